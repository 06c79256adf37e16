//! mavbt CLI library
//!
//! Wires the forwarder in `mavlink-bt-core` to the btleplug and BlueZ
//! adapters and feeds it MAVLink bytes from UDP or stdin.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;

pub use app::LinkApp;
pub use cli::{Cli, Commands};
pub use config::CliAppConfig;
pub use error::{CliError, Result};
pub use input::FrameSource;
