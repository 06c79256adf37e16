//! btleplug transport adapter for the MAVLink Bluetooth forwarder
//!
//! This crate implements the forwarder's BLE capabilities on top of
//! `btleplug`, so the link state machine in `mavlink-bt-core` can scan for,
//! connect to and write to a Nordic UART Service peripheral on Linux, macOS
//! and Windows.
//!
//! ## Architecture
//!
//! - [`config`] - Adapter selection and connect timeout
//! - [`error`] - Error types raised by the platform stack
//! - [`protocol`] - Translation of btleplug types into transport events
//! - [`central`] - Address-filtered scanning
//! - [`connection`] - Per-connection GATT driver and fragment writes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mavlink_bt_ble::{BleAdapterConfig, BtleplugCentral};
//! use mavlink_bt_core::{DisabledSpp, Forwarder, ForwarderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let central = BtleplugCentral::initialize(BleAdapterConfig::default()).await?;
//! let (forwarder, mut events, _worker) = Forwarder::spawn_with_channel(
//!     ForwarderConfig::default(),
//!     Box::new(central),
//!     Box::new(DisabledSpp),
//! )?;
//!
//! forwarder.connect("AA:BB:CC:DD:EE:FF");
//! if let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Notes
//!
//! btleplug negotiates the ATT MTU internally and exposes no request call, so
//! links opened through this adapter use the fallback chunk size.

pub mod central;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;

pub use central::BtleplugCentral;
pub use config::BleAdapterConfig;
pub use connection::BtleplugGattClient;
pub use error::BleAdapterError;
