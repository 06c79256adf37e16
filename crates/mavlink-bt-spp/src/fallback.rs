//! Fallback SPP connector for platforms without BlueZ

use async_trait::async_trait;
use mavlink_bt_core::{Result, SppConnector, SppSocket};
use tracing::warn;

use crate::config::SppConfig;
use crate::error::SppAdapterError;

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Connector that reports SPP as unavailable
pub struct BluezSppConnector {
    #[allow(dead_code)]
    config: SppConfig,
}

impl BluezSppConnector {
    pub fn new(config: SppConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SppConnector for BluezSppConnector {
    async fn connect(&mut self, address: &str) -> Result<(Box<dyn SppSocket>, Option<String>)> {
        warn!(
            "SPP is only supported with BlueZ on Linux, cannot connect to {}",
            address
        );
        Err(SppAdapterError::Unsupported.into())
    }
}
