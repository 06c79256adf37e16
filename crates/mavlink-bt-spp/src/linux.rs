//! Linux SPP connector using bluer (BlueZ)

use async_trait::async_trait;
use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::{Address, Device, Session};
use futures::StreamExt;
use mavlink_bt_core::{Result, SppConnector, SppSocket};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::SppConfig;
use crate::error::SppAdapterError;

// ----------------------------------------------------------------------------
// Connector
// ----------------------------------------------------------------------------

/// Opens RFCOMM streams through the system BlueZ daemon
pub struct BluezSppConnector {
    config: SppConfig,
    session: Option<Session>,
}

impl BluezSppConnector {
    pub fn new(config: SppConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    async fn session(&mut self) -> std::result::Result<Session, SppAdapterError> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let session = Session::new().await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn open(
        &mut self,
        address: Address,
    ) -> std::result::Result<(Stream, Option<String>), SppAdapterError> {
        let session = self.session().await?;
        let adapter = session.default_adapter().await?;
        if !adapter.is_powered().await.unwrap_or(false) {
            adapter.set_powered(true).await?;
        }

        let device = adapter.device(address)?;
        let name = device.name().await.ok().flatten();

        let stream = match self.config.channel {
            Some(channel) => {
                debug!("Connecting RFCOMM channel {} on {}", channel, address);
                Stream::connect(SocketAddr::new(address, channel)).await?
            }
            None => self.connect_profile(&session, &device).await?,
        };
        Ok((stream, name))
    }

    /// Resolve the channel through the serial port service record
    async fn connect_profile(
        &self,
        session: &Session,
        device: &Device,
    ) -> std::result::Result<Stream, SppAdapterError> {
        let profile = Profile {
            uuid: self.config.service_uuid,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = session.register_profile(profile).await?;
        debug!("Registered SPP client profile {}", self.config.service_uuid);

        let connect = device.connect_profile(&self.config.service_uuid);
        tokio::pin!(connect);
        let mut connect_done = false;

        // BlueZ hands the socket to the profile before connect_profile returns
        loop {
            tokio::select! {
                result = &mut connect, if !connect_done => {
                    result?;
                    connect_done = true;
                }
                request = handle.next() => {
                    let request = request.ok_or(SppAdapterError::ProfileClosed)?;
                    return Ok(request.accept()?);
                }
            }
        }
    }
}

#[async_trait]
impl SppConnector for BluezSppConnector {
    async fn connect(&mut self, address: &str) -> Result<(Box<dyn SppSocket>, Option<String>)> {
        let target: Address = address
            .parse()
            .map_err(|_| SppAdapterError::InvalidAddress(address.to_string()))?;

        let (stream, name) = timeout(self.config.connect_timeout, self.open(target))
            .await
            .map_err(|_| SppAdapterError::ConnectionTimeout)??;

        info!("SPP stream open to {}", address);
        Ok((Box::new(BluezSppSocket { stream }), name))
    }
}

// ----------------------------------------------------------------------------
// Socket
// ----------------------------------------------------------------------------

struct BluezSppSocket {
    stream: Stream,
}

#[async_trait]
impl SppSocket for BluezSppSocket {
    async fn write_all(&mut self, buffer: &[u8]) -> Result<()> {
        self.stream
            .write_all(buffer)
            .await
            .map_err(SppAdapterError::from)?;
        self.stream.flush().await.map_err(SppAdapterError::from)?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Failed to shut down SPP stream: {}", e);
        }
    }
}
