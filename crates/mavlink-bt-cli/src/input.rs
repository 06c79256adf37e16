//! Upstream MAVLink byte sources
//!
//! Each UDP datagram or stdin read is handed to the forwarder as one raw
//! frame; the link splits it into MTU-sized fragments.

use anyhow::{Context, Result};
use mavlink_bt_core::RawFrameSink;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

/// Where outbound bytes are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    Udp(String),
    Stdin,
}

impl FrameSource {
    /// Read frames into `sink` until the source closes. Returns the number of
    /// bytes handed over.
    pub async fn pump<S>(self, sink: &S, buffer_size: usize) -> Result<u64>
    where
        S: RawFrameSink + ?Sized,
    {
        match self {
            FrameSource::Udp(bind) => {
                let socket = bind_udp(&bind).await?;
                pump_udp(&socket, sink, buffer_size).await
            }
            FrameSource::Stdin => {
                info!("Reading MAVLink bytes from stdin");
                pump_reader(tokio::io::stdin(), sink, buffer_size).await
            }
        }
    }
}

pub async fn bind_udp(bind: &str) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("Failed to bind UDP socket on {}", bind))?;
    info!(
        "Receiving MAVLink datagrams on {}",
        socket.local_addr().context("UDP socket has no local address")?
    );
    Ok(socket)
}

/// Forward every datagram received on `socket`. Never returns `Ok`.
pub async fn pump_udp<S>(socket: &UdpSocket, sink: &S, buffer_size: usize) -> Result<u64>
where
    S: RawFrameSink + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let (len, peer) = socket
            .recv_from(&mut buffer)
            .await
            .context("Failed to receive UDP datagram")?;
        trace!("{} bytes from {}", len, peer);
        sink.on_raw_frame(&buffer[..len]);
    }
}

/// Forward reads from `reader` until end of input
pub async fn pump_reader<R, S>(mut reader: R, sink: &S, buffer_size: usize) -> Result<u64>
where
    R: AsyncRead + Unpin,
    S: RawFrameSink + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;
    loop {
        let len = reader
            .read(&mut buffer)
            .await
            .context("Failed to read input")?;
        if len == 0 {
            debug!("Input closed after {} bytes", total);
            return Ok(total);
        }
        sink.on_raw_frame(&buffer[..len]);
        total += len as u64;
    }
}
