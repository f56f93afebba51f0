//! One-shot TCP transport.
//!
//! Every envelope gets its own connection: the sender connects, writes the
//! whole payload, shuts down its write half and closes. The receiver reads
//! until EOF, bounded by a maximum size and a timeout. There is no length
//! prefix and no connection reuse.

use crate::network::PeerId;
use crate::utils::{NetworkError, NodeError, ProtocolError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;

/// Bound TCP listener accepting one envelope per connection
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `host:port` with address reuse enabled
    ///
    /// Port `0` asks the OS for an ephemeral port; see [`Listener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address cannot be resolved
    /// or bound, for example when the port is already in use.
    pub async fn bind(host: &str, port: u16, backlog: u32) -> Result<Self> {
        let address = format!("{host}:{port}");
        let bind_failed = |reason: String| NetworkError::BindFailed {
            address: address.clone(),
            reason,
        };

        let addr = lookup_host((host, port))
            .await
            .map_err(|e| bind_failed(e.to_string()))?
            .next()
            .ok_or_else(|| bind_failed("address did not resolve".to_string()))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| bind_failed(e.to_string()))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| bind_failed(e.to_string()))?;
        socket.bind(addr).map_err(|e| bind_failed(e.to_string()))?;
        let inner = socket
            .listen(backlog)
            .map_err(|e| bind_failed(e.to_string()))?;
        let local_addr = inner.local_addr().map_err(|e| bind_failed(e.to_string()))?;

        log::info!("Listening on {}", local_addr);
        Ok(Self { inner, local_addr })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next inbound connection
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(self.inner.accept().await?)
    }
}

/// Read one frame: everything up to EOF, at most `max_size` bytes
///
/// # Errors
///
/// Returns [`ProtocolError::MessageTooLarge`] if the peer sends more than
/// `max_size` bytes, or an I/O error if the read fails.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let limit = u64::try_from(max_size)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    reader.take(limit).read_to_end(&mut buffer).await?;

    if buffer.len() > max_size {
        return Err(ProtocolError::MessageTooLarge {
            size: buffer.len(),
            max: max_size,
        }
        .into());
    }

    Ok(buffer)
}

/// Read one frame from an accepted connection, giving up after `limit`
pub async fn receive_frame(
    stream: &mut TcpStream,
    max_size: usize,
    limit: Duration,
) -> Result<Vec<u8>> {
    timeout(limit, read_frame(stream, max_size))
        .await
        .map_err(|_| NetworkError::Timeout {
            operation: "read envelope".to_string(),
        })?
}

/// Open a connection to `peer`, write `payload`, close
///
/// Connecting and writing together are bounded by `limit`.
///
/// # Errors
///
/// Returns [`NetworkError::Timeout`] if the peer does not accept and drain the
/// payload in time, or [`NetworkError::ConnectionFailed`] on any I/O failure.
pub async fn send_frame(peer: &PeerId, payload: &[u8], limit: Duration) -> Result<()> {
    let exchange = async {
        let mut stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
        stream.write_all(payload).await?;
        stream.shutdown().await?;
        Ok::<(), std::io::Error>(())
    };

    match timeout(limit, exchange).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(NodeError::Network(NetworkError::ConnectionFailed {
            peer: peer.to_string(),
            reason: e.to_string(),
        })),
        Err(_) => Err(NodeError::Network(NetworkError::Timeout {
            operation: format!("send to {peer}"),
        })),
    }
}
