//! TCP connections carrying protocol frames.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::error::{Result, TransportError};
use crate::protocol::{Frame, FrameHeader, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// TCP transport configuration.
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Whether to enable TCP_NODELAY.
    pub nodelay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            nodelay: true,
        }
    }
}

/// Connection factory for the frame protocol.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Creates a transport with the given configuration.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    /// Dials the given address, bounded by the configured connect timeout.
    pub async fn connect(&self, addr: &str) -> Result<TcpConnection> {
        let timeout = std::time::Duration::from_millis(self.config.connect_timeout_ms);
        let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectionTimeout {
                addr: addr.to_string(),
                timeout_ms: self.config.connect_timeout_ms,
            })?
            .map_err(TransportError::IoError)?;
        if self.config.nodelay {
            stream.set_nodelay(true).map_err(TransportError::IoError)?;
        }
        tracing::debug!(addr, "TCP connected");
        TcpConnection::from_stream(stream)
    }

    /// Binds a listener on the given address.
    pub async fn listen(&self, addr: &str) -> Result<tokio::net::TcpListener> {
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(TransportError::IoError)
    }

    /// Accepts one incoming connection from the listener.
    pub async fn accept(&self, listener: &tokio::net::TcpListener) -> Result<TcpConnection> {
        let (stream, _) = listener.accept().await.map_err(TransportError::IoError)?;
        if self.config.nodelay {
            stream.set_nodelay(true).map_err(TransportError::IoError)?;
        }
        TcpConnection::from_stream(stream)
    }
}

/// A framed TCP connection. Reads and writes are independently serialized
/// so a reader task and concurrent senders can share one connection.
pub struct TcpConnection {
    read: Mutex<OwnedReadHalf>,
    write: Mutex<OwnedWriteHalf>,
    peer_addr: String,
}

impl TcpConnection {
    pub(crate) fn from_stream(stream: tokio::net::TcpStream) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let (read, write) = stream.into_split();
        Ok(Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
            peer_addr,
        })
    }

    /// Sends one frame.
    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let encoded = frame.encode();
        let mut write = self.write.lock().await;
        write
            .write_all(&encoded)
            .await
            .map_err(TransportError::IoError)?;
        write.flush().await.map_err(TransportError::IoError)?;
        Ok(())
    }

    /// Receives one frame, validating header and payload checksum.
    pub async fn recv_frame(&self) -> Result<Frame> {
        let mut read = self.read.lock().await;
        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        read.read_exact(&mut header_buf)
            .await
            .map_err(TransportError::IoError)?;
        let header = FrameHeader::decode(&header_buf)?;
        if header.payload_length > MAX_PAYLOAD_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: header.payload_length,
                max_size: MAX_PAYLOAD_SIZE,
            });
        }
        let mut payload = vec![0u8; header.payload_length as usize];
        if !payload.is_empty() {
            read.read_exact(&mut payload)
                .await
                .map_err(TransportError::IoError)?;
        }
        let frame = Frame { header, payload };
        frame.validate()?;
        Ok(frame)
    }

    /// The remote peer address.
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
