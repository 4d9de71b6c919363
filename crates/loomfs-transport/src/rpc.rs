//! Request/response RPC over framed TCP connections.
//!
//! The client multiplexes requests onto one connection: a background reader
//! task routes each response frame to the waiting caller by request id. The
//! server spawns a task per accepted connection and hands every request
//! frame to an [`RpcHandler`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::protocol::{Frame, Opcode};
use crate::tcp::TcpConnection;

/// Configuration for the RPC client.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Per-request response timeout in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
        }
    }
}

/// Handles incoming RPC requests on the server side.
///
/// The returned bytes become the response payload for the request frame.
pub trait RpcHandler: Send + Sync + 'static {
    /// Processes one request frame.
    fn handle(&self, request: Frame) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;
}

/// RPC client for one connection.
pub struct RpcClient {
    conn: Arc<TcpConnection>,
    config: RpcClientConfig,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Frame>>>>,
    reader: tokio::task::JoinHandle<()>,
}

impl RpcClient {
    /// Creates a client over an established connection and starts its
    /// background reader task.
    pub fn new(conn: Arc<TcpConnection>, config: RpcClientConfig) -> Self {
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Frame>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let reader_conn = conn.clone();
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            loop {
                match reader_conn.recv_frame().await {
                    Ok(frame) => {
                        let request_id = frame.request_id();
                        let mut map = reader_pending.lock().await;
                        if let Some(tx) = map.remove(&request_id) {
                            let _ = tx.send(frame);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "RPC reader stopping");
                        break;
                    }
                }
            }
        });
        Self {
            conn,
            config,
            next_id: AtomicU64::new(1),
            pending,
            reader,
        }
    }

    /// Sends one request and waits for its response.
    pub async fn call(&self, opcode: Opcode, payload: Vec<u8>) -> Result<Frame> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::new(opcode, request_id, payload);
        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(request_id, tx);
        }
        self.conn.send_frame(&frame).await?;
        let timeout = std::time::Duration::from_millis(self.config.response_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::ConnectionReset),
            Err(_) => {
                let mut map = self.pending.lock().await;
                map.remove(&request_id);
                Err(TransportError::RequestTimeout {
                    request_id,
                    timeout_ms: self.config.response_timeout_ms,
                })
            }
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// RPC server: accept loop dispatching request frames to a handler.
pub struct RpcServer;

impl RpcServer {
    /// Runs the accept loop until the listener fails. Spawns one task per
    /// connection; each task serves requests sequentially.
    pub async fn serve(
        listener: tokio::net::TcpListener,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<()> {
        loop {
            let (stream, peer_addr) = listener.accept().await.map_err(TransportError::IoError)?;
            debug!(peer = %peer_addr, "accepted connection");
            let handler = handler.clone();
            tokio::spawn(async move {
                let conn = match TcpConnection::from_stream(stream) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "failed to wrap connection");
                        return;
                    }
                };
                loop {
                    let frame = match conn.recv_frame().await {
                        Ok(f) => f,
                        Err(e) => {
                            debug!(error = %e, "connection closed");
                            break;
                        }
                    };
                    match handler.handle(frame.clone()).await {
                        Ok(payload) => {
                            let response = frame.make_response(payload);
                            if let Err(e) = conn.send_frame(&response).await {
                                warn!(error = %e, "failed to send response");
                                break;
                            }
                        }
                        Err(e) => {
                            // Without a payload there is nothing to answer
                            // with; the caller will time out.
                            warn!(error = %e, opcode = ?frame.opcode(), "handler error");
                        }
                    }
                }
            });
        }
    }
}
