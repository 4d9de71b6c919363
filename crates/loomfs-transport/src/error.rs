//! Transport-level error types.

use thiserror::Error;

/// Errors surfaced by the framing, connection, and RPC layers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the peer within the connect timeout.
    #[error("connection timeout after {timeout_ms}ms to {addr}")]
    ConnectionTimeout {
        /// Address that was dialed.
        addr: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The peer closed the connection mid-exchange.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// A frame failed structural validation.
    #[error("invalid frame: {reason}")]
    InvalidFrame {
        /// Why the frame was rejected.
        reason: String,
    },

    /// The frame did not begin with the protocol magic.
    #[error("invalid magic number: expected 0x{expected:08X}, got 0x{got:08X}")]
    InvalidMagic {
        /// Expected magic constant.
        expected: u32,
        /// Received value.
        got: u32,
    },

    /// The peer speaks a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Supported version.
        expected: u8,
        /// Received version.
        got: u8,
    },

    /// The payload checksum did not match the header.
    #[error("checksum mismatch: expected 0x{expected:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch {
        /// Checksum carried in the header.
        expected: u32,
        /// Checksum computed over the received payload.
        computed: u32,
    },

    /// The advertised payload length exceeds the protocol limit.
    #[error("payload too large: {size} bytes (max {max_size})")]
    PayloadTooLarge {
        /// Advertised payload size.
        size: u32,
        /// Protocol maximum.
        max_size: u32,
    },

    /// No response arrived within the per-request timeout.
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Request id assigned by the client.
        request_id: u64,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The opcode field does not name a known operation.
    #[error("unknown opcode: 0x{0:04X}")]
    UnknownOpcode(u16),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An underlying socket error.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Convenience alias used throughout the transport crate.
pub type Result<T> = std::result::Result<T, TransportError>;
