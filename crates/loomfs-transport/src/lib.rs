#![warn(missing_docs)]

//! LoomFS transport: binary frame protocol over TCP with request/response
//! multiplexing, plus typed clients for the four remote interfaces.
//!
//! The naming server and the storage servers each expose two interfaces
//! (service/registration and storage/command respectively). All four ride
//! the same framed RPC layer: a fixed-size header carrying an opcode and a
//! request id, followed by a bincode-encoded payload.

pub mod client;
pub mod error;
pub mod message;
pub mod protocol;
pub mod rpc;
pub mod tcp;

pub use client::{ClientError, CommandClient, RegistrationClient, ServiceClient, StorageClient};
pub use error::{Result, TransportError};
pub use message::{
    deserialize_message, serialize_message, CommandRequest, CommandResponse, RegisterRequest,
    RegisterResponse, RemoteError, ServiceRequest, ServiceResponse, StorageRequest,
    StorageResponse,
};
pub use protocol::{Frame, FrameFlags, FrameHeader, Opcode};
pub use rpc::{RpcClient, RpcClientConfig, RpcHandler, RpcServer};
pub use tcp::{TcpConnection, TcpTransport, TcpTransportConfig};
