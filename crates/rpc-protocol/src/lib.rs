//! Wire framing and message types shared by the RPC resilience core.
//!
//! This crate is transport-agnostic: it defines the frame format, the
//! `Request`/`Response` data model, and a `tokio_util::codec` encoder/decoder
//! pair. Connection pooling, retries, and routing live in `rpc-core`.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod serializer;

pub use codec::RpcCodec;
pub use endpoint::{Endpoint, EndpointKey};
pub use error::ProtocolError;
pub use message::{Body, FramedMessage, MessageType, RemoteException, Request, Response, SerializerKind};
