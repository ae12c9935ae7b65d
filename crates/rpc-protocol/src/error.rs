//! Wire-level failures: bad magic, truncated frames, (de)serialization errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Decoder contract step 2: magic mismatch. The connection must be closed;
    /// no resynchronization is attempted.
    #[error("bad magic number, expected 0xCAFEBABE")]
    BadMagic,

    #[error("unknown message type byte: {0}")]
    UnknownMessageType(u8),

    #[error("unknown serializer byte: {0}")]
    UnknownSerializer(u8),

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("deserialization failed: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
