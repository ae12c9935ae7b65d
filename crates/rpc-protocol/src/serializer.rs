//! Pluggable body (de)serialization, selected by the frame's `serializer` byte.
//!
//! The Java reference design offers a JDK-native serializer and a
//! Protostuff binary serializer (the default). This crate keeps both wire
//! identifiers but backs them with serde-compatible formats: `Jdk` maps to
//! `serde_json` (a textual, reflection-free stand-in for JDK serialization)
//! and `Protostuff` maps to `bincode` (a compact binary format, matching
//! Protostuff's role as the efficient default).

use crate::error::ProtocolError;
use crate::message::{Payload, SerializerKind};

pub trait MessageSerializer: Send + Sync {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>, ProtocolError>;
    fn decode(&self, bytes: &[u8]) -> Result<Payload, ProtocolError>;
}

pub struct JdkSerializer;

impl MessageSerializer for JdkSerializer {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(payload).map_err(|e| ProtocolError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Deserialize(e.to_string()))
    }
}

pub struct ProtostuffSerializer;

impl MessageSerializer for ProtostuffSerializer {
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(payload).map_err(|e| ProtocolError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload, ProtocolError> {
        bincode::deserialize(bytes).map_err(|e| ProtocolError::Deserialize(e.to_string()))
    }
}

/// Resolve the serializer implementation for a wire-level [`SerializerKind`].
pub fn for_kind(kind: SerializerKind) -> &'static dyn MessageSerializer {
    match kind {
        SerializerKind::Jdk => &JdkSerializer,
        SerializerKind::Protostuff => &ProtostuffSerializer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Body, Request};

    fn sample_payload() -> Payload {
        Payload {
            body: Body::Request(Request {
                request_id: "r1".into(),
                class_name: "com.example.Svc".into(),
                method_name: "call".into(),
                param_types: vec!["java.lang.String".into()],
                params: vec![serde_json::json!("hi")],
                heartbeat: false,
            }),
            attachments: Default::default(),
        }
    }

    #[test]
    fn jdk_round_trip() {
        let p = sample_payload();
        let bytes = for_kind(SerializerKind::Jdk).encode(&p).unwrap();
        let back = for_kind(SerializerKind::Jdk).decode(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn protostuff_round_trip() {
        let p = sample_payload();
        let bytes = for_kind(SerializerKind::Protostuff).encode(&p).unwrap();
        let back = for_kind(SerializerKind::Protostuff).decode(&bytes).unwrap();
        assert_eq!(p, back);
    }
}
