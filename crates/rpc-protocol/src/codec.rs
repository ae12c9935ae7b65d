//! Frame-level codec implementing spec §4.1:
//!
//! ```text
//! magic(4)=0xCAFEBABE | version(1)=1 | serializer(1) | type(1) | msgId(4) | length(4) | body(length)
//! ```
//!
//! All integers are big-endian; the header is 15 bytes.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::ProtocolError;
use crate::message::{Body, FramedMessage, MessageType, Payload, SerializerKind};
use crate::serializer;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 15;

#[derive(Debug, Default)]
pub struct RpcCodec;

impl Decoder for RpcCodec {
    type Item = FramedMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FramedMessage>, ProtocolError> {
        // Step 1: need at least the full header before reading anything.
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut cursor = &src[..HEADER_LEN];
        let magic = cursor.get_u32();
        if magic != MAGIC {
            warn!(magic, "bad magic number, closing connection");
            return Err(ProtocolError::BadMagic);
        }
        let _version = cursor.get_u8();
        let serializer_byte = cursor.get_u8();
        let type_byte = cursor.get_u8();
        let message_id = cursor.get_u32();
        let length = cursor.get_u32() as usize;

        // Step 4: if the buffered body is shorter than `length`, wait for more
        // without consuming the header (we haven't advanced `src` yet).
        if src.len() < HEADER_LEN + length {
            src.reserve(HEADER_LEN + length - src.len());
            return Ok(None);
        }

        let serializer_kind = SerializerKind::from_byte(serializer_byte)
            .ok_or(ProtocolError::UnknownSerializer(serializer_byte))?;
        let message_type = MessageType::from_byte(type_byte)
            .ok_or(ProtocolError::UnknownMessageType(type_byte))?;

        src.advance(HEADER_LEN);
        let body_bytes = src.split_to(length);

        let payload: Payload = serializer::for_kind(serializer_kind).decode(&body_bytes)?;
        validate_body_matches_type(message_type, &payload.body)?;

        Ok(Some(FramedMessage {
            message_type,
            serializer: serializer_kind,
            message_id,
            body: payload.body,
            attachments: payload.attachments,
        }))
    }
}

impl Encoder<FramedMessage> for RpcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: FramedMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = Payload { body: msg.body, attachments: msg.attachments };
        let body_bytes = serializer::for_kind(msg.serializer).encode(&payload)?;

        dst.reserve(HEADER_LEN + body_bytes.len());
        dst.put_u32(MAGIC);
        dst.put_u8(VERSION);
        dst.put_u8(msg.serializer.as_byte());
        dst.put_u8(msg.message_type.as_byte());
        dst.put_u32(msg.message_id);
        dst.put_u32(body_bytes.len() as u32);
        dst.put_slice(&body_bytes);
        Ok(())
    }
}

fn validate_body_matches_type(message_type: MessageType, body: &Body) -> Result<(), ProtocolError> {
    match (message_type, body) {
        (MessageType::Request | MessageType::HeartbeatRequest, Body::Request(_)) => Ok(()),
        (MessageType::Response | MessageType::HeartbeatResponse, Body::Response(_)) => Ok(()),
        _ => Err(ProtocolError::Deserialize(
            "message type/body mismatch".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    fn sample_request(id: u32) -> FramedMessage {
        FramedMessage::request(
            id,
            SerializerKind::Protostuff,
            Request {
                request_id: "r1".into(),
                class_name: "Svc".into(),
                method_name: "ping".into(),
                param_types: vec![],
                params: vec![],
                heartbeat: false,
            },
        )
    }

    #[test]
    fn round_trip() {
        let mut codec = RpcCodec;
        let mut buf = BytesMut::new();
        let original = sample_request(7);
        codec.encode(original.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, original);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_header() {
        let mut codec = RpcCodec;
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 0, 0]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_body() {
        let mut codec = RpcCodec;
        let mut full = BytesMut::new();
        codec.encode(sample_request(1), &mut full).unwrap();

        let mut partial = BytesMut::new();
        partial.put_slice(&full[..full.len() - 2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        // Nothing should have been consumed while waiting.
        assert_eq!(partial.len(), full.len() - 2);
    }

    #[test]
    fn bad_magic_closes_connection() {
        let mut codec = RpcCodec;
        let mut buf = BytesMut::new();
        buf.put_u32(0xDEAD_BEEF);
        buf.put_slice(&[0u8; 11]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::BadMagic));
    }

    #[test]
    fn heartbeat_pong_round_trip() {
        use crate::message::Response;
        let mut codec = RpcCodec;
        let mut buf = BytesMut::new();
        let msg = FramedMessage::response(3, SerializerKind::Protostuff, Response::pong("r1"), true);
        codec.encode(msg.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.message_type, MessageType::HeartbeatResponse);
    }
}
