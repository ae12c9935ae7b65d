//! Message types carried inside a framed message (spec §3, §4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `type` field of the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 1,
    HeartbeatRequest = 2,
    HeartbeatResponse = 3,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            2 => Some(Self::HeartbeatRequest),
            3 => Some(Self::HeartbeatResponse),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn carries_request(self) -> bool {
        matches!(self, Self::Request | Self::HeartbeatRequest)
    }
}

/// `serializer` field of the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SerializerKind {
    Jdk = 0,
    Protostuff = 1,
}

impl SerializerKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Jdk),
            1 => Some(Self::Protostuff),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl Default for SerializerKind {
    fn default() -> Self {
        Self::Protostuff
    }
}

/// An RPC call, immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub class_name: String,
    pub method_name: String,
    pub param_types: Vec<String>,
    pub params: Vec<serde_json::Value>,
    pub heartbeat: bool,
}

impl Request {
    /// A heartbeat request body: otherwise-empty per spec §4.1.
    pub fn heartbeat(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            class_name: String::new(),
            method_name: String::new(),
            param_types: Vec::new(),
            params: Vec::new(),
            heartbeat: true,
        }
    }
}

/// An application-level RPC failure carried back in a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteException {
    pub class_name: String,
    pub message: String,
}

/// The result of an RPC call. Exactly one of `result` / `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<RemoteException>,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self { request_id: request_id.into(), result: Some(result), error: None }
    }

    pub fn err(request_id: impl Into<String>, error: RemoteException) -> Self {
        Self { request_id: request_id.into(), result: None, error: Some(error) }
    }

    /// The literal heartbeat reply body specified in spec §4.1.
    pub fn pong(request_id: impl Into<String>) -> Self {
        Self::ok(request_id, serde_json::Value::String("PONG".to_owned()))
    }
}

/// The `Request` or `Response` carried by a framed message, tagged by
/// [`MessageType`] in the header rather than here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    Request(Request),
    Response(Response),
}

/// Everything serialized as the frame body: the `Request`/`Response` plus
/// the attachment map (spec §3 "Framed message").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub body: Body,
    #[serde(default)]
    pub attachments: HashMap<String, String>,
}

/// A complete framed message as exchanged on the wire (spec §3, §4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct FramedMessage {
    pub message_type: MessageType,
    pub serializer: SerializerKind,
    pub message_id: u32,
    pub body: Body,
    pub attachments: HashMap<String, String>,
}

impl FramedMessage {
    pub fn request(message_id: u32, serializer: SerializerKind, req: Request) -> Self {
        let message_type = if req.heartbeat { MessageType::HeartbeatRequest } else { MessageType::Request };
        Self { message_type, serializer, message_id, body: Body::Request(req), attachments: HashMap::new() }
    }

    pub fn response(message_id: u32, serializer: SerializerKind, resp: Response, heartbeat: bool) -> Self {
        let message_type = if heartbeat { MessageType::HeartbeatResponse } else { MessageType::Response };
        Self { message_type, serializer, message_id, body: Body::Response(resp), attachments: HashMap::new() }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match &self.body {
            Body::Response(r) => Some(r),
            Body::Request(_) => None,
        }
    }

    pub fn as_request(&self) -> Option<&Request> {
        match &self.body {
            Body::Request(r) => Some(r),
            Body::Response(_) => None,
        }
    }
}
