use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Correlation id of one outstanding call
///
/// Ids start at 1 and are never reused by the generator that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl CallId {
    pub const FIRST: CallId = CallId(1);

    pub fn next(self) -> CallId {
        CallId(self.0 + 1)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub call_id: CallId,
    pub call: String,
    pub arguments: Vec<Value>,
}

/// Response to a [`CallRequest`]
///
/// By convention `arguments[0]` is `Null` on success or a
/// [`Value::Error`] on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub call_response: CallId,
    pub arguments: Vec<Value>,
}

/// One-time list of operation names published by a callee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub function_names: Vec<String>,
}

/// Any message a channel carries
///
/// Serialized externally tagged, so a request travels as
/// `{"request": {callId, call, arguments}}`. The outer tag is a codec
/// artifact: bincode cannot decode an untagged enum. The bodies keep the
/// plain `{callId, call, arguments}`, `{callResponse, arguments}` and
/// `{functionNames}` shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Message {
    Request(CallRequest),
    Response(CallResponse),
    Announcement(Announcement),
}

impl Message {
    /// Argument array of the message, if it has one
    pub fn arguments_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Message::Request(r) => Some(&mut r.arguments),
            Message::Response(r) => Some(&mut r.arguments),
            Message::Announcement(_) => None,
        }
    }
}

impl From<CallRequest> for Message {
    fn from(r: CallRequest) -> Self {
        Message::Request(r)
    }
}

impl From<CallResponse> for Message {
    fn from(r: CallResponse) -> Self {
        Message::Response(r)
    }
}

impl From<Announcement> for Message {
    fn from(a: Announcement) -> Self {
        Message::Announcement(a)
    }
}
