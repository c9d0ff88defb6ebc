//! Wire shape of one bus message.
//!
//! ```text
//! { "label": "ping" | 7, "data": <any json>, "callbackNum": 3 | null }
//! ```
//! A string label addresses a topic; a numeric label addresses the pending request
//! with that callback id.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// Per-bus request sequence number used to correlate replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(pub u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message address: a topic name or the callback id of a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Reply(CallbackId),
    Topic(String),
}

impl Label {
    pub fn as_topic(&self) -> Option<&str> {
        match self {
            Label::Topic(t) => Some(t.as_str()),
            Label::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<CallbackId> {
        match self {
            Label::Reply(id) => Some(*id),
            Label::Topic(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Topic(t) => f.write_str(t),
            Label::Reply(id) => write!(f, "reply#{id}"),
        }
    }
}

impl From<&str> for Label {
    fn from(topic: &str) -> Self {
        Label::Topic(topic.to_string())
    }
}

impl From<String> for Label {
    fn from(topic: String) -> Self {
        Label::Topic(topic)
    }
}

impl From<CallbackId> for Label {
    fn from(id: CallbackId) -> Self {
        Label::Reply(id)
    }
}

/// One message as handed to / received from a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub label: Label,
    #[serde(default)]
    pub data: Value,
    /// Present on requests; the receiver replies to `Label::Reply(callback_num)`.
    #[serde(default)]
    pub callback_num: Option<CallbackId>,
}

impl Envelope {
    pub fn new(label: Label, data: Value, callback_num: Option<CallbackId>) -> Self {
        Self {
            label,
            data,
            callback_num,
        }
    }

    /// Encodes the envelope as JSON text.
    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes an envelope from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(text)?)
    }
}
