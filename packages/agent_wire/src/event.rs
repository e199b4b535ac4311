//! Event envelopes for the conversation-room socket.
//!
//! Every frame is `{"event": <name>, "payload": {...}}`, with event names
//! shared with the backend. [`ClientEvent`] is what we send, [`ServerEvent`]
//! what we receive.

use serde::{Deserialize, Serialize};

use crate::types::{AgentMessage, SystemMessage};

/// Bearer credential carried inside a join payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub auth: Auth,
    pub conv_id: String,
    pub agent_uids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePayload {
    pub conv_id: String,
}

/// Envelopes sent FROM the client TO the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "multi-agent-join")]
    Join(JoinPayload),
    #[serde(rename = "multi-agent-leave")]
    Leave(LeavePayload),
}

/// Acknowledgement that a join took effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedAck {
    pub conv_id: String,
    #[serde(default)]
    pub agent_uids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conv_id: Option<String>,
}

/// Channel-level diagnostic (auth failure, bad join, internal error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelErrorPayload {
    pub error: String,
}

/// Envelopes sent FROM the server TO the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "multi-agent-joined")]
    Joined(JoinedAck),
    #[serde(rename = "multi-agent-left")]
    Left(LeftAck),
    #[serde(rename = "multi-agent-error")]
    ChannelError(ChannelErrorPayload),
    #[serde(rename = "multi-agent-message")]
    Message(AgentMessage),
    #[serde(rename = "multi-agent-system")]
    System(SystemMessage),
}
