//! # Agent Wire
//!
//! Wire protocol types for multi-agent conversation rooms.
//!
//! A conversation room groups one user with a chosen subset of agents. The
//! client joins the room over a WebSocket carrying named JSON events, then
//! receives the streamed replies of every agent in the room, interleaved.
//! Dispatching a user message happens out of band over plain HTTP; only the
//! resulting streams come back through the socket.
//!
//! Every frame on the socket is an envelope:
//!
//! ```text
//! {"event": "multi-agent-message", "payload": { ... }}
//! ```
//!
//! [`ClientEvent`] covers the outbound envelopes (join/leave), [`ServerEvent`]
//! the inbound ones (acknowledgements, per-agent stream payloads, system
//! messages). Per-agent payloads are discriminated by `data.type` into the
//! [`AgentData`] sum type so consumers can match exhaustively.

pub mod agent;
pub mod event;
pub mod types;

pub use agent::{AgentConfig, AgentDescriptor, MultiChatRequest, MultiChatResponse};
pub use event::{
    Auth, ChannelErrorPayload, ClientEvent, JoinPayload, JoinedAck, LeavePayload, LeftAck,
    ServerEvent,
};
pub use types::{AgentData, AgentMessage, Reference, SystemData, SystemKind, SystemMessage, Usage};
