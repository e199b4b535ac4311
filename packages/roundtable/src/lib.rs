//! # Roundtable
//!
//! Client for multi-agent streaming conversations. One user message fans out
//! to several AI agents at once; their replies stream back interleaved over a
//! single WebSocket and are merged into one stable display log.
//!
//! The moving parts:
//!
//! - [`channel`] owns the WebSocket and turns frames into ordered notices.
//! - [`membership`] tracks which conversation room we are in.
//! - [`reconciler`] merges the interleaved streams into the display log.
//! - [`session`] is the actor tying those together behind a [`SessionHandle`].
//! - [`dispatch`] and [`directory`] are the two HTTP calls: submit a message
//!   for fan-out, and list the agents available to talk to.

pub mod channel;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod membership;
pub mod reconciler;
pub mod session;

pub use channel::{ChannelHandle, ChannelNotice, ConnectionState};
pub use config::RoundtableConfig;
pub use directory::AgentDirectory;
pub use dispatch::DispatchClient;
pub use error::{DirectoryError, DispatchError, ProtocolError, TransportError};
pub use membership::Membership;
pub use reconciler::{
    AgentPhase, DisplayMessage, LogChange, MessageKind, Producer, Reconciler,
};
pub use session::{SessionHandle, SessionSnapshot, SessionUpdate, spawn_session};
