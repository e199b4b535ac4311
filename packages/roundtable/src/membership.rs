//! Room membership bookkeeping.
//!
//! A room is one conversation id plus one agent subset. This tracks which
//! room we are in (or are joining) and builds the outbound join/leave
//! envelopes; the caller puts them on the wire. Pure state, no I/O.

use agent_wire::{Auth, ClientEvent, JoinPayload, JoinedAck, LeavePayload};
use tracing::debug;

/// The join we are waiting to see acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingJoin {
    conv_id: String,
    agent_uids: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Membership {
    conv_id: String,
    agent_uids: Vec<String>,
    joined: bool,
    pending: Option<PendingJoin>,
}

impl Membership {
    pub fn new(conv_id: String) -> Self {
        Self {
            conv_id,
            ..Default::default()
        }
    }

    pub fn conv_id(&self) -> &str {
        &self.conv_id
    }

    pub fn agent_uids(&self) -> &[String] {
        &self.agent_uids
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn has_agents(&self) -> bool {
        !self.agent_uids.is_empty()
    }

    pub fn contains_agent(&self, agent_uid: &str) -> bool {
        self.agent_uids.iter().any(|uid| uid == agent_uid)
    }

    /// Replace the agent subset. Returns false when nothing changed.
    pub fn set_agents(&mut self, agent_uids: Vec<String>) -> bool {
        if self.agent_uids == agent_uids {
            return false;
        }
        self.agent_uids = agent_uids;
        true
    }

    /// Switch to a fresh conversation id. Room state starts over.
    pub fn reset_conversation(&mut self, conv_id: String) {
        self.conv_id = conv_id;
        self.joined = false;
        self.pending = None;
    }

    /// Build a join envelope and arm the acknowledgement expectation. A new
    /// join supersedes any pending one.
    pub fn join_request(&mut self, token: &str) -> ClientEvent {
        self.joined = false;
        self.pending = Some(PendingJoin {
            conv_id: self.conv_id.clone(),
            agent_uids: self.agent_uids.clone(),
        });
        ClientEvent::Join(JoinPayload {
            auth: Auth {
                token: token.to_string(),
            },
            conv_id: self.conv_id.clone(),
            agent_uids: self.agent_uids.clone(),
        })
    }

    /// Build a leave envelope. Fire and forget: membership drops immediately,
    /// the server's `left` acknowledgement is not waited on.
    pub fn leave_request(&mut self) -> ClientEvent {
        self.joined = false;
        self.pending = None;
        ClientEvent::Leave(LeavePayload {
            conv_id: self.conv_id.clone(),
        })
    }

    /// Handle a joined acknowledgement. True only when it matches the join we
    /// are waiting on; anything else is stale and ignored.
    pub fn acknowledge(&mut self, ack: &JoinedAck) -> bool {
        let Some(pending) = &self.pending else {
            debug!(conv_id = %ack.conv_id, "ignoring joined ack with no join pending");
            return false;
        };
        let agents_match = ack.agent_uids.is_empty() || ack.agent_uids == pending.agent_uids;
        if ack.conv_id != pending.conv_id || !agents_match {
            debug!(conv_id = %ack.conv_id, "ignoring stale joined ack");
            return false;
        }
        self.joined = true;
        self.pending = None;
        true
    }

    /// Transport dropped. Room membership does not survive a reconnect.
    pub fn connection_lost(&mut self) {
        self.joined = false;
        self.pending = None;
    }
}
