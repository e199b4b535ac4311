//! The stream reconciler.
//!
//! Merges interleaved per-agent events into a single append-only display log.
//! Each agent has at most one open streaming message at a time; deltas mutate
//! it in place, terminal events finalize it, and everything else appends. Log
//! indices are stable: messages are never removed or reordered, only a full
//! [`Reconciler::clear`] empties the log.

use std::collections::HashMap;

use agent_wire::{AgentData, AgentMessage, Reference, SystemKind, SystemMessage, Usage};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who produced a display message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Producer {
    User,
    System,
    /// Identified by agent uid.
    Agent(String),
}

/// Kind of a display message. `Streaming` is the only open kind; every other
/// kind is final from the moment it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Streaming,
    Complete,
    Error,
    Status,
}

impl MessageKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageKind::Streaming)
    }
}

/// One entry in the display log.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub id: String,
    pub producer: Producer,
    /// Human-readable sender label.
    pub producer_name: String,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub usage: Option<Usage>,
    pub references: Option<Vec<Reference>>,
}

impl DisplayMessage {
    fn new(
        producer: Producer,
        producer_name: String,
        content: String,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            producer,
            producer_name,
            content,
            kind,
            timestamp,
            usage: None,
            references: None,
        }
    }
}

/// Per-agent stream phase within the current dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentPhase {
    #[default]
    Idle,
    Streaming,
    Complete,
    Error,
}

/// What applying one event did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    /// A new message was appended at this index.
    Appended(usize),
    /// The message at this index was mutated in place.
    Updated(usize),
}

impl LogChange {
    pub fn index(self) -> usize {
        match self {
            LogChange::Appended(idx) | LogChange::Updated(idx) => idx,
        }
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    log: Vec<DisplayMessage>,
    /// Open streaming message per agent: uid to log index.
    open: HashMap<String, usize>,
    phases: HashMap<String, AgentPhase>,
    /// Display names learned from the directory or from payloads.
    names: HashMap<String, String>,
    dispatch_pending: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[DisplayMessage] {
        &self.log
    }

    pub fn message(&self, index: usize) -> Option<&DisplayMessage> {
        self.log.get(index)
    }

    /// True between an accepted dispatch and the system message settling it.
    pub fn dispatch_pending(&self) -> bool {
        self.dispatch_pending
    }

    pub fn phase(&self, agent_uid: &str) -> AgentPhase {
        self.phases.get(agent_uid).copied().unwrap_or_default()
    }

    /// Remember a display name for an agent uid.
    pub fn register_agent(&mut self, agent_uid: &str, name: &str) {
        self.names
            .insert(agent_uid.to_string(), name.to_string());
    }

    /// Start a new dispatch: append the user's message, reset every agent to
    /// idle, and forget any still-open streams from the previous round.
    pub fn begin_dispatch(&mut self, user_name: &str, text: &str) -> LogChange {
        self.open.clear();
        self.phases.clear();
        self.dispatch_pending = true;
        let idx = self.push(DisplayMessage::new(
            Producer::User,
            user_name.to_string(),
            text.to_string(),
            MessageKind::User,
            Utc::now(),
        ));
        LogChange::Appended(idx)
    }

    /// The dispatch never started; drop the pending flag.
    pub fn dispatch_rejected(&mut self) {
        self.dispatch_pending = false;
    }

    /// Apply one agent event to the log.
    pub fn apply_agent(&mut self, msg: &AgentMessage) -> LogChange {
        let ts = msg.timestamp_utc();
        if let Some(name) = msg.data.agent_name() {
            self.register_agent(&msg.agent_id, name);
        }
        match &msg.data {
            AgentData::Delta {
                content,
                accumulated,
                ..
            } => {
                if let Some(&idx) = self.open.get(&msg.agent_id) {
                    let open = &mut self.log[idx];
                    match accumulated {
                        // The payload carries the whole response so far.
                        Some(full) => open.content = full.clone(),
                        None => open.content.push_str(content),
                    }
                    open.timestamp = ts;
                    LogChange::Updated(idx)
                } else {
                    let seed = accumulated.clone().unwrap_or_else(|| content.clone());
                    let name = self.display_name(&msg.agent_id);
                    let idx = self.push(DisplayMessage::new(
                        Producer::Agent(msg.agent_id.clone()),
                        name,
                        seed,
                        MessageKind::Streaming,
                        ts,
                    ));
                    self.open.insert(msg.agent_id.clone(), idx);
                    self.phases
                        .insert(msg.agent_id.clone(), AgentPhase::Streaming);
                    LogChange::Appended(idx)
                }
            }
            AgentData::Complete {
                content,
                usage,
                references,
                ..
            } => {
                self.phases
                    .insert(msg.agent_id.clone(), AgentPhase::Complete);
                if let Some(idx) = self.open.remove(&msg.agent_id) {
                    let open = &mut self.log[idx];
                    open.kind = MessageKind::Complete;
                    open.content = content.clone();
                    open.usage = usage.clone();
                    open.references = references.clone();
                    open.timestamp = ts;
                    LogChange::Updated(idx)
                } else {
                    // Complete without any preceding delta still lands once.
                    let name = self.display_name(&msg.agent_id);
                    let mut message = DisplayMessage::new(
                        Producer::Agent(msg.agent_id.clone()),
                        name,
                        content.clone(),
                        MessageKind::Complete,
                        ts,
                    );
                    message.usage = usage.clone();
                    message.references = references.clone();
                    LogChange::Appended(self.push(message))
                }
            }
            AgentData::Error { content, .. } => {
                // Additive: whatever partial output exists stays untouched,
                // the failure lands as its own entry.
                self.phases.insert(msg.agent_id.clone(), AgentPhase::Error);
                self.open.remove(&msg.agent_id);
                let name = self.display_name(&msg.agent_id);
                let idx = self.push(DisplayMessage::new(
                    Producer::Agent(msg.agent_id.clone()),
                    name,
                    content.clone(),
                    MessageKind::Error,
                    ts,
                ));
                LogChange::Appended(idx)
            }
            AgentData::Status { content, .. } => {
                let name = self.display_name(&msg.agent_id);
                let idx = self.push(DisplayMessage::new(
                    Producer::Agent(msg.agent_id.clone()),
                    name,
                    content.clone(),
                    MessageKind::Status,
                    ts,
                ));
                LogChange::Appended(idx)
            }
        }
    }

    /// Apply one room-wide system message. The second element reports whether
    /// this message settled the current dispatch.
    pub fn apply_system(&mut self, msg: &SystemMessage) -> (LogChange, bool) {
        let (kind, settled) = match msg.message_type {
            SystemKind::Start => (MessageKind::Status, false),
            SystemKind::Complete => (MessageKind::Complete, true),
            SystemKind::Error => (MessageKind::Error, true),
        };
        if settled {
            self.dispatch_pending = false;
            self.open.clear();
        }
        let idx = self.push(DisplayMessage::new(
            Producer::System,
            "system".to_string(),
            msg.data.message.clone(),
            kind,
            msg.timestamp_utc(),
        ));
        (LogChange::Appended(idx), settled)
    }

    /// Empty the log and reset all stream state. Learned names survive.
    pub fn clear(&mut self) {
        self.log.clear();
        self.open.clear();
        self.phases.clear();
        self.dispatch_pending = false;
    }

    fn push(&mut self, message: DisplayMessage) -> usize {
        self.log.push(message);
        self.log.len() - 1
    }

    fn display_name(&self, agent_uid: &str) -> String {
        self.names
            .get(agent_uid)
            .cloned()
            .unwrap_or_else(|| agent_uid.to_string())
    }
}
