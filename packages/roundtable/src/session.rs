//! The conversation session actor.
//!
//! One actor exclusively owns the display log, room membership, and dispatch
//! history for one conversation. Everything that mutates session state flows
//! through its single command queue: user commands from [`SessionHandle`],
//! channel notices forwarded from the transport, and dispatch outcomes posted
//! back by spawned HTTP tasks. No locks, no shared mutable state.

use anyhow::{Result, anyhow};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::yield_now;
use tracing::{debug, warn};
use uuid::Uuid;

use agent_wire::{AgentData, AgentDescriptor, MultiChatRequest, MultiChatResponse, ServerEvent};

use crate::channel::{self, ChannelHandle, ChannelNotice, ConnectionState};
use crate::config::RoundtableConfig;
use crate::dispatch::DispatchClient;
use crate::error::{DispatchError, TransportError};
use crate::membership::Membership;
use crate::reconciler::{DisplayMessage, LogChange, Reconciler};

const COMMAND_QUEUE: usize = 64;
const UPDATE_QUEUE: usize = 256;
const NOTICE_QUEUE: usize = 256;

/// Commands understood by the session actor.
enum SessionCommand {
    Connect {
        respond_to: oneshot::Sender<Result<(), TransportError>>,
    },
    Disconnect {
        respond_to: oneshot::Sender<()>,
    },
    SelectAgents {
        agents: Vec<AgentDescriptor>,
        respond_to: oneshot::Sender<()>,
    },
    SendMessage {
        text: String,
        respond_to: oneshot::Sender<Result<(), DispatchError>>,
    },
    DispatchOutcome {
        text: String,
        /// The conversation the dispatch was sent under; outcomes for a
        /// conversation that was cleared in the meantime are discarded.
        conv_id: String,
        outcome: Result<MultiChatResponse, DispatchError>,
        respond_to: oneshot::Sender<Result<(), DispatchError>>,
    },
    Clear {
        respond_to: oneshot::Sender<String>,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    Notice(ChannelNotice),
    Teardown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Broadcast to every subscriber as the session evolves.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A message was appended to the display log.
    Message(DisplayMessage),
    /// An open streaming message was mutated or finalized in place.
    MessageUpdated(DisplayMessage),
    Connection(ConnectionState),
    /// The current dispatch settled; every agent is done one way or another.
    DispatchSettled,
    /// A user-visible failure. The session itself keeps running.
    Notice(String),
    /// The log was dropped under a fresh conversation id.
    Cleared { conv_id: String },
}

/// Point-in-time copy of the session for rendering or inspection.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub conv_id: String,
    pub agent_uids: Vec<String>,
    pub connection: ConnectionState,
    pub dispatch_pending: bool,
    pub messages: Vec<DisplayMessage>,
}

/// Handle to a running session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionHandle {
    /// Open the session channel. Idempotent while connected.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Connect { respond_to: tx })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))?
    }

    /// Leave the room and close the channel.
    pub async fn disconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Disconnect { respond_to: tx })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))
    }

    /// Replace the agent subset for this conversation.
    pub async fn select_agents(&self, agents: Vec<AgentDescriptor>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::SelectAgents {
                agents,
                respond_to: tx,
            })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))
    }

    /// Dispatch one user message to every selected agent. Resolves when the
    /// backend accepts or refuses the dispatch, not when agents finish.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::SendMessage {
                text: text.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| DispatchError::Other(anyhow!("Session actor is gone")))?;
        rx.await
            .map_err(|_| DispatchError::Other(anyhow!("Session actor is gone")))?
    }

    /// Drop the log and start over under a fresh conversation id, which is
    /// returned.
    pub async fn clear(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Clear { respond_to: tx })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Stop the actor for good.
    pub async fn teardown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Teardown { respond_to: tx })
            .await
            .map_err(|_| anyhow!("Session actor is gone"))?;
        rx.await.map_err(|_| anyhow!("Session actor is gone"))
    }
}

/// Spawn a session actor and return its handle. The conversation starts under
/// a freshly minted id.
pub fn spawn_session(config: RoundtableConfig) -> SessionHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_QUEUE);
    let (updates, _) = broadcast::channel(UPDATE_QUEUE);
    let actor = SessionActor::new(config, sender.clone(), updates.clone());
    tokio::spawn(actor.run(receiver));
    SessionHandle { sender, updates }
}

struct SessionActor {
    config: RoundtableConfig,
    membership: Membership,
    reconciler: Reconciler,
    /// `(question, answer)` pairs sent as context with each dispatch. The
    /// answer slot is filled by the first agent completion of the round.
    history: Vec<(String, String)>,
    connection: ConnectionState,
    channel: Option<ChannelHandle>,
    dispatch: DispatchClient,
    sender: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionActor {
    fn new(
        config: RoundtableConfig,
        sender: mpsc::Sender<SessionCommand>,
        updates: broadcast::Sender<SessionUpdate>,
    ) -> Self {
        let dispatch = DispatchClient::new(&config);
        Self {
            config,
            membership: Membership::new(Uuid::new_v4().to_string()),
            reconciler: Reconciler::new(),
            history: Vec::new(),
            connection: ConnectionState::Disconnected,
            channel: None,
            dispatch,
            sender,
            updates,
        }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                SessionCommand::Connect { respond_to } => {
                    let _ = respond_to.send(self.on_connect().await);
                }
                SessionCommand::Disconnect { respond_to } => {
                    self.on_disconnect();
                    let _ = respond_to.send(());
                }
                SessionCommand::SelectAgents { agents, respond_to } => {
                    self.on_select_agents(agents).await;
                    let _ = respond_to.send(());
                }
                SessionCommand::SendMessage { text, respond_to } => {
                    self.on_send_message(text, respond_to);
                }
                SessionCommand::DispatchOutcome {
                    text,
                    conv_id,
                    outcome,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.on_dispatch_outcome(text, &conv_id, outcome));
                }
                SessionCommand::Clear { respond_to } => {
                    let _ = respond_to.send(self.on_clear().await);
                }
                SessionCommand::Snapshot { respond_to } => {
                    let _ = respond_to.send(self.snapshot());
                }
                SessionCommand::Notice(notice) => self.on_notice(notice),
                SessionCommand::Teardown { respond_to } => {
                    self.on_disconnect();
                    let _ = respond_to.send(());
                    break;
                }
            }
        }
        debug!("session actor finished");
    }

    async fn on_connect(&mut self) -> Result<(), TransportError> {
        if self.channel.is_some() {
            return Ok(());
        }
        self.set_connection(ConnectionState::Connecting);

        let (notice_tx, mut notice_rx) = mpsc::channel(NOTICE_QUEUE);
        match channel::connect(&self.config.ws_url(), &self.config.token, notice_tx).await {
            Ok(handle) => {
                self.channel = Some(handle);
                // Forward transport notices into our own queue so they are
                // processed in order with everything else.
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    while let Some(notice) = notice_rx.recv().await {
                        if sender.send(SessionCommand::Notice(notice)).await.is_err() {
                            break;
                        }
                    }
                });
                Ok(())
            }
            Err(err) => {
                self.set_connection(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    fn on_disconnect(&mut self) {
        if self.channel.is_some() && self.membership.is_joined() {
            let event = self.membership.leave_request();
            self.emit(event);
        }
        if let Some(channel) = &self.channel {
            channel.close();
        }
        // The Disconnected notice from the transport finishes the bookkeeping.
    }

    async fn on_select_agents(&mut self, agents: Vec<AgentDescriptor>) {
        for agent in &agents {
            self.reconciler.register_agent(&agent.agent_uid, &agent.name);
        }
        let uids: Vec<String> = agents.into_iter().map(|a| a.agent_uid).collect();
        let had_room = self.membership.has_agents();
        if !self.membership.set_agents(uids) {
            return;
        }
        if self.connection == ConnectionState::Connected {
            if had_room {
                let event = self.membership.leave_request();
                self.emit(event);
                // Give the transport a tick to put the leave on the wire
                // ahead of the join.
                yield_now().await;
            }
            self.emit_join();
        }
    }

    fn on_send_message(
        &mut self,
        text: String,
        respond_to: oneshot::Sender<Result<(), DispatchError>>,
    ) {
        if !self.membership.has_agents() {
            let _ = respond_to.send(Err(DispatchError::Other(anyhow!(
                "No agents selected for this conversation"
            ))));
            return;
        }
        let request = MultiChatRequest {
            conv_id: self.membership.conv_id().to_string(),
            user_id: self.config.user_id.clone(),
            message: text.clone(),
            agent_uids: self.membership.agent_uids().to_vec(),
            history: self.history.clone(),
        };
        // The HTTP round trip must not block the command queue; the outcome
        // comes back as a command of its own.
        let dispatch = self.dispatch.clone();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let conv_id = request.conv_id.clone();
            let outcome = dispatch.send(&request).await;
            let _ = sender
                .send(SessionCommand::DispatchOutcome {
                    text,
                    conv_id,
                    outcome,
                    respond_to,
                })
                .await;
        });
    }

    fn on_dispatch_outcome(
        &mut self,
        text: String,
        conv_id: &str,
        outcome: Result<MultiChatResponse, DispatchError>,
    ) -> Result<(), DispatchError> {
        if conv_id != self.membership.conv_id() {
            debug!(%conv_id, "discarding dispatch outcome for a cleared conversation");
            return Err(DispatchError::Other(anyhow!(
                "Conversation was cleared before the dispatch resolved"
            )));
        }
        match outcome {
            Ok(_) => {
                let user_name = self.user_name().to_string();
                let change = self.reconciler.begin_dispatch(&user_name, &text);
                self.publish_change(change);
                self.history.push((text, String::new()));
                Ok(())
            }
            Err(err) => {
                self.reconciler.dispatch_rejected();
                self.notify(format!("Dispatch failed: {err}"));
                Err(err)
            }
        }
    }

    async fn on_clear(&mut self) -> String {
        let conv_id = Uuid::new_v4().to_string();
        let rejoin = self.connection == ConnectionState::Connected && self.membership.has_agents();
        if rejoin && self.membership.is_joined() {
            let event = self.membership.leave_request();
            self.emit(event);
            yield_now().await;
        }
        self.membership.reset_conversation(conv_id.clone());
        self.reconciler.clear();
        self.history.clear();
        let _ = self.updates.send(SessionUpdate::Cleared {
            conv_id: conv_id.clone(),
        });
        if rejoin {
            self.emit_join();
        }
        conv_id
    }

    fn on_notice(&mut self, notice: ChannelNotice) {
        match notice {
            ChannelNotice::Connected => {
                self.set_connection(ConnectionState::Connected);
                // Membership never survives a transport; (re)join eagerly.
                if self.membership.has_agents() {
                    self.emit_join();
                }
            }
            ChannelNotice::Disconnected { reason } => {
                self.channel = None;
                self.membership.connection_lost();
                self.set_connection(ConnectionState::Disconnected);
                if let Some(reason) = reason {
                    self.notify(format!("Connection lost: {reason}"));
                }
            }
            ChannelNotice::Event(event) => self.on_event(event),
        }
    }

    fn on_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Joined(ack) => {
                if self.membership.acknowledge(&ack) {
                    debug!(conv_id = %ack.conv_id, "joined conversation room");
                }
            }
            ServerEvent::Left(_) => {
                // Leaves are fire-and-forget; nothing waits on this.
            }
            ServerEvent::ChannelError(payload) => {
                warn!("channel error: {}", payload.error);
                self.notify(format!("Channel error: {}", payload.error));
            }
            ServerEvent::Message(msg) => {
                // Stragglers from agents we already left behind are dropped.
                if !self.membership.contains_agent(&msg.agent_id) {
                    debug!(agent_id = %msg.agent_id, "dropping event for agent outside the room");
                    return;
                }
                if let AgentData::Complete { content, .. } = &msg.data {
                    self.fill_history_answer(content);
                }
                let change = self.reconciler.apply_agent(&msg);
                self.publish_change(change);
            }
            ServerEvent::System(msg) => {
                let (change, settled) = self.reconciler.apply_system(&msg);
                self.publish_change(change);
                if settled {
                    let _ = self.updates.send(SessionUpdate::DispatchSettled);
                }
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conv_id: self.membership.conv_id().to_string(),
            agent_uids: self.membership.agent_uids().to_vec(),
            connection: self.connection,
            dispatch_pending: self.reconciler.dispatch_pending(),
            messages: self.reconciler.log().to_vec(),
        }
    }

    fn emit(&self, event: agent_wire::ClientEvent) {
        if let Some(channel) = &self.channel {
            channel.emit(event);
        }
    }

    fn emit_join(&mut self) {
        let event = self.membership.join_request(&self.config.token);
        self.emit(event);
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            self.connection = state;
            let _ = self.updates.send(SessionUpdate::Connection(state));
        }
    }

    fn publish_change(&self, change: LogChange) {
        let message = self.reconciler.log()[change.index()].clone();
        let update = match change {
            LogChange::Appended(_) => SessionUpdate::Message(message),
            LogChange::Updated(_) => SessionUpdate::MessageUpdated(message),
        };
        let _ = self.updates.send(update);
    }

    fn notify(&self, text: String) {
        let _ = self.updates.send(SessionUpdate::Notice(text));
    }

    fn user_name(&self) -> &str {
        if self.config.user_id.is_empty() {
            "you"
        } else {
            &self.config.user_id
        }
    }

    fn fill_history_answer(&mut self, answer: &str) {
        if let Some((_, slot)) = self.history.last_mut() {
            if slot.is_empty() {
                *slot = answer.to_string();
            }
        }
    }
}
