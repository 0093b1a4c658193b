//! Router Process
//!
//! Owns every session exclusively. One task drains the router mailbox, the
//! completion channel of in-flight dispatches, and a periodic idle sweep:
//!
//! ```text
//!   client ──ClientMessage──▶ mailbox ─┐
//!                                      ├─▶ RouterAgent ──ack/reply──▶ client
//!   dispatch task ──Completion──▶ ─────┤
//!   sweep interval ──tick──▶ ──────────┘
//! ```
//!
//! Per session only one query is in flight; later queries wait in arrival
//! order. Ending a session aborts its in-flight dispatch, and a completion
//! that no longer matches the in-flight message is discarded.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use agent_core::{
    mailbox, Address, AgentError, ChatAcknowledgement, ChatMessage, ClientFrame, Content, Envelope, Mailbox, Postbox,
    Session, SessionId, SessionState,
};

use super::compose;
use super::dispatch::Dispatcher;
use super::reply::QueryReply;

/// Inbound protocol message plus where the client wants frames delivered
pub struct ClientMessage {
    pub message: ChatMessage,
    pub reply_to: Postbox<ClientFrame>,
}

/// Point-in-time view of the router's sessions
#[derive(Clone, Debug, Default, Serialize)]
pub struct RouterSnapshot {
    pub sessions: BTreeMap<String, SessionState>,
    pub queued: usize,
    pub replies_sent: u64,
}

impl RouterSnapshot {
    pub fn state_of(&self, session: &SessionId) -> Option<SessionState> {
        self.sessions.get(session.as_str()).copied()
    }

    pub fn count(&self, state: SessionState) -> usize {
        self.sessions.values().filter(|s| **s == state).count()
    }

    /// Sessions not yet ended
    pub fn active(&self) -> usize {
        self.sessions.len() - self.count(SessionState::Ended)
    }
}

/// Cloneable way in to a running router
#[derive(Clone, Debug)]
pub struct RouterHandle {
    postbox: Postbox<ClientMessage>,
    snapshots: watch::Receiver<RouterSnapshot>,
}

impl RouterHandle {
    pub const fn address(&self) -> &Address {
        self.postbox.address()
    }

    /// Post `message` for `session`; frames come back on `reply_to`
    pub async fn send(
        &self,
        session: &SessionId,
        from: &Address,
        message: ChatMessage,
        reply_to: Postbox<ClientFrame>,
    ) -> agent_core::Result<Uuid> {
        let msg_id = message.msg_id;
        self.postbox
            .post(session, from, ClientMessage { message, reply_to })
            .await?;
        Ok(msg_id)
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RouterSnapshot> {
        self.snapshots.clone()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RouterSettings {
    pub mailbox_capacity: usize,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

struct PendingQuery {
    msg_id: Uuid,
    text: String,

    /// Where the answer to this query goes
    reply_to: Postbox<ClientFrame>,
}

struct Completion {
    session: SessionId,
    msg_id: Uuid,
    reply: QueryReply,
    reply_to: Postbox<ClientFrame>,
}

struct Slot {
    session: Session,
    pending: VecDeque<PendingQuery>,
    task: Option<AbortHandle>,
}

impl Slot {
    fn new(id: SessionId) -> Self {
        Self {
            session: Session::new(id),
            pending: VecDeque::new(),
            task: None,
        }
    }

    /// Move to `AwaitingAgentResponse` and run the query on its own task
    fn launch(&mut self, dispatcher: &Dispatcher, done: &mpsc::UnboundedSender<Completion>, query: PendingQuery) {
        if let Err(e) = self.session.begin(query.msg_id) {
            tracing::warn!(session = %self.session.id, "Cannot start query: {}", e);
            return;
        }

        let dispatcher = dispatcher.clone();
        let done = done.clone();
        let session = self.session.id.clone();
        let PendingQuery { msg_id, text, reply_to } = query;

        let task = tokio::spawn(async move {
            let reply = dispatcher.dispatch(&session, &text).await;
            // Router gone means shutdown; nothing to deliver to.
            let _ = done.send(Completion {
                session,
                msg_id,
                reply,
                reply_to,
            });
        });
        self.task = Some(task.abort_handle());
    }

    /// Any state → `Ended`, cancelling in-flight and queued work
    fn end(&mut self) {
        if let Some(cancelled) = self.session.end() {
            tracing::debug!(session = %self.session.id, message = %cancelled, "Cancelled in-flight query");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.pending.clear();
    }
}

pub struct RouterAgent {
    dispatcher: Dispatcher,
    address: Address,
    settings: RouterSettings,
    slots: HashMap<SessionId, Slot>,
    done: mpsc::UnboundedSender<Completion>,
    snapshots: watch::Sender<RouterSnapshot>,
    replies_sent: u64,
}

impl RouterAgent {
    /// Start the router process on its own task
    pub fn spawn(dispatcher: Dispatcher, address: Address, settings: RouterSettings) -> (RouterHandle, JoinHandle<()>) {
        let (postbox, inbox) = mailbox(address.clone(), settings.mailbox_capacity);
        let (snapshots, snapshot_rx) = watch::channel(RouterSnapshot::default());
        let (done, done_rx) = mpsc::unbounded_channel();

        let router = Self {
            dispatcher,
            address,
            settings,
            slots: HashMap::new(),
            done,
            snapshots,
            replies_sent: 0,
        };
        let task = tokio::spawn(router.run(inbox, done_rx));

        (
            RouterHandle {
                postbox,
                snapshots: snapshot_rx,
            },
            task,
        )
    }

    async fn run(mut self, mut inbox: Mailbox<ClientMessage>, mut done_rx: mpsc::UnboundedReceiver<Completion>) {
        tracing::info!(address = %self.address, "Router listening");

        let mut sweep = tokio::time::interval(self.settings.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sweep.tick().await;

        // Handlers never await client mailboxes
        loop {
            tokio::select! {
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => self.on_message(envelope),
                    None => break,
                },
                Some(completion) = done_rx.recv() => self.on_completion(completion),
                _ = sweep.tick() => self.sweep(),
            }
            self.publish();
        }

        for slot in self.slots.values_mut() {
            slot.end();
        }
        tracing::info!(address = %self.address, "Router stopped");
    }

    fn on_message(&mut self, envelope: Envelope<ClientMessage>) {
        let Envelope {
            session: id,
            sender,
            payload: ClientMessage { message, reply_to },
            ..
        } = envelope;

        // Acknowledge before anything else is sent for this message
        let ack = ClientFrame::Ack(ChatAcknowledgement::of(&message));
        send_frame(&reply_to, &id, &self.address, ack);

        let slot = match self.slots.remove(&id) {
            Some(slot) if !slot.session.is_ended() => slot,
            Some(_) => {
                tracing::info!(session = %id, %sender, "Message for ended session, starting a new one");
                Slot::new(id.clone())
            }
            None => Slot::new(id.clone()),
        };
        let slot = self.slots.entry(id.clone()).or_insert(slot);
        slot.session.touch();

        if !slot.session.mark_seen(message.msg_id) {
            tracing::debug!(session = %id, message = %message.msg_id, "Duplicate message ignored");
            return;
        }

        let mut text_seen = false;
        for item in &message.content {
            match item {
                Content::StartSession => {
                    if slot.session.state() == SessionState::Idle {
                        start_session(&mut slot.session);
                    }
                    let mut welcome = ChatMessage::text(compose::WELCOME).replying_to(message.msg_id);
                    for (key, value) in compose::CAPABILITIES {
                        welcome = welcome.with_metadata(key, value);
                    }
                    send_frame(&reply_to, &id, &self.address, ClientFrame::Message(welcome));
                }
                Content::Text { text } if !text_seen && !text.trim().is_empty() => {
                    text_seen = true;
                    if slot.session.is_ended() {
                        // Ended earlier in this same message
                        *slot = Slot::new(id.clone());
                        slot.session.mark_seen(message.msg_id);
                    }
                    if slot.session.state() == SessionState::Idle {
                        // A query without StartSession implicitly starts the session
                        start_session(&mut slot.session);
                    }
                    let query = PendingQuery {
                        msg_id: message.msg_id,
                        text: text.trim().to_string(),
                        reply_to: reply_to.clone(),
                    };
                    if slot.session.state() == SessionState::AwaitingAgentResponse {
                        tracing::debug!(session = %id, queued = slot.pending.len() + 1, "Query queued");
                        slot.pending.push_back(query);
                    } else {
                        slot.launch(&self.dispatcher, &self.done, query);
                    }
                }
                Content::EndSession => {
                    slot.end();
                    tracing::info!(
                        session = %id,
                        duration_secs = slot.session.duration().num_seconds(),
                        "Session ended"
                    );
                }
                Content::Text { .. } | Content::Metadata { .. } | Content::Data { .. } => {
                    tracing::debug!(session = %id, "Ignoring content item");
                }
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        let Completion {
            session,
            msg_id,
            reply,
            reply_to,
        } = completion;

        let Some(slot) = self.slots.get_mut(&session) else {
            tracing::debug!(%session, message = %msg_id, "Discarding reply for unknown session");
            return;
        };
        if slot.session.in_flight() != Some(msg_id) {
            tracing::debug!(%session, message = %msg_id, "Discarding stale agent reply");
            return;
        }
        if let Err(e) = slot.session.complete(msg_id) {
            tracing::debug!(%session, "Discarding agent reply: {}", e);
            return;
        }
        slot.task = None;

        tracing::info!(%session, intent = %reply.intent, success = reply.success, "Replying");
        send_frame(&reply_to, &session, &self.address, ClientFrame::Message(reply.to_chat(msg_id)));
        self.replies_sent += 1;

        if let Some(next) = slot.pending.pop_front() {
            slot.launch(&self.dispatcher, &self.done, next);
        }
    }

    /// Drop sessions ended before this sweep, then end idle ones
    fn sweep(&mut self) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.session.is_ended());
        let collected = before - self.slots.len();

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.settings.idle_timeout).unwrap_or(chrono::Duration::MAX);
        let mut expired = 0;
        for slot in self.slots.values_mut() {
            if slot.session.state() != SessionState::AwaitingAgentResponse && slot.session.is_idle_since(now, ttl) {
                slot.end();
                expired += 1;
            }
        }

        if collected + expired > 0 {
            tracing::info!(collected, expired, remaining = self.slots.len(), "Session sweep");
        }
    }

    fn publish(&self) {
        let snapshot = RouterSnapshot {
            sessions: self
                .slots
                .iter()
                .map(|(id, slot)| (id.to_string(), slot.session.state()))
                .collect(),
            queued: self.slots.values().map(|s| s.pending.len()).sum(),
            replies_sent: self.replies_sent,
        };
        self.snapshots.send_replace(snapshot);
    }
}

fn start_session(session: &mut Session) {
    match session.start() {
        Ok(()) => tracing::info!(session = %session.id, "Session started"),
        Err(e) => tracing::warn!(session = %session.id, "Session start rejected: {}", e),
    }
}

/// Hand a frame to the client without waiting; a client that is not
/// draining its mailbox loses the frame
fn send_frame(to: &Postbox<ClientFrame>, session: &SessionId, from: &Address, frame: ClientFrame) {
    match to.try_post(session, from, frame) {
        Ok(_) => {}
        Err(AgentError::MailboxFull(client)) => {
            tracing::warn!(%session, %client, "Client not reading, frame dropped");
        }
        Err(e) => tracing::debug!(%session, "Client gone, frame dropped: {}", e),
    }
}
