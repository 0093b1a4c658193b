//! Session Lifecycle
//!
//! ```text
//! Idle ──start──▶ Started ──begin──▶ AwaitingAgentResponse ──complete──▶ Responded
//!                   │  ▲                        │                          │
//!                   │  └──────────begin─────────┼──────────────────────────┘
//!                   └──────────end──────────────┴──────────end─────────────▶ Ended
//! ```
//!
//! `Ended` is terminal. A later message for the same id starts a fresh
//! session rather than resuming the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AgentError, Result};

/// Unique session identifier (opaque, client supplied)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Started,
    AwaitingAgentResponse,
    Responded,
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Started => write!(f, "started"),
            Self::AwaitingAgentResponse => write!(f, "awaiting_agent_response"),
            Self::Responded => write!(f, "responded"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// A conversational session between one client and the router
#[derive(Clone, Debug)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    state: SessionState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,

    /// Message currently awaiting downstream agents
    in_flight: Option<Uuid>,

    /// Inbound message ids already processed
    seen: HashSet<Uuid>,
}

impl Session {
    /// Create an idle session
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Idle,
            created_at: now,
            last_activity: now,
            in_flight: None,
            seen: HashSet::new(),
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn in_flight(&self) -> Option<Uuid> {
        self.in_flight
    }

    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Record an inbound message id; `false` if it was already seen
    pub fn mark_seen(&mut self, msg_id: Uuid) -> bool {
        self.seen.insert(msg_id)
    }

    /// `Idle → Started`
    pub fn start(&mut self) -> Result<()> {
        self.transition("start", |state| {
            (state == SessionState::Idle).then_some(SessionState::Started)
        })
    }

    /// `Started | Responded → AwaitingAgentResponse`
    pub fn begin(&mut self, msg_id: Uuid) -> Result<()> {
        self.transition("query", |state| {
            matches!(state, SessionState::Started | SessionState::Responded)
                .then_some(SessionState::AwaitingAgentResponse)
        })?;
        self.in_flight = Some(msg_id);
        Ok(())
    }

    /// `AwaitingAgentResponse → Responded`, only for the in-flight message
    pub fn complete(&mut self, msg_id: Uuid) -> Result<()> {
        if self.state == SessionState::AwaitingAgentResponse && self.in_flight != Some(msg_id) {
            return Err(AgentError::Session(format!(
                "reply for {msg_id} does not match the in-flight message"
            )));
        }
        self.transition("agent_reply", |state| {
            (state == SessionState::AwaitingAgentResponse).then_some(SessionState::Responded)
        })?;
        self.in_flight = None;
        Ok(())
    }

    /// Any state `→ Ended`; returns the cancelled in-flight message, if any
    pub fn end(&mut self) -> Option<Uuid> {
        self.state = SessionState::Ended;
        self.touch();
        self.in_flight.take()
    }

    /// Whether the session has been inactive for at least `ttl`
    pub fn is_idle_since(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_activity >= ttl
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.last_activity - self.created_at
    }

    fn transition(
        &mut self,
        event: &'static str,
        next: impl FnOnce(SessionState) -> Option<SessionState>,
    ) -> Result<()> {
        let to = next(self.state).ok_or(AgentError::InvalidTransition {
            from: self.state,
            event,
        })?;
        tracing::debug!(session = %self.id, from = %self.state, to = %to, "Session transition");
        self.state = to;
        self.touch();
        Ok(())
    }
}
