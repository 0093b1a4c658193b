//! # agent-core
//!
//! Messaging core for independently running agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  Envelope<Ask<Req, Resp>>  ┌──────────┐
//! │  Router  │ ─────────────────────────▶ │  Agent   │
//! │          │ ◀───────────────────────── │ (serve)  │
//! └──────────┘   Envelope<Resp> (corr id) └──────────┘
//!      ▲ │
//!      │ ▼ ClientFrame (ack, then message)
//!   external client
//! ```
//!
//! Agents share no memory. Each owns a bounded [`Mailbox`]; everything they
//! exchange travels in an [`Envelope`] that names its session explicitly.

pub mod agent;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod session;

pub use agent::{serve, Handler};
pub use error::{AgentError, Result};
pub use mailbox::{mailbox, Address, Ask, Envelope, Mailbox, Postbox};
pub use message::{ChatAcknowledgement, ChatMessage, ClientFrame, Content};
pub use session::{Session, SessionId, SessionState};
