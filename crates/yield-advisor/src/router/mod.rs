//! Router
//!
//! Owns the conversational sessions, classifies each query and drives the
//! analyzer → strategy pipeline. Every inbound message is acknowledged
//! before anything else is sent for it.

mod client;
mod compose;
mod dispatch;
mod intent;
mod process;
mod reply;

pub use client::Conversation;
pub use compose::{format_apy, format_usd, CAPABILITIES, WELCOME};
pub use dispatch::{AnalyzerPostbox, Dispatcher, StrategyPostbox};
pub use intent::{Intent, IntentClassifier};
pub use process::{ClientMessage, RouterAgent, RouterHandle, RouterSettings, RouterSnapshot};
pub use reply::QueryReply;
