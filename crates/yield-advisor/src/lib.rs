//! # yield-advisor
//!
//! Conversational DeFi yield advisor built from independently running
//! agents that talk only through mailboxes.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐ ChatMessage ┌──────────┐ AnalyzeRequest ┌──────────┐   ┌─────────────┐
//! │  Client  │ ──────────▶ │  Router  │ ─────────────▶ │ Analyzer │──▶│ QuoteSource │ × N
//! │          │ ◀────────── │ sessions │ ◀───────────── │  (rank)  │   └─────────────┘
//! └──────────┘ ack, reply  │ intents  │    Analysis    └──────────┘
//!                          │          │ RecommendRequest ┌──────────┐   ┌───────────┐
//!                          │          │ ───────────────▶ │ Strategy │──▶│ Knowledge │
//!                          └──────────┘ ◀─────────────── │ reasoner │   │   store   │
//!                                        Recommendation  └──────────┘   └───────────┘
//! ```
//!
//! - **Router** acknowledges every message, keeps one query in flight per
//!   session and turns downstream failures into apologies.
//! - **Analyzer** queries all sources concurrently under a per-source
//!   timeout; slow or failing sources are left out, never fatal.
//! - **Strategy reasoner** produces a confidence-scored reasoning chain and
//!   an allocation, backed by the knowledge store when it is available.
//!
//! ## Example
//!
//! ```text
//! > Best strategy for $1000 USDC
//! Moderate strategy for $1,000 in USDC:
//! - 40% Kamino (USDC) · $400 · APY 12.3% · Risk Medium
//! - 30% Orca (SOL-USDC) · $300 · APY 8.5% · Risk Low
//! - 30% Raydium (SOL-USDC) · $300 · APY 7.2% · Risk Low
//! ```

pub mod analyzer;
pub mod concepts;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod model;
pub mod reasoner;
pub mod router;
pub mod svckit;
pub mod system;

pub use analyzer::{Analysis, Analyzer, QuoteSource};
pub use config::AdvisorConfig;
pub use error::{AdvisorError, Result};
pub use knowledge::{load_knowledge, KnowledgeBase, RelationStore};
pub use model::{RiskTier, RiskTolerance, YieldOpportunity};
pub use reasoner::{Reasoner, Recommendation};
pub use router::{Conversation, Intent, QueryReply, RouterHandle};
pub use system::{spawn_system, SystemHandle};
