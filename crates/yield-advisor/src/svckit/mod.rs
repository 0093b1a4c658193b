//! Service Kit - Agent Handlers
//!
//! Domain handlers that implement `agent_core::Handler`, one per agent
//! process behind the router.

mod analyzer_agent;
mod strategy_agent;

pub use analyzer_agent::{AnalyzeRequest, AnalyzerAgent};
pub use strategy_agent::{RecommendRequest, StrategyAgent};
