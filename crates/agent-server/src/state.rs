//! Application State

use std::sync::Arc;
use std::time::Duration;

use yield_advisor::{AdvisorConfig, RouterHandle, SystemHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Router of the running agent system
    pub router: RouterHandle,

    pub config: Arc<AdvisorConfig>,

    pub knowledge_available: bool,

    /// `knowledge` or `fallback`
    pub reasoner_kind: &'static str,
}

impl AppState {
    pub fn new(system: SystemHandle, config: AdvisorConfig) -> Self {
        Self {
            router: system.router,
            config: Arc::new(config),
            knowledge_available: system.knowledge_available,
            reasoner_kind: system.reasoner_kind,
        }
    }

    /// How long an HTTP caller waits for the two-stage pipeline
    pub fn reply_budget(&self) -> Duration {
        reply_budget(self.config.agent_timeout)
    }
}

/// Two agent stages plus a second of slack
fn reply_budget(agent_timeout: Duration) -> Duration {
    agent_timeout.saturating_mul(2).saturating_add(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_budget() {
        assert_eq!(reply_budget(Duration::from_secs(15)), Duration::from_secs(31));
        assert_eq!(reply_budget(Duration::MAX), Duration::MAX);
        assert_eq!(reply_budget(Duration::from_secs(u64::MAX / 2 + 1)), Duration::MAX);
    }
}
