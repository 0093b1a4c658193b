//! Process Wiring
//!
//! Starts the analyzer and strategy agents behind their mailboxes and the
//! router in front of them.

use std::sync::Arc;

use agent_core::{mailbox, serve, Address};

use crate::analyzer::{Analyzer, QuoteSource};
use crate::config::AdvisorConfig;
use crate::knowledge::KnowledgeBase;
use crate::reasoner::select_reasoner;
use crate::router::{Dispatcher, IntentClassifier, RouterAgent, RouterHandle, RouterSettings};
use crate::svckit::{AnalyzerAgent, StrategyAgent};

/// Running agent system
#[derive(Clone, Debug)]
pub struct SystemHandle {
    pub router: RouterHandle,
    pub knowledge_available: bool,
    pub reasoner_kind: &'static str,
}

/// Spawn analyzer, strategy agent and router on the current runtime
pub fn spawn_system(
    config: &AdvisorConfig,
    sources: Vec<Arc<dyn QuoteSource>>,
    knowledge: Arc<dyn KnowledgeBase>,
) -> SystemHandle {
    let knowledge_available = knowledge.is_available();
    let reasoner = select_reasoner(knowledge);
    let reasoner_kind = reasoner.kind();

    let analyzer = Analyzer::new(sources, config.source_timeout);
    tracing::info!(sources = ?analyzer.source_ids(), "Analyzer configured");

    let (analyzer_box, analyzer_inbox) = mailbox(Address::new(&config.analyzer_address), config.mailbox_capacity);
    let (strategy_box, strategy_inbox) = mailbox(Address::new(&config.strategy_address), config.mailbox_capacity);
    tokio::spawn(serve(analyzer_inbox, Arc::new(AnalyzerAgent::new(analyzer))));
    tokio::spawn(serve(strategy_inbox, Arc::new(StrategyAgent::new(reasoner))));

    let router_address = Address::new(&config.router_address);
    let dispatcher = Dispatcher::new(
        IntentClassifier::new(config.out_of_scope_patterns.iter().cloned()),
        analyzer_box,
        strategy_box,
        router_address.clone(),
        config.agent_timeout,
    );
    let settings = RouterSettings {
        mailbox_capacity: config.mailbox_capacity,
        idle_timeout: config.session_idle_timeout,
        sweep_interval: config.session_sweep_interval,
    };
    let (router, _task) = RouterAgent::spawn(dispatcher, router_address, settings);

    SystemHandle {
        router,
        knowledge_available,
        reasoner_kind,
    }
}
