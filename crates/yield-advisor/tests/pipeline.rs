//! End-to-end conversations through router, analyzer and strategy agents

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{ChatMessage, ClientFrame, SessionId, SessionState};
use yield_advisor::analyzer::{demo_sources, StaticSource};
use yield_advisor::knowledge::UnavailableKnowledge;
use yield_advisor::{
    load_knowledge, spawn_system, AdvisorConfig, Conversation, Intent, QuoteSource, RiskTier, SystemHandle,
    YieldOpportunity,
};

const WAIT: Duration = Duration::from_secs(20);

fn config() -> AdvisorConfig {
    AdvisorConfig {
        agent_timeout: Duration::from_secs(15),
        source_timeout: Duration::from_secs(1),
        ..AdvisorConfig::default()
    }
}

fn with_knowledge() -> SystemHandle {
    let config = config();
    let kb = load_knowledge(&config);
    spawn_system(&config, demo_sources(), kb)
}

fn without_knowledge() -> SystemHandle {
    spawn_system(&config(), demo_sources(), Arc::new(UnavailableKnowledge))
}

async fn wait_for_state(system: &SystemHandle, session: &SessionId, state: Option<SessionState>) {
    let mut rx = system.router.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|s| s.state_of(session) == state))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_session_round_trip() {
    let system = with_knowledge();
    let session = SessionId::from_string("round-trip");
    let mut conversation = Conversation::open(system.router.clone(), session.clone());

    let start = conversation.send(ChatMessage::start_session()).await.unwrap();
    match conversation.next_frame(WAIT).await.unwrap() {
        ClientFrame::Ack(ack) => assert_eq!(ack.acknowledged_msg_id, start),
        ClientFrame::Message(_) => panic!("first frame must be the ack"),
    }
    let welcome = conversation.reply_to(start, WAIT).await.unwrap();
    assert_eq!(welcome.metadata_value("capabilities"), Some("yield_optimization"));

    let reply = conversation.ask("What's the best yield for SOL?", WAIT).await.unwrap();
    assert!(reply.success);
    assert_eq!(reply.intent, Intent::YieldAnalysis);
    assert!(reply.opportunities.iter().all(|q| q.matches_topic("SOL")));
    assert_eq!(reply.opportunities[0].protocol, "Marginfi");
    wait_for_state(&system, &session, Some(SessionState::Responded)).await;

    conversation.send(ChatMessage::end_session()).await.unwrap();
    wait_for_state(&system, &session, Some(SessionState::Ended)).await;

    // Same id after Ended starts over
    let reply = conversation.ask("Compare Orca vs Raydium APYs", WAIT).await.unwrap();
    assert!(reply.success);
    let state = system.router.snapshot().state_of(&session);
    assert!(state.is_some_and(|s| s != SessionState::Ended));
}

#[tokio::test]
async fn test_comparison_ranks_orca_first() {
    let system = with_knowledge();
    let mut conversation = Conversation::open(system.router.clone(), SessionId::new());

    let reply = conversation.ask("Compare Orca vs Raydium APYs", WAIT).await.unwrap();
    assert_eq!(reply.intent, Intent::YieldComparison);
    let protocols: Vec<&str> = reply.opportunities.iter().map(|q| q.protocol.as_str()).collect();
    assert_eq!(protocols, vec!["Orca", "Raydium"]);
    assert!(reply.response.find("Orca").unwrap() < reply.response.find("Raydium").unwrap());
}

#[tokio::test]
async fn test_strategy_with_knowledge() {
    let system = with_knowledge();
    assert!(system.knowledge_available);
    assert_eq!(system.reasoner_kind, "knowledge");
    let mut conversation = Conversation::open(system.router.clone(), SessionId::new());

    let reply = conversation.ask("Best strategy for $1000 USDC", WAIT).await.unwrap();
    assert_eq!(reply.intent, Intent::StrategyRecommendation);

    let recommendation = reply.recommendation.unwrap();
    assert_eq!(recommendation.allocation, vec![40, 30, 30]);
    assert_eq!(recommendation.amount_usd, Some(dec!(1000)));
    assert!(
        recommendation
            .chain
            .steps
            .iter()
            .any(|s| s.concept.contains("Kamino") && s.concept.contains("Solend"))
    );
    assert!(recommendation.confidence() > 0.6);
    assert_eq!(recommendation.slices[0].protocol, "Kamino");
}

#[tokio::test]
async fn test_strategy_for_amount_at_decimal_limit() {
    for system in [with_knowledge(), without_knowledge()] {
        let mut conversation = Conversation::open(system.router.clone(), SessionId::new());
        let reply = conversation
            .ask("Best strategy for $79228162514264337593543950335 USDC", WAIT)
            .await
            .unwrap();

        assert!(reply.success, "{:?}", reply.error);
        assert_eq!(reply.intent, Intent::StrategyRecommendation);
        let rec = reply.recommendation.unwrap();
        assert!(rec.slices.iter().all(|s| s.amount_usd.is_none()));
    }
}

#[tokio::test]
async fn test_strategy_without_knowledge() {
    let system = without_knowledge();
    assert!(!system.knowledge_available);
    assert_eq!(system.reasoner_kind, "fallback");
    let mut conversation = Conversation::open(system.router.clone(), SessionId::new());

    let reply = conversation.ask("Best strategy for $1000 USDC", WAIT).await.unwrap();
    assert!(reply.success);

    let recommendation = reply.recommendation.unwrap();
    assert!(recommendation.confidence() <= 0.5);
    assert!(recommendation.chain.steps.iter().any(|s| s.concept.contains("fallback")));
    assert_eq!(recommendation.allocation, vec![40, 30, 30]);
}

#[tokio::test]
async fn test_out_of_scope() {
    let system = with_knowledge();
    let mut conversation = Conversation::open(system.router.clone(), SessionId::new());

    let reply = conversation.ask("Tell me a joke", WAIT).await.unwrap();
    assert_eq!(reply.intent, Intent::OutOfScope);
    assert!(reply.success);
    assert!(reply.opportunities.is_empty());
    assert!(reply.recommendation.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_is_left_out() {
    let quote = |protocol: &str, apy| {
        YieldOpportunity::new(protocol, "SOL", RiskTier::Low, protocol.to_lowercase()).with_apy(apy)
    };
    let sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(StaticSource::new("fast-a", vec![quote("Alpha", dec!(5))])),
        Arc::new(StaticSource::new("fast-b", vec![quote("Beta", dec!(6))])),
        Arc::new(
            StaticSource::new("slow", vec![quote("Gamma", dec!(50))]).with_latency(Duration::from_secs(60)),
        ),
    ];
    let config = config();
    let system = spawn_system(&config, sources, load_knowledge(&config));
    let mut conversation = Conversation::open(system.router.clone(), SessionId::new());

    let reply = conversation.ask("What's the best yield for SOL?", WAIT).await.unwrap();
    assert!(reply.success);
    assert_eq!(reply.missing_sources, 1);
    let protocols: Vec<&str> = reply.opportunities.iter().map(|q| q.protocol.as_str()).collect();
    assert_eq!(protocols, vec!["Beta", "Alpha"]);
    assert!(reply.response.contains("1 data source was unavailable"));
}
