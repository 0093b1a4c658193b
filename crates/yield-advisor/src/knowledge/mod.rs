//! Knowledge Store
//!
//! Read-only repository of static yield facts: protocol risk tiers, supported
//! pairs, TVL hints, routing hints and allocation templates.
//!
//! Callers depend on [`KnowledgeBase`] only. Two implementations exist:
//! [`RelationStore`], parsed from a fact program, and [`UnavailableKnowledge`],
//! which answers every query with an empty result so the reasoner can apply
//! its fallback policy uniformly.

mod store;

pub use store::RelationStore;

use serde::Serialize;
use std::sync::Arc;

use crate::config::AdvisorConfig;
use crate::model::{RiskTier, TvlBucket};

/// Allocation returned for a tier the store has no template for
pub const DEFAULT_ALLOCATION: [u8; 3] = [40, 30, 30];

/// A single declarative fact
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum Relation {
    ProtocolRisk { protocol: String, tier: RiskTier },
    SupportsPair { protocol: String, pair: String },
    TvlBucket { protocol: String, bucket: TvlBucket },
    Route { topic: String, protocol: String },
    AllocationTemplate { tier: String, percentages: Vec<u8> },
}

/// Read-only knowledge repository
///
/// Every query returns the empty result when `is_available()` is false.
pub trait KnowledgeBase: Send + Sync {
    fn is_available(&self) -> bool;

    /// Full static fact set
    fn relations(&self) -> &[Relation];

    /// Version of the loaded fact program, if it declares one
    fn version(&self) -> Option<u32>;

    /// Protocols supporting `pair`, in declared order, without duplicates
    fn query_pair(&self, pair: &str) -> Vec<String>;

    /// Protocols the routing hints suggest for `topic`
    fn query_routes(&self, topic: &str) -> Vec<String>;

    /// Allocation template for `tier`; [`DEFAULT_ALLOCATION`] when unknown
    fn query_allocation(&self, tier: &str) -> Vec<u8>;

    fn query_risk(&self, protocol: &str) -> Option<RiskTier>;

    fn query_tvl_bucket(&self, protocol: &str) -> Option<TvlBucket>;
}

/// Null store used when the fact program could not be loaded
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableKnowledge;

impl KnowledgeBase for UnavailableKnowledge {
    fn is_available(&self) -> bool {
        false
    }

    fn relations(&self) -> &[Relation] {
        &[]
    }

    fn version(&self) -> Option<u32> {
        None
    }

    fn query_pair(&self, _pair: &str) -> Vec<String> {
        Vec::new()
    }

    fn query_routes(&self, _topic: &str) -> Vec<String> {
        Vec::new()
    }

    fn query_allocation(&self, _tier: &str) -> Vec<u8> {
        Vec::new()
    }

    fn query_risk(&self, _protocol: &str) -> Option<RiskTier> {
        None
    }

    fn query_tvl_bucket(&self, _protocol: &str) -> Option<TvlBucket> {
        None
    }
}

/// Build the knowledge store for this process.
///
/// Never fails: a disabled or broken fact program yields
/// [`UnavailableKnowledge`] and a warning.
pub fn load_knowledge(config: &AdvisorConfig) -> Arc<dyn KnowledgeBase> {
    if config.knowledge_disabled {
        tracing::info!("Knowledge store disabled by configuration");
        return Arc::new(UnavailableKnowledge);
    }

    let loaded = match &config.knowledge_facts_path {
        Some(path) => RelationStore::from_file(path),
        None => RelationStore::seed(),
    };

    match loaded {
        Ok(store) => {
            tracing::info!(
                relations = store.relations().len(),
                version = ?store.version(),
                "Knowledge store loaded"
            );
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!("Knowledge store unavailable, reasoning will use fallback: {}", e);
            Arc::new(UnavailableKnowledge)
        }
    }
}
