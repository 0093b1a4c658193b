//! Advisor Configuration
//!
//! Everything is read from the environment with a default for every value.
//! Unparseable values fall back to the default rather than failing startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::RiskTier;

/// An HTTP quote source declared in `YIELD_SOURCES` as `id|risk|url`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSpec {
    pub id: String,
    pub risk: RiskTier,
    pub url: String,
}

impl SourceSpec {
    fn parse(entry: &str) -> Option<Self> {
        let mut parts = entry.trim().splitn(3, '|');
        let id = parts.next()?.trim();
        let risk = RiskTier::parse(parts.next()?.trim())?;
        let url = parts.next()?.trim();
        if id.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            risk,
            url: url.to_string(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct AdvisorConfig {
    pub router_address: String,
    pub analyzer_address: String,
    pub strategy_address: String,

    /// Router's bounded wait per downstream agent call
    pub agent_timeout: Duration,

    /// Analyzer's bounded wait per quote source
    pub source_timeout: Duration,

    pub session_idle_timeout: Duration,
    pub session_sweep_interval: Duration,
    pub mailbox_capacity: usize,

    pub knowledge_disabled: bool,
    pub knowledge_facts_path: Option<PathBuf>,

    /// Extra phrases that force `out_of_scope`
    pub out_of_scope_patterns: Vec<String>,

    /// HTTP sources; empty means the built-in demo sources
    pub yield_sources: Vec<SourceSpec>,

    pub bind_addr: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            router_address: "agent://router".into(),
            analyzer_address: "agent://analyzer".into(),
            strategy_address: "agent://strategy".into(),
            agent_timeout: Duration::from_millis(15_000),
            source_timeout: Duration::from_millis(10_000),
            session_idle_timeout: Duration::from_secs(900),
            session_sweep_interval: Duration::from_secs(30),
            mailbox_capacity: 64,
            knowledge_disabled: false,
            knowledge_facts_path: None,
            out_of_scope_patterns: Vec::new(),
            yield_sources: Vec::new(),
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());
        let list = |key: &str| {
            var(key)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        let yield_sources = list("YIELD_SOURCES")
            .iter()
            .filter_map(|entry| {
                let spec = SourceSpec::parse(entry);
                if spec.is_none() {
                    tracing::warn!(entry = %entry, "Ignoring malformed YIELD_SOURCES entry");
                }
                spec
            })
            .collect();

        Self {
            router_address: var("ROUTER_ADDRESS").unwrap_or(defaults.router_address),
            analyzer_address: var("ANALYZER_ADDRESS").unwrap_or(defaults.analyzer_address),
            strategy_address: var("STRATEGY_ADDRESS").unwrap_or(defaults.strategy_address),
            agent_timeout: number("AGENT_TIMEOUT_MS").map_or(defaults.agent_timeout, Duration::from_millis),
            source_timeout: number("SOURCE_TIMEOUT_MS").map_or(defaults.source_timeout, Duration::from_millis),
            session_idle_timeout: number("SESSION_IDLE_TIMEOUT_SECS")
                .map_or(defaults.session_idle_timeout, Duration::from_secs),
            session_sweep_interval: number("SESSION_SWEEP_SECS")
                .filter(|s| *s > 0)
                .map_or(defaults.session_sweep_interval, Duration::from_secs),
            mailbox_capacity: number("MAILBOX_CAPACITY")
                .and_then(|c| usize::try_from(c).ok())
                .filter(|c| *c > 0)
                .unwrap_or(defaults.mailbox_capacity),
            knowledge_disabled: var("KNOWLEDGE_DISABLED")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            knowledge_facts_path: var("KNOWLEDGE_FACTS_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            out_of_scope_patterns: list("OUT_OF_SCOPE_PATTERNS"),
            yield_sources,
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}
