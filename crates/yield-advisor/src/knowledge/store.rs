//! Relation-backed knowledge store parsed from a fact program

use std::path::Path;

use super::{KnowledgeBase, Relation, DEFAULT_ALLOCATION};
use crate::error::{AdvisorError, Result};
use crate::model::{RiskTier, TvlBucket};

const SEED_PROGRAM: &str = include_str!("seed.facts");

/// Immutable fact set; safe for unsynchronized concurrent reads
#[derive(Clone, Debug, Default)]
pub struct RelationStore {
    relations: Vec<Relation>,
    version: Option<u32>,
}

impl RelationStore {
    /// Store loaded from the embedded seed program
    pub fn seed() -> Result<Self> {
        Self::parse(SEED_PROGRAM)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let program = std::fs::read_to_string(path)?;
        Self::parse(&program)
    }

    /// Parse a fact program, one `(head args...)` fact per line.
    /// `;;` starts a comment. Duplicate facts are kept once.
    pub fn parse(program: &str) -> Result<Self> {
        let mut store = Self::default();

        for (index, raw) in program.lines().enumerate() {
            let line = raw.split(";;").next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let fail = |reason: String| AdvisorError::KnowledgeParse {
                line: index + 1,
                reason,
            };

            let body = line
                .strip_prefix('(')
                .and_then(|l| l.strip_suffix(')'))
                .ok_or_else(|| fail(format!("expected a parenthesised fact, got `{line}`")))?;
            let parts: Vec<&str> = body.split_whitespace().collect();

            let relation = match parts.as_slice() {
                ["version", v] => {
                    let version = v.parse().map_err(|_| fail(format!("bad version `{v}`")))?;
                    store.version = Some(version);
                    continue;
                }
                ["protocol", protocol, tier] => Relation::ProtocolRisk {
                    protocol: (*protocol).to_string(),
                    tier: RiskTier::parse(tier).ok_or_else(|| fail(format!("unknown risk tier `{tier}`")))?,
                },
                ["supports_pair", protocol, pair] => Relation::SupportsPair {
                    protocol: (*protocol).to_string(),
                    pair: pair.to_uppercase(),
                },
                ["tvl_hint", protocol, bucket] => Relation::TvlBucket {
                    protocol: (*protocol).to_string(),
                    bucket: TvlBucket::parse(bucket)
                        .ok_or_else(|| fail(format!("unknown TVL bucket `{bucket}`")))?,
                },
                ["route", topic, protocol] => Relation::Route {
                    topic: topic.to_uppercase(),
                    protocol: (*protocol).to_string(),
                },
                ["alloc", tier, pcts @ ..] if !pcts.is_empty() => {
                    let percentages = pcts
                        .iter()
                        .map(|p| p.parse::<u8>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|_| fail(format!("bad percentage in template `{tier}`")))?;
                    let total: u32 = percentages.iter().map(|p| u32::from(*p)).sum();
                    if total != 100 {
                        return Err(fail(format!("template `{tier}` sums to {total}, not 100")));
                    }
                    Relation::AllocationTemplate {
                        tier: tier.to_uppercase(),
                        percentages,
                    }
                }
                [head, ..] => return Err(fail(format!("unknown or malformed relation `{head}`"))),
                [] => return Err(fail("empty fact".to_string())),
            };

            if !store.relations.contains(&relation) {
                store.relations.push(relation);
            }
        }

        Ok(store)
    }
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}

impl KnowledgeBase for RelationStore {
    fn is_available(&self) -> bool {
        true
    }

    fn relations(&self) -> &[Relation] {
        &self.relations
    }

    fn version(&self) -> Option<u32> {
        self.version
    }

    fn query_pair(&self, pair: &str) -> Vec<String> {
        let pair = pair.to_uppercase();
        let mut out = Vec::new();
        for relation in &self.relations {
            if let Relation::SupportsPair { protocol, pair: p } = relation {
                if *p == pair {
                    push_unique(&mut out, protocol);
                }
            }
        }
        out
    }

    fn query_routes(&self, topic: &str) -> Vec<String> {
        let topic = topic.to_uppercase();
        let mut out = Vec::new();
        for relation in &self.relations {
            if let Relation::Route { topic: t, protocol } = relation {
                if *t == topic {
                    push_unique(&mut out, protocol);
                }
            }
        }
        out
    }

    fn query_allocation(&self, tier: &str) -> Vec<u8> {
        self.relations
            .iter()
            .find_map(|relation| match relation {
                Relation::AllocationTemplate { tier: t, percentages } if t.eq_ignore_ascii_case(tier) => {
                    Some(percentages.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| DEFAULT_ALLOCATION.to_vec())
    }

    fn query_risk(&self, protocol: &str) -> Option<RiskTier> {
        self.relations.iter().find_map(|relation| match relation {
            Relation::ProtocolRisk { protocol: p, tier } if p.eq_ignore_ascii_case(protocol) => Some(*tier),
            _ => None,
        })
    }

    fn query_tvl_bucket(&self, protocol: &str) -> Option<TvlBucket> {
        self.relations.iter().find_map(|relation| match relation {
            Relation::TvlBucket { protocol: p, bucket } if p.eq_ignore_ascii_case(protocol) => Some(*bucket),
            _ => None,
        })
    }
}
