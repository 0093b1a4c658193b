//! Reasoning chains
//!
//! Aggregate confidence is the minimum step confidence when any step falls
//! below [`FALLBACK_THRESHOLD`], and the arithmetic mean otherwise.

use serde::{Deserialize, Serialize};

/// Direct knowledge hit
pub const DIRECT: f64 = 0.9;
/// Value derived from other data or a default
pub const DERIVED: f64 = 0.8;
/// Heuristic fallback when knowledge is unavailable
pub const FALLBACK: f64 = 0.4;
/// Nothing usable in the query
pub const INSUFFICIENT: f64 = 0.3;

/// Any step below this marks the chain as degraded
pub const FALLBACK_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based position in the chain
    pub index: usize,
    pub concept: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub label: String,
    pub steps: Vec<ReasoningStep>,
    pub confidence: f64,
}

impl ReasoningChain {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn push(&mut self, concept: impl Into<String>, confidence: f64) {
        self.steps.push(ReasoningStep {
            index: self.steps.len() + 1,
            concept: concept.into(),
            confidence: confidence.clamp(0.0, 1.0),
        });
        self.confidence = aggregate(&self.steps);
    }

    pub fn is_degraded(&self) -> bool {
        self.steps.iter().any(|s| s.confidence < FALLBACK_THRESHOLD)
    }
}

/// Minimum if any step is below the threshold, mean otherwise; 0 when empty
pub fn aggregate(steps: &[ReasoningStep]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    let confidences = steps.iter().map(|s| s.confidence);
    if steps.iter().any(|s| s.confidence < FALLBACK_THRESHOLD) {
        confidences.fold(f64::INFINITY, f64::min)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let count = steps.len() as f64;
        confidences.sum::<f64>() / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_when_all_confident() {
        let mut chain = ReasoningChain::new("strategy");
        chain.push("topic=USDC", DIRECT);
        chain.push("alloc=[40, 30, 30]", DERIVED);

        assert!(close(chain.confidence, 0.85));
        assert!(!chain.is_degraded());
        assert_eq!(chain.steps[1].index, 2);
    }

    #[test]
    fn test_minimum_when_any_step_falls_back() {
        let mut chain = ReasoningChain::new("strategy");
        chain.push("topic=USDC", DIRECT);
        chain.push("fallback", FALLBACK);
        chain.push("alloc", DERIVED);

        assert!(close(chain.confidence, FALLBACK));
        assert!(chain.is_degraded());
    }

    #[test]
    fn test_empty_and_clamped() {
        assert!(close(aggregate(&[]), 0.0));

        let mut chain = ReasoningChain::new("topic");
        chain.push("x", 1.7);
        assert!(close(chain.confidence, 1.0));
    }
}
