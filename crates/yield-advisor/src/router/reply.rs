//! Router replies and their wire form
//!
//! A [`QueryReply`] crosses the session protocol as one [`ChatMessage`]: the
//! body as text, `intent`/`success`/`error`/`missing_sources`/`confidence` as
//! metadata, and the yield table plus recommendation as structured data.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agent_core::{AgentError, ChatMessage};

use super::intent::Intent;
use crate::analyzer::Analysis;
use crate::model::YieldOpportunity;
use crate::reasoner::Recommendation;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryReply {
    pub intent: Intent,
    pub response: String,
    pub success: bool,

    /// Machine-readable diagnostic code on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub opportunities: Vec<YieldOpportunity>,

    #[serde(default)]
    pub missing_sources: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

#[derive(Serialize, Deserialize)]
struct ReplyData {
    #[serde(default)]
    opportunities: Vec<YieldOpportunity>,
    #[serde(default)]
    recommendation: Option<Recommendation>,
}

impl QueryReply {
    pub fn ok(intent: Intent, response: impl Into<String>) -> Self {
        Self {
            intent,
            response: response.into(),
            success: true,
            error: None,
            opportunities: Vec::new(),
            missing_sources: 0,
            recommendation: None,
        }
    }

    /// Generic apology; the error only surfaces as its code
    pub fn failed(intent: Intent, error: &AgentError) -> Self {
        Self {
            success: false,
            error: Some(error.code().to_string()),
            ..Self::ok(intent, error.user_message())
        }
    }

    #[must_use]
    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.missing_sources = analysis.missing_sources();
        self.opportunities = analysis.opportunities;
        self
    }

    #[must_use]
    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendation = Some(recommendation);
        self
    }

    pub fn confidence(&self) -> Option<f64> {
        self.recommendation.as_ref().map(Recommendation::confidence)
    }

    /// Protocol message answering `in_reply_to`
    pub fn to_chat(&self, in_reply_to: Uuid) -> ChatMessage {
        let mut message = ChatMessage::text(&self.response)
            .replying_to(in_reply_to)
            .with_metadata("intent", self.intent.as_str())
            .with_metadata("success", self.success.to_string())
            .with_metadata("missing_sources", self.missing_sources.to_string());
        if let Some(error) = &self.error {
            message = message.with_metadata("error", error);
        }
        if let Some(confidence) = self.confidence() {
            message = message.with_metadata("confidence", format!("{confidence:.2}"));
        }

        if !self.opportunities.is_empty() || self.recommendation.is_some() {
            let data = ReplyData {
                opportunities: self.opportunities.clone(),
                recommendation: self.recommendation.clone(),
            };
            match serde_json::to_value(&data) {
                Ok(value) => message = message.with_data(value),
                Err(e) => tracing::warn!("Dropping reply data: {}", e),
            }
        }
        message
    }

    /// Rebuild a reply from its protocol message; `None` if it isn't one
    pub fn from_chat(message: &ChatMessage) -> Option<Self> {
        let intent = Intent::parse(message.metadata_value("intent")?)?;
        let data = message
            .data()
            .and_then(|d| serde_json::from_value::<ReplyData>(d.clone()).ok());
        let (opportunities, recommendation) = data.map_or((Vec::new(), None), |d| (d.opportunities, d.recommendation));

        Some(Self {
            intent,
            response: message.text_content().unwrap_or_default().to_string(),
            success: message.metadata_value("success") == Some("true"),
            error: message.metadata_value("error").map(str::to_string),
            opportunities,
            missing_sources: message
                .metadata_value("missing_sources")
                .and_then(|n| n.parse().ok())
                .unwrap_or_default(),
            recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskTier;
    use rust_decimal_macros::dec;

    #[test]
    fn test_failed_reply_hides_detail() {
        let err = AgentError::Timeout {
            address: "agent://analyzer".into(),
            after_ms: 15_000,
        };
        let reply = QueryReply::failed(Intent::YieldAnalysis, &err);

        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("downstream_timeout"));
        assert!(!reply.response.contains("agent://analyzer"));
        assert!(reply.response.starts_with("Sorry"));
    }

    #[test]
    fn test_chat_form() {
        let request = Uuid::new_v4();
        let reply = QueryReply::ok(Intent::YieldComparison, "Orca leads").with_analysis(Analysis {
            topic: None,
            opportunities: vec![YieldOpportunity::new("Orca", "SOL-USDC", RiskTier::Low, "orca").with_apy(dec!(8.5))],
            excluded: Vec::new(),
        });

        let message = reply.to_chat(request);
        assert_eq!(message.in_reply_to, Some(request));
        assert_eq!(message.text_content(), Some("Orca leads"));
        assert_eq!(message.metadata_value("intent"), Some("yield_comparison"));
        assert_eq!(message.metadata_value("success"), Some("true"));
        assert_eq!(message.metadata_value("error"), None);

        let back = QueryReply::from_chat(&message).unwrap();
        assert_eq!(back.opportunities[0].apy, Some(dec!(8.5)));
        assert_eq!(back.intent, Intent::YieldComparison);
    }

    #[test]
    fn test_out_of_scope_has_no_data() {
        let message = QueryReply::ok(Intent::OutOfScope, "nope").to_chat(Uuid::new_v4());
        assert!(message.data().is_none());
        assert!(QueryReply::from_chat(&ChatMessage::text("hello")).is_none());
    }
}
