//! Method-agnostic recognition results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::Stage;
use crate::quality::{self, QualityAssessment};

/// Identifies which recognition source produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// On-device classifier
    Offline,
    /// Quota-gated cloud recognition API
    CloudApi,
    /// AI service configured by the user
    UserAi,
}

impl RecognitionMethod {
    pub const ALL: [RecognitionMethod; 3] = [Self::Offline, Self::CloudApi, Self::UserAi];

    pub fn requires_network(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for RecognitionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::CloudApi => write!(f, "cloud_api"),
            Self::UserAi => write!(f, "user_ai"),
        }
    }
}

impl std::str::FromStr for RecognitionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "offline" => Ok(Self::Offline),
            "cloud_api" | "cloud" => Ok(Self::CloudApi),
            "user_ai" | "ai" => Ok(Self::UserAi),
            other => Err(format!("Unknown recognition method: {other}")),
        }
    }
}

/// Supplementary knowledge attached by the knowledge enhancer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: String,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Unified recognition result, whichever method produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub usage: String,
    pub category: String,
    pub confidence: f64,
    pub method: RecognitionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    pub recognized_at: DateTime<Utc>,
}

impl RecognitionOutcome {
    /// Minimal outcome with only a name, category and confidence.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        confidence: f64,
        method: RecognitionMethod,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            origin: String::new(),
            usage: String::new(),
            category: category.into(),
            confidence,
            method,
            enrichment: None,
            recognized_at: Utc::now(),
        }
    }

    /// Quality verdict for this outcome's confidence and method.
    pub fn quality(&self) -> QualityAssessment {
        quality::assess(self.confidence, self.method)
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }
}

/// Observable state of the orchestrator's current request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum RecognitionState {
    #[default]
    Idle,
    Processing(Stage),
    Success(Box<RecognitionOutcome>),
    Error(String),
}

impl RecognitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_requirement() {
        assert!(!RecognitionMethod::Offline.requires_network());
        assert!(RecognitionMethod::CloudApi.requires_network());
        assert!(RecognitionMethod::UserAi.requires_network());
    }

    #[test]
    fn test_method_parse_and_display() {
        for method in RecognitionMethod::ALL {
            assert_eq!(method.to_string().parse::<RecognitionMethod>(), Ok(method));
        }
        assert_eq!("Cloud-API".parse::<RecognitionMethod>(), Ok(RecognitionMethod::CloudApi));
        assert!("satellite".parse::<RecognitionMethod>().is_err());
    }

    #[test]
    fn test_method_serde_names() {
        let json = serde_json::to_string(&RecognitionMethod::UserAi).unwrap();
        assert_eq!(json, "\"user_ai\"");
    }

    #[test]
    fn test_outcome_quality() {
        let outcome = RecognitionOutcome::new("Teapot", "Kitchenware", 0.5, RecognitionMethod::Offline);
        let quality = outcome.quality();
        assert!(quality.is_reliable);
        assert!(!outcome.is_enriched());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!RecognitionState::Idle.is_terminal());
        assert!(RecognitionState::Error("no result".into()).is_terminal());
    }
}
