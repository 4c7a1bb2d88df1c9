//! Recognition collaborators.
//!
//! The orchestrator never talks to a model or a network client directly. It
//! drives these traits, each of which wraps one external source:
//!
//! - **Offline classifier** - on-device model, always reachable
//! - **Cloud API** - quota-gated recognition service
//! - **User AI** - AI service the user configured with their own credentials
//! - **Knowledge enhancer** - best-effort enrichment of a finished outcome
//!
//! Implementations must be thread-safe (`Send + Sync`). Errors returned from
//! `recognize` are treated as "no result from this source"; they never fail
//! the request on their own.

#[cfg(feature = "mock")]
pub mod mock;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::outcome::{RecognitionMethod, RecognitionOutcome};

/// Descriptive fields an offline label may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDetails {
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub usage: String,
    pub category: String,
}

/// Raw output of the offline classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineLabel {
    pub label: String,
    pub confidence: f64,
    pub details: Option<LabelDetails>,
}

/// Category used when the classifier has no details for a label.
pub const UNCLASSIFIED_CATEGORY: &str = "Unclassified";

impl From<OfflineLabel> for RecognitionOutcome {
    fn from(raw: OfflineLabel) -> Self {
        let details = raw.details.unwrap_or_else(|| LabelDetails {
            category: UNCLASSIFIED_CATEGORY.to_string(),
            ..LabelDetails::default()
        });
        Self {
            aliases: details.aliases,
            origin: details.origin,
            usage: details.usage,
            ..RecognitionOutcome::new(
                raw.label,
                details.category,
                raw.confidence,
                RecognitionMethod::Offline,
            )
        }
    }
}

/// Raw output of a cloud recognition API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudApiResult {
    /// Quota source that served the request
    pub source: String,
    pub name: String,
    pub confidence: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl From<CloudApiResult> for RecognitionOutcome {
    fn from(raw: CloudApiResult) -> Self {
        Self {
            aliases: raw.aliases,
            origin: raw.description,
            ..RecognitionOutcome::new(
                raw.name,
                raw.category,
                raw.confidence,
                RecognitionMethod::CloudApi,
            )
        }
    }
}

/// Raw output of a user-configured AI service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResult {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub usage: String,
    pub category: String,
    pub confidence: f64,
}

impl From<AiResult> for RecognitionOutcome {
    fn from(raw: AiResult) -> Self {
        Self {
            aliases: raw.aliases,
            origin: raw.origin,
            usage: raw.usage,
            ..RecognitionOutcome::new(raw.name, raw.category, raw.confidence, RecognitionMethod::UserAi)
        }
    }
}

/// Connection settings for a user AI service.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AiServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

impl std::fmt::Debug for AiServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// On-device image classifier.
#[async_trait]
pub trait OfflineClassifier: Send + Sync {
    /// Load the model. Idempotent; returns whether the classifier is ready.
    async fn initialize(&self) -> bool;

    fn is_initialized(&self) -> bool;

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<OfflineLabel>>;
}

/// Quota-gated cloud recognition API.
///
/// On a successful call the implementation records the use against the
/// quota source that served it.
#[async_trait]
pub trait CloudApiSource: Send + Sync {
    /// Quota source names this client can draw on.
    fn source_names(&self) -> Vec<String>;

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<CloudApiResult>>;
}

/// AI service configured by the user.
#[async_trait]
pub trait UserAiService: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<AiResult>>;

    /// Check a candidate configuration out of band.
    async fn validate_config(&self, config: &AiServiceConfig) -> bool;
}

/// Best-effort enrichment of a finished outcome.
#[async_trait]
pub trait KnowledgeEnhancer: Send + Sync {
    async fn enhance(&self, outcome: RecognitionOutcome) -> Result<RecognitionOutcome>;
}

/// Network reachability probe.
pub trait NetworkMonitor: Send + Sync {
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_label_without_details() {
        let outcome: RecognitionOutcome = OfflineLabel {
            label: "Teapot".into(),
            confidence: 0.4,
            details: None,
        }
        .into();

        assert_eq!(outcome.name, "Teapot");
        assert_eq!(outcome.category, UNCLASSIFIED_CATEGORY);
        assert_eq!(outcome.method, RecognitionMethod::Offline);
        assert!(outcome.aliases.is_empty());
    }

    #[test]
    fn test_offline_label_with_details() {
        let outcome: RecognitionOutcome = OfflineLabel {
            label: "Teapot".into(),
            confidence: 0.5,
            details: Some(LabelDetails {
                aliases: vec!["Tea kettle".into()],
                origin: "China".into(),
                usage: "Brewing tea".into(),
                category: "Kitchenware".into(),
            }),
        }
        .into();

        assert_eq!(outcome.category, "Kitchenware");
        assert_eq!(outcome.origin, "China");
        assert_eq!(outcome.aliases, vec!["Tea kettle".to_string()]);
    }

    #[test]
    fn test_cloud_result_maps_description_to_origin() {
        let outcome: RecognitionOutcome = CloudApiResult {
            source: "vision-api".into(),
            name: "Cactus".into(),
            confidence: 0.9,
            category: "Plant".into(),
            description: "Native to the Americas".into(),
            aliases: Vec::new(),
        }
        .into();

        assert_eq!(outcome.method, RecognitionMethod::CloudApi);
        assert_eq!(outcome.origin, "Native to the Americas");
    }

    #[test]
    fn test_ai_config_debug_redacts_key() {
        let config = AiServiceConfig {
            endpoint: "https://ai.example".into(),
            model: "vision".into(),
            api_key: "secret".into(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
