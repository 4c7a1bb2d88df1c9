//! Confidence → quality tier mapping.
//!
//! Tiers use inclusive lower bounds:
//!
//! | Tier      | Confidence     |
//! |-----------|----------------|
//! | Uncertain | `[0, 0.2)`     |
//! | Low       | `[0.2, 0.45)`  |
//! | Medium    | `[0.45, 0.75)` |
//! | High      | `[0.75, 1.0]`  |

use serde::{Deserialize, Serialize};

use crate::outcome::RecognitionMethod;

/// Coarse confidence bucket, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Uncertain,
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Inclusive minimum confidence for this tier.
    pub const fn min_confidence(self) -> f64 {
        match self {
            Self::Uncertain => 0.0,
            Self::Low => 0.2,
            Self::Medium => 0.45,
            Self::High => 0.75,
        }
    }

    /// Tier for a confidence value. Non-finite values are `Uncertain`.
    pub fn from_confidence(confidence: f64) -> Self {
        if !confidence.is_finite() {
            return Self::Uncertain;
        }
        [Self::High, Self::Medium, Self::Low]
            .into_iter()
            .find(|tier| confidence >= tier.min_confidence())
            .unwrap_or(Self::Uncertain)
    }

    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uncertain => write!(f, "uncertain"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Quality verdict for a single recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub tier: QualityTier,
    /// Confidence clamped into `[0, 1]`
    pub confidence: f64,
    pub advisories: Vec<String>,
    pub is_reliable: bool,
}

const RETAKE_ADVICE: &str = "Re-center the subject and improve the lighting, then try again";
const FILL_FRAME_ADVICE: &str = "Move closer so the object fills most of the frame";
const LOW_ADVICE: &str = "This result may be inaccurate; try a clearer photo";
const MEDIUM_ADVICE: &str = "This result is plausible; double-check key details";
const NETWORK_ADVICE: &str = "Connect to a network for a more accurate result";

/// Assess a confidence score produced by `method`.
pub fn assess(confidence: f64, method: RecognitionMethod) -> QualityAssessment {
    let tier = QualityTier::from_confidence(confidence);
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut advisories: Vec<&str> = match tier {
        QualityTier::Uncertain => vec![RETAKE_ADVICE, FILL_FRAME_ADVICE],
        QualityTier::Low => vec![LOW_ADVICE],
        QualityTier::Medium => vec![MEDIUM_ADVICE],
        QualityTier::High => Vec::new(),
    };
    if method == RecognitionMethod::Offline && matches!(tier, QualityTier::Low | QualityTier::Medium)
    {
        advisories.push(NETWORK_ADVICE);
    }

    QualityAssessment {
        tier,
        confidence,
        advisories: advisories.into_iter().map(String::from).collect(),
        is_reliable: tier.is_reliable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_exact() {
        assert_eq!(QualityTier::from_confidence(0.75), QualityTier::High);
        assert_eq!(QualityTier::from_confidence(0.749999), QualityTier::Medium);
        assert_eq!(QualityTier::from_confidence(0.45), QualityTier::Medium);
        assert_eq!(QualityTier::from_confidence(0.449999), QualityTier::Low);
        assert_eq!(QualityTier::from_confidence(0.2), QualityTier::Low);
        assert_eq!(QualityTier::from_confidence(0.199999), QualityTier::Uncertain);
        assert_eq!(QualityTier::from_confidence(0.0), QualityTier::Uncertain);
        assert_eq!(QualityTier::from_confidence(1.0), QualityTier::High);
    }

    #[test]
    fn test_out_of_range_confidence() {
        assert_eq!(QualityTier::from_confidence(f64::NAN), QualityTier::Uncertain);
        assert_eq!(QualityTier::from_confidence(-0.3), QualityTier::Uncertain);
        assert_eq!(QualityTier::from_confidence(1.7), QualityTier::High);

        let assessment = assess(1.7, RecognitionMethod::CloudApi);
        assert_eq!(assessment.confidence, 1.0);
        assert_eq!(assess(f64::NAN, RecognitionMethod::CloudApi).confidence, 0.0);
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(QualityTier::Uncertain < QualityTier::Low);
        assert!(QualityTier::Low < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
    }

    #[test]
    fn test_reliability() {
        assert!(!assess(0.1, RecognitionMethod::UserAi).is_reliable);
        assert!(!assess(0.3, RecognitionMethod::UserAi).is_reliable);
        assert!(assess(0.5, RecognitionMethod::UserAi).is_reliable);
        assert!(assess(0.9, RecognitionMethod::UserAi).is_reliable);
    }

    #[test]
    fn test_high_has_no_advisories() {
        assert!(assess(0.9, RecognitionMethod::Offline).advisories.is_empty());
    }

    #[test]
    fn test_offline_medium_suggests_network() {
        let offline = assess(0.5, RecognitionMethod::Offline);
        assert!(offline.advisories.iter().any(|a| a == NETWORK_ADVICE));

        let cloud = assess(0.5, RecognitionMethod::CloudApi);
        assert!(!cloud.advisories.iter().any(|a| a == NETWORK_ADVICE));
    }

    #[test]
    fn test_uncertain_suggests_retake() {
        let assessment = assess(0.05, RecognitionMethod::CloudApi);
        assert_eq!(assessment.tier, QualityTier::Uncertain);
        assert!(assessment.advisories.iter().any(|a| a == RETAKE_ADVICE));
    }
}
