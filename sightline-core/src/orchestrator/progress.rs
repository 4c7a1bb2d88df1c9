//! Progress events published by the orchestrator.
//!
//! One producer, any number of subscribers. Slow subscribers lag and lose
//! old events; they never hold the orchestrator back.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::outcome::RecognitionMethod;

/// Non-terminal stages of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CacheLookup,
    Preparing,
    Attempting(RecognitionMethod),
    KnowledgeEnhancement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheLookup => write!(f, "cache lookup"),
            Self::Preparing => write!(f, "preparing"),
            Self::Attempting(method) => write!(f, "attempting {method}"),
            Self::KnowledgeEnhancement => write!(f, "knowledge enhancement"),
        }
    }
}

/// Why a method was passed over without being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoNetwork,
    QuotaExhausted,
    NotConfigured,
}

/// Stage transitions and terminal results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ProgressEvent {
    StageEntered {
        stage: Stage,
        elapsed_ms: u64,
    },
    MethodSkipped {
        method: RecognitionMethod,
        reason: SkipReason,
    },
    MethodFinished {
        method: RecognitionMethod,
        confidence: Option<f64>,
    },
    Completed {
        method: RecognitionMethod,
        confidence: f64,
        from_cache: bool,
        elapsed_ms: u64,
    },
    Failed {
        message: String,
        elapsed_ms: u64,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Broadcast channel for [`ProgressEvent`]s.
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ProgressBus::new(4);
        bus.publish(ProgressEvent::Failed {
            message: "nothing".into(),
            elapsed_ms: 0,
        });
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = ProgressBus::new(4);
        let mut rx = bus.subscribe();

        bus.publish(ProgressEvent::StageEntered {
            stage: Stage::CacheLookup,
            elapsed_ms: 0,
        });
        bus.publish(ProgressEvent::StageEntered {
            stage: Stage::Attempting(RecognitionMethod::Offline),
            elapsed_ms: 1,
        });

        assert!(matches!(
            rx.try_recv().unwrap(),
            ProgressEvent::StageEntered {
                stage: Stage::CacheLookup,
                ..
            }
        ));
        let next = rx.try_recv().unwrap();
        assert!(!next.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::MethodSkipped {
            method: RecognitionMethod::CloudApi,
            reason: SkipReason::QuotaExhausted,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MethodSkipped");
        assert_eq!(json["payload"]["reason"], "quota_exhausted");
    }
}
