//! Orchestrator configuration
//!
//! Defaults match the interactive camera flow. Every value can be overridden
//! from `SIGHTLINE_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::fingerprint::DEFAULT_SIMILARITY_THRESHOLD;
use crate::outcome::RecognitionMethod;

/// Timeouts, thresholds and sizes used by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Soft deadline for the whole request, checked between methods (default: 15s)
    pub total_budget: Duration,
    /// Stop trying methods once less than this is left (default: 1s)
    pub min_remaining: Duration,
    /// Offline classifier timeout (default: 2s)
    pub offline_timeout: Duration,
    /// Cloud API timeout (default: 5s)
    pub cloud_timeout: Duration,
    /// User AI timeout (default: 6s)
    pub user_ai_timeout: Duration,
    /// Knowledge enhancement timeout (default: 3s)
    pub enhancement_timeout: Duration,
    /// Medium-tier results at or above this confidence end the search (default: 0.7)
    pub medium_accept_threshold: f64,
    /// Result cache capacity (default: 50)
    pub cache_capacity: usize,
    /// Near-duplicate threshold in bits (default: 10)
    pub similarity_threshold: u32,
    /// Progress channel buffer per subscriber (default: 64)
    pub progress_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            total_budget: Duration::from_secs(15),
            min_remaining: Duration::from_secs(1),
            offline_timeout: Duration::from_secs(2),
            cloud_timeout: Duration::from_secs(5),
            user_ai_timeout: Duration::from_secs(6),
            enhancement_timeout: Duration::from_secs(3),
            medium_accept_threshold: 0.7,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            progress_capacity: 64,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl OrchestratorConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Durations are in milliseconds: `SIGHTLINE_TOTAL_BUDGET_MS`,
    /// `SIGHTLINE_MIN_REMAINING_MS`, `SIGHTLINE_OFFLINE_TIMEOUT_MS`,
    /// `SIGHTLINE_CLOUD_TIMEOUT_MS`, `SIGHTLINE_USER_AI_TIMEOUT_MS`,
    /// `SIGHTLINE_ENHANCEMENT_TIMEOUT_MS`. Also `SIGHTLINE_MEDIUM_THRESHOLD`,
    /// `SIGHTLINE_CACHE_CAPACITY`, `SIGHTLINE_SIMILARITY_THRESHOLD`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let medium_accept_threshold = env_parse::<f64>("SIGHTLINE_MEDIUM_THRESHOLD")
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(defaults.medium_accept_threshold);

        Self {
            total_budget: env_millis("SIGHTLINE_TOTAL_BUDGET_MS", defaults.total_budget),
            min_remaining: env_millis("SIGHTLINE_MIN_REMAINING_MS", defaults.min_remaining),
            offline_timeout: env_millis("SIGHTLINE_OFFLINE_TIMEOUT_MS", defaults.offline_timeout),
            cloud_timeout: env_millis("SIGHTLINE_CLOUD_TIMEOUT_MS", defaults.cloud_timeout),
            user_ai_timeout: env_millis("SIGHTLINE_USER_AI_TIMEOUT_MS", defaults.user_ai_timeout),
            enhancement_timeout: env_millis(
                "SIGHTLINE_ENHANCEMENT_TIMEOUT_MS",
                defaults.enhancement_timeout,
            ),
            medium_accept_threshold,
            cache_capacity: env_parse("SIGHTLINE_CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            similarity_threshold: env_parse("SIGHTLINE_SIMILARITY_THRESHOLD")
                .unwrap_or(defaults.similarity_threshold),
            progress_capacity: defaults.progress_capacity,
        }
    }

    /// Per-method call timeout.
    pub fn timeout_for(&self, method: RecognitionMethod) -> Duration {
        match method {
            RecognitionMethod::Offline => self.offline_timeout,
            RecognitionMethod::CloudApi => self.cloud_timeout,
            RecognitionMethod::UserAi => self.user_ai_timeout,
        }
    }
}
