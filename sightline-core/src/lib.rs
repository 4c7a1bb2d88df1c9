//! Sightline Core - recognition orchestration for photographed objects
//!
//! This crate decides *how* an object in a photo gets recognized. It does not
//! ship a model; it coordinates pluggable recognizers and the bookkeeping
//! around them.
//!
//! # Features
//!
//! - DCT perceptual fingerprints for near-duplicate detection
//! - Bounded LRU result cache with exact and fuzzy lookups
//! - Per-source daily/monthly quotas with calendar resets
//! - User-ordered recognition methods with early exit on a good result
//! - Best-effort knowledge enhancement under a timeout
//! - Progress events and an observable request state
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sightline_core::mock::{MockAiService, MockClassifier, MockCloudApi, MockEnhancer, StaticNetwork};
//! use sightline_core::{MemoryStore, Orchestrator, QuotaLimits, QuotaTracker, Recognizers};
//!
//! # async fn example() -> sightline_core::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let quota = Arc::new(QuotaTracker::load(store.clone())?);
//! quota.register("vision-api", QuotaLimits::default())?;
//!
//! let recognizers = Recognizers {
//!     offline: Arc::new(MockClassifier::default_test()),
//!     cloud: Arc::new(MockCloudApi::new(quota.clone(), vec!["vision-api".into()])),
//!     user_ai: Arc::new(MockAiService::new(false)),
//!     enhancer: Arc::new(MockEnhancer::new()),
//!     network: Arc::new(StaticNetwork::new(true)),
//! };
//! let orchestrator = Orchestrator::builder(recognizers)
//!     .with_store(store)
//!     .with_quota(quota)
//!     .build()?;
//!
//! let photo = image::open("teapot.jpg").map_err(|e| sightline_core::SightlineError::Image(e.to_string()))?;
//! let outcome = orchestrator.recognize(&photo).await?;
//! println!("{} ({:.0}%)", outcome.name, outcome.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod orchestrator;
pub mod outcome;
pub mod priority;
pub mod quality;
pub mod quota;
pub mod recognizer;
pub mod store;

// Re-export main types for convenience
pub use cache::{CacheStats, CachedResult, ResultCache, FUZZY_MATCH_CONFIDENCE_FACTOR};
pub use error::{Result, SightlineError};
pub use fingerprint::{
    compute_fingerprint, fingerprint_bytes, hamming_distance, Fingerprint,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use orchestrator::{
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, ProgressEvent, Recognizers,
    SkipReason, Stage,
};
pub use outcome::{Enrichment, RecognitionMethod, RecognitionOutcome, RecognitionState};
pub use priority::{MethodConfig, PriorityConfig, PriorityManager};
pub use quality::{assess, QualityAssessment, QualityTier};
pub use quota::{Clock, ManualClock, QuotaLimits, QuotaRecord, QuotaTracker, SystemClock};
pub use recognizer::{
    AiResult, AiServiceConfig, CloudApiResult, CloudApiSource, KnowledgeEnhancer, LabelDetails,
    NetworkMonitor, OfflineClassifier, OfflineLabel, UserAiService,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};

// Mock collaborators for tests and demos
#[cfg(feature = "mock")]
pub use recognizer::mock;
