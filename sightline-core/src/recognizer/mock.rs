//! Deterministic mock collaborators for testing and demos.
//! WARNING: these do not recognize anything - results are derived from the
//! image fingerprint with SHA3 or scripted by the caller.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use sha3::{Digest, Sha3_256};
use tracing::debug;

use super::{
    AiResult, AiServiceConfig, CloudApiResult, CloudApiSource, KnowledgeEnhancer, LabelDetails,
    NetworkMonitor, OfflineClassifier, OfflineLabel, UserAiService,
};
use crate::error::{Result, SightlineError};
use crate::fingerprint::compute_fingerprint;
use crate::outcome::{Enrichment, RecognitionOutcome};
use crate::quota::QuotaTracker;

struct Specimen {
    name: &'static str,
    category: &'static str,
    origin: &'static str,
    usage: &'static str,
    aliases: &'static [&'static str],
}

const SPECIMENS: &[Specimen] = &[
    Specimen {
        name: "Teapot",
        category: "Kitchenware",
        origin: "China",
        usage: "Brewing and serving tea",
        aliases: &["Tea kettle"],
    },
    Specimen {
        name: "Monstera",
        category: "Plant",
        origin: "Central America",
        usage: "Ornamental houseplant",
        aliases: &["Swiss cheese plant"],
    },
    Specimen {
        name: "Abacus",
        category: "Tool",
        origin: "Mesopotamia",
        usage: "Manual arithmetic",
        aliases: &["Counting frame"],
    },
    Specimen {
        name: "Ammonite",
        category: "Fossil",
        origin: "Devonian to Cretaceous seas",
        usage: "Index fossil for dating rock layers",
        aliases: &[],
    },
];

/// Scripted behavior shared by the mocks.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Fixed confidence; derived from the image when `None`
    pub confidence: Option<f64>,
    /// Simulated latency
    pub delay: Duration,
    /// Return an error instead of a result
    pub fail: bool,
    /// Return `Ok(None)`
    pub empty: bool,
}

impl MockBehavior {
    /// Sleep, count the call, and decide whether a result should be produced.
    async fn perform(&self, calls: &AtomicUsize, who: &str) -> Result<bool> {
        calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SightlineError::Collaborator(format!("{who}: simulated failure")));
        }
        Ok(!self.empty)
    }
}

/// SHA3 digest of seed, salt and image fingerprint.
fn digest(seed: u64, salt: &[u8], image: &DynamicImage) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(salt);
    hasher.update(compute_fingerprint(image).as_bytes());

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn pick(digest: &[u8; 32]) -> &'static Specimen {
    &SPECIMENS[digest[0] as usize % SPECIMENS.len()]
}

/// Map a digest byte into `[0.3, 0.95]`.
fn derived_confidence(digest: &[u8; 32]) -> f64 {
    0.3 + f64::from(digest[1]) / 255.0 * 0.65
}

macro_rules! behavior_builders {
    () => {
        /// Always report this confidence.
        pub fn with_confidence(mut self, confidence: f64) -> Self {
            self.behavior.confidence = Some(confidence);
            self
        }

        /// Wait this long before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.behavior.delay = delay;
            self
        }

        /// Fail every call.
        pub fn failing(mut self) -> Self {
            self.behavior.fail = true;
            self
        }

        /// Succeed without producing a result.
        pub fn returning_nothing(mut self) -> Self {
            self.behavior.empty = true;
            self
        }

        /// Number of recognition calls made so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    };
}

/// Mock on-device classifier.
pub struct MockClassifier {
    seed: u64,
    behavior: MockBehavior,
    with_details: bool,
    can_initialize: bool,
    initialized: AtomicBool,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            behavior: MockBehavior::default(),
            with_details: true,
            can_initialize: true,
            initialized: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock with default seed for simple tests.
    pub fn default_test() -> Self {
        Self::new(0xDEADBEEF_CAFEBABE)
    }

    behavior_builders!();

    /// Labels carry no details.
    pub fn without_details(mut self) -> Self {
        self.with_details = false;
        self
    }

    /// Model never finishes loading.
    pub fn uninitializable(mut self) -> Self {
        self.can_initialize = false;
        self
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::default_test()
    }
}

#[async_trait]
impl OfflineClassifier for MockClassifier {
    async fn initialize(&self) -> bool {
        if self.can_initialize {
            self.initialized.store(true, Ordering::SeqCst);
        }
        self.is_initialized()
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<OfflineLabel>> {
        if !self.behavior.perform(&self.calls, "offline").await? {
            return Ok(None);
        }

        let digest = digest(self.seed, b"sightline-mock-offline", image);
        let specimen = pick(&digest);
        let details = self.with_details.then(|| LabelDetails {
            aliases: specimen.aliases.iter().map(|a| a.to_string()).collect(),
            origin: specimen.origin.to_string(),
            usage: specimen.usage.to_string(),
            category: specimen.category.to_string(),
        });

        Ok(Some(OfflineLabel {
            label: specimen.name.to_string(),
            confidence: self
                .behavior
                .confidence
                .unwrap_or_else(|| derived_confidence(&digest)),
            details,
        }))
    }
}

/// Mock cloud API drawing on quota-tracked sources.
pub struct MockCloudApi {
    quota: Arc<QuotaTracker>,
    sources: Vec<String>,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockCloudApi {
    pub fn new(quota: Arc<QuotaTracker>, sources: Vec<String>) -> Self {
        Self {
            quota,
            sources,
            behavior: MockBehavior::default(),
            calls: AtomicUsize::new(0),
        }
    }

    behavior_builders!();
}

#[async_trait]
impl CloudApiSource for MockCloudApi {
    fn source_names(&self) -> Vec<String> {
        self.sources.clone()
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<CloudApiResult>> {
        let mut source = None;
        for name in &self.sources {
            if self.quota.is_available(name)? {
                source = Some(name.clone());
                break;
            }
        }
        let Some(source) = source else {
            return Err(SightlineError::Collaborator(
                "cloud: no quota source available".into(),
            ));
        };

        if !self.behavior.perform(&self.calls, "cloud").await? {
            return Ok(None);
        }

        let digest = digest(0, b"sightline-mock-cloud", image);
        let specimen = pick(&digest);
        self.quota.record_use(&source)?;
        debug!(source = %source, "Mock cloud call recorded");

        Ok(Some(CloudApiResult {
            source,
            name: specimen.name.to_string(),
            confidence: self
                .behavior
                .confidence
                .unwrap_or_else(|| derived_confidence(&digest)),
            category: specimen.category.to_string(),
            description: specimen.origin.to_string(),
            aliases: specimen.aliases.iter().map(|a| a.to_string()).collect(),
        }))
    }
}

/// Mock user-configured AI service.
pub struct MockAiService {
    configured: bool,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockAiService {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            behavior: MockBehavior::default(),
            calls: AtomicUsize::new(0),
        }
    }

    behavior_builders!();
}

#[async_trait]
impl UserAiService for MockAiService {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<Option<AiResult>> {
        if !self.behavior.perform(&self.calls, "user_ai").await? {
            return Ok(None);
        }

        let digest = digest(0, b"sightline-mock-ai", image);
        let specimen = pick(&digest);
        Ok(Some(AiResult {
            name: specimen.name.to_string(),
            aliases: specimen.aliases.iter().map(|a| a.to_string()).collect(),
            origin: specimen.origin.to_string(),
            usage: specimen.usage.to_string(),
            category: specimen.category.to_string(),
            confidence: self
                .behavior
                .confidence
                .unwrap_or_else(|| derived_confidence(&digest)),
        }))
    }

    async fn validate_config(&self, config: &AiServiceConfig) -> bool {
        !config.endpoint.is_empty() && !config.api_key.is_empty()
    }
}

/// Mock knowledge enhancer that attaches a canned summary.
pub struct MockEnhancer {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockEnhancer {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::default(),
            calls: AtomicUsize::new(0),
        }
    }

    behavior_builders!();
}

impl Default for MockEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeEnhancer for MockEnhancer {
    async fn enhance(&self, mut outcome: RecognitionOutcome) -> Result<RecognitionOutcome> {
        if !self.behavior.perform(&self.calls, "enhancer").await? {
            return Ok(outcome);
        }

        let mut facts = Vec::new();
        if !outcome.origin.is_empty() {
            facts.push(format!("Origin: {}", outcome.origin));
        }
        if !outcome.usage.is_empty() {
            facts.push(format!("Usage: {}", outcome.usage));
        }
        outcome.enrichment = Some(Enrichment {
            summary: format!("{} ({})", outcome.name, outcome.category),
            facts,
            references: Vec::new(),
        });
        Ok(outcome)
    }
}

/// Network probe with a switchable answer.
#[derive(Debug)]
pub struct StaticNetwork {
    online: AtomicBool,
}

impl StaticNetwork {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl NetworkMonitor for StaticNetwork {
    fn is_available(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
