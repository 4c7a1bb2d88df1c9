//! Recognition orchestrator.
//!
//! Drives one request through cache lookup, the prioritized recognition
//! methods and knowledge enhancement:
//!
//! ```text
//! CacheLookup -> Preparing -> Attempting(method)* -> KnowledgeEnhancement -> Completed
//!                                     \-> Failed (no result, budget, cancellation)
//! ```
//!
//! Methods run one after another. Each call has its own timeout; the overall
//! budget is checked between calls. Requests on the same orchestrator are
//! serialized by a request gate.

mod config;
mod progress;

pub use config::OrchestratorConfig;
pub use progress::{ProgressBus, ProgressEvent, SkipReason, Stage};

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, ResultCache};
use crate::error::{Result, SightlineError};
use crate::fingerprint::compute_fingerprint;
use crate::outcome::{RecognitionMethod, RecognitionOutcome, RecognitionState};
use crate::priority::PriorityManager;
use crate::quality::{self, QualityTier};
use crate::quota::{QuotaRecord, QuotaTracker};
use crate::recognizer::{
    CloudApiSource, KnowledgeEnhancer, NetworkMonitor, OfflineClassifier, UserAiService,
};
use crate::store::{KeyValueStore, MemoryStore};

/// External collaborators driven by the orchestrator.
#[derive(Clone)]
pub struct Recognizers {
    pub offline: Arc<dyn OfflineClassifier>,
    pub cloud: Arc<dyn CloudApiSource>,
    pub user_ai: Arc<dyn UserAiService>,
    pub enhancer: Arc<dyn KnowledgeEnhancer>,
    pub network: Arc<dyn NetworkMonitor>,
}

/// Result of the pipeline before terminal bookkeeping.
struct Resolved {
    outcome: RecognitionOutcome,
    from_cache: bool,
}

/// Builder for [`Orchestrator`].
///
/// Components that are not supplied are created on build: priority and quota
/// are loaded from the store (an in-memory store unless one is given) and the
/// cache is sized from the configuration.
pub struct OrchestratorBuilder {
    recognizers: Recognizers,
    config: OrchestratorConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    priority: Option<Arc<PriorityManager>>,
    quota: Option<Arc<QuotaTracker>>,
    cache: Option<Arc<ResultCache>>,
}

impl OrchestratorBuilder {
    pub fn new(recognizers: Recognizers) -> Self {
        Self {
            recognizers,
            config: OrchestratorConfig::default(),
            store: None,
            priority: None,
            quota: None,
            cache: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Store used to load the priority configuration and quota records.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_priority(mut self, priority: Arc<PriorityManager>) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Share a quota tracker, typically the one the cloud client records into.
    pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the orchestrator. Fails only if loading persisted state fails.
    pub fn build(self) -> Result<Orchestrator> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);

        let priority = match self.priority {
            Some(priority) => priority,
            None => Arc::new(PriorityManager::load(store.clone())?),
        };
        let quota = match self.quota {
            Some(quota) => quota,
            None => Arc::new(QuotaTracker::load(store)?),
        };
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ResultCache::new(
                self.config.cache_capacity,
                self.config.similarity_threshold,
            ))
        });

        let (state, _) = watch::channel(RecognitionState::Idle);
        Ok(Orchestrator {
            progress: ProgressBus::new(self.config.progress_capacity),
            config: self.config,
            recognizers: self.recognizers,
            priority,
            quota,
            cache,
            state,
            gate: Mutex::new(()),
        })
    }
}

/// Coordinates one recognition request at a time across the configured
/// methods, with caching, quota gating and enrichment.
pub struct Orchestrator {
    config: OrchestratorConfig,
    recognizers: Recognizers,
    priority: Arc<PriorityManager>,
    quota: Arc<QuotaTracker>,
    cache: Arc<ResultCache>,
    progress: ProgressBus,
    state: watch::Sender<RecognitionState>,
    gate: Mutex<()>,
}

impl Orchestrator {
    pub fn builder(recognizers: Recognizers) -> OrchestratorBuilder {
        OrchestratorBuilder::new(recognizers)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Recognize the object in `image`.
    pub async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionOutcome> {
        self.recognize_with_cancel(image, &CancellationToken::new())
            .await
    }

    /// Recognize the object in `image`, giving up with
    /// [`SightlineError::Cancelled`] once `cancel` fires.
    ///
    /// A request waits for any earlier request on this orchestrator to finish.
    #[instrument(
        level = "info",
        skip_all,
        fields(width = image.width(), height = image.height())
    )]
    pub async fn recognize_with_cancel(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        let gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = self.gate.lock() => Some(guard),
        };

        let result = match &gate {
            Some(_) => self.run(image, cancel, started).await,
            None => Err(SightlineError::Cancelled),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Resolved {
                outcome,
                from_cache,
            }) => {
                info!(
                    name = %outcome.name,
                    method = %outcome.method,
                    confidence = outcome.confidence,
                    from_cache,
                    elapsed_ms,
                    "Recognition completed"
                );
                self.progress.publish(ProgressEvent::Completed {
                    method: outcome.method,
                    confidence: outcome.confidence,
                    from_cache,
                    elapsed_ms,
                });
                self.state
                    .send_replace(RecognitionState::Success(Box::new(outcome.clone())));
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, elapsed_ms, "Recognition failed");
                self.progress.publish(ProgressEvent::Failed {
                    message: e.to_string(),
                    elapsed_ms,
                });
                self.state
                    .send_replace(RecognitionState::Error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<Resolved> {
        self.enter(Stage::CacheLookup, started);
        let fingerprint = compute_fingerprint(image);
        if let Some(hit) = self.cache.lookup_fingerprint(&fingerprint) {
            debug!(%fingerprint, exact = hit.exact, "Serving cached outcome");
            return Ok(Resolved {
                outcome: hit.into_outcome(),
                from_cache: true,
            });
        }

        self.enter(Stage::Preparing, started);
        let methods = self.priority.enabled_in_order();
        let online = self.recognizers.network.is_available();
        debug!(?methods, online, "Recognition plan");

        let candidate = self
            .attempt_methods(image, &methods, online, cancel, started)
            .await?;
        let outcome = self.enhance(candidate, cancel, started).await?;

        self.cache.store_fingerprint(fingerprint, outcome.clone());
        Ok(Resolved {
            outcome,
            from_cache: false,
        })
    }

    async fn attempt_methods(
        &self,
        image: &DynamicImage,
        methods: &[RecognitionMethod],
        online: bool,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RecognitionOutcome> {
        let mut fallback: Option<RecognitionOutcome> = None;
        let mut out_of_budget = false;

        for &method in methods {
            if cancel.is_cancelled() {
                return Err(SightlineError::Cancelled);
            }

            let remaining = self.config.total_budget.saturating_sub(started.elapsed());
            if remaining < self.config.min_remaining {
                warn!(
                    %method,
                    remaining_ms = remaining.as_millis() as u64,
                    "Recognition budget exhausted"
                );
                out_of_budget = true;
                break;
            }

            if let Some(reason) = self.skip_reason(method, online) {
                debug!(%method, ?reason, "Skipping method");
                self.progress
                    .publish(ProgressEvent::MethodSkipped { method, reason });
                continue;
            }

            self.enter(Stage::Attempting(method), started);
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SightlineError::Cancelled),
                attempt = self.attempt(method, image) => attempt,
            };
            self.progress.publish(ProgressEvent::MethodFinished {
                method,
                confidence: attempt.as_ref().map(|o| o.confidence),
            });

            let Some(outcome) = attempt else {
                continue;
            };

            let tier = quality::assess(outcome.confidence, method).tier;
            let accept = match tier {
                QualityTier::High => true,
                QualityTier::Medium => outcome.confidence >= self.config.medium_accept_threshold,
                QualityTier::Low | QualityTier::Uncertain => false,
            };
            if accept {
                debug!(%method, %tier, confidence = outcome.confidence, "Accepting result");
                return Ok(outcome);
            }

            // First result wins ties
            if fallback
                .as_ref()
                .map_or(true, |best| outcome.confidence > best.confidence)
            {
                fallback = Some(outcome);
            }
        }

        match fallback {
            Some(best) => {
                debug!(
                    method = %best.method,
                    confidence = best.confidence,
                    "Using best fallback result"
                );
                Ok(best)
            }
            None if out_of_budget => Err(SightlineError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            None => Err(SightlineError::NoResult),
        }
    }

    fn skip_reason(&self, method: RecognitionMethod, online: bool) -> Option<SkipReason> {
        if method.requires_network() && !online {
            return Some(SkipReason::NoNetwork);
        }
        match method {
            RecognitionMethod::Offline => None,
            RecognitionMethod::CloudApi => {
                let sources = self.recognizers.cloud.source_names();
                match self.quota.any_available(&sources) {
                    Ok(true) => None,
                    Ok(false) => Some(SkipReason::QuotaExhausted),
                    Err(e) => {
                        warn!(error = %e, "Quota check failed, treating as exhausted");
                        Some(SkipReason::QuotaExhausted)
                    }
                }
            }
            RecognitionMethod::UserAi => {
                (!self.recognizers.user_ai.is_configured()).then_some(SkipReason::NotConfigured)
            }
        }
    }

    /// Run one method under its timeout. Errors and timeouts yield `None`.
    async fn attempt(
        &self,
        method: RecognitionMethod,
        image: &DynamicImage,
    ) -> Option<RecognitionOutcome> {
        let limit = self.config.timeout_for(method);
        match tokio::time::timeout(limit, self.call(method, image)).await {
            Ok(Ok(Some(outcome))) if !outcome.confidence.is_finite() => {
                warn!(%method, name = %outcome.name, "Discarding result with non-finite confidence");
                None
            }
            Ok(Ok(Some(outcome))) => {
                debug!(%method, name = %outcome.name, confidence = outcome.confidence, "Method result");
                Some(outcome)
            }
            Ok(Ok(None)) => {
                debug!(%method, "Method produced no result");
                None
            }
            Ok(Err(e)) => {
                warn!(%method, error = %e, "Method failed");
                None
            }
            Err(_) => {
                warn!(%method, timeout_ms = limit.as_millis() as u64, "Method timed out");
                None
            }
        }
    }

    async fn call(
        &self,
        method: RecognitionMethod,
        image: &DynamicImage,
    ) -> Result<Option<RecognitionOutcome>> {
        match method {
            RecognitionMethod::Offline => {
                let offline = &self.recognizers.offline;
                if !offline.is_initialized() && !offline.initialize().await {
                    return Err(SightlineError::Collaborator(
                        "offline classifier failed to initialize".into(),
                    ));
                }
                Ok(offline.recognize(image).await?.map(RecognitionOutcome::from))
            }
            RecognitionMethod::CloudApi => Ok(self
                .recognizers
                .cloud
                .recognize(image)
                .await?
                .map(RecognitionOutcome::from)),
            RecognitionMethod::UserAi => Ok(self
                .recognizers
                .user_ai
                .recognize(image)
                .await?
                .map(RecognitionOutcome::from)),
        }
    }

    /// Enrich `outcome`, keeping it unchanged if enhancement fails or times out.
    async fn enhance(
        &self,
        outcome: RecognitionOutcome,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RecognitionOutcome> {
        if cancel.is_cancelled() {
            return Err(SightlineError::Cancelled);
        }
        self.enter(Stage::KnowledgeEnhancement, started);

        let limit = self.config.enhancement_timeout;
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SightlineError::Cancelled),
            attempt = tokio::time::timeout(limit, self.recognizers.enhancer.enhance(outcome.clone())) => attempt,
        };

        match attempt {
            Ok(Ok(enriched)) => Ok(enriched),
            Ok(Err(e)) => {
                warn!(error = %e, "Knowledge enhancement failed, keeping base result");
                Ok(outcome)
            }
            Err(_) => {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "Knowledge enhancement timed out, keeping base result"
                );
                Ok(outcome)
            }
        }
    }

    fn enter(&self, stage: Stage, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(%stage, elapsed_ms, "Entering stage");
        self.progress
            .publish(ProgressEvent::StageEntered { stage, elapsed_ms });
        self.state.send_replace(RecognitionState::Processing(stage));
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Current request state.
    pub fn state(&self) -> RecognitionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RecognitionState> {
        self.state.subscribe()
    }

    /// Return to `Idle` after the consumer has handled a terminal state.
    pub fn reset_state(&self) {
        self.state.send_replace(RecognitionState::Idle);
    }

    pub fn quota_status(&self, source: &str) -> Result<Option<QuotaRecord>> {
        self.quota.status_of(source)
    }

    pub fn all_quota_status(&self) -> Result<Vec<QuotaRecord>> {
        self.quota.status_of_all()
    }

    pub fn enabled_methods_in_order(&self) -> Vec<RecognitionMethod> {
        self.priority.enabled_in_order()
    }

    pub fn priority(&self) -> &Arc<PriorityManager> {
        &self.priority
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::recognizer::mock::{
        MockAiService, MockClassifier, MockCloudApi, MockEnhancer, StaticNetwork,
    };
    use image::{GrayImage, Luma};
    use std::time::Duration;

    fn image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, y| {
            Luma([((x * 7 + y * 13) % 256) as u8])
        }))
    }

    fn orchestrator(offline: MockClassifier, online: bool) -> Orchestrator {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let quota = Arc::new(QuotaTracker::load(store.clone()).unwrap());
        let recognizers = Recognizers {
            offline: Arc::new(offline),
            cloud: Arc::new(MockCloudApi::new(quota.clone(), Vec::new())),
            user_ai: Arc::new(MockAiService::new(false)),
            enhancer: Arc::new(MockEnhancer::new()),
            network: Arc::new(StaticNetwork::new(online)),
        };
        Orchestrator::builder(recognizers)
            .with_store(store)
            .with_quota(quota)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_ends_in_success() {
        let orch = orchestrator(MockClassifier::default_test().with_confidence(0.9), false);
        assert_eq!(orch.state(), RecognitionState::Idle);

        let outcome = orch.recognize(&image()).await.unwrap();
        assert!(outcome.is_enriched());
        match orch.state() {
            RecognitionState::Success(done) => assert_eq!(done.name, outcome.name),
            other => panic!("unexpected state {other:?}"),
        }

        orch.reset_state();
        assert_eq!(orch.state(), RecognitionState::Idle);
    }

    #[tokio::test]
    async fn test_state_ends_in_error_without_result() {
        let orch = orchestrator(MockClassifier::default_test().returning_nothing(), false);

        let err = orch.recognize(&image()).await.unwrap_err();
        assert!(matches!(err, SightlineError::NoResult));
        assert_eq!(orch.state(), RecognitionState::Error(err.user_message()));
    }

    #[tokio::test]
    async fn test_progress_stages_in_order() {
        let orch = orchestrator(MockClassifier::default_test().with_confidence(0.9), false);
        let mut rx = orch.subscribe_progress();

        orch.recognize(&image()).await.unwrap();

        let mut stages = Vec::new();
        let mut terminal = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::StageEntered { stage, .. } => stages.push(stage),
                event if event.is_terminal() => terminal = Some(event),
                _ => {}
            }
        }

        assert_eq!(
            stages,
            vec![
                Stage::CacheLookup,
                Stage::Preparing,
                Stage::Attempting(RecognitionMethod::Offline),
                Stage::KnowledgeEnhancement,
            ]
        );
        assert!(matches!(
            terminal,
            Some(ProgressEvent::Completed {
                from_cache: false,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_offline_skipped_methods_are_reported() {
        let orch = orchestrator(MockClassifier::default_test().with_confidence(0.5), false);
        let mut rx = orch.subscribe_progress();

        orch.recognize(&image()).await.unwrap();

        let mut skipped = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::MethodSkipped { method, reason } = event {
                skipped.push((method, reason));
            }
        }
        assert!(skipped.contains(&(RecognitionMethod::CloudApi, SkipReason::NoNetwork)));
        assert!(skipped.contains(&(RecognitionMethod::UserAi, SkipReason::NoNetwork)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let orch = orchestrator(
            MockClassifier::default_test().with_delay(Duration::from_millis(500)),
            false,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch
            .recognize_with_cancel(&image(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SightlineError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_at_gate_is_terminal() {
        let orch = orchestrator(
            MockClassifier::default_test()
                .with_confidence(0.9)
                .with_delay(Duration::from_millis(500)),
            false,
        );
        let mut rx = orch.subscribe_progress();
        let waiting = CancellationToken::new();

        let first_image = image();
        let second_image = image();
        let (first, second, _) = tokio::join!(
            orch.recognize(&first_image),
            orch.recognize_with_cancel(&second_image, &waiting),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                waiting.cancel();
            }
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(SightlineError::Cancelled)));

        let mut failed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ProgressEvent::Failed { .. }) {
                failed += 1;
            }
        }
        assert_eq!(failed, 1);
    }
}
