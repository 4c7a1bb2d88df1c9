//! Fingerprint-keyed result cache.
//!
//! Bounded, least-recently-used, in memory only. Lookups try the exact
//! fingerprint first and then fall back to the most recently used entry
//! within the similarity threshold.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::Serialize;
use tracing::debug;

use crate::fingerprint::{compute_fingerprint, Fingerprint, DEFAULT_SIMILARITY_THRESHOLD};
use crate::outcome::RecognitionOutcome;

/// Default number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Confidence multiplier applied to near-duplicate hits.
pub const FUZZY_MATCH_CONFIDENCE_FACTOR: f64 = 0.95;

/// A previously produced outcome, as returned by a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub fingerprint: Fingerprint,
    pub outcome: RecognitionOutcome,
    pub created_at: DateTime<Utc>,
    /// `true` when the lookup fingerprint matched exactly
    pub exact: bool,
}

impl CachedResult {
    /// Outcome ready for use: unchanged on an exact hit, confidence
    /// discounted by [`FUZZY_MATCH_CONFIDENCE_FACTOR`] on a near-duplicate hit.
    pub fn into_outcome(self) -> RecognitionOutcome {
        let mut outcome = self.outcome;
        if !self.exact {
            outcome.confidence *= FUZZY_MATCH_CONFIDENCE_FACTOR;
        }
        outcome
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub exact_hits: u64,
    pub fuzzy_hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, exact or fuzzy.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.exact_hits + self.fuzzy_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<Fingerprint, CachedResult>,
    /// Most recently used at the front.
    recency: VecDeque<Fingerprint>,
    stats: CacheStats,
}

impl CacheInner {
    fn touch(&mut self, fingerprint: &Fingerprint) {
        if let Some(pos) = self.recency.iter().position(|f| f == fingerprint) {
            self.recency.remove(pos);
        }
        self.recency.push_front(*fingerprint);
    }
}

/// Bounded LRU cache of recognition outcomes keyed by perceptual fingerprint.
pub struct ResultCache {
    capacity: usize,
    threshold: u32,
    inner: Mutex<CacheInner>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results (minimum 1), matching
    /// near-duplicates within `threshold` bits.
    pub fn new(capacity: usize, threshold: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            threshold,
            inner: Mutex::new(CacheInner {
                stats: CacheStats {
                    capacity,
                    ..CacheStats::default()
                },
                ..CacheInner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn similarity_threshold(&self) -> u32 {
        self.threshold
    }

    /// Look up a prior result for an image.
    pub fn lookup(&self, image: &DynamicImage) -> Option<CachedResult> {
        self.lookup_fingerprint(&compute_fingerprint(image))
    }

    /// Look up a prior result by fingerprint.
    pub fn lookup_fingerprint(&self, fingerprint: &Fingerprint) -> Option<CachedResult> {
        let mut inner = self.lock();

        if let Some(hit) = inner.entries.get(fingerprint).cloned() {
            inner.touch(fingerprint);
            inner.stats.exact_hits += 1;
            debug!(%fingerprint, "Exact cache hit");
            return Some(CachedResult { exact: true, ..hit });
        }

        let threshold = self.threshold;
        let near = inner
            .recency
            .iter()
            .find(|candidate| candidate.is_similar(fingerprint, Some(threshold)))
            .copied();

        match near.and_then(|key| inner.entries.get(&key).cloned()) {
            Some(hit) => {
                inner.touch(&hit.fingerprint);
                inner.stats.fuzzy_hits += 1;
                debug!(
                    %fingerprint,
                    matched = %hit.fingerprint,
                    distance = hit.fingerprint.distance(fingerprint),
                    "Fuzzy cache hit"
                );
                Some(CachedResult { exact: false, ..hit })
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Store an outcome for an image.
    pub fn store(&self, image: &DynamicImage, outcome: RecognitionOutcome) {
        self.store_fingerprint(compute_fingerprint(image), outcome);
    }

    /// Store an outcome under a fingerprint, replacing any exact match and
    /// evicting the least recently used entry when full.
    pub fn store_fingerprint(&self, fingerprint: Fingerprint, outcome: RecognitionOutcome) {
        let mut inner = self.lock();

        let entry = CachedResult {
            fingerprint,
            outcome,
            created_at: Utc::now(),
            exact: true,
        };
        if inner.entries.insert(fingerprint, entry).is_none() {
            while inner.entries.len() > self.capacity {
                let Some(oldest) = inner.recency.pop_back() else {
                    break;
                };
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
                debug!(fingerprint = %oldest, "Evicted cache entry");
            }
        }
        inner.touch(&fingerprint);
    }

    /// Drop every cached result. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
        debug!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}
