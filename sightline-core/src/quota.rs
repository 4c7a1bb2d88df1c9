//! Per-source call quotas with calendar resets.
//!
//! Each source carries a daily and a monthly counter. A counter is zeroed
//! lazily, the first time the tracker is consulted after the local calendar
//! day (or month) has changed since its last reset. Every accessor applies due
//! resets before answering.
//!
//! All records live behind one lock and are persisted as a single JSON
//! snapshot. The in-memory state only changes once the snapshot was written,
//! so a storage failure never leaves memory and disk disagreeing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SightlineError};
use crate::store::{self, KeyValueStore};

/// Storage key for the persisted quota snapshot.
pub const QUOTA_RECORDS_KEY: &str = "quota.records";

/// Time source for calendar resets.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Configured call ceilings for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub daily: u32,
    pub monthly: u32,
}

impl QuotaLimits {
    pub fn new(daily: u32, monthly: u32) -> Self {
        Self { daily, monthly }
    }

    /// Read `SIGHTLINE_QUOTA_DAILY` and `SIGHTLINE_QUOTA_MONTHLY`, keeping
    /// the default for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str| std::env::var(key).ok().and_then(|v| v.trim().parse().ok());
        Self {
            daily: read("SIGHTLINE_QUOTA_DAILY").unwrap_or(defaults.daily),
            monthly: read("SIGHTLINE_QUOTA_MONTHLY").unwrap_or(defaults.monthly),
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily: 100,
            monthly: 1000,
        }
    }
}

/// Usage counters for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub source: String,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub monthly_used: u32,
    pub monthly_limit: u32,
    pub last_daily_reset: DateTime<Utc>,
    pub last_monthly_reset: DateTime<Utc>,
}

impl QuotaRecord {
    fn new(source: &str, limits: QuotaLimits, now: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            daily_used: 0,
            daily_limit: limits.daily,
            monthly_used: 0,
            monthly_limit: limits.monthly,
            last_daily_reset: now,
            last_monthly_reset: now,
        }
    }

    /// Both counters strictly below their limits.
    pub fn is_available(&self) -> bool {
        self.daily_used < self.daily_limit && self.monthly_used < self.monthly_limit
    }

    pub fn daily_remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.daily_used)
    }

    pub fn monthly_remaining(&self) -> u32 {
        self.monthly_limit.saturating_sub(self.monthly_used)
    }

    /// Zero counters whose calendar window has rolled over.
    /// Returns how many counters were reset.
    fn apply_due_resets(&mut self, now: DateTime<Utc>) -> usize {
        let today = now.with_timezone(&Local);
        let mut reset = 0;

        let last_daily = self.last_daily_reset.with_timezone(&Local);
        if (today.year(), today.ordinal()) != (last_daily.year(), last_daily.ordinal()) {
            self.daily_used = 0;
            self.last_daily_reset = now;
            reset += 1;
        }

        let last_monthly = self.last_monthly_reset.with_timezone(&Local);
        if (today.year(), today.month()) != (last_monthly.year(), last_monthly.month()) {
            self.monthly_used = 0;
            self.last_monthly_reset = now;
            reset += 1;
        }

        reset
    }
}

/// Tracks and persists call quotas for every known source.
pub struct QuotaTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    records: Mutex<BTreeMap<String, QuotaRecord>>,
}

impl QuotaTracker {
    /// Load persisted records using the wall clock.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Load persisted records using a custom clock.
    ///
    /// A snapshot that does not parse is an error; starting from empty
    /// records would hand exhausted sources fresh counters.
    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let records: BTreeMap<String, QuotaRecord> =
            store::load_json_strict(store.as_ref(), QUOTA_RECORDS_KEY)?.unwrap_or_default();
        debug!(sources = records.len(), "Loaded quota records");

        Ok(Self {
            store,
            clock,
            records: Mutex::new(records),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, QuotaRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, records: &BTreeMap<String, QuotaRecord>) -> Result<()> {
        store::save_json(self.store.as_ref(), QUOTA_RECORDS_KEY, records)?;
        Ok(())
    }

    /// Apply due resets under an already-held lock, persisting on change.
    fn reset_locked(&self, records: &mut BTreeMap<String, QuotaRecord>) -> Result<usize> {
        let now = self.clock.now();
        let mut updated = records.clone();
        let reset: usize = updated
            .values_mut()
            .map(|record| record.apply_due_resets(now))
            .sum();

        if reset > 0 {
            self.persist(&updated)?;
            *records = updated;
            debug!(counters = reset, "Applied quota resets");
        }
        Ok(reset)
    }

    /// Register a source. New sources start with zeroed counters; known
    /// sources keep their counters (clamped to the new limits) and take the
    /// new limits.
    pub fn register(&self, source: &str, limits: QuotaLimits) -> Result<()> {
        let mut records = self.lock();
        let mut updated = records.clone();

        match updated.get_mut(source) {
            Some(record) => {
                if record.daily_limit == limits.daily && record.monthly_limit == limits.monthly {
                    return Ok(());
                }
                record.daily_limit = limits.daily;
                record.monthly_limit = limits.monthly;
                record.daily_used = record.daily_used.min(limits.daily);
                record.monthly_used = record.monthly_used.min(limits.monthly);
            }
            None => {
                updated.insert(
                    source.to_string(),
                    QuotaRecord::new(source, limits, self.clock.now()),
                );
            }
        }

        self.persist(&updated)?;
        *records = updated;
        info!(source, daily = limits.daily, monthly = limits.monthly, "Registered quota source");
        Ok(())
    }

    /// Zero every counter whose calendar window has rolled over.
    /// Returns the number of counters reset; zero means nothing was written.
    pub fn apply_due_resets(&self) -> Result<usize> {
        let mut records = self.lock();
        self.reset_locked(&mut records)
    }

    /// Whether `source` has calls left today and this month.
    /// Unknown sources are unavailable.
    pub fn is_available(&self, source: &str) -> Result<bool> {
        let mut records = self.lock();
        self.reset_locked(&mut records)?;
        Ok(records.get(source).is_some_and(QuotaRecord::is_available))
    }

    /// Whether any of `sources` is available.
    pub fn any_available<S: AsRef<str>>(&self, sources: &[S]) -> Result<bool> {
        let mut records = self.lock();
        self.reset_locked(&mut records)?;
        Ok(sources
            .iter()
            .filter_map(|s| records.get(s.as_ref()))
            .any(QuotaRecord::is_available))
    }

    /// Count one successful call against both counters.
    ///
    /// Callers check availability first. A call at the ceiling is not
    /// rejected; the counters saturate at their limits.
    pub fn record_use(&self, source: &str) -> Result<()> {
        let mut records = self.lock();
        self.reset_locked(&mut records)?;

        let mut updated = records.clone();
        let record = updated
            .get_mut(source)
            .ok_or_else(|| SightlineError::Config(format!("Unknown quota source: {source}")))?;

        if !record.is_available() {
            warn!(source, "Quota use recorded at ceiling");
        }
        record.daily_used = (record.daily_used + 1).min(record.daily_limit);
        record.monthly_used = (record.monthly_used + 1).min(record.monthly_limit);
        let (daily_used, monthly_used) = (record.daily_used, record.monthly_used);

        self.persist(&updated)?;
        *records = updated;
        debug!(source, daily_used, monthly_used, "Recorded quota use");
        Ok(())
    }

    /// Snapshot of one source's counters.
    pub fn status_of(&self, source: &str) -> Result<Option<QuotaRecord>> {
        let mut records = self.lock();
        self.reset_locked(&mut records)?;
        Ok(records.get(source).cloned())
    }

    /// Snapshot of every source, sorted by name.
    pub fn status_of_all(&self) -> Result<Vec<QuotaRecord>> {
        let mut records = self.lock();
        self.reset_locked(&mut records)?;
        Ok(records.values().cloned().collect())
    }
}
