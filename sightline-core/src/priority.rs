//! User-ordered recognition method priorities.
//!
//! The configuration is read-mostly: readers take a consistent snapshot,
//! writers validate, persist, and then swap the whole snapshot at once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, SightlineError};
use crate::outcome::RecognitionMethod;
use crate::store::{self, KeyValueStore};

/// Storage key for the persisted priority configuration.
pub const PRIORITY_CONFIG_KEY: &str = "priority.config";

/// One method's position and enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub method: RecognitionMethod,
    pub enabled: bool,
    pub priority: u32,
}

impl MethodConfig {
    pub fn new(method: RecognitionMethod, enabled: bool, priority: u32) -> Self {
        Self {
            method,
            enabled,
            priority,
        }
    }
}

/// Full ordered, enable-aware method list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    pub methods: Vec<MethodConfig>,
}

impl Default for PriorityConfig {
    /// Offline → CloudApi → UserAi, all enabled.
    fn default() -> Self {
        Self {
            methods: RecognitionMethod::ALL
                .iter()
                .enumerate()
                .map(|(i, method)| MethodConfig::new(*method, true, i as u32))
                .collect(),
        }
    }
}

impl PriorityConfig {
    pub fn new(methods: Vec<MethodConfig>) -> Self {
        Self { methods }
    }

    /// Build a config from an explicit order; methods not listed are
    /// appended disabled.
    pub fn from_order(order: &[RecognitionMethod]) -> Self {
        let mut methods: Vec<MethodConfig> = Vec::with_capacity(RecognitionMethod::ALL.len());
        for method in order {
            if methods.iter().all(|m| m.method != *method) {
                methods.push(MethodConfig::new(*method, true, methods.len() as u32));
            }
        }
        for method in RecognitionMethod::ALL {
            if methods.iter().all(|m| m.method != method) {
                methods.push(MethodConfig::new(method, false, methods.len() as u32));
            }
        }
        Self { methods }
    }

    /// Check the config has exactly one entry per method and at least one
    /// enabled entry.
    pub fn validate(&self) -> Result<()> {
        for method in RecognitionMethod::ALL {
            let count = self.methods.iter().filter(|m| m.method == method).count();
            if count != 1 {
                return Err(SightlineError::Config(format!(
                    "expected exactly one entry for {method}, found {count}"
                )));
            }
        }
        if self.methods.len() != RecognitionMethod::ALL.len() {
            return Err(SightlineError::Config(format!(
                "expected {} entries, found {}",
                RecognitionMethod::ALL.len(),
                self.methods.len()
            )));
        }
        if !self.methods.iter().any(|m| m.enabled) {
            return Err(SightlineError::Config(
                "at least one recognition method must be enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Enabled methods sorted by ascending priority; ties keep list order.
    pub fn enabled_in_order(&self) -> Vec<RecognitionMethod> {
        let mut enabled: Vec<&MethodConfig> = self.methods.iter().filter(|m| m.enabled).collect();
        enabled.sort_by_key(|m| m.priority);
        enabled.into_iter().map(|m| m.method).collect()
    }

    pub fn is_enabled(&self, method: RecognitionMethod) -> bool {
        self.methods.iter().any(|m| m.method == method && m.enabled)
    }
}

/// Holds and persists the active [`PriorityConfig`].
pub struct PriorityManager {
    store: Arc<dyn KeyValueStore>,
    current: watch::Sender<Arc<PriorityConfig>>,
}

impl PriorityManager {
    /// Load the persisted configuration.
    ///
    /// Storage failures propagate. An absent, malformed or invalid stored
    /// configuration resolves to the default ordering.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let config = Self::read_config(store.as_ref())?;
        let (current, _) = watch::channel(Arc::new(config));
        Ok(Self { store, current })
    }

    fn read_config(store: &dyn KeyValueStore) -> Result<PriorityConfig> {
        let Some(config) = store::load_json::<PriorityConfig>(store, PRIORITY_CONFIG_KEY)? else {
            debug!("No stored priority config, using default");
            return Ok(PriorityConfig::default());
        };

        match config.validate() {
            Ok(()) => Ok(config),
            Err(e) => {
                warn!(error = %e, "Stored priority config is invalid, using default");
                Ok(PriorityConfig::default())
            }
        }
    }

    /// Current configuration snapshot.
    pub fn resolve(&self) -> PriorityConfig {
        self.current.borrow().as_ref().clone()
    }

    /// Enabled methods in ascending priority order.
    pub fn enabled_in_order(&self) -> Vec<RecognitionMethod> {
        self.current.borrow().enabled_in_order()
    }

    /// Validate, persist and publish a new configuration.
    pub fn save(&self, config: PriorityConfig) -> Result<()> {
        config.validate()?;
        store::save_json(self.store.as_ref(), PRIORITY_CONFIG_KEY, &config)?;

        info!(order = ?config.enabled_in_order(), "Priority config saved");
        self.current.send_replace(Arc::new(config));
        Ok(())
    }

    pub fn reset_to_default(&self) -> Result<()> {
        self.save(PriorityConfig::default())
    }

    /// Re-read the persisted configuration and publish it.
    pub fn reload(&self) -> Result<PriorityConfig> {
        let config = Self::read_config(self.store.as_ref())?;
        self.current.send_replace(Arc::new(config.clone()));
        Ok(config)
    }

    /// Observe configuration changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PriorityConfig>> {
        self.current.subscribe()
    }
}
