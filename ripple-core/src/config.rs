//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime state: the
//! reactive context, the job queue and the current component instance all
//! live in thread-locals. Install a configuration once on the thread that
//! drives rendering.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::Result;

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How many consecutive batches a single `flush_jobs` call may drain.
    ///
    /// Jobs queued while a batch runs start a new batch. A job that keeps
    /// re-queueing work would otherwise flush forever.
    pub max_flush_batches: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_flush_batches: 100,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Emit usage diagnostics through `tracing::warn!`.
    pub warnings: bool,

    /// Job scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            warnings: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Make this the active configuration for the current thread.
    pub fn install(self) {
        CONFIG.with(|config| *config.borrow_mut() = self);
    }
}

/// The configuration active on the current thread.
pub fn current() -> RuntimeConfig {
    CONFIG.with(|config| config.borrow().clone())
}

pub(crate) fn warnings_enabled() -> bool {
    CONFIG.with(|config| config.borrow().warnings)
}

/// Log a usage diagnostic unless warnings are muted.
macro_rules! diagnostic {
    ($($arg:tt)+) => {
        if $crate::config::warnings_enabled() {
            ::tracing::warn!($($arg)+);
        }
    };
}

pub(crate) use diagnostic;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = RuntimeConfig::from_json(r#"{"warnings": false}"#).unwrap();
        assert!(!config.warnings);
        assert_eq!(config.scheduler.max_flush_batches, 100);
    }

    #[test]
    fn nested_scheduler_settings_parse() {
        let config =
            RuntimeConfig::from_json(r#"{"scheduler": {"max_flush_batches": 3}}"#).unwrap();
        assert!(config.warnings);
        assert_eq!(config.scheduler.max_flush_batches, 3);
    }

    #[test]
    fn install_is_thread_local() {
        RuntimeConfig {
            warnings: false,
            ..Default::default()
        }
        .install();
        assert!(!current().warnings);

        let other = std::thread::spawn(|| current().warnings).join().unwrap();
        assert!(other);

        RuntimeConfig::default().install();
    }
}
