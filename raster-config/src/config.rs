//! The scheduler's runtime configuration, loaded from TOML with environment
//! variable overrides. Fields carry defaults so a deployment can adopt a
//! partial config file and let everything else fall back, the way
//! `OrchestratorConfig` does in its home crate.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Global knobs tuning the scheduler loop, its worker pools and its cache
/// I/O path.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub loop_tuning: LoopTuning,
    #[serde(default)]
    pub pools: PoolCapacities,
    #[serde(default)]
    pub priority_weights: PriorityWeights,
    #[serde(default)]
    pub cache_io: CacheIoConfig,
}

/// Timing for the scheduler's own idle loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LoopTuning {
    /// Sleep duration when a tick drains no pile, no external message and no
    /// keep-alive work. Matches the Python original's `1/20` second sleep.
    pub idle_sleep_ms: u64,
}

impl Default for LoopTuning {
    fn default() -> Self {
        Self { idle_sleep_ms: 50 }
    }
}

impl LoopTuning {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

/// Per-worker-pool-kind task capacity. Keyed by pool name (`"compute"`,
/// `"resample"`, `"cache_extract"`, `"read"` by default) so a deployment can
/// add or rename pools without a schema change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolCapacities {
    #[serde(flatten)]
    pub by_name: HashMap<String, usize>,
}

impl Default for PoolCapacities {
    fn default() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("compute".to_string(), 4);
        by_name.insert("resample".to_string(), 4);
        by_name.insert("cache_extract".to_string(), 4);
        by_name.insert("read".to_string(), 8);
        Self { by_name }
    }
}

impl PoolCapacities {
    pub fn capacity_of(&self, pool_name: &str) -> usize {
        self.by_name.get(pool_name).copied().unwrap_or(1)
    }
}

/// Weights used purely as tie-breaking inputs to the priority key
/// `GlobalPrioritiesWatcher` computes. This is not a fairness ring: a higher
/// weight never lets a query jump ahead of a strictly more urgent one, it
/// only orders queries that are otherwise equally urgent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub urgency: u32,
    pub age: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgency: 10,
            age: 1,
        }
    }
}

/// Tuning for the on-disk cache store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CacheIoConfig {
    /// Concurrent fsync-and-rename commits allowed at once.
    pub max_concurrent_writes: usize,
}

impl Default for CacheIoConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: 4,
        }
    }
}

impl SchedulerConfig {
    /// Parses a config from a TOML string, with missing sections/fields
    /// falling back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })
    }

    /// Reads and parses a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Applies environment variable overrides on top of an already-loaded
    /// config. Supported overrides: `RASTER_SCHEDULER_IDLE_SLEEP_MS`,
    /// `RASTER_SCHEDULER_CACHE_MAX_CONCURRENT_WRITES`.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(raw) = env::var("RASTER_SCHEDULER_IDLE_SLEEP_MS") {
            self.loop_tuning.idle_sleep_ms = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "RASTER_SCHEDULER_IDLE_SLEEP_MS must be an integer, got {raw:?}"
                ))
            })?;
        }
        if let Ok(raw) = env::var("RASTER_SCHEDULER_CACHE_MAX_CONCURRENT_WRITES") {
            self.cache_io.max_concurrent_writes = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "RASTER_SCHEDULER_CACHE_MAX_CONCURRENT_WRITES must be an integer, got {raw:?}"
                ))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.loop_tuning.idle_sleep_ms == 0 {
            return Err(ConfigError::Invalid(
                "loop_tuning.idle_sleep_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache_io.max_concurrent_writes == 0 {
            return Err(ConfigError::Invalid(
                "cache_io.max_concurrent_writes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SchedulerConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = SchedulerConfig::from_toml_str(
            r#"
            [loop_tuning]
            idle_sleep_ms = 25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.loop_tuning.idle_sleep_ms, 25);
        assert_eq!(cfg.pools.capacity_of("compute"), 4);
    }

    #[test]
    fn rejects_zero_idle_sleep() {
        let cfg = SchedulerConfig::from_toml_str(
            r#"
            [loop_tuning]
            idle_sleep_ms = 0
            "#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }
}
