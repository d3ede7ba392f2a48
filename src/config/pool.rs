//! Pool, scheduler, planner and calculator configuration structures.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::scheduler::TaskKind;
use crate::core::AppResult;

/// Prefix of the environment variables read by
/// [`DispatchConfig::apply_env_overrides`].
pub const ENV_PREFIX: &str = "DISPATCH_";

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Share of total worker capacity the pool may consume, in (0, 1].
    pub usage_fraction: f64,
    /// Capacity units held back on the controller's own host.
    pub host_reservation: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            usage_fraction: 1.0,
            host_reservation: 32.0,
        }
    }
}

impl PoolConfig {
    /// Pool with the given fraction and the default reservation.
    #[must_use]
    pub fn with_fraction(usage_fraction: f64) -> Self {
        Self {
            usage_fraction,
            ..Self::default()
        }
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.usage_fraction.is_nan() || self.usage_fraction <= 0.0 || self.usage_fraction > 1.0 {
            return Err(format!(
                "usage_fraction must be in (0, 1], got {}",
                self.usage_fraction
            ));
        }
        if self.host_reservation.is_nan() || self.host_reservation < 0.0 {
            return Err("host_reservation must not be negative".into());
        }
        Ok(())
    }
}

/// Dispatch loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Longest single sleep of the loop.
    pub cap_wait_ms: u64,
    /// Sleeps longer than this put idle capacity to use first.
    pub share_threshold_ms: u64,
    /// Delay before re-running a job that found no work.
    pub default_backoff_ms: u64,
    /// Same-name jobs due closer together than this are coalesced.
    pub coalesce_window_ms: u64,
    /// Whether the queue report job is seeded.
    pub report_interval_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cap_wait_ms: 11_000,
            share_threshold_ms: 10_000,
            default_backoff_ms: 60_000,
            coalesce_window_ms: 10_000,
            report_interval_enabled: true,
        }
    }
}

/// Batch planner tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Spacing between landings of consecutive phases.
    pub increment_ms: u64,
    /// Cycles issued per planning pass at most.
    pub max_iterations: u32,
    /// Extraction needs yield above this share of its maximum.
    pub steady_yield_ratio: f64,
    /// Extraction needs defense below this multiple of its minimum.
    pub steady_defense_ratio: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            increment_ms: 50,
            max_iterations: 100,
            steady_yield_ratio: 0.95,
            steady_defense_ratio: 1.1,
        }
    }
}

/// Ranking and sizing tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Share of current yield one extraction pass takes.
    pub extraction_fraction: f64,
    /// Targets within this factor of max yield are not replenished.
    pub replenish_headroom: f64,
    /// Extraction needs yield at or above this share of its maximum.
    pub extraction_min_yield_ratio: f64,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            extraction_fraction: 0.4,
            replenish_headroom: 1.1,
            extraction_min_yield_ratio: 0.9,
        }
    }
}

/// A recurring job seeded into the scheduler at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name; instances of the same job are coalesced by it.
    pub name: String,
    /// What the job runs.
    #[serde(flatten)]
    pub kind: TaskKind,
}

impl JobConfig {
    /// Job `name` running `kind`.
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    fn pool(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Extraction { pool }
            | TaskKind::Replenishment { pool, .. }
            | TaskKind::Mitigation { pool }
            | TaskKind::Batch { pool, .. } => Some(pool),
            TaskKind::Maintenance { .. } | TaskKind::QueueReport => None,
        }
    }
}

/// Root dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, PoolConfig>,
    /// Loop timing.
    pub scheduler: SchedulerConfig,
    /// Batch planner tuning.
    pub planner: PlannerConfig,
    /// Ranking tuning.
    pub calculator: CalculatorConfig,
    /// Jobs seeded at start, in order. The queue report job is added on top
    /// when [`SchedulerConfig::report_interval_enabled`] is set.
    pub jobs: Vec<JobConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let pools = HashMap::from([
            ("shard_extract".to_string(), PoolConfig::with_fraction(0.8)),
            ("shard_mitigate".to_string(), PoolConfig::with_fraction(0.1)),
        ]);
        Self {
            pools,
            scheduler: SchedulerConfig::default(),
            planner: PlannerConfig::default(),
            calculator: CalculatorConfig::default(),
            jobs: vec![
                JobConfig::new(
                    "mitigate",
                    TaskKind::Mitigation {
                        pool: "shard_mitigate".into(),
                    },
                ),
                JobConfig::new(
                    "extract",
                    TaskKind::Extraction {
                        pool: "shard_extract".into(),
                    },
                ),
            ],
        }
    }
}

impl DispatchConfig {
    /// Validate every section, and that the pools' fractions do not
    /// overlap.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        let total: f64 = self.pools.values().map(|p| p.usage_fraction).sum();
        if total > 1.0 + 1e-9 {
            return Err(format!("pool usage fractions sum to {total}, above 1"));
        }

        if self.scheduler.cap_wait_ms == 0 {
            return Err("cap_wait_ms must be greater than 0".into());
        }
        if self.scheduler.coalesce_window_ms == 0 {
            return Err("coalesce_window_ms must be greater than 0".into());
        }
        if self.planner.increment_ms == 0 {
            return Err("increment_ms must be greater than 0".into());
        }
        if self.planner.max_iterations == 0 {
            return Err("max_iterations must be greater than 0".into());
        }
        for job in &self.jobs {
            if let Some(pool) = job.pool() {
                if !self.pools.contains_key(pool) {
                    return Err(format!("job `{}` references unknown pool `{pool}`", job.name));
                }
            }
        }

        let fraction = self.calculator.extraction_fraction;
        if fraction.is_nan() || fraction <= 0.0 || fraction >= 1.0 {
            return Err(format!("extraction_fraction must be in (0, 1), got {fraction}"));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or holds invalid configuration.
    pub fn load_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading config file {}", path.display()))
    }

    /// Override timing constants from `DISPATCH_*` environment variables,
    /// loading a `.env` file first when one exists, then re-validate.
    ///
    /// # Errors
    ///
    /// Returns a description of a malformed variable or of the resulting
    /// invalid configuration.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// [`apply_env_overrides`](Self::apply_env_overrides) over an arbitrary
    /// variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`apply_env_overrides`](Self::apply_env_overrides).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| -> Result<Option<u64>, String> {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|e| format!("{name}={raw}: {e}"))
                })
                .transpose()
        };

        if let Some(v) = read("CAP_WAIT_MS")? {
            self.scheduler.cap_wait_ms = v;
        }
        if let Some(v) = read("SHARE_THRESHOLD_MS")? {
            self.scheduler.share_threshold_ms = v;
        }
        if let Some(v) = read("DEFAULT_BACKOFF_MS")? {
            self.scheduler.default_backoff_ms = v;
        }
        if let Some(v) = read("COALESCE_WINDOW_MS")? {
            self.scheduler.coalesce_window_ms = v;
        }
        if let Some(v) = read("INCREMENT_MS")? {
            self.planner.increment_ms = v;
        }
        if let Some(v) = read("MAX_ITERATIONS")? {
            self.planner.max_iterations =
                u32::try_from(v).map_err(|e| format!("{ENV_PREFIX}MAX_ITERATIONS: {e}"))?;
        }
        self.validate()
    }
}
