//! Configuration management for CLI, environment variables, and config files.

use crate::error::{FairnessError, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for atomic-fairness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shape of the experiment matrix and its sampling windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Arena rows to sweep, clamped to `COUNT_SWEEP_MAX`
    pub count: usize,
    /// Windows per phase, including the discarded first one
    pub samples: usize,
    pub interval_ms: u64,
}

/// How workers are placed and how they issue increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub batch_size: u32,
    pub batches_per_report: u32,
    /// Bucket spacing: worker `u` uses counter `trunc(u * spacer) mod NUM_COUNTERS`
    pub spacer: f64,
    /// Bit `n` set delays the worker on CPU `n` before each mode
    pub delay_mask: u64,
    pub delay_ms: u64,
    pub pin_threads: bool,
    /// Use at most this many of the allowed CPUs
    pub max_threads: Option<usize>,
}

/// What gets printed after the sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub verbosity: u8,
    pub plot_dir: Option<PathBuf>,
}

/// Configuration for logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            count: 1,
            samples: 6,
            interval_ms: 500,
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batches_per_report: 1,
            spacer: 0.0,
            delay_mask: 0,
            delay_ms: 1000,
            pin_threads: true,
            max_threads: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Parse an integer the way `strtoul(s, 0, 0)` does: `0x` hex, leading `0`
/// octal, decimal otherwise.
pub fn parse_mask(s: &str) -> Result<u64, FairnessError> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse()
    };
    parsed.map_err(|_| FairnessError::InvalidArgument(format!("invalid mask '{}'", s)))
}

fn parse_env<T: std::str::FromStr>(name: &str, val: &str) -> Result<T, FairnessError> {
    val.parse()
        .map_err(|_| FairnessError::InvalidArgument(format!("{} has invalid format", name)))
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, FairnessError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FairnessError::Io(format!("{}: {}", path.display(), e)))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(toml::from_str(&content)?),
        }
    }

    pub fn from_default_locations() -> Result<Self, FairnessError> {
        let config_paths = [
            dirs::config_dir().map(|d| d.join("atomic-fairness/config.toml")),
            Some(PathBuf::from("/etc/atomic-fairness/config.toml")),
            Some(PathBuf::from("./atomic-fairness.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    pub fn merge_from_env(mut self) -> Result<Self, FairnessError> {
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_SWEEP_COUNT") {
            self.sweep.count = parse_env("ATOMIC_FAIRNESS_SWEEP_COUNT", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_SAMPLES") {
            self.sweep.samples = parse_env("ATOMIC_FAIRNESS_SAMPLES", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_INTERVAL_MS") {
            self.sweep.interval_ms = parse_env("ATOMIC_FAIRNESS_INTERVAL_MS", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_BATCH_SIZE") {
            self.worker.batch_size = parse_env("ATOMIC_FAIRNESS_BATCH_SIZE", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_BATCHES_PER_REPORT") {
            self.worker.batches_per_report =
                parse_env("ATOMIC_FAIRNESS_BATCHES_PER_REPORT", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_SPACER") {
            self.worker.spacer = parse_env("ATOMIC_FAIRNESS_SPACER", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_DELAY_MASK") {
            self.worker.delay_mask = parse_mask(&val).map_err(|_| {
                FairnessError::InvalidArgument(
                    "ATOMIC_FAIRNESS_DELAY_MASK has invalid format".into(),
                )
            })?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_DELAY_MS") {
            self.worker.delay_ms = parse_env("ATOMIC_FAIRNESS_DELAY_MS", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_PIN_THREADS") {
            self.worker.pin_threads = parse_env("ATOMIC_FAIRNESS_PIN_THREADS", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_MAX_THREADS") {
            self.worker.max_threads = Some(parse_env("ATOMIC_FAIRNESS_MAX_THREADS", &val)?);
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_VERBOSITY") {
            self.output.verbosity = parse_env("ATOMIC_FAIRNESS_VERBOSITY", &val)?;
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_PLOT_DIR") {
            self.output.plot_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("ATOMIC_FAIRNESS_LOG_LEVEL") {
            self.logging.level = val;
        }

        Ok(self)
    }

    pub fn merge_from_cli(mut self, cli: &CliArgs) -> Self {
        if let Some(count) = cli.sweep_count {
            self.sweep.count = count;
        }
        if let Some(samples) = cli.samples {
            self.sweep.samples = samples;
        }
        if let Some(interval_ms) = cli.interval_ms {
            self.sweep.interval_ms = interval_ms;
        }
        if let Some(batch_size) = cli.batch_size {
            self.worker.batch_size = batch_size;
        }
        if let Some(batches) = cli.batches_per_report {
            self.worker.batches_per_report = batches;
        }
        if let Some(spacer) = cli.spacer {
            self.worker.spacer = spacer;
        }
        if let Some(mask) = cli.delay_mask {
            self.worker.delay_mask = mask;
        }
        if let Some(delay_ms) = cli.delay_ms {
            self.worker.delay_ms = delay_ms;
        }
        if cli.no_pin {
            self.worker.pin_threads = false;
        }
        if let Some(threads) = cli.max_threads {
            self.worker.max_threads = Some(threads);
        }
        if let Some(verbosity) = cli.verbosity {
            self.output.verbosity = verbosity;
        }
        if let Some(ref dir) = cli.plot_dir {
            self.output.plot_dir = Some(dir.clone());
        }
        if let Some(ref level) = cli.log_level {
            self.logging.level = level.clone();
        }

        self
    }

    pub fn load_with_cli(cli: &CliArgs) -> Result<Self, FairnessError> {
        let base = match cli.config_file {
            Some(ref path) => Self::from_file(path)?,
            None => Self::from_default_locations()?,
        };
        Ok(base.merge_from_env()?.merge_from_cli(cli))
    }

    pub fn validate(&self) -> Result<(), FairnessError> {
        let mut issues = Vec::new();
        let mut issue = |field: &str, message: String| {
            issues.push(ValidationIssue {
                field: field.to_string(),
                message,
            })
        };

        if self.sweep.count == 0 {
            issue("sweep.count", "must be at least 1".to_string());
        }
        if self.sweep.samples < 2 {
            issue(
                "sweep.samples",
                "must be at least 2, the first window of every phase is discarded".to_string(),
            );
        }
        if self.sweep.interval_ms == 0 {
            issue("sweep.interval_ms", "must be greater than 0".to_string());
        }
        if self.worker.batch_size == 0 {
            issue("worker.batch_size", "must be greater than 0".to_string());
        }
        if self.worker.batches_per_report == 0 {
            issue(
                "worker.batches_per_report",
                "must be greater than 0".to_string(),
            );
        }
        if !self.worker.spacer.is_finite() {
            issue(
                "worker.spacer",
                format!("must be a finite number, got {}", self.worker.spacer),
            );
        }
        if self.worker.max_threads == Some(0) {
            issue("worker.max_threads", "must be at least 1".to_string());
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            issue(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Valid levels: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            );
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(FairnessError::ValidationError(issues))
        }
    }
}

/// Command-line arguments that override configuration values.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_file: Option<PathBuf>,
    pub sweep_count: Option<usize>,
    pub samples: Option<usize>,
    pub interval_ms: Option<u64>,
    pub batch_size: Option<u32>,
    pub batches_per_report: Option<u32>,
    pub spacer: Option<f64>,
    pub delay_mask: Option<u64>,
    pub delay_ms: Option<u64>,
    pub no_pin: bool,
    pub max_threads: Option<usize>,
    pub verbosity: Option<u8>,
    pub plot_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}
