//! Configuration for the origami pipeline.

use crate::work::PATTERNS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Topology and queue sizing
    #[serde(default)]
    pub production: ProductionConfig,

    /// Simulated work timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Progress reporting
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Pipeline topology and queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Number of pieces to cut; the run ends once this many are retired
    #[serde(default = "default_total_pieces")]
    pub total_pieces: u64,

    /// Capacity of the paper table (cutter → folders)
    #[serde(default = "default_paper_table_capacity")]
    pub paper_table_capacity: usize,

    /// Capacity of the finished table (folders → stocker)
    #[serde(default = "default_finished_table_capacity")]
    pub finished_table_capacity: usize,

    /// Number of folder threads sharing the two tables
    #[serde(default = "default_folder_count")]
    pub folder_count: usize,

    /// How often the orchestrator checks the retired counter
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            total_pieces: default_total_pieces(),
            paper_table_capacity: default_paper_table_capacity(),
            finished_table_capacity: default_finished_table_capacity(),
            folder_count: default_folder_count(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ProductionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Number of pieces folder `index` (0-based) is responsible for.
    ///
    /// Shares add up to `total_pieces`; the first `total % folders` folders
    /// take one extra piece.
    pub fn folder_share(&self, index: usize) -> u64 {
        let folders = self.folder_count.max(1) as u64;
        let base = self.total_pieces / folders;
        let extra = self.total_pieces % folders;
        if (index as u64) < extra {
            base + 1
        } else {
            base
        }
    }
}

/// Timing of the simulated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Multiplier applied to every simulated delay (0 disables sleeping)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Seconds the stocker spends putting one piece away
    #[serde(default = "default_stock_secs")]
    pub stock_secs: u64,

    /// Seed for pattern selection; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            stock_secs: default_stock_secs(),
            seed: None,
        }
    }
}

impl TimingConfig {
    /// Scale a nominal duration by `time_scale`.
    ///
    /// # Panics
    ///
    /// Panics if the scaled duration overflows `Duration`; [`Config::validate`]
    /// rejects scales where that can happen.
    pub fn scaled(&self, nominal: Duration) -> Duration {
        if self.time_scale <= 0.0 {
            return Duration::ZERO;
        }
        nominal.mul_f64(self.time_scale)
    }

    /// Scaled stocker handling time.
    pub fn stock_time(&self) -> Duration {
        self.scaled(Duration::from_secs(self.stock_secs))
    }

    /// Longest delay any stage will sleep for, or `None` if it does not fit
    /// in a `Duration`.
    pub fn longest_delay(&self) -> Option<Duration> {
        let longest_fold = PATTERNS.iter().map(|p| p.fold_secs).max().unwrap_or(0);
        let nominal = longest_fold.max(self.stock_secs) as f64;
        Duration::try_from_secs_f64(nominal * self.time_scale.max(0.0)).ok()
    }
}

/// Progress reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable periodic progress reports and the final summary
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Progress reporting interval in seconds
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Optional path to save metrics JSON after the run completes
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_secs: default_report_interval(),
            output_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let production = &self.production;
        if production.total_pieces == 0 {
            anyhow::bail!("total_pieces must be >= 1");
        }
        if production.paper_table_capacity == 0 {
            anyhow::bail!("paper_table_capacity must be > 0");
        }
        if production.finished_table_capacity == 0 {
            anyhow::bail!("finished_table_capacity must be > 0");
        }
        if production.folder_count == 0 {
            anyhow::bail!("folder_count must be >= 1");
        }
        if production.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be > 0");
        }
        if !self.timing.time_scale.is_finite() || self.timing.time_scale < 0.0 {
            anyhow::bail!("time_scale must be a finite, non-negative number");
        }
        if self.timing.longest_delay().is_none() {
            anyhow::bail!(
                "time_scale {} makes simulated work too long to represent",
                self.timing.time_scale
            );
        }
        if self.metrics.enabled && self.metrics.report_interval_secs == 0 {
            anyhow::bail!("report_interval_secs must be > 0 when metrics are enabled");
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_total_pieces() -> u64 { 16 }
fn default_paper_table_capacity() -> usize { 2 }
fn default_finished_table_capacity() -> usize { 4 }
fn default_folder_count() -> usize { 2 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_time_scale() -> f64 { 1.0 }
fn default_stock_secs() -> u64 { 6 }
fn default_true() -> bool { true }
fn default_report_interval() -> u64 { 10 }
