//! Configuration management for the detection engine.
//!
//! Supports loading from environment variables and TOML config files, with
//! CLI arguments applied on top by the binary.

use crate::rapid_movement::{DEFAULT_SIMILARITY_RATIO, DEFAULT_WINDOW_MINUTES};
use crate::smurfing::{DEFAULT_MIN_TRANSACTIONS, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detector parameters
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Input and output paths
    #[serde(default)]
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub smurfing: SmurfingConfig,

    #[serde(default)]
    pub rapid_movement: RapidMovementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmurfingConfig {
    /// Exclusive upper bound on a "small" inbound payment
    #[serde(default = "default_smurfing_threshold")]
    pub threshold: f64,

    /// Small payments needed before an account is flagged
    #[serde(default = "default_min_transactions")]
    pub min_transactions: usize,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            threshold: default_smurfing_threshold(),
            min_transactions: default_min_transactions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RapidMovementConfig {
    /// Maximum minutes between receiving and forwarding funds
    #[serde(default = "default_window_minutes")]
    pub window_minutes: f64,

    /// Minimum outbound/inbound value ratio
    #[serde(default = "default_similarity_ratio")]
    pub similarity_ratio: f64,
}

impl Default for RapidMovementConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            similarity_ratio: default_similarity_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_accounts_path")]
    pub accounts: PathBuf,

    #[serde(default = "default_transactions_path")]
    pub transactions: PathBuf,

    #[serde(default = "default_findings_dir")]
    pub findings_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            accounts: default_accounts_path(),
            transactions: default_transactions_path(),
            findings_dir: default_findings_dir(),
        }
    }
}

impl PathConfig {
    /// Re-root every path under `data_dir`
    pub fn rooted_at(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            accounts: data_dir.join("accounts.csv"),
            transactions: data_dir.join("transactions.csv"),
            findings_dir: data_dir.join("findings"),
        }
    }
}

// Default value functions
fn default_smurfing_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_min_transactions() -> usize {
    DEFAULT_MIN_TRANSACTIONS
}

fn default_window_minutes() -> f64 {
    DEFAULT_WINDOW_MINUTES
}

fn default_similarity_ratio() -> f64 {
    DEFAULT_SIMILARITY_RATIO
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_accounts_path() -> PathBuf {
    PathBuf::from("data/accounts.csv")
}

fn default_transactions_path() -> PathBuf {
    PathBuf::from("data/transactions.csv")
}

fn default_findings_dir() -> PathBuf {
    PathBuf::from("data/findings")
}

impl DetectionConfig {
    /// Validate detector parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.smurfing.threshold.is_finite() && self.smurfing.threshold > 0.0) {
            anyhow::bail!("smurfing.threshold must be a positive number");
        }
        if self.smurfing.min_transactions == 0 {
            anyhow::bail!("smurfing.min_transactions must be >= 1");
        }
        if !(self.rapid_movement.window_minutes.is_finite()
            && self.rapid_movement.window_minutes > 0.0)
        {
            anyhow::bail!("rapid_movement.window_minutes must be a positive number");
        }
        if !(self.rapid_movement.similarity_ratio.is_finite()
            && self.rapid_movement.similarity_ratio > 0.0)
        {
            anyhow::bail!("rapid_movement.similarity_ratio must be a positive number");
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load configuration from defaults and environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from a TOML config file with environment overrides
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = ::toml::from_str(&contents)?;

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Environment variables override file settings
    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(v) = env_parse::<f64>("AML_SMURFING_THRESHOLD")? {
            self.detection.smurfing.threshold = v;
        }
        if let Some(v) = env_parse::<usize>("AML_SMURFING_MIN_TRANSACTIONS")? {
            self.detection.smurfing.min_transactions = v;
        }
        if let Some(v) = env_parse::<f64>("AML_RAPID_WINDOW_MINUTES")? {
            self.detection.rapid_movement.window_minutes = v;
        }
        if let Some(v) = env_parse::<f64>("AML_RAPID_SIMILARITY_RATIO")? {
            self.detection.rapid_movement.similarity_ratio = v;
        }
        if let Ok(dir) = std::env::var("AML_DATA_DIR") {
            self.paths = PathConfig::rooted_at(Path::new(&dir));
        }
        Ok(())
    }

    /// Ensure the findings directory exists
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.paths.findings_dir)?;
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.detection.smurfing.threshold, 10_000.0);
        assert_eq!(config.detection.smurfing.min_transactions, 3);
        assert_eq!(config.detection.rapid_movement.window_minutes, 60.0);
        assert_eq!(config.detection.rapid_movement.similarity_ratio, 0.95);
        assert!(config.detection.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [detection.smurfing]
            threshold = 5000.0

            [paths]
            accounts = "in/accounts.parquet"
            "#,
        )
        .unwrap();

        assert_eq!(config.detection.smurfing.threshold, 5000.0);
        assert_eq!(config.detection.smurfing.min_transactions, 3);
        assert_eq!(config.detection.rapid_movement.window_minutes, 60.0);
        assert_eq!(config.paths.accounts, PathBuf::from("in/accounts.parquet"));
        assert_eq!(config.paths.transactions, PathBuf::from("data/transactions.csv"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DetectionConfig::default();
        config.smurfing.min_transactions = 0;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.rapid_movement.window_minutes = -5.0;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.smurfing.threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_rooted_at() {
        let paths = PathConfig::rooted_at(Path::new("/tmp/run1"));
        assert_eq!(paths.accounts, PathBuf::from("/tmp/run1/accounts.csv"));
        assert_eq!(paths.findings_dir, PathBuf::from("/tmp/run1/findings"));
    }
}
