use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CREDIT_DIR_NAME: &str = ".credit";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_DATABASE_FILE: &str = "predictions.sqlite";
pub const DEFAULT_SUBJECT: &str = "probability";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_BINS: usize = 10;
pub const DEFAULT_SMOOTHING: f64 = 1e-6;
pub const DEFAULT_MODERATE_THRESHOLD: f64 = 0.1;
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.25;
pub const DEFAULT_REFERENCE_VALUE: f64 = 0.5;
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

pub const ENV_DB_PATH: &str = "CREDIT_DB_PATH";
pub const ENV_HOST: &str = "CREDIT_HOST";
pub const ENV_PORT: &str = "CREDIT_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BinningStrategy {
    #[default]
    Deciles,
    Quantile,
}

impl BinningStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deciles => "deciles",
            Self::Quantile => "quantile",
        }
    }
}

impl std::str::FromStr for BinningStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "deciles" => Ok(Self::Deciles),
            "quantile" => Ok(Self::Quantile),
            other => Err(format!(
                "invalid binning strategy '{other}', expected one of: deciles, quantile"
            )),
        }
    }
}

/// Comparison target for the distribution equality test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceConfig {
    /// A single value repeated to the observed sample length.
    Constant { value: f64 },
    /// An explicit reference sample, compared as-is.
    Samples { values: Vec<f64> },
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self::Constant {
            value: DEFAULT_REFERENCE_VALUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreditConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub predictions: PredictionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub drift: DriftConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionsConfig {
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

impl Default for PredictionsConfig {
    fn default() -> Self {
        Self {
            decision_threshold: default_decision_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_bins")]
    pub bins: usize,
    #[serde(default)]
    pub binning: BinningStrategy,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Vec<f64>>,
    #[serde(default)]
    pub reference: ReferenceConfig,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            bins: default_bins(),
            binning: BinningStrategy::default(),
            smoothing: default_smoothing(),
            moderate_threshold: default_moderate_threshold(),
            drift_threshold: default_drift_threshold(),
            baseline: None,
            reference: ReferenceConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

pub fn credit_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(CREDIT_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    credit_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn database_path(workspace_root: impl AsRef<Path>, store: &StoreConfig) -> PathBuf {
    let workspace_root = workspace_root.as_ref();
    match store.path.as_deref() {
        Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
        Some(path) => workspace_root.join(path),
        None => credit_dir(workspace_root).join(DEFAULT_DATABASE_FILE),
    }
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<CreditConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(CreditConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: CreditConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<CreditConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(credit_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = CreditConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

/// Applies `CREDIT_DB_PATH`, `CREDIT_HOST` and `CREDIT_PORT` on top of the
/// file values. `lookup` is usually `|key| std::env::var(key).ok()`.
pub fn apply_env_overrides<F>(
    mut config: CreditConfig,
    lookup: F,
) -> (CreditConfig, Vec<ConfigWarning>)
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    if let Some(path) = normalize_optional(lookup(ENV_DB_PATH)) {
        config.store.path = Some(path);
    }
    if let Some(host) = normalize_optional(lookup(ENV_HOST)) {
        config.server.host = host;
    }
    if let Some(raw_port) = normalize_optional(lookup(ENV_PORT)) {
        match raw_port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warnings.push(ConfigWarning {
                code: "invalid_env_port",
                message: format!(
                    "{ENV_PORT}='{raw_port}' is not a valid port, keeping {}",
                    config.server.port
                ),
            }),
        }
    }

    (config, warnings)
}

pub fn validate_config(config: &CreditConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let drift = &config.drift;

    if drift.bins == 0 {
        warnings.push(ConfigWarning {
            code: "drift_bins_zero",
            message: "drift.bins must be at least 1".to_owned(),
        });
    }
    if !(drift.smoothing.is_finite() && drift.smoothing > 0.0) {
        warnings.push(ConfigWarning {
            code: "drift_smoothing_invalid",
            message: format!(
                "drift.smoothing must be a small positive number, got {}",
                drift.smoothing
            ),
        });
    }
    if !(drift.moderate_threshold.is_finite()
        && drift.drift_threshold.is_finite()
        && drift.moderate_threshold < drift.drift_threshold)
    {
        warnings.push(ConfigWarning {
            code: "drift_thresholds_unordered",
            message: format!(
                "drift.moderate_threshold ({}) must be below drift.drift_threshold ({})",
                drift.moderate_threshold, drift.drift_threshold
            ),
        });
    }

    match &drift.reference {
        ReferenceConfig::Constant { value } if !(0.0..=1.0).contains(value) => {
            warnings.push(ConfigWarning {
                code: "drift_reference_out_of_range",
                message: format!("drift.reference.value must lie in [0, 1], got {value}"),
            });
        }
        ReferenceConfig::Samples { values } if values.is_empty() => {
            warnings.push(ConfigWarning {
                code: "drift_reference_empty",
                message: "drift.reference.values is empty; the equality test will fail"
                    .to_owned(),
            });
        }
        _ => {}
    }

    if let Some(baseline) = &drift.baseline {
        if drift.binning == BinningStrategy::Quantile {
            warnings.push(ConfigWarning {
                code: "drift_baseline_ignored",
                message: "drift.baseline is ignored under quantile binning".to_owned(),
            });
        }
        if baseline.len() != drift.bins {
            warnings.push(ConfigWarning {
                code: "drift_baseline_length",
                message: format!(
                    "drift.baseline has {} entries but drift.bins is {}",
                    baseline.len(),
                    drift.bins
                ),
            });
        }
        if baseline.iter().any(|value| !value.is_finite() || *value < 0.0) {
            warnings.push(ConfigWarning {
                code: "drift_baseline_negative",
                message: "drift.baseline entries must be finite and non-negative".to_owned(),
            });
        }
        let total = baseline.iter().sum::<f64>();
        let tolerance = 1e-6 * baseline.len().max(1) as f64;
        if (total - 1.0).abs() > tolerance {
            warnings.push(ConfigWarning {
                code: "drift_baseline_sum",
                message: format!("drift.baseline proportions sum to {total}, expected 1"),
            });
        }
    }

    let threshold = config.predictions.decision_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        warnings.push(ConfigWarning {
            code: "decision_threshold_out_of_range",
            message: format!("predictions.decision_threshold must lie in [0, 1], got {threshold}"),
        });
    }

    warnings
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_decision_threshold() -> f64 {
    DEFAULT_DECISION_THRESHOLD
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_owned()
}

fn default_bins() -> usize {
    DEFAULT_BINS
}

fn default_smoothing() -> f64 {
    DEFAULT_SMOOTHING
}

fn default_moderate_threshold() -> f64 {
    DEFAULT_MODERATE_THRESHOLD
}

fn default_drift_threshold() -> f64 {
    DEFAULT_DRIFT_THRESHOLD
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_config(mut config: CreditConfig) -> CreditConfig {
    config.store.path = normalize_optional(config.store.path.take());

    let subject = config.drift.subject.trim();
    if subject.is_empty() {
        config.drift.subject = default_subject();
    } else {
        config.drift.subject = subject.to_owned();
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        config.server.host = default_host();
    } else {
        config.server.host = host.to_owned();
    }

    config
}
