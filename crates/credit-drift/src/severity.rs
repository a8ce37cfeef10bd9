use credit_config::{DEFAULT_DRIFT_THRESHOLD, DEFAULT_MODERATE_THRESHOLD, DriftConfig};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    NoDrift,
    ModerateDrift,
    DriftDetected,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoDrift => "no_drift",
            Self::ModerateDrift => "moderate_drift",
            Self::DriftDetected => "drift_detected",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "no_drift" => Ok(Self::NoDrift),
            "moderate_drift" => Ok(Self::ModerateDrift),
            "drift_detected" => Ok(Self::DriftDetected),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Inclusive lower bounds of the two alerting levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub moderate: f64,
    pub drift: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate: DEFAULT_MODERATE_THRESHOLD,
            drift: DEFAULT_DRIFT_THRESHOLD,
        }
    }
}

impl SeverityThresholds {
    pub fn from_config(config: &DriftConfig) -> Self {
        Self {
            moderate: config.moderate_threshold,
            drift: config.drift_threshold,
        }
    }

    pub fn min_index(self, severity: Severity) -> f64 {
        match severity {
            Severity::NoDrift => f64::NEG_INFINITY,
            Severity::ModerateDrift => self.moderate,
            Severity::DriftDetected => self.drift,
        }
    }
}

pub fn classify_severity(psi: f64, thresholds: SeverityThresholds) -> Severity {
    if psi >= thresholds.min_index(Severity::DriftDetected) {
        return Severity::DriftDetected;
    }
    if psi >= thresholds.min_index(Severity::ModerateDrift) {
        return Severity::ModerateDrift;
    }
    Severity::NoDrift
}
