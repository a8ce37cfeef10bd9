use credit_store::NewDriftReport;
use serde::{Deserialize, Serialize};

use crate::ks::EqualityTest;
use crate::psi::{BinOccupancy, StabilityIndex};
use crate::severity::Severity;

pub const DRIFT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    NoData,
    NoDrift,
    ModerateDrift,
    DriftDetected,
}

impl DriftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::NoDrift => "no_drift",
            Self::ModerateDrift => "moderate_drift",
            Self::DriftDetected => "drift_detected",
        }
    }

    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::NoData => None,
            Self::NoDrift => Some(Severity::NoDrift),
            Self::ModerateDrift => Some(Severity::ModerateDrift),
            Self::DriftDetected => Some(Severity::DriftDetected),
        }
    }
}

impl From<Severity> for DriftStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::NoDrift => Self::NoDrift,
            Severity::ModerateDrift => Self::ModerateDrift,
            Severity::DriftDetected => Self::DriftDetected,
        }
    }
}

impl std::str::FromStr for DriftStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "no_data" => Ok(Self::NoData),
            other => other.parse::<Severity>().map(Self::from),
        }
    }
}

impl std::fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one drift computation. `sample_count` is always the length of
/// the snapshot the numbers were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub schema_version: String,
    pub subject: String,
    pub status: DriftStatus,
    pub psi: Option<f64>,
    pub ks_statistic: Option<f64>,
    pub ks_p_value: Option<f64>,
    pub sample_count: usize,
    pub total_records: usize,
    pub discarded_records: usize,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bins: Vec<BinOccupancy>,
}

impl DriftReport {
    pub fn no_data(subject: impl Into<String>, total_records: usize, created_at: i64) -> Self {
        Self {
            schema_version: DRIFT_SCHEMA_VERSION.to_owned(),
            subject: subject.into(),
            status: DriftStatus::NoData,
            psi: None,
            ks_statistic: None,
            ks_p_value: None,
            sample_count: 0,
            total_records,
            discarded_records: total_records,
            created_at,
            bins: Vec::new(),
        }
    }

    pub fn computed(
        subject: impl Into<String>,
        index: StabilityIndex,
        equality: &EqualityTest,
        severity: Severity,
        total_records: usize,
        created_at: i64,
    ) -> Self {
        let sample_count = equality.sample_size;
        Self {
            schema_version: DRIFT_SCHEMA_VERSION.to_owned(),
            subject: subject.into(),
            status: DriftStatus::from(severity),
            psi: Some(index.value),
            ks_statistic: Some(equality.statistic),
            ks_p_value: Some(equality.p_value),
            sample_count,
            total_records,
            discarded_records: total_records.saturating_sub(sample_count),
            created_at,
            bins: index.bins,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.status == DriftStatus::NoData
    }

    pub fn to_record(&self) -> NewDriftReport {
        NewDriftReport {
            subject: self.subject.clone(),
            psi: self.psi,
            status: self.status.as_str().to_owned(),
            ks_statistic: self.ks_statistic,
            ks_p_value: self.ks_p_value,
            sample_count: i64::try_from(self.sample_count).unwrap_or(i64::MAX),
            created_at: self.created_at,
        }
    }
}
