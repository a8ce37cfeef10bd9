mod engine;
mod error;
mod ks;
mod psi;
mod report;
mod severity;
mod snapshot;

pub use engine::{DriftEngine, DriftRun, DriftSettings};
pub use error::{DriftError, DriftErrorKind};
pub use ks::{EqualityTest, ReferenceDistribution, kolmogorov_p_value, two_sample_ks};
pub use psi::{BinOccupancy, StabilityIndex, StabilityIndexCalculator};
pub use report::{DRIFT_SCHEMA_VERSION, DriftReport, DriftStatus};
pub use severity::{Severity, SeverityThresholds, classify_severity};
pub use snapshot::{DistributionSnapshot, Snapshot, build_snapshot};
