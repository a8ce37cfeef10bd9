use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use credit_config::DriftConfig;
use credit_store::{DriftReportStore, PredictionStore};
use serde::Serialize;

use crate::error::DriftError;
use crate::ks::ReferenceDistribution;
use crate::psi::StabilityIndexCalculator;
use crate::report::DriftReport;
use crate::severity::{SeverityThresholds, classify_severity};
use crate::snapshot::{DistributionSnapshot, Snapshot, build_snapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct DriftSettings {
    pub subject: String,
    pub stability: StabilityIndexCalculator,
    pub reference: ReferenceDistribution,
    pub thresholds: SeverityThresholds,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self::from_config(&DriftConfig::default())
    }
}

impl DriftSettings {
    pub fn from_config(config: &DriftConfig) -> Self {
        Self {
            subject: config.subject.clone(),
            stability: StabilityIndexCalculator::from_config(config),
            reference: ReferenceDistribution::from(&config.reference),
            thresholds: SeverityThresholds::from_config(config),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftRun {
    #[serde(flatten)]
    pub report: DriftReport,
    pub report_id: Option<i64>,
    pub warnings: Vec<String>,
}

impl DriftRun {
    pub fn persisted(&self) -> bool {
        self.report_id.is_some()
    }
}

/// Snapshot, index, equality test, severity and audit append for one
/// invocation. Holds no state between runs; concurrent runs are independent.
#[derive(Clone)]
pub struct DriftEngine {
    predictions: Arc<dyn PredictionStore>,
    reports: Arc<dyn DriftReportStore>,
    settings: DriftSettings,
}

impl DriftEngine {
    pub fn new(
        predictions: Arc<dyn PredictionStore>,
        reports: Arc<dyn DriftReportStore>,
        settings: DriftSettings,
    ) -> Self {
        Self {
            predictions,
            reports,
            settings,
        }
    }

    pub fn settings(&self) -> &DriftSettings {
        &self.settings
    }

    /// Pure computation over an already materialized snapshot.
    pub fn evaluate(
        &self,
        snapshot: &DistributionSnapshot,
        created_at: i64,
    ) -> Result<DriftReport, DriftError> {
        let index = self.settings.stability.compute(snapshot.values())?;
        let equality = self.settings.reference.compare(snapshot.values())?;
        let severity = classify_severity(index.value, self.settings.thresholds);

        Ok(DriftReport::computed(
            self.settings.subject.clone(),
            index,
            &equality,
            severity,
            snapshot.total_records(),
            created_at,
        ))
    }

    pub fn run(&self) -> Result<DriftRun, DriftError> {
        let snapshot = build_snapshot(self.predictions.as_ref())?;
        let created_at = now_millis();

        let report = match &snapshot {
            Snapshot::Ready(snapshot) => self.evaluate(snapshot, created_at)?,
            Snapshot::NoData { total_records } => {
                DriftReport::no_data(self.settings.subject.clone(), *total_records, created_at)
            }
        };

        let mut warnings = Vec::new();
        let report_id = match self.reports.append_drift_report(&report.to_record()) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(
                    subject = %report.subject,
                    status = report.status.as_str(),
                    error = %err,
                    "drift report computed but not persisted"
                );
                warnings.push(format!("drift report was not persisted: {err}"));
                None
            }
        };

        tracing::info!(
            subject = %report.subject,
            status = report.status.as_str(),
            psi = report.psi,
            sample_count = report.sample_count,
            report_id,
            "drift computation finished"
        );

        Ok(DriftRun {
            report,
            report_id,
            warnings,
        })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use credit_store::{
        DriftReportRecord, NewDriftReport, NewPrediction, PredictionRecord, StoreError,
    };

    use super::*;
    use crate::error::DriftErrorKind;
    use crate::report::DriftStatus;

    struct FakePredictions {
        probabilities: Vec<Option<f64>>,
        unavailable: bool,
    }

    impl FakePredictions {
        fn with(probabilities: Vec<Option<f64>>) -> Arc<Self> {
            Arc::new(Self {
                probabilities,
                unavailable: false,
            })
        }
    }

    impl PredictionStore for FakePredictions {
        fn insert_prediction(&self, _record: NewPrediction) -> Result<i64, StoreError> {
            Err(StoreError::InvalidRecord("read-only fake".to_owned()))
        }

        fn list_predictions(&self) -> Result<Vec<PredictionRecord>, StoreError> {
            if self.unavailable {
                return Err(StoreError::Io(std::io::Error::other("connection refused")));
            }
            Ok(self
                .probabilities
                .iter()
                .enumerate()
                .map(|(index, probability)| PredictionRecord {
                    id: index as i64 + 1,
                    features: Default::default(),
                    predicted_class: probability.map(|value| i64::from(value >= 0.5)),
                    probability: *probability,
                    timestamp: 1,
                })
                .collect())
        }

        fn count_predictions(&self) -> Result<u64, StoreError> {
            Ok(self.probabilities.len() as u64)
        }

        fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingReports {
        appended: Mutex<Vec<NewDriftReport>>,
        fail: bool,
    }

    impl DriftReportStore for RecordingReports {
        fn append_drift_report(&self, report: &NewDriftReport) -> Result<i64, StoreError> {
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            let mut appended = self.appended.lock().expect("lock reports");
            appended.push(report.clone());
            Ok(appended.len() as i64)
        }

        fn latest_drift_report(&self) -> Result<Option<DriftReportRecord>, StoreError> {
            Ok(None)
        }

        fn list_drift_reports(&self, _limit: u32) -> Result<Vec<DriftReportRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn uniform(count: usize) -> Vec<Option<f64>> {
        (0..count)
            .map(|step| Some((step as f64 + 0.5) / count as f64))
            .collect()
    }

    fn engine(predictions: Arc<FakePredictions>, reports: Arc<RecordingReports>) -> DriftEngine {
        DriftEngine::new(predictions, reports, DriftSettings::default())
    }

    #[test]
    fn uniform_sample_is_no_drift_and_persisted() {
        let reports = Arc::new(RecordingReports::default());
        let run = engine(FakePredictions::with(uniform(100)), reports.clone())
            .run()
            .expect("run drift");

        assert_eq!(run.report.status, DriftStatus::NoDrift);
        assert!(run.report.psi.expect("psi") < 0.1);
        assert_eq!(run.report.sample_count, 100);
        assert_eq!(run.report_id, Some(1));
        assert!(run.warnings.is_empty());

        let appended = reports.appended.lock().expect("lock reports");
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].sample_count, 100);
        assert_eq!(appended[0].status, "no_drift");
    }

    #[test]
    fn empty_store_yields_persisted_no_data_report() {
        let reports = Arc::new(RecordingReports::default());
        let run = engine(FakePredictions::with(Vec::new()), reports.clone())
            .run()
            .expect("run drift");

        assert_eq!(run.report.status, DriftStatus::NoData);
        assert_eq!(run.report.sample_count, 0);
        assert_eq!(run.report.psi, None);
        assert_eq!(run.report.ks_statistic, None);

        let appended = reports.appended.lock().expect("lock reports");
        assert_eq!(appended[0].status, "no_data");
        assert_eq!(appended[0].psi, None);
    }

    #[test]
    fn sample_count_excludes_rows_without_probability() {
        let mut probabilities = uniform(10);
        probabilities.push(None);
        probabilities.push(Some(f64::NAN));
        let run = engine(
            FakePredictions::with(probabilities),
            Arc::new(RecordingReports::default()),
        )
        .run()
        .expect("run drift");

        assert_eq!(run.report.sample_count, 10);
        assert_eq!(run.report.total_records, 12);
        assert_eq!(run.report.discarded_records, 2);
    }

    #[test]
    fn persistence_failure_is_a_warning_not_an_error() {
        let reports = Arc::new(RecordingReports {
            fail: true,
            ..RecordingReports::default()
        });
        let run = engine(FakePredictions::with(uniform(100)), reports)
            .run()
            .expect("computation still succeeds");

        assert_eq!(run.report.status, DriftStatus::NoDrift);
        assert_eq!(run.report_id, None);
        assert!(!run.persisted());
        assert_eq!(run.warnings.len(), 1);
        assert!(run.warnings[0].contains("disk full"));
    }

    #[test]
    fn unavailable_store_is_data_unavailable() {
        let predictions = Arc::new(FakePredictions {
            probabilities: Vec::new(),
            unavailable: true,
        });
        let reports = Arc::new(RecordingReports::default());
        let err = engine(predictions, reports.clone())
            .run()
            .expect_err("store failure must surface");

        assert_eq!(err.kind(), DriftErrorKind::DataUnavailable);
        assert_eq!(err.operation(), "load_snapshot");
        assert!(reports.appended.lock().expect("lock reports").is_empty());
    }

    #[test]
    fn computation_failure_is_not_coerced_to_a_severity() {
        let settings = DriftSettings {
            stability: StabilityIndexCalculator::default().with_smoothing(f64::NAN),
            ..DriftSettings::default()
        };
        let reports = Arc::new(RecordingReports::default());
        let err = DriftEngine::new(FakePredictions::with(uniform(50)), reports.clone(), settings)
            .run()
            .expect_err("nan index must fail");

        assert_eq!(err.kind(), DriftErrorKind::Computation);
        assert!(reports.appended.lock().expect("lock reports").is_empty());
    }

    #[test]
    fn equality_test_does_not_change_severity() {
        let run = engine(
            FakePredictions::with(uniform(100)),
            Arc::new(RecordingReports::default()),
        )
        .run()
        .expect("run drift");

        assert!(run.report.ks_p_value.expect("p-value") < 1e-6);
        assert_eq!(run.report.status, DriftStatus::NoDrift);
    }

    #[test]
    fn run_serializes_report_fields_at_top_level() {
        let run = engine(
            FakePredictions::with(Vec::new()),
            Arc::new(RecordingReports::default()),
        )
        .run()
        .expect("run drift");
        let json = serde_json::to_value(&run).expect("serialize run");

        assert_eq!(json["status"], "no_data");
        assert_eq!(json["sample_count"], 0);
        assert_eq!(json["report_id"], 1);
        assert_eq!(json["subject"], "probability");
    }
}
