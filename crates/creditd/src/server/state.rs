use std::sync::Arc;

use credit_config::CreditConfig;
use credit_drift::{DriftEngine, DriftSettings};
use credit_store::{DriftReportStore, PredictionStore, SqliteStore};

/// Everything a handler may touch, built once at startup and passed in.
#[derive(Clone)]
pub struct AppState {
    pub predictions: Arc<dyn PredictionStore>,
    pub reports: Arc<dyn DriftReportStore>,
    pub engine: DriftEngine,
    pub decision_threshold: f64,
}

impl AppState {
    pub fn new(
        predictions: Arc<dyn PredictionStore>,
        reports: Arc<dyn DriftReportStore>,
        settings: DriftSettings,
        decision_threshold: f64,
    ) -> Self {
        let engine = DriftEngine::new(predictions.clone(), reports.clone(), settings);
        Self {
            predictions,
            reports,
            engine,
            decision_threshold,
        }
    }

    pub fn from_config(store: Arc<SqliteStore>, config: &CreditConfig) -> Self {
        Self::new(
            store.clone(),
            store,
            DriftSettings::from_config(&config.drift),
            config.predictions.decision_threshold,
        )
    }
}
