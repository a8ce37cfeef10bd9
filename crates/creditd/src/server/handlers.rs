use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use credit_drift::DriftRun;
use credit_store::{CreditFeatures, DriftReportRecord, NewPrediction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::spawn_blocking;

use super::error::ApiError;
use super::state::AppState;
use crate::cli::DEFAULT_REPORT_LIMIT;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    #[serde(flatten)]
    pub features: CreditFeatures,
    pub probability: f64,
    #[serde(default)]
    pub prediction: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub id: i64,
    pub prediction: i64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<DriftReportRecord>,
}

pub async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    let predictions = state.predictions.clone();
    let outcome = spawn_blocking(move || {
        predictions.ping()?;
        predictions.count_predictions()
    })
    .await;

    let failure = match outcome {
        Ok(Ok(count)) => {
            return Json(json!({ "status": "ready", "predictions": count })).into_response();
        }
        Ok(Err(err)) => err.to_string(),
        Err(err) => err.to_string(),
    };
    tracing::warn!(error = %failure, "readiness check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "degraded", "db": format!("error: {failure}") })),
    )
        .into_response()
}

pub async fn run_drift(State(state): State<Arc<AppState>>) -> Result<Json<DriftRun>, ApiError> {
    let engine = state.engine.clone();
    let run = spawn_blocking(move || engine.run()).await??;
    Ok(Json(run))
}

pub async fn latest_report(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let reports = state.reports.clone();
    let latest = spawn_blocking(move || reports.latest_drift_report()).await??;

    Ok(match latest {
        Some(record) => Json(record).into_response(),
        None => Json(json!({ "status": "no_report" })).into_response(),
    })
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT);
    let store = state.reports.clone();
    let reports = spawn_blocking(move || store.list_drift_reports(limit)).await??;
    Ok(Json(ReportsResponse { reports }))
}

pub async fn log_prediction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PredictionResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if !request.probability.is_finite() || !(0.0..=1.0).contains(&request.probability) {
        return Err(ApiError::BadRequest(format!(
            "probability must be within [0, 1], got {}",
            request.probability
        )));
    }

    let predicted_class = request
        .prediction
        .unwrap_or_else(|| i64::from(request.probability >= state.decision_threshold));
    let record = NewPrediction {
        features: request.features,
        predicted_class,
        probability: request.probability,
    };

    let predictions = state.predictions.clone();
    let id = spawn_blocking(move || predictions.insert_prediction(record)).await??;
    tracing::debug!(id, predicted_class, "prediction logged");

    Ok((
        StatusCode::CREATED,
        Json(PredictionResponse {
            id,
            prediction: predicted_class,
            probability: request.probability,
        }),
    ))
}
