use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use credit_config::CreditConfig;
use credit_drift::{DriftSettings, StabilityIndexCalculator};
use credit_store::{
    DriftReportRecord, DriftReportStore, NewDriftReport, NewPrediction, PredictionRecord,
    PredictionStore, SqliteStore, StoreError,
};
use creditd::server::{AppState, create_router};
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

struct UnavailableStore;

fn unavailable() -> StoreError {
    StoreError::Io(std::io::Error::other("database is locked"))
}

impl PredictionStore for UnavailableStore {
    fn insert_prediction(&self, _record: NewPrediction) -> Result<i64, StoreError> {
        Err(unavailable())
    }

    fn list_predictions(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        Err(unavailable())
    }

    fn count_predictions(&self) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

impl DriftReportStore for UnavailableStore {
    fn append_drift_report(&self, _report: &NewDriftReport) -> Result<i64, StoreError> {
        Err(unavailable())
    }

    fn latest_drift_report(&self) -> Result<Option<DriftReportRecord>, StoreError> {
        Err(unavailable())
    }

    fn list_drift_reports(&self, _limit: u32) -> Result<Vec<DriftReportRecord>, StoreError> {
        Err(unavailable())
    }
}

fn sqlite_app() -> (TempDir, Arc<SqliteStore>, Router) {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(
        SqliteStore::open(temp.path().join("predictions.sqlite")).expect("open store"),
    );
    let state = AppState::from_config(store.clone(), &CreditConfig::default());
    (temp, store, create_router(Arc::new(state)))
}

fn seed_uniform(store: &SqliteStore, count: usize) {
    for step in 0..count {
        let probability = (step as f64 + 0.5) / count as f64;
        store
            .insert_prediction(NewPrediction {
                features: Default::default(),
                predicted_class: i64::from(probability >= 0.5),
                probability,
            })
            .expect("seed prediction");
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).expect("json body");
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn liveness_and_readiness_report_ok() {
    let (_temp, _store, app) = sqlite_app();

    let (status, body) = send(app.clone(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app.clone(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["predictions"], 0);

    let (status, _) = send(
        app.clone(),
        post_json("/predictions", json!({ "probability": 0.4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = send(app, get("/health/ready")).await;
    assert_eq!(body["predictions"], 1);
}

#[tokio::test]
async fn readiness_degrades_when_store_is_unavailable() {
    let store = Arc::new(UnavailableStore);
    let state = AppState::new(store.clone(), store, DriftSettings::default(), 0.5);
    let app = create_router(Arc::new(state));

    let (status, body) = send(app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert!(
        body["db"]
            .as_str()
            .is_some_and(|db| db.starts_with("error: "))
    );
}

#[tokio::test]
async fn drift_on_empty_store_is_ok_with_no_data_status() {
    let (_temp, _store, app) = sqlite_app();

    let (status, body) = send(app, get("/drift")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_data");
    assert_eq!(body["sample_count"], 0);
    assert!(body["psi"].is_null());
}

#[tokio::test]
async fn drift_runs_and_latest_reads_the_persisted_row() {
    let (_temp, store, app) = sqlite_app();

    let (status, body) = send(app.clone(), get("/drift/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "no_report" }));

    seed_uniform(&store, 100);
    let (status, run) = send(app.clone(), get("/drift")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "no_drift");
    assert_eq!(run["sample_count"], 100);
    assert!(run["psi"].as_f64().is_some_and(|psi| psi < 0.1));
    assert!(run["ks_p_value"].is_f64());
    assert_eq!(run["warnings"], json!([]));

    let (status, latest) = send(app.clone(), get("/drift/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], run["report_id"]);
    assert_eq!(latest["status"], "no_drift");
    assert_eq!(latest["sample_count"], 100);

    let (status, listed) = send(app, get("/drift/reports?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["reports"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn drift_maps_store_failure_to_503() {
    let store = Arc::new(UnavailableStore);
    let state = AppState::new(store.clone(), store, DriftSettings::default(), 0.5);
    let app = create_router(Arc::new(state));

    let (status, body) = send(app, get("/drift")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "data_unavailable");
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.contains("load_snapshot"))
    );
}

#[tokio::test]
async fn drift_maps_computation_failure_to_500() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(SqliteStore::open(temp.path().join("db.sqlite")).expect("open store"));
    seed_uniform(&store, 30);
    let settings = DriftSettings {
        stability: StabilityIndexCalculator::default().with_smoothing(f64::NAN),
        ..DriftSettings::default()
    };
    let state = AppState::new(store.clone(), store.clone(), settings, 0.5);
    let app = create_router(Arc::new(state));

    let (status, body) = send(app, get("/drift")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "computation_error");
    assert!(store.latest_drift_report().expect("read latest").is_none());
}

#[tokio::test]
async fn drift_still_answers_when_the_audit_write_fails() {
    let temp = tempdir().expect("tempdir");
    let predictions = Arc::new(SqliteStore::open(temp.path().join("db.sqlite")).expect("open"));
    seed_uniform(&predictions, 50);
    let state = AppState::new(
        predictions,
        Arc::new(UnavailableStore),
        DriftSettings::default(),
        0.5,
    );
    let app = create_router(Arc::new(state));

    let (status, body) = send(app, get("/drift")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_drift");
    assert!(body["report_id"].is_null());
    assert_eq!(body["warnings"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn logging_a_prediction_derives_the_class_from_the_threshold() {
    let (_temp, store, app) = sqlite_app();

    let (status, body) = send(
        app.clone(),
        post_json(
            "/predictions",
            json!({
                "age": 35,
                "credit_amount": 2500.0,
                "duration": 24,
                "purpose": "car",
                "housing": "own",
                "job": "skilled",
                "probability": 0.73,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["probability"], 0.73);

    let (status, body) = send(
        app,
        post_json("/predictions", json!({ "probability": 0.2, "prediction": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["prediction"], 0);

    let records = store.list_predictions().expect("list predictions");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].features.purpose.as_deref(), Some("car"));
    assert_eq!(records[0].features.age, Some(35));
    assert_eq!(records[1].features.age, None);
}

#[tokio::test]
async fn logging_rejects_invalid_predictions() {
    let (_temp, store, app) = sqlite_app();

    let (status, body) = send(
        app.clone(),
        post_json("/predictions", json!({ "probability": 1.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    let (status, _) = send(
        app.clone(),
        post_json("/predictions", json!({ "probability": 0.4, "prediction": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, post_json("/predictions", json!({ "age": 30 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.count_predictions().expect("count"), 0);
}

#[tokio::test]
async fn unknown_routes_return_json_404() {
    let (_temp, _store, app) = sqlite_app();

    let (status, body) = send(app, get("/predict")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}
