use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use credit_config::{StoreConfig, database_path};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_REPORT_LIST_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreditFeatures {
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub credit_amount: Option<f64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub housing: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub features: CreditFeatures,
    pub predicted_class: i64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub features: CreditFeatures,
    pub predicted_class: Option<i64>,
    pub probability: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDriftReport {
    pub subject: String,
    pub psi: Option<f64>,
    pub status: String,
    pub ks_statistic: Option<f64>,
    pub ks_p_value: Option<f64>,
    pub sample_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReportRecord {
    pub id: i64,
    pub subject: String,
    pub psi: Option<f64>,
    pub status: String,
    pub ks_statistic: Option<f64>,
    pub ks_p_value: Option<f64>,
    pub sample_count: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Read/write access to the append-only prediction log.
pub trait PredictionStore: Send + Sync {
    fn insert_prediction(&self, record: NewPrediction) -> Result<i64, StoreError>;
    fn list_predictions(&self) -> Result<Vec<PredictionRecord>, StoreError>;
    fn count_predictions(&self) -> Result<u64, StoreError>;
    fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only audit trail of drift computations.
pub trait DriftReportStore: Send + Sync {
    fn append_drift_report(&self, report: &NewDriftReport) -> Result<i64, StoreError>;
    fn latest_drift_report(&self) -> Result<Option<DriftReportRecord>, StoreError>;
    fn list_drift_reports(&self, limit: u32) -> Result<Vec<DriftReportRecord>, StoreError>;
}

/// SQLite-backed store. Each operation opens its own connection, so the
/// handle is cheap to share across threads and never pins a connection for
/// longer than one statement batch.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_timeout(
            path,
            Duration::from_millis(credit_config::DEFAULT_BUSY_TIMEOUT_MS),
        )
    }

    pub fn open_workspace(
        workspace_root: impl AsRef<Path>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        Self::open_with_timeout(
            database_path(workspace_root, config),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let store = Self { path, busy_timeout };
        let conn = store.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;
        tracing::debug!(path = %store.path.display(), "prediction store ready");

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl PredictionStore for SqliteStore {
    fn insert_prediction(&self, record: NewPrediction) -> Result<i64, StoreError> {
        validate_new_prediction(&record)?;
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO prediction_logs (
                age, credit_amount, duration, purpose, housing, job,
                prediction, probability, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.features.age,
                record.features.credit_amount,
                record.features.duration,
                record.features.purpose,
                record.features.housing,
                record.features.job,
                record.predicted_class,
                record.probability,
                now_millis(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn list_predictions(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, age, credit_amount, duration, purpose, housing, job,
                   prediction, probability, timestamp
            FROM prediction_logs
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PredictionRecord {
                id: row.get(0)?,
                features: CreditFeatures {
                    age: row.get(1)?,
                    credit_amount: row.get(2)?,
                    duration: row.get(3)?,
                    purpose: row.get(4)?,
                    housing: row.get(5)?,
                    job: row.get(6)?,
                },
                predicted_class: row.get(7)?,
                probability: row.get(8)?,
                timestamp: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count_predictions(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM prediction_logs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

impl DriftReportStore for SqliteStore {
    fn append_drift_report(&self, report: &NewDriftReport) -> Result<i64, StoreError> {
        if report.subject.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "drift report subject must not be empty".to_owned(),
            ));
        }

        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO drift_reports (
                feature, psi, status, created_at, ks_stat, ks_pval, "count"
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                report.subject,
                report.psi,
                report.status,
                report.created_at,
                report.ks_statistic,
                report.ks_p_value,
                report.sample_count,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn latest_drift_report(&self) -> Result<Option<DriftReportRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, feature, psi, status, created_at, ks_stat, ks_pval, "count"
            FROM drift_reports
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )?;

        let record = stmt.query_row([], drift_report_from_row).optional()?;
        Ok(record)
    }

    fn list_drift_reports(&self, limit: u32) -> Result<Vec<DriftReportRecord>, StoreError> {
        let capped_limit = limit.clamp(1, MAX_REPORT_LIST_LIMIT) as i64;
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, feature, psi, status, created_at, ks_stat, ks_pval, "count"
            FROM drift_reports
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![capped_limit], drift_report_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn drift_report_from_row(row: &Row<'_>) -> rusqlite::Result<DriftReportRecord> {
    Ok(DriftReportRecord {
        id: row.get(0)?,
        subject: row.get(1)?,
        psi: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        ks_statistic: row.get(5)?,
        ks_p_value: row.get(6)?,
        sample_count: row.get(7)?,
    })
}

fn validate_new_prediction(record: &NewPrediction) -> Result<(), StoreError> {
    if !record.probability.is_finite() || !(0.0..=1.0).contains(&record.probability) {
        return Err(StoreError::InvalidRecord(format!(
            "probability must be a finite value in [0, 1], got {}",
            record.probability
        )));
    }
    if !matches!(record.predicted_class, 0 | 1) {
        return Err(StoreError::InvalidRecord(format!(
            "predicted class must be 0 or 1, got {}",
            record.predicted_class
        )));
    }
    Ok(())
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS prediction_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            age INTEGER,
            credit_amount REAL,
            duration INTEGER,
            purpose TEXT,
            housing TEXT,
            job TEXT,
            prediction INTEGER,
            probability REAL,
            timestamp INTEGER
        );

        CREATE TABLE IF NOT EXISTS drift_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            feature TEXT NOT NULL,
            psi REAL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            ks_stat REAL,
            ks_pval REAL,
            "count" INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_drift_reports_created_at
            ON drift_reports(created_at);
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as i64)
        .unwrap_or(0)
}
