use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use credit_drift::{DriftError, DriftErrorKind};
use credit_store::StoreError;
use serde_json::json;

/// The one place internal failures become HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    DataUnavailable(String),
    Computation(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Computation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::DataUnavailable(_) => DriftErrorKind::DataUnavailable.as_str(),
            Self::Computation(_) => DriftErrorKind::Computation.as_str(),
            Self::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::DataUnavailable(message)
            | Self::Computation(message)
            | Self::Internal(message) => message,
        }
    }
}

impl From<DriftError> for ApiError {
    fn from(err: DriftError) -> Self {
        match err.kind() {
            DriftErrorKind::DataUnavailable => Self::DataUnavailable(err.to_string()),
            DriftErrorKind::Computation => Self::Computation(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidRecord(message) => Self::BadRequest(message),
            other => Self::DataUnavailable(format!("prediction store unavailable: {other}")),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::BadRequest(_) => {}
            Self::DataUnavailable(message) => {
                tracing::warn!(kind = self.kind(), detail = %message, "request failed");
            }
            Self::Computation(message) | Self::Internal(message) => {
                tracing::error!(kind = self.kind(), detail = %message, "request failed");
            }
        }

        let body = Json(json!({
            "error": true,
            "kind": self.kind(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_split_between_client_and_availability() {
        let invalid = ApiError::from(StoreError::InvalidRecord("probability".to_owned()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let io = ApiError::from(StoreError::Io(std::io::Error::other("locked")));
        assert_eq!(io.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(io.kind(), "data_unavailable");
        assert!(io.message().contains("locked"));
    }

    #[test]
    fn response_body_carries_kind_and_message() {
        let response = ApiError::Computation("psi is NaN".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
