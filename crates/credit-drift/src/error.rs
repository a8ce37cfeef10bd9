use credit_store::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("data unavailable during {operation}: {source}")]
    DataUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("computation failed during {operation}: {message}")]
    Computation {
        operation: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftErrorKind {
    DataUnavailable,
    Computation,
}

impl DriftErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataUnavailable => "data_unavailable",
            Self::Computation => "computation_error",
        }
    }
}

impl DriftError {
    pub fn kind(&self) -> DriftErrorKind {
        match self {
            Self::DataUnavailable { .. } => DriftErrorKind::DataUnavailable,
            Self::Computation { .. } => DriftErrorKind::Computation,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::DataUnavailable { operation, .. } | Self::Computation { operation, .. } => {
                *operation
            }
        }
    }

    pub(crate) fn data_unavailable(operation: &'static str, source: StoreError) -> Self {
        Self::DataUnavailable { operation, source }
    }

    pub(crate) fn computation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Computation {
            operation,
            message: message.into(),
        }
    }
}
