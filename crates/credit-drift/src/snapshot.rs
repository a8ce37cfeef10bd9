use credit_store::{PredictionRecord, PredictionStore};

use crate::error::DriftError;

/// Probability values extracted from the prediction log for one computation.
/// Never persisted; order carries no meaning downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSnapshot {
    values: Vec<f64>,
    total_records: usize,
}

impl DistributionSnapshot {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn discarded_records(&self) -> usize {
        self.total_records.saturating_sub(self.values.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Ready(DistributionSnapshot),
    NoData { total_records: usize },
}

impl Snapshot {
    /// Keeps finite probabilities; missing or non-finite ones are discarded
    /// but still counted in `total_records`.
    pub fn from_probabilities<I>(probabilities: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut total_records = 0usize;
        let mut values = Vec::new();
        for probability in probabilities {
            total_records += 1;
            if let Some(value) = probability.filter(|value| value.is_finite()) {
                values.push(value);
            }
        }

        if values.is_empty() {
            Self::NoData { total_records }
        } else {
            Self::Ready(DistributionSnapshot {
                values,
                total_records,
            })
        }
    }

    pub fn from_records(records: &[PredictionRecord]) -> Self {
        Self::from_probabilities(records.iter().map(|record| record.probability))
    }

    pub fn total_records(&self) -> usize {
        match self {
            Self::Ready(snapshot) => snapshot.total_records(),
            Self::NoData { total_records } => *total_records,
        }
    }
}

pub fn build_snapshot(source: &dyn PredictionStore) -> Result<Snapshot, DriftError> {
    let records = source
        .list_predictions()
        .map_err(|err| DriftError::data_unavailable("load_snapshot", err))?;
    Ok(Snapshot::from_records(records.as_slice()))
}
