use std::cmp::Ordering;

use credit_config::ReferenceConfig;
use serde::{Deserialize, Serialize};

use crate::error::DriftError;

const OPERATION: &str = "equality_test";

/// Below this the asymptotic series converges too slowly and the tail
/// probability is indistinguishable from 1.
const MIN_SERIES_LAMBDA: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualityTest {
    pub statistic: f64,
    pub p_value: f64,
    pub sample_size: usize,
    pub reference_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceDistribution {
    /// Repeated to the observed sample length.
    Constant(f64),
    Samples(Vec<f64>),
}

impl From<&ReferenceConfig> for ReferenceDistribution {
    fn from(config: &ReferenceConfig) -> Self {
        match config {
            ReferenceConfig::Constant { value } => Self::Constant(*value),
            ReferenceConfig::Samples { values } => Self::Samples(values.clone()),
        }
    }
}

impl ReferenceDistribution {
    pub fn sample_for(&self, sample_len: usize) -> Vec<f64> {
        match self {
            Self::Constant(value) => vec![*value; sample_len],
            Self::Samples(values) => values.clone(),
        }
    }

    pub fn compare(&self, values: &[f64]) -> Result<EqualityTest, DriftError> {
        let reference = self.sample_for(values.len());
        two_sample_ks(values, reference.as_slice())
    }
}

/// Two-sample Kolmogorov-Smirnov test. The statistic is the largest gap
/// between the two empirical CDFs; ties advance both samples together.
pub fn two_sample_ks(sample: &[f64], reference: &[f64]) -> Result<EqualityTest, DriftError> {
    if sample.is_empty() || reference.is_empty() {
        return Err(DriftError::computation(
            OPERATION,
            "both samples must be non-empty",
        ));
    }
    if sample
        .iter()
        .chain(reference.iter())
        .any(|value| !value.is_finite())
    {
        return Err(DriftError::computation(
            OPERATION,
            "samples contain non-finite values",
        ));
    }

    let left = sorted(sample);
    let right = sorted(reference);
    let n1 = left.len() as f64;
    let n2 = right.len() as f64;

    let mut i = 0usize;
    let mut j = 0usize;
    let mut statistic = 0.0f64;
    while i < left.len() && j < right.len() {
        let value = left[i].min(right[j]);
        while i < left.len() && left[i] <= value {
            i += 1;
        }
        while j < right.len() && right[j] <= value {
            j += 1;
        }
        statistic = statistic.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    let effective = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (effective + 0.12 + 0.11 / effective) * statistic;
    let p_value = kolmogorov_p_value(lambda);
    if !statistic.is_finite() || !p_value.is_finite() {
        return Err(DriftError::computation(
            OPERATION,
            format!("non-finite test result (statistic {statistic}, p-value {p_value})"),
        ));
    }

    Ok(EqualityTest {
        statistic,
        p_value,
        sample_size: left.len(),
        reference_size: right.len(),
    })
}

/// Tail probability of the Kolmogorov distribution,
/// `2 * sum_{k>=1} (-1)^(k-1) * exp(-2 k^2 lambda^2)`.
pub fn kolmogorov_p_value(lambda: f64) -> f64 {
    if lambda.is_nan() || lambda < MIN_SERIES_LAMBDA {
        return 1.0;
    }

    let mut sum = 0.0f64;
    let mut sign = 1.0f64;
    for k in 1..=100 {
        let k = f64::from(k);
        let term = sign * (-2.0 * k * k * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(|left, right| left.partial_cmp(right).unwrap_or(Ordering::Equal));
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(count: usize) -> Vec<f64> {
        (0..count)
            .map(|step| (step as f64 + 0.5) / count as f64)
            .collect()
    }

    #[test]
    fn identical_samples_have_zero_statistic() {
        let values = uniform(50);
        let test = two_sample_ks(values.as_slice(), values.as_slice()).expect("ks");

        assert_eq!(test.statistic, 0.0);
        assert_eq!(test.p_value, 1.0);
    }

    #[test]
    fn uniform_against_constant_half_splits_in_the_middle() {
        let values = uniform(100);
        let test = ReferenceDistribution::Constant(0.5)
            .compare(values.as_slice())
            .expect("ks");

        assert!((test.statistic - 0.5).abs() < 1e-12);
        assert!(test.p_value < 1e-6, "p = {}", test.p_value);
        assert_eq!(test.sample_size, 100);
        assert_eq!(test.reference_size, 100);
    }

    #[test]
    fn ties_across_samples_advance_together() {
        let test = two_sample_ks(&[0.5, 0.5, 0.5], &[0.5]).expect("ks");
        assert_eq!(test.statistic, 0.0);

        let test = two_sample_ks(&[0.1, 0.5], &[0.5, 0.9]).expect("ks");
        assert!((test.statistic - 0.5).abs() < 1e-12);
    }

    #[test]
    fn disjoint_samples_have_statistic_one() {
        let test = two_sample_ks(&[0.1, 0.2, 0.3], &[0.7, 0.8, 0.9]).expect("ks");
        assert_eq!(test.statistic, 1.0);
        assert!(test.p_value < 0.2);
    }

    #[test]
    fn explicit_reference_samples_are_used_as_is() {
        let reference = ReferenceDistribution::from(&ReferenceConfig::Samples {
            values: uniform(20),
        });
        let test = reference.compare(uniform(100).as_slice()).expect("ks");

        assert_eq!(test.reference_size, 20);
        assert!(test.statistic < 0.1);
        assert!(test.p_value > 0.5);
    }

    #[test]
    fn kolmogorov_tail_matches_known_critical_value() {
        let p = kolmogorov_p_value(1.36);
        assert!((p - 0.05).abs() < 0.002, "p = {p}");
        assert_eq!(kolmogorov_p_value(0.0), 1.0);
        assert_eq!(kolmogorov_p_value(f64::NAN), 1.0);
        assert!(kolmogorov_p_value(3.0) < 1e-6);
    }

    #[test]
    fn rejects_empty_and_non_finite_samples() {
        assert!(two_sample_ks(&[], &[0.5]).is_err());
        assert!(two_sample_ks(&[0.5], &[]).is_err());
        assert!(two_sample_ks(&[0.5, f64::INFINITY], &[0.5]).is_err());
        assert!(
            ReferenceDistribution::Samples(Vec::new())
                .compare(&[0.5])
                .is_err()
        );
    }
}
