use std::cmp::Ordering;

use credit_config::{BinningStrategy, DEFAULT_BINS, DEFAULT_SMOOTHING, DriftConfig};
use serde::{Deserialize, Serialize};

use crate::error::DriftError;

const OPERATION: &str = "stability_index";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinOccupancy {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
    pub observed: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityIndex {
    pub value: f64,
    pub bins: Vec<BinOccupancy>,
}

/// Population stability index over binned probabilities:
/// `sum((a - e) * ln((a + eps) / (e + eps)))`.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityIndexCalculator {
    bins: usize,
    strategy: BinningStrategy,
    smoothing: f64,
    baseline: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bin {
    lower: f64,
    upper: f64,
    count: usize,
}

impl Default for StabilityIndexCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_BINS, BinningStrategy::Deciles)
    }
}

impl StabilityIndexCalculator {
    pub fn new(bins: usize, strategy: BinningStrategy) -> Self {
        Self {
            bins,
            strategy,
            smoothing: DEFAULT_SMOOTHING,
            baseline: None,
        }
    }

    pub fn from_config(config: &DriftConfig) -> Self {
        let calculator = Self::new(config.bins, config.binning).with_smoothing(config.smoothing);
        match &config.baseline {
            Some(baseline) => calculator.with_baseline(baseline.clone()),
            None => calculator,
        }
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Expected proportions per fixed decile bin, aligned by bin index. Ignored
    /// under quantile binning, whose cut-points move with every sample.
    pub fn with_baseline(mut self, baseline: Vec<f64>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn compute(&self, values: &[f64]) -> Result<StabilityIndex, DriftError> {
        if values.is_empty() {
            return Err(DriftError::computation(
                OPERATION,
                "cannot bin an empty sample",
            ));
        }
        if values.iter().any(|value| !value.is_finite()) {
            return Err(DriftError::computation(
                OPERATION,
                "sample contains non-finite values",
            ));
        }
        if self.bins == 0 {
            return Err(DriftError::computation(
                OPERATION,
                "bin count must be at least 1",
            ));
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|left, right| left.partial_cmp(right).unwrap_or(Ordering::Equal));

        let bins = match self.strategy {
            BinningStrategy::Deciles => self.fixed_width_bins(sorted.as_slice()),
            BinningStrategy::Quantile => self.quantile_bins(sorted.as_slice()),
        };
        if bins.is_empty() {
            return Err(DriftError::computation(
                OPERATION,
                "binning produced no bins",
            ));
        }

        let expected = self.expected_proportions(bins.len());
        let total = sorted.len() as f64;
        let mut psi = 0.0f64;
        let mut occupancy = Vec::with_capacity(bins.len());
        for (bin, expected) in bins.iter().zip(expected) {
            let observed = bin.count as f64 / total;
            psi += (observed - expected)
                * ((observed + self.smoothing) / (expected + self.smoothing)).ln();
            occupancy.push(BinOccupancy {
                lower: bin.lower,
                upper: bin.upper,
                count: bin.count as u64,
                observed,
                expected,
            });
        }

        if !psi.is_finite() {
            return Err(DriftError::computation(
                OPERATION,
                format!("stability index is not finite ({psi})"),
            ));
        }
        // -0.0 reads as a sign flip in reports.
        let value = if psi == 0.0 { 0.0 } else { psi };

        Ok(StabilityIndex {
            value,
            bins: occupancy,
        })
    }

    fn expected_proportions(&self, produced: usize) -> Vec<f64> {
        if let Some(baseline) = &self.baseline {
            if self.strategy == BinningStrategy::Quantile {
                tracing::warn!(
                    "baseline is ignored under quantile binning, using a uniform reference"
                );
                return vec![1.0 / produced as f64; produced];
            }
            if produced == self.bins && baseline.len() == produced {
                return baseline.clone();
            }
            tracing::warn!(
                baseline_bins = baseline.len(),
                produced_bins = produced,
                "baseline does not align with the produced bins, using a uniform reference"
            );
        }
        vec![1.0 / produced as f64; produced]
    }

    /// Equal-width cut-points over [0, 1]. A sample of one repeated value is a
    /// single bin, so it scores zero.
    fn fixed_width_bins(&self, sorted: &[f64]) -> Vec<Bin> {
        let (lowest, highest) = (sorted[0], sorted[sorted.len() - 1]);
        if lowest == highest {
            return vec![Bin {
                lower: lowest,
                upper: highest,
                count: sorted.len(),
            }];
        }

        let width = 1.0 / self.bins as f64;
        let mut bins = (0..self.bins)
            .map(|index| Bin {
                lower: index as f64 * width,
                upper: (index + 1) as f64 * width,
                count: 0,
            })
            .collect::<Vec<_>>();
        let last = self.bins - 1;
        for value in sorted {
            let index = (value * self.bins as f64).floor();
            let index = if index <= 0.0 {
                0
            } else {
                (index as usize).min(last)
            };
            bins[index].count += 1;
        }
        bins
    }

    /// Rank-based quantile cut-points taken from the sample itself; duplicate
    /// cut-points are dropped, so heavy ties yield fewer bins.
    fn quantile_bins(&self, sorted: &[f64]) -> Vec<Bin> {
        let mut edges = (0..=self.bins)
            .map(|step| quantile(sorted, step as f64 / self.bins as f64))
            .collect::<Vec<_>>();
        edges.dedup();

        if edges.len() < 2 {
            return vec![Bin {
                lower: sorted[0],
                upper: sorted[sorted.len() - 1],
                count: sorted.len(),
            }];
        }

        let mut bins = edges
            .windows(2)
            .map(|pair| Bin {
                lower: pair[0],
                upper: pair[1],
                count: 0,
            })
            .collect::<Vec<_>>();
        let last = bins.len() - 1;
        let upper_edges = &edges[1..];
        for value in sorted {
            // Right-closed intervals; the minimum lands in the first bin.
            let index = upper_edges.partition_point(|edge| edge < value).min(last);
            bins[index].count += 1;
        }
        bins
    }
}

fn quantile(sorted: &[f64], fraction: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * fraction.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
