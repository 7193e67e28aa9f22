//! ±kσ outlier filter applied once to the comparable price-per-m² sample.

use serde::{Deserialize, Serialize};

use super::stats;

/// Scales the median absolute deviation to σ for normally distributed data.
const MAD_TO_SIGMA: f64 = 1.4826;

/// How the centre and spread of the sample are estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaEstimator {
    /// Median centre with σ from the median absolute deviation. A single
    /// extreme value cannot inflate its own threshold. When more than half
    /// the sample shares one value the MAD is zero and the classical
    /// estimate is used instead.
    #[default]
    Robust,
    /// Mean centre with the sample standard deviation.
    Classical,
}

/// Centre and σ of a sample under a given estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub center: f64,
    pub sigma: f64,
}

impl Spread {
    pub fn estimate(values: &[f64], estimator: SigmaEstimator) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }

        match estimator {
            SigmaEstimator::Classical => Some(Self {
                center: stats::mean(values)?,
                sigma: stats::sample_std_dev(values)?,
            }),
            SigmaEstimator::Robust => {
                let center = stats::median(values)?;
                let deviations: Vec<f64> =
                    values.iter().map(|value| (value - center).abs()).collect();
                let mad = stats::median(&deviations)?;
                if mad > 0.0 {
                    Some(Self {
                        center,
                        sigma: MAD_TO_SIGMA * mad,
                    })
                } else {
                    Self::estimate(values, SigmaEstimator::Classical)
                }
            }
        }
    }
}

/// Why a sample value was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRejection {
    pub index: usize,
    pub value: f64,
    pub center: f64,
    pub sigma: f64,
    pub deviation_sigmas: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl OutlierRejection {
    pub fn reason(&self) -> String {
        format!(
            "{:.0} lies {:.1}σ from {:.0}, outside [{:.0}, {:.0}]",
            self.value, self.deviation_sigmas, self.center, self.lower_bound, self.upper_bound
        )
    }
}

/// Items that passed the filter, and the ones that did not with their reason.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierSplit<T> {
    pub kept: Vec<T>,
    pub rejected: Vec<(T, OutlierRejection)>,
}

/// Keep items whose value lies within `center ± sigma_multiplier·σ`.
///
/// Fewer than two items, or a zero spread, leave the input untouched.
pub fn filter_outliers<T, F>(
    items: Vec<T>,
    value_of: F,
    sigma_multiplier: f64,
    estimator: SigmaEstimator,
) -> OutlierSplit<T>
where
    F: Fn(&T) -> f64,
{
    let values: Vec<f64> = items.iter().map(&value_of).collect();
    let spread = Spread::estimate(&values, estimator)
        .filter(|spread| spread.sigma.is_finite() && spread.sigma > 0.0);

    let Some(Spread { center, sigma }) = spread else {
        return OutlierSplit {
            kept: items,
            rejected: Vec::new(),
        };
    };

    let lower_bound = center - sigma_multiplier * sigma;
    let upper_bound = center + sigma_multiplier * sigma;

    let mut kept = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, (item, value)) in items.into_iter().zip(values).enumerate() {
        if (lower_bound..=upper_bound).contains(&value) {
            kept.push(item);
        } else {
            let rejection = OutlierRejection {
                index,
                value,
                center,
                sigma,
                deviation_sigmas: (value - center).abs() / sigma,
                lower_bound,
                upper_bound,
            };
            rejected.push((item, rejection));
        }
    }

    OutlierSplit { kept, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(values: &[f64], estimator: SigmaEstimator) -> OutlierSplit<f64> {
        filter_outliers(values.to_vec(), |value| *value, 3.0, estimator)
    }

    #[test]
    fn tenfold_value_is_rejected_in_five_item_sample() {
        let result = split(
            &[160_000.0, 165_000.0, 158_000.0, 170_000.0, 1_650_000.0],
            SigmaEstimator::Robust,
        );
        assert_eq!(result.kept.len(), 4);
        assert_eq!(result.rejected.len(), 1);
        let (value, rejection) = &result.rejected[0];
        assert_eq!(*value, 1_650_000.0);
        assert_eq!(rejection.index, 4);
        assert!(rejection.deviation_sigmas > 3.0);
        assert!(rejection.reason().contains("σ"));
    }

    #[test]
    fn identical_values_are_never_rejected() {
        let result = split(&[100.0; 6], SigmaEstimator::Robust);
        assert_eq!(result.kept.len(), 6);
        assert!(result.rejected.is_empty());

        let result = split(&[100.0; 6], SigmaEstimator::Classical);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn evenly_spread_sample_is_kept() {
        let values: Vec<f64> = (0..20).map(|step| 150_000.0 + step as f64 * 1_000.0).collect();
        for estimator in [SigmaEstimator::Robust, SigmaEstimator::Classical] {
            let result = split(&values, estimator);
            assert!(result.rejected.is_empty(), "{estimator:?} rejected values");
        }
    }

    #[test]
    fn single_value_is_a_no_op() {
        let result = split(&[42.0], SigmaEstimator::Robust);
        assert_eq!(result.kept, vec![42.0]);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn robust_estimator_keeps_documented_three_sample() {
        let result = split(&[170_833.0, 165_686.0, 163_636.0], SigmaEstimator::Robust);
        assert_eq!(result.kept.len(), 3);
    }

    #[test]
    fn classical_estimator_rejects_when_sample_is_large_enough() {
        let mut values = vec![100.0; 11];
        values[3] = 1_000.0;
        let result = split(&values, SigmaEstimator::Classical);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].1.index, 3);
    }

    #[test]
    fn robust_uses_classical_spread_when_mad_is_zero() {
        let values = [100.0, 100.0, 100.0, 100.0, 1_000.0];
        let robust = Spread::estimate(&values, SigmaEstimator::Robust).expect("spread defined");
        let classical =
            Spread::estimate(&values, SigmaEstimator::Classical).expect("spread defined");
        assert_eq!(robust, classical);
        assert_eq!(robust.center, 280.0);
        assert!((robust.sigma - 162_000.0_f64.sqrt()).abs() < 1e-9);
        assert!(split(&values, SigmaEstimator::Robust).rejected.is_empty());
    }

    #[test]
    fn near_identical_sample_keeps_a_one_percent_deviation() {
        let result = split(
            &[150_000.0, 150_000.0, 150_000.0, 150_000.0, 151_500.0],
            SigmaEstimator::Robust,
        );
        assert_eq!(result.kept.len(), 5);
        assert!(result.rejected.is_empty());
    }
}
