//! Confidence interval around the base price per m².

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use super::error::ValuationError;
use super::stats;

/// Samples at least this large use the normal approximation.
pub const NORMAL_APPROXIMATION_MIN_SAMPLE: usize = 30;

/// Distribution the critical value was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriticalDistribution {
    Normal,
    StudentT { degrees_of_freedom: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledInterval {
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub confidence_level: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub margin_percent: f64,
    pub critical_value: f64,
    /// `None` for a single-sample interval, where no spread exists.
    pub distribution: Option<CriticalDistribution>,
    pub single_sample: bool,
    pub zero_variance: bool,
    /// The same interval expressed in total price.
    pub total: ScaledInterval,
}

impl ConfidenceInterval {
    /// Scale the interval to total price, e.g. by `final_multiplier × area`.
    pub fn with_total_scale(mut self, factor: f64) -> Self {
        self.total = ScaledInterval {
            lower: self.lower * factor,
            upper: self.upper * factor,
            margin: self.margin * factor,
        };
        self
    }
}

/// Two-sided interval `center ± critical · s/√n` at `level`.
///
/// A single observation or a zero spread yields a zero-width interval; the
/// flags on the result say which case applied.
pub fn confidence_interval(
    sample: &[f64],
    center: f64,
    level: f64,
) -> Result<ConfidenceInterval, ValuationError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(ValuationError::InvalidOptions {
            reason: format!("confidence level must lie in (0, 1), got {level}"),
        });
    }

    let n = sample.len();
    let (critical_value, distribution, std_dev) = match stats::sample_std_dev(sample) {
        None => (0.0, None, 0.0),
        Some(std_dev) => {
            let (critical, distribution) = critical_value(n, level)?;
            (critical, Some(distribution), std_dev)
        }
    };

    let margin = if std_dev > 0.0 {
        critical_value * std_dev / (n as f64).sqrt()
    } else {
        0.0
    };
    let margin_percent = if center != 0.0 {
        margin / center * 100.0
    } else {
        0.0
    };

    let interval = ConfidenceInterval {
        confidence_level: level,
        lower: center - margin,
        upper: center + margin,
        margin,
        margin_percent,
        critical_value,
        distribution,
        single_sample: n == 1,
        zero_variance: n > 1 && std_dev == 0.0,
        total: ScaledInterval {
            lower: center - margin,
            upper: center + margin,
            margin,
        },
    };
    Ok(interval)
}

/// Two-sided critical value for a sample of size `n`.
pub fn critical_value(
    n: usize,
    level: f64,
) -> Result<(f64, CriticalDistribution), ValuationError> {
    let quantile = 1.0 - (1.0 - level) / 2.0;

    if n >= NORMAL_APPROXIMATION_MIN_SAMPLE {
        let normal = Normal::new(0.0, 1.0).map_err(|error| ValuationError::Distribution {
            reason: error.to_string(),
        })?;
        return Ok((normal.inverse_cdf(quantile), CriticalDistribution::Normal));
    }

    let degrees_of_freedom = n.saturating_sub(1) as f64;
    let students = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|error| {
        ValuationError::Distribution {
            reason: format!("{degrees_of_freedom} degrees of freedom: {error}"),
        }
    })?;
    Ok((
        students.inverse_cdf(quantile),
        CriticalDistribution::StudentT { degrees_of_freedom },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_samples_use_student_t() {
        let (critical, distribution) = critical_value(5, 0.95).expect("critical value");
        assert!((critical - 2.776).abs() < 1e-3);
        assert_eq!(
            distribution,
            CriticalDistribution::StudentT {
                degrees_of_freedom: 4.0
            }
        );
    }

    #[test]
    fn large_samples_use_normal_quantile() {
        let (critical, distribution) = critical_value(30, 0.95).expect("critical value");
        assert!((critical - 1.96).abs() < 1e-2);
        assert_eq!(distribution, CriticalDistribution::Normal);
    }

    #[test]
    fn smaller_samples_produce_wider_margins() {
        let base = [90.0, 95.0, 100.0, 105.0, 110.0];
        let large: Vec<f64> = base.iter().copied().cycle().take(50).collect();

        let small = confidence_interval(&base, 100.0, 0.95).expect("interval");
        let large = confidence_interval(&large, 100.0, 0.95).expect("interval");

        assert!(small.margin > large.margin);
        assert!(small.lower < 100.0 && small.upper > 100.0);
    }

    #[test]
    fn single_sample_has_zero_margin() {
        let interval = confidence_interval(&[150_000.0], 150_000.0, 0.95).expect("interval");
        assert!(interval.single_sample);
        assert_eq!(interval.margin, 0.0);
        assert_eq!(interval.lower, 150_000.0);
        assert!(interval.distribution.is_none());
    }

    #[test]
    fn identical_values_have_zero_margin() {
        let interval =
            confidence_interval(&[100.0, 100.0, 100.0], 100.0, 0.95).expect("interval");
        assert!(interval.zero_variance);
        assert!(!interval.single_sample);
        assert_eq!(interval.margin, 0.0);
    }

    #[test]
    fn total_scale_multiplies_bounds() {
        let interval = confidence_interval(&[90.0, 100.0, 110.0], 100.0, 0.9)
            .expect("interval")
            .with_total_scale(50.0);
        assert!((interval.total.margin - interval.margin * 50.0).abs() < 1e-9);
        assert!((interval.total.lower - interval.lower * 50.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_levels_outside_unit_interval() {
        assert!(matches!(
            confidence_interval(&[1.0, 2.0], 1.5, 1.0),
            Err(ValuationError::InvalidOptions { .. })
        ));
    }
}
