use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::aggregate::{aggregate, AggregateRecord};
use super::coefficients::CoefficientTable;
use super::domain::{ComparableSet, PropertyRecord, SourceRef, VariableParameter};
use super::error::{SampleStage, ValuationError};
use super::fair_price::{Adjustment, FairPriceCalculator, MultiplierBounds, PriceClassification};
use super::interval::{confidence_interval, ConfidenceInterval};
use super::normalizer::{normalize, NormalizedRecord, QualityFlag};
use super::outliers::{filter_outliers, OutlierRejection, SigmaEstimator};
use super::stats::{self, SampleSummary};

/// Tunables of a single valuation. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationOptions {
    pub filter_outliers: bool,
    pub outlier_sigma: f64,
    pub sigma_estimator: SigmaEstimator,
    pub min_comparables: usize,
    pub confidence_level: f64,
    pub multiplier_bounds: MultiplierBounds,
    pub fair_band_percent: f64,
    /// Year building ages are measured against.
    pub reference_year: i32,
    /// Drop comparables whose known fixed parameters differ from the target's.
    pub require_fixed_match: bool,
    /// Proceed below `min_comparables` (but never with zero) and flag the
    /// result instead of failing.
    pub allow_low_confidence: bool,
}

impl Default for ValuationOptions {
    fn default() -> Self {
        Self {
            filter_outliers: true,
            outlier_sigma: 3.0,
            sigma_estimator: SigmaEstimator::Robust,
            min_comparables: 3,
            confidence_level: 0.95,
            multiplier_bounds: MultiplierBounds::default(),
            fair_band_percent: 5.0,
            reference_year: Utc::now().year(),
            require_fixed_match: false,
            allow_low_confidence: false,
        }
    }
}

impl ValuationOptions {
    pub fn validate(&self) -> Result<(), ValuationError> {
        let invalid = |reason: String| Err(ValuationError::InvalidOptions { reason });

        if self.min_comparables == 0 {
            return invalid("min_comparables must be at least 1".to_string());
        }
        if !(self.outlier_sigma.is_finite() && self.outlier_sigma > 0.0) {
            return invalid(format!(
                "outlier_sigma must be positive, got {}",
                self.outlier_sigma
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return invalid(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            ));
        }
        if !(self.fair_band_percent.is_finite() && self.fair_band_percent >= 0.0) {
            return invalid(format!(
                "fair_band_percent must be non-negative, got {}",
                self.fair_band_percent
            ));
        }
        self.multiplier_bounds
            .validate()
            .map_err(|reason| ValuationError::InvalidOptions { reason })
    }
}

/// Pipeline checkpoints reported at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationStage {
    Received,
    Filtered,
    Aggregated,
    Adjusted,
    IntervalComputed,
    Done,
    Failed,
}

/// Conditions that weaken a result without invalidating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleWarning {
    SingleSample,
    ZeroVariance,
    LowConfidence { found: usize, required: usize },
}

/// A comparable removed by the outlier filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedComparable {
    pub source: SourceRef,
    pub price_per_sqm: f64,
    pub reason: String,
    pub rejection: OutlierRejection,
}

/// A comparable dropped because its fixed parameters differ from the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedMismatch {
    pub source: SourceRef,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub base_price_per_sqm: f64,
    pub adjustments: BTreeMap<VariableParameter, Adjustment>,
    pub raw_multiplier: f64,
    pub final_multiplier: f64,
    pub multiplier_clamped: bool,
    pub fair_price_per_sqm: f64,
    pub fair_price_total: f64,
    pub current_price: f64,
    pub price_diff_amount: f64,
    pub price_diff_percent: f64,
    pub classification: PriceClassification,
    pub confidence_interval: ConfidenceInterval,
    pub sample_size: usize,
    pub sample: SampleSummary,
    pub outliers: Vec<RejectedComparable>,
    pub excluded_sources: Vec<SourceRef>,
    pub fixed_mismatches: Vec<FixedMismatch>,
    pub unpriced_sources: Vec<SourceRef>,
    pub warnings: Vec<SampleWarning>,
    pub target_quality: BTreeSet<QualityFlag>,
    pub aggregate: AggregateRecord,
    pub coefficient_table_version: String,
}

/// Runs the full valuation pipeline against an injected coefficient table.
///
/// The engine holds no mutable state; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ValuationEngine {
    table: CoefficientTable,
}

impl ValuationEngine {
    pub fn new(table: CoefficientTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CoefficientTable {
        &self.table
    }

    pub fn evaluate(
        &self,
        target: &PropertyRecord,
        comparables: &ComparableSet,
        options: &ValuationOptions,
    ) -> Result<ValuationResult, ValuationError> {
        debug!(
            stage = ?ValuationStage::Received,
            target = %target.source,
            comparables = comparables.len(),
            "valuation stage"
        );

        let outcome = self.run(target, comparables, options);
        match &outcome {
            Ok(_) => debug!(stage = ?ValuationStage::Done, "valuation stage"),
            Err(error) => debug!(
                stage = ?ValuationStage::Failed,
                kind = error.kind(),
                %error,
                "valuation stage"
            ),
        }
        outcome
    }

    fn run(
        &self,
        target: &PropertyRecord,
        comparables: &ComparableSet,
        options: &ValuationOptions,
    ) -> Result<ValuationResult, ValuationError> {
        options.validate()?;

        let target = normalize(target);
        let mut warnings = Vec::new();

        let mut excluded_sources = Vec::new();
        let mut fixed_mismatches = Vec::new();
        let mut unpriced_sources = Vec::new();
        let mut admitted: Vec<(NormalizedRecord, f64)> = Vec::new();

        for comparable in comparables {
            let source = &comparable.record.source;
            if comparable.excluded {
                excluded_sources.push(source.clone());
                continue;
            }

            let normalized = normalize(&comparable.record);
            if options.require_fixed_match {
                let parameters = target.record.fixed.mismatches(&normalized.record.fixed);
                if !parameters.is_empty() {
                    debug!(%source, ?parameters, "comparable fixed parameters differ");
                    fixed_mismatches.push(FixedMismatch {
                        source: source.clone(),
                        parameters: parameters.into_iter().map(str::to_string).collect(),
                    });
                    continue;
                }
            }

            match normalized.price_per_sqm() {
                Some(price_per_sqm) => admitted.push((normalized, price_per_sqm)),
                None => unpriced_sources.push(source.clone()),
            }
        }

        check_sample(admitted.len(), SampleStage::Admitted, options, &mut warnings)?;

        let mut outliers = Vec::new();
        let used = if options.filter_outliers {
            let split = filter_outliers(
                admitted,
                |(_, price_per_sqm)| *price_per_sqm,
                options.outlier_sigma,
                options.sigma_estimator,
            );
            for ((record, price_per_sqm), rejection) in split.rejected {
                let reason = rejection.reason();
                debug!(source = %record.record.source, %reason, "comparable rejected as outlier");
                outliers.push(RejectedComparable {
                    source: record.record.source,
                    price_per_sqm,
                    reason,
                    rejection,
                });
            }
            split.kept
        } else {
            admitted
        };
        debug!(
            stage = ?ValuationStage::Filtered,
            kept = used.len(),
            rejected = outliers.len(),
            "valuation stage"
        );

        check_sample(used.len(), SampleStage::Filtered, options, &mut warnings)?;

        let values: Vec<f64> = used.iter().map(|(_, price_per_sqm)| *price_per_sqm).collect();
        let empty = || ValuationError::InsufficientComparables {
            found: 0,
            required: options.min_comparables,
            stage: SampleStage::Filtered,
        };
        let base_price_per_sqm = stats::median(&values).ok_or_else(empty)?;
        let sample = SampleSummary::from_values(&values).ok_or_else(empty)?;

        let records: Vec<&PropertyRecord> = used.iter().map(|(record, _)| &record.record).collect();
        let aggregate = aggregate(&records);
        debug!(
            stage = ?ValuationStage::Aggregated,
            base_price_per_sqm,
            "valuation stage"
        );

        let calculator = FairPriceCalculator::new(
            &self.table,
            options.multiplier_bounds,
            options.fair_band_percent,
            options.reference_year,
        );
        let fair = calculator.calculate(&target.record, &aggregate, base_price_per_sqm)?;
        debug!(
            stage = ?ValuationStage::Adjusted,
            adjustments = fair.adjustments.len(),
            raw_multiplier = fair.raw_multiplier,
            final_multiplier = fair.final_multiplier,
            "valuation stage"
        );
        if fair.multiplier_clamped {
            debug!(
                raw_multiplier = fair.raw_multiplier,
                final_multiplier = fair.final_multiplier,
                "multiplier clamped to bounds"
            );
        }

        let interval = confidence_interval(&values, base_price_per_sqm, options.confidence_level)?
            .with_total_scale(fair.fair_price_total / base_price_per_sqm);
        if interval.single_sample {
            warn!("valuation based on a single comparable; interval has zero width");
            warnings.push(SampleWarning::SingleSample);
        } else if interval.zero_variance {
            warn!("comparable prices per m² are identical; interval has zero width");
            warnings.push(SampleWarning::ZeroVariance);
        }
        debug!(
            stage = ?ValuationStage::IntervalComputed,
            margin = interval.margin,
            "valuation stage"
        );

        info!(
            sample_size = values.len(),
            classification = fair.classification.label(),
            fair_price_total = fair.fair_price_total,
            price_diff_percent = fair.price_diff_percent,
            "valuation completed"
        );

        Ok(ValuationResult {
            base_price_per_sqm,
            adjustments: fair.adjustments,
            raw_multiplier: fair.raw_multiplier,
            final_multiplier: fair.final_multiplier,
            multiplier_clamped: fair.multiplier_clamped,
            fair_price_per_sqm: fair.fair_price_per_sqm,
            fair_price_total: fair.fair_price_total,
            current_price: fair.current_price,
            price_diff_amount: fair.price_diff_amount,
            price_diff_percent: fair.price_diff_percent,
            classification: fair.classification,
            confidence_interval: interval,
            sample_size: values.len(),
            sample,
            outliers,
            excluded_sources,
            fixed_mismatches,
            unpriced_sources,
            warnings,
            target_quality: target.quality,
            aggregate,
            coefficient_table_version: self.table.version.clone(),
        })
    }
}

fn check_sample(
    found: usize,
    stage: SampleStage,
    options: &ValuationOptions,
    warnings: &mut Vec<SampleWarning>,
) -> Result<(), ValuationError> {
    let required = options.min_comparables;
    if found >= required {
        return Ok(());
    }
    if options.allow_low_confidence && found > 0 {
        warn!(found, required, %stage, "proceeding with fewer comparables than required");
        warnings.retain(|warning| !matches!(warning, SampleWarning::LowConfidence { .. }));
        warnings.push(SampleWarning::LowConfidence { found, required });
        return Ok(());
    }

    Err(ValuationError::InsufficientComparables {
        found,
        required,
        stage,
    })
}
