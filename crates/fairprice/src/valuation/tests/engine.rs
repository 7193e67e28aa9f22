use super::common::*;
use crate::valuation::domain::{
    Comparable, ComparableSet, Field, FixedParameters, PropertyRecord, SourceRef,
    VariableParameter,
};
use crate::valuation::engine::{SampleWarning, ValuationOptions};
use crate::valuation::error::{SampleStage, ValuationError};
use crate::valuation::fair_price::PriceClassification;
use crate::valuation::interval::CriticalDistribution;
use crate::valuation::normalizer::QualityFlag;

#[test]
fn scenario_is_underpriced_with_clamped_multiplier() {
    let result = engine()
        .evaluate(&scenario_target(), &scenario_comparables(), &options())
        .expect("scenario evaluates");

    assert!((result.base_price_per_sqm - 8_450_000.0 / 51.0).abs() < 1e-6);
    assert!((result.raw_multiplier - 1.72125).abs() < 1e-3);
    assert_eq!(result.final_multiplier, 1.4);
    assert!(result.multiplier_clamped);
    assert!((result.fair_price_total - 11_598_039.2).abs() < 1.0);
    assert!((result.price_diff_percent + 26.71).abs() < 0.01);
    assert_eq!(result.classification, PriceClassification::Underpriced);

    let applied: Vec<VariableParameter> = result.adjustments.keys().copied().collect();
    assert_eq!(
        applied,
        vec![
            VariableParameter::RepairLevel,
            VariableParameter::CeilingHeight,
            VariableParameter::Bathrooms,
            VariableParameter::ViewType,
        ]
    );
    assert_eq!(result.sample_size, 3);
    assert!(result.outliers.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(
        result.confidence_interval.distribution,
        Some(CriticalDistribution::StudentT {
            degrees_of_freedom: 2.0
        })
    );
    assert!(result.confidence_interval.lower < result.base_price_per_sqm);
    assert!(result.confidence_interval.total.upper > result.fair_price_total);
}

#[test]
fn evaluation_is_deterministic() {
    let engine = engine();
    let first = engine
        .evaluate(&scenario_target(), &scenario_comparables(), &options())
        .expect("first run");
    let second = engine
        .evaluate(&scenario_target(), &scenario_comparables(), &options())
        .expect("second run");
    assert_eq!(first, second);
}

#[test]
fn ten_times_outlier_is_rejected_and_reported() {
    let target = priced("target", 10_000_000.0, 50.0);
    let result = engine()
        .evaluate(&target, &comparables_with_outlier(), &options())
        .expect("evaluation succeeds");

    assert_eq!(result.sample_size, 4);
    assert_eq!(result.outliers.len(), 1);
    let rejected = &result.outliers[0];
    assert_eq!(rejected.source, SourceRef("e".to_string()));
    assert!(rejected.rejection.deviation_sigmas > 3.0);
    assert!(!rejected.reason.is_empty());
    assert!(result.base_price_per_sqm < 210_000.0);
}

#[test]
fn disabling_the_filter_keeps_outliers() {
    let target = priced("target", 10_000_000.0, 50.0);
    let options = ValuationOptions {
        filter_outliers: false,
        ..options()
    };
    let result = engine()
        .evaluate(&target, &comparables_with_outlier(), &options)
        .expect("evaluation succeeds");
    assert_eq!(result.sample_size, 5);
    assert!(result.outliers.is_empty());
}

#[test]
fn near_identical_comparables_keep_a_one_percent_deviation() {
    let comparables: ComparableSet = [
        ("a", 7_500_000.0),
        ("b", 7_500_000.0),
        ("c", 7_500_000.0),
        ("d", 7_500_000.0),
        ("e", 7_575_000.0),
    ]
    .into_iter()
    .map(|(source, price)| priced(source, price, 50.0))
    .collect();

    let result = engine()
        .evaluate(&priced("target", 7_500_000.0, 50.0), &comparables, &options())
        .expect("evaluation succeeds");

    assert!(result.outliers.is_empty());
    assert_eq!(result.sample_size, 5);
    assert_eq!(result.base_price_per_sqm, 150_000.0);
}

#[test]
fn minimum_sample_is_rechecked_after_filtering() {
    let target = priced("target", 10_000_000.0, 50.0);
    let options = ValuationOptions {
        min_comparables: 5,
        ..options()
    };
    let error = engine()
        .evaluate(&target, &comparables_with_outlier(), &options)
        .expect_err("filtering leaves four comparables");
    assert_eq!(
        error,
        ValuationError::InsufficientComparables {
            found: 4,
            required: 5,
            stage: SampleStage::Filtered,
        }
    );
}

#[test]
fn manual_exclusions_count_against_the_minimum() {
    let mut comparables = scenario_comparables();
    assert!(comparables.exclude(&SourceRef("https://listings.example/b".to_string())));

    let error = engine()
        .evaluate(&scenario_target(), &comparables, &options())
        .expect_err("two comparables remain");
    assert_eq!(
        error,
        ValuationError::InsufficientComparables {
            found: 2,
            required: 3,
            stage: SampleStage::Admitted,
        }
    );
}

#[test]
fn low_confidence_mode_proceeds_with_warning() {
    let mut comparables = scenario_comparables();
    comparables.exclude(&SourceRef("https://listings.example/b".to_string()));
    let options = ValuationOptions {
        allow_low_confidence: true,
        ..options()
    };

    let result = engine()
        .evaluate(&scenario_target(), &comparables, &options)
        .expect("low confidence evaluation succeeds");

    assert_eq!(result.sample_size, 2);
    assert_eq!(
        result.excluded_sources,
        vec![SourceRef("https://listings.example/b".to_string())]
    );
    assert_eq!(
        result.warnings,
        vec![SampleWarning::LowConfidence {
            found: 2,
            required: 3
        }]
    );
}

#[test]
fn low_confidence_mode_still_needs_one_comparable() {
    let options = ValuationOptions {
        allow_low_confidence: true,
        ..options()
    };
    let error = engine()
        .evaluate(&scenario_target(), &ComparableSet::default(), &options)
        .expect_err("empty set fails");
    assert!(matches!(
        error,
        ValuationError::InsufficientComparables { found: 0, .. }
    ));
}

#[test]
fn single_comparable_yields_zero_width_interval() {
    let comparables: ComparableSet = [priced("only", 9_000_000.0, 50.0)].into_iter().collect();
    let options = ValuationOptions {
        min_comparables: 1,
        ..options()
    };
    let result = engine()
        .evaluate(&priced("target", 9_000_000.0, 50.0), &comparables, &options)
        .expect("single comparable evaluates");

    assert_eq!(result.warnings, vec![SampleWarning::SingleSample]);
    assert_eq!(result.confidence_interval.margin, 0.0);
    assert_eq!(result.classification, PriceClassification::Fair);
}

#[test]
fn identical_comparables_warn_about_zero_variance() {
    let comparables: ComparableSet = ["a", "b", "c"]
        .into_iter()
        .map(|source| priced(source, 10_000_000.0, 50.0))
        .collect();
    let result = engine()
        .evaluate(&priced("target", 10_000_000.0, 50.0), &comparables, &options())
        .expect("uniform sample evaluates");

    assert_eq!(result.sample_size, 3);
    assert!(result.outliers.is_empty());
    assert_eq!(result.warnings, vec![SampleWarning::ZeroVariance]);
    assert_eq!(result.final_multiplier, 1.0);
}

#[test]
fn unpriced_comparables_are_set_aside() {
    let mut comparables = scenario_comparables();
    comparables.push(PropertyRecord {
        total_area: Some(40.0),
        ..PropertyRecord::new("no-price")
    });

    let result = engine()
        .evaluate(&scenario_target(), &comparables, &options())
        .expect("evaluation succeeds");
    assert_eq!(result.sample_size, 3);
    assert_eq!(
        result.unpriced_sources,
        vec![SourceRef("no-price".to_string())]
    );
}

#[test]
fn fixed_parameter_mismatches_are_excluded_on_request() {
    let fixed = |district: &str| FixedParameters {
        district_type: Some(district.to_string()),
        ..FixedParameters::default()
    };
    let target = PropertyRecord {
        fixed: fixed("центр"),
        ..scenario_target()
    };
    let mut comparables: Vec<Comparable> = scenario_comparables().iter().cloned().collect();
    for comparable in &mut comparables {
        comparable.record.fixed = fixed("центр");
    }
    let mut outsider = priced("outsider", 8_300_000.0, 50.0);
    outsider.fixed = fixed("спальный");
    comparables.push(Comparable::from(outsider));
    let comparables = ComparableSet::new(comparables);

    let options = ValuationOptions {
        require_fixed_match: true,
        ..options()
    };
    let result = engine()
        .evaluate(&target, &comparables, &options)
        .expect("evaluation succeeds");

    assert_eq!(result.sample_size, 3);
    assert_eq!(result.fixed_mismatches.len(), 1);
    assert_eq!(result.fixed_mismatches[0].parameters, vec!["district_type"]);

    let relaxed = engine()
        .evaluate(&target, &comparables, &super::common::options())
        .expect("evaluation succeeds");
    assert_eq!(relaxed.sample_size, 4);
}

#[test]
fn target_without_area_is_insufficient_data() {
    let target = PropertyRecord {
        total_area: None,
        price_per_sqm: None,
        ..scenario_target()
    };
    let error = engine()
        .evaluate(&target, &scenario_comparables(), &options())
        .expect_err("area is required");
    assert_eq!(
        error,
        ValuationError::InsufficientData {
            field: Field::TotalArea
        }
    );
}

#[test]
fn invalid_options_are_rejected_before_any_work() {
    let options = ValuationOptions {
        confidence_level: 1.5,
        ..options()
    };
    let error = engine()
        .evaluate(&scenario_target(), &ComparableSet::default(), &options)
        .expect_err("options are invalid");
    assert_eq!(error.kind(), "invalid_options");
}

#[test]
fn target_quality_flags_are_reported() {
    let target = PropertyRecord {
        price_per_sqm: Some(100_000.0),
        ceiling_height: Some(9.0),
        ..scenario_target()
    };
    let result = engine()
        .evaluate(&target, &scenario_comparables(), &options())
        .expect("evaluation succeeds");
    assert!(result
        .target_quality
        .contains(&QualityFlag::PricePerSqmRecomputed));
    assert!(result
        .target_quality
        .contains(&QualityFlag::CeilingOutOfRange));
    assert!(!result
        .adjustments
        .contains_key(&VariableParameter::CeilingHeight));
    assert_eq!(result.coefficient_table_version, "standard-2024.1");
}
