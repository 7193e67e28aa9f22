use crate::infra::{build_engine, parse_confidence, read_target};
use chrono::Local;
use clap::Args;
use fairprice::comparables::ComparableImporter;
use fairprice::config::AppConfig;
use fairprice::error::AppError;
use fairprice::valuation::{
    Comparable, ComparableSet, CriticalDistribution, PropertyRecord, RepairLevel, SampleWarning,
    SourceRef, ValuationOverrides, ValuationResult, ViewType,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Target listing as a JSON document
    #[arg(long)]
    pub(crate) target: PathBuf,
    /// Comparable listings as CSV (header row) or a JSON array
    #[arg(long)]
    pub(crate) comparables: PathBuf,
    /// Minimum number of comparables required
    #[arg(long)]
    pub(crate) min_comparables: Option<usize>,
    /// Outlier threshold in standard deviations
    #[arg(long)]
    pub(crate) sigma: Option<f64>,
    /// Keep every comparable regardless of its price per m²
    #[arg(long)]
    pub(crate) no_outlier_filter: bool,
    /// Confidence level, e.g. 0.9 or 95%
    #[arg(long, value_parser = parse_confidence)]
    pub(crate) confidence: Option<f64>,
    /// Proceed below the minimum sample size and flag the result
    #[arg(long)]
    pub(crate) allow_low_confidence: bool,
    /// Drop comparables whose district, house type or other fixed parameters differ
    #[arg(long)]
    pub(crate) require_fixed_match: bool,
    /// Exclude a comparable by source; repeatable
    #[arg(long = "exclude")]
    pub(crate) excluded: Vec<String>,
    /// Coefficient table JSON replacing the configured one
    #[arg(long)]
    pub(crate) coefficients: Option<PathBuf>,
    /// Print the full result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

impl EvaluateArgs {
    fn overrides(&self) -> ValuationOverrides {
        ValuationOverrides {
            filter_outliers: self.no_outlier_filter.then_some(false),
            outlier_sigma: self.sigma,
            min_comparables: self.min_comparables,
            confidence_level: self.confidence,
            require_fixed_match: self.require_fixed_match.then_some(true),
            allow_low_confidence: self.allow_low_confidence.then_some(true),
            ..ValuationOverrides::default()
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = build_engine(&config.valuation, args.coefficients.as_deref())?;

    let target = read_target(&args.target)?;
    let mut comparables = ComparableImporter::from_path(&args.comparables)?;
    for source in &args.excluded {
        if !comparables.exclude(&SourceRef(source.clone())) {
            eprintln!("warning: no comparable with source '{source}' to exclude");
        }
    }

    let options = args.overrides().apply(&config.valuation.defaults);
    let result = engine.evaluate(&target, &comparables, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_valuation(&target, &result));
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = build_engine(&config.valuation, None)?;
    let target = demo_target();
    let result = engine.evaluate(&target, &demo_comparables(), &config.valuation.defaults)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "Fair price demo ({})",
        Local::now().date_naive().format("%Y-%m-%d")
    );
    println!("{}", render_valuation(&target, &result));
    Ok(())
}

/// Premium-finish flat with a water view and three standard-finish neighbours.
pub(crate) fn demo_target() -> PropertyRecord {
    PropertyRecord {
        price: Some(8_500_000.0),
        total_area: Some(50.0),
        repair_level: Some(RepairLevel::Premium),
        ceiling_height: Some(3.0),
        bathrooms: Some(2),
        view_type: Some(ViewType::Water),
        ..PropertyRecord::new("demo:target")
    }
}

pub(crate) fn demo_comparables() -> ComparableSet {
    [
        ("demo:comparable-1", 8_200_000.0, 48.0, 2.7),
        ("demo:comparable-2", 8_450_000.0, 51.0, 2.8),
        ("demo:comparable-3", 9_000_000.0, 55.0, 2.9),
    ]
    .into_iter()
    .map(|(source, price, area, ceiling)| {
        Comparable::from(PropertyRecord {
            price: Some(price),
            total_area: Some(area),
            repair_level: Some(RepairLevel::Standard),
            ceiling_height: Some(ceiling),
            bathrooms: Some(1),
            view_type: Some(ViewType::Street),
            ..PropertyRecord::new(source)
        })
    })
    .collect()
}

pub(crate) fn render_valuation(target: &PropertyRecord, result: &ValuationResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Target: {}", target.source));
    lines.push(format!(
        "Comparables used: {} (outliers: {}, excluded: {}, unpriced: {}, fixed mismatches: {})",
        result.sample_size,
        result.outliers.len(),
        result.excluded_sources.len(),
        result.unpriced_sources.len(),
        result.fixed_mismatches.len()
    ));
    lines.push(format!(
        "Base price per m2: {}",
        format_amount(result.base_price_per_sqm)
    ));

    if result.adjustments.is_empty() {
        lines.push("Adjustments: none (target matches the comparable baseline)".to_string());
    } else {
        lines.push("Adjustments:".to_string());
        for adjustment in result.adjustments.values() {
            lines.push(format!("  - {}", adjustment.description));
        }
    }

    let clamped = if result.multiplier_clamped {
        " (clamped)"
    } else {
        ""
    };
    lines.push(format!(
        "Multiplier: raw {:.3} -> final {:.3}{}",
        result.raw_multiplier, result.final_multiplier, clamped
    ));
    lines.push(format!(
        "Fair price: {} per m2, {} total",
        format_amount(result.fair_price_per_sqm),
        format_amount(result.fair_price_total)
    ));
    lines.push(format!(
        "Asking price: {} ({:+.1}%, {})",
        format_amount(result.current_price),
        result.price_diff_percent,
        result.classification.label()
    ));

    let interval = &result.confidence_interval;
    let method = match interval.distribution {
        Some(CriticalDistribution::Normal) => "normal".to_string(),
        Some(CriticalDistribution::StudentT { degrees_of_freedom }) => {
            format!("Student-t, {degrees_of_freedom} df")
        }
        None => "single sample".to_string(),
    };
    lines.push(format!(
        "{:.0}% interval: {} - {} per m2, {} - {} total ({})",
        interval.confidence_level * 100.0,
        format_amount(interval.lower),
        format_amount(interval.upper),
        format_amount(interval.total.lower),
        format_amount(interval.total.upper),
        method
    ));

    for rejected in &result.outliers {
        lines.push(format!("Outlier {}: {}", rejected.source, rejected.reason));
    }
    for warning in &result.warnings {
        let message = match warning {
            SampleWarning::SingleSample => "only one comparable; the interval has no width".to_string(),
            SampleWarning::ZeroVariance => "all comparables share one price per m2".to_string(),
            SampleWarning::LowConfidence { found, required } => {
                format!("low confidence: {found} comparables, {required} recommended")
            }
        };
        lines.push(format!("Warning: {message}"));
    }
    lines.push(format!(
        "Coefficient table: {}",
        result.coefficient_table_version
    ));

    lines.join("\n")
}

/// Whole currency units with comma thousands separators.
pub(crate) fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
