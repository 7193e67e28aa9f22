use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::aggregate::AggregateRecord;
use super::coefficients::{CoefficientTable, FloorPosition};
use super::domain::{Categorical, Field, ParameterCluster, PropertyRecord, VariableParameter};
use super::error::ValuationError;

/// Continuous values closer than this count as equal and are not adjusted.
const VALUE_TOLERANCE: f64 = 1e-6;
/// Ratios this close to one are coefficient ties and are not reported.
const RATIO_TOLERANCE: f64 = 1e-12;

/// Business guardrail on the combined adjustment multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for MultiplierBounds {
    fn default() -> Self {
        Self { min: 0.7, max: 1.4 }
    }
}

impl MultiplierBounds {
    pub fn clamp(&self, raw: f64) -> f64 {
        raw.clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min <= 0.0 {
            return Err(format!(
                "multiplier bounds must be positive and finite, got [{}, {}]",
                self.min, self.max
            ));
        }
        if self.min > self.max {
            return Err(format!(
                "multiplier lower bound {} exceeds upper bound {}",
                self.min, self.max
            ));
        }
        Ok(())
    }
}

/// Asking price relative to the estimated fair price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceClassification {
    Overpriced,
    Underpriced,
    Fair,
}

impl PriceClassification {
    /// `band_percent` is the symmetric tolerance around the fair price; the
    /// boundary itself still counts as fair.
    pub fn classify(price_diff_percent: f64, band_percent: f64) -> Self {
        if price_diff_percent > band_percent {
            PriceClassification::Overpriced
        } else if price_diff_percent < -band_percent {
            PriceClassification::Underpriced
        } else {
            PriceClassification::Fair
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PriceClassification::Overpriced => "overpriced",
            PriceClassification::Underpriced => "underpriced",
            PriceClassification::Fair => "fair",
        }
    }
}

/// A compared attribute value, numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Category(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Number(value) => write!(f, "{value}"),
            ParameterValue::Category(label) => f.write_str(label),
        }
    }
}

/// One applied price adjustment, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub cluster: ParameterCluster,
    pub target_value: ParameterValue,
    pub aggregate_value: ParameterValue,
    pub target_coefficient: f64,
    pub aggregate_coefficient: f64,
    pub coefficient_ratio: f64,
    pub description: String,
}

/// Output of the calculator before the confidence interval is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairPrice {
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
}

struct Comparison {
    target: ParameterValue,
    aggregate: ParameterValue,
    target_coefficient: f64,
    aggregate_coefficient: f64,
}

/// Applies coefficient ratios for every variable parameter where the target
/// differs from the comparable baseline.
pub struct FairPriceCalculator<'a> {
    table: &'a CoefficientTable,
    bounds: MultiplierBounds,
    fair_band_percent: f64,
    reference_year: i32,
}

impl<'a> FairPriceCalculator<'a> {
    pub fn new(
        table: &'a CoefficientTable,
        bounds: MultiplierBounds,
        fair_band_percent: f64,
        reference_year: i32,
    ) -> Self {
        Self {
            table,
            bounds,
            fair_band_percent,
            reference_year,
        }
    }

    pub fn calculate(
        &self,
        target: &PropertyRecord,
        aggregate: &AggregateRecord,
        base_price_per_sqm: f64,
    ) -> Result<FairPrice, ValuationError> {
        let area = target
            .total_area
            .filter(|area| area.is_finite() && *area > 0.0)
            .ok_or(ValuationError::InsufficientData {
                field: Field::TotalArea,
            })?;
        let current_price = target
            .price
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or(ValuationError::InsufficientData {
                field: Field::Price,
            })?;

        let adjustments = self.adjustments(target, aggregate, base_price_per_sqm);
        let raw_multiplier: f64 = adjustments
            .values()
            .map(|adjustment| adjustment.coefficient_ratio)
            .product();
        let final_multiplier = self.bounds.clamp(raw_multiplier);

        let fair_price_per_sqm = base_price_per_sqm * final_multiplier;
        let fair_price_total = fair_price_per_sqm * area;
        let price_diff_amount = current_price - fair_price_total;
        let price_diff_percent = price_diff_amount / fair_price_total * 100.0;

        Ok(FairPrice {
            adjustments,
            raw_multiplier,
            final_multiplier,
            multiplier_clamped: final_multiplier != raw_multiplier,
            fair_price_per_sqm,
            fair_price_total,
            current_price,
            price_diff_amount,
            price_diff_percent,
            classification: PriceClassification::classify(
                price_diff_percent,
                self.fair_band_percent,
            ),
        })
    }

    /// Ratios `coef(target) / coef(baseline)` for the parameters that differ.
    /// Adjusting only the delta keeps the baseline's own characteristics out
    /// of the multiplier.
    ///
    /// Liquidity is compared last, on values implied by the comparable base
    /// price per m², so the asking price never feeds its own valuation.
    pub fn adjustments(
        &self,
        target: &PropertyRecord,
        aggregate: &AggregateRecord,
        base_price_per_sqm: f64,
    ) -> BTreeMap<VariableParameter, Adjustment> {
        let mut adjustments = BTreeMap::new();
        let parameters = VariableParameter::ATTRIBUTES
            .into_iter()
            .chain([VariableParameter::PriceTier]);

        for parameter in parameters {
            let Some(comparison) = self.compare(parameter, target, aggregate, base_price_per_sqm)
            else {
                continue;
            };

            let mut ratio = comparison.target_coefficient / comparison.aggregate_coefficient;
            if parameter == VariableParameter::ViewType {
                ratio = self.table.view.cap_ratio(ratio);
            }
            if !ratio.is_finite() || (ratio - 1.0).abs() <= RATIO_TOLERANCE {
                continue;
            }

            let description = format!(
                "{}: {} vs comparables' {} (x{:.3})",
                parameter.label(),
                comparison.target,
                comparison.aggregate,
                ratio
            );
            adjustments.insert(
                parameter,
                Adjustment {
                    cluster: parameter.cluster(),
                    target_value: comparison.target,
                    aggregate_value: comparison.aggregate,
                    target_coefficient: comparison.target_coefficient,
                    aggregate_coefficient: comparison.aggregate_coefficient,
                    coefficient_ratio: ratio,
                    description,
                },
            );
        }

        adjustments
    }

    fn compare(
        &self,
        parameter: VariableParameter,
        target: &PropertyRecord,
        aggregate: &AggregateRecord,
        base_price_per_sqm: f64,
    ) -> Option<Comparison> {
        let table = self.table;
        match parameter {
            VariableParameter::RepairLevel => {
                categorical(target.repair_level, aggregate.repair_level, |value| {
                    table.repair(value)
                })
            }
            VariableParameter::CeilingHeight => {
                numeric(target.ceiling_height, aggregate.ceiling_height, |value| {
                    table.ceiling_height(value)
                })
            }
            VariableParameter::Bathrooms => numeric(
                target.bathrooms.map(f64::from),
                aggregate.bathrooms,
                |value| table.bathrooms(value),
            ),
            VariableParameter::WindowType => {
                categorical(target.window_type, aggregate.window_type, |value| {
                    table.window_type(value)
                })
            }
            VariableParameter::ElevatorCount => {
                categorical(target.elevator_count, aggregate.elevator_count, |value| {
                    table.elevator_count(value)
                })
            }
            VariableParameter::LivingAreaShare => numeric(
                target.living_area_share(),
                aggregate.living_area_share,
                |value| table.living_area_share(value),
            ),
            VariableParameter::Floor => self.compare_floor(target, aggregate),
            VariableParameter::MetroDistance => numeric(
                target.metro_distance_min,
                aggregate.metro_distance_min,
                |value| table.metro_distance(value),
            ),
            VariableParameter::ViewType => {
                categorical(target.view_type, aggregate.view_type, |value| table.view(value))
            }
            VariableParameter::PhotoType => {
                categorical(target.photo_type, aggregate.photo_type, |value| {
                    table.photo_type(value)
                })
            }
            VariableParameter::ObjectStatus => {
                categorical(target.object_status, aggregate.object_status, |value| {
                    table.object_status(value)
                })
            }
            VariableParameter::BuildYear => numeric(
                target.build_year.map(f64::from),
                aggregate.build_year,
                |value| table.building_age(value, self.reference_year),
            ),
            VariableParameter::PriceTier => numeric(
                target.total_area.map(|area| base_price_per_sqm * area),
                aggregate.total_area.map(|area| base_price_per_sqm * area),
                |value| table.price_tier(value),
            ),
        }
    }

    fn compare_floor(
        &self,
        target: &PropertyRecord,
        aggregate: &AggregateRecord,
    ) -> Option<Comparison> {
        let target_floor = f64::from(target.floor?);
        let target_total = target.total_floors.map(f64::from);
        let aggregate_position = aggregate.floor_position?;

        let target_position = FloorPosition::classify(target_floor, target_total)?;
        if target_position == aggregate_position {
            return None;
        }

        Some(Comparison {
            target: ParameterValue::Category(target_position.label().to_string()),
            aggregate: ParameterValue::Category(aggregate_position.label().to_string()),
            target_coefficient: self.table.floor.lookup(target_position),
            aggregate_coefficient: self.table.floor.lookup(aggregate_position),
        })
    }
}

fn numeric<F>(target: Option<f64>, aggregate: Option<f64>, coefficient: F) -> Option<Comparison>
where
    F: Fn(f64) -> f64,
{
    let target = target.filter(|value| value.is_finite())?;
    let aggregate = aggregate.filter(|value| value.is_finite())?;
    if (target - aggregate).abs() <= VALUE_TOLERANCE {
        return None;
    }

    Some(Comparison {
        target: ParameterValue::Number(target),
        aggregate: ParameterValue::Number(aggregate),
        target_coefficient: coefficient(target),
        aggregate_coefficient: coefficient(aggregate),
    })
}

/// An `Unknown` label on either side means there is nothing to compare.
fn categorical<T, F>(target: Option<T>, aggregate: Option<T>, coefficient: F) -> Option<Comparison>
where
    T: Categorical,
    F: Fn(T) -> f64,
{
    let target = target.filter(|value| !value.is_unknown())?;
    let aggregate = aggregate.filter(|value| !value.is_unknown())?;
    if target == aggregate {
        return None;
    }

    Some(Comparison {
        target: ParameterValue::Category(target.to_string()),
        aggregate: ParameterValue::Category(aggregate.to_string()),
        target_coefficient: coefficient(target),
        aggregate_coefficient: coefficient(aggregate),
    })
}
