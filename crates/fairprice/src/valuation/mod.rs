//! Fair-price valuation of a listing against comparable listings.
//!
//! Comparables are normalized, filtered for price-per-m² outliers and
//! reduced to a median baseline. The target's price per m² is then adjusted
//! by coefficient ratios for every attribute where it differs from that
//! baseline, with the combined multiplier held inside configurable bounds.

pub mod aggregate;
pub mod coefficients;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fair_price;
pub mod interval;
pub mod normalizer;
pub mod outliers;
pub mod router;
pub mod stats;

#[cfg(test)]
mod tests;

pub use aggregate::AggregateRecord;
pub use coefficients::{CoefficientTable, CoefficientTableError, FloorPosition};
pub use domain::{
    Comparable, ComparableSet, ElevatorCount, Field, FixedParameters, ObjectStatus,
    ParameterCluster, PhotoType, PropertyRecord, RepairLevel, SourceRef, VariableParameter,
    ViewType, WindowType,
};
pub use engine::{
    FixedMismatch, RejectedComparable, SampleWarning, ValuationEngine, ValuationOptions,
    ValuationResult, ValuationStage,
};
pub use error::{SampleStage, ValuationError};
pub use fair_price::{
    Adjustment, FairPrice, FairPriceCalculator, MultiplierBounds, ParameterValue,
    PriceClassification,
};
pub use interval::{confidence_interval, ConfidenceInterval, CriticalDistribution};
pub use normalizer::{normalize, parse_number, NormalizedRecord, QualityFlag};
pub use outliers::SigmaEstimator;
pub use router::{valuation_router, ValuationOverrides, ValuationRequest};
