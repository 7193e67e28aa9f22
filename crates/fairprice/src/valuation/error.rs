use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::Field;

/// Point in the pipeline where the comparable count was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStage {
    /// After manual exclusions and dropping unpriced comparables.
    Admitted,
    /// After the outlier filter.
    Filtered,
}

impl fmt::Display for SampleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleStage::Admitted => f.write_str("after exclusions"),
            SampleStage::Filtered => f.write_str("after outlier filtering"),
        }
    }
}

/// Typed failure of a valuation. No partial result accompanies any variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValuationError {
    #[error("need at least {required} comparables, found {found} {stage}")]
    InsufficientComparables {
        found: usize,
        required: usize,
        stage: SampleStage,
    },
    #[error("target listing is missing `{field}`, which the valuation requires")]
    InsufficientData { field: Field },
    #[error("invalid valuation options: {reason}")]
    InvalidOptions { reason: String },
    #[error("could not build the critical value distribution: {reason}")]
    Distribution { reason: String },
}

impl ValuationError {
    pub const fn kind(&self) -> &'static str {
        match self {
            ValuationError::InsufficientComparables { .. } => "insufficient_comparables",
            ValuationError::InsufficientData { .. } => "insufficient_data",
            ValuationError::InvalidOptions { .. } => "invalid_options",
            ValuationError::Distribution { .. } => "distribution",
        }
    }
}
