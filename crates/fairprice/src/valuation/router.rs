use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ComparableSet, PropertyRecord};
use super::engine::{ValuationEngine, ValuationOptions};
use super::error::ValuationError;
use super::fair_price::MultiplierBounds;
use super::outliers::SigmaEstimator;

/// Per-request option overrides; anything left out falls back to the
/// service defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationOverrides {
    pub filter_outliers: Option<bool>,
    pub outlier_sigma: Option<f64>,
    pub sigma_estimator: Option<SigmaEstimator>,
    pub min_comparables: Option<usize>,
    pub confidence_level: Option<f64>,
    pub multiplier_bounds: Option<MultiplierBounds>,
    pub fair_band_percent: Option<f64>,
    pub reference_year: Option<i32>,
    pub require_fixed_match: Option<bool>,
    pub allow_low_confidence: Option<bool>,
}

impl ValuationOverrides {
    pub fn apply(&self, defaults: &ValuationOptions) -> ValuationOptions {
        ValuationOptions {
            filter_outliers: self.filter_outliers.unwrap_or(defaults.filter_outliers),
            outlier_sigma: self.outlier_sigma.unwrap_or(defaults.outlier_sigma),
            sigma_estimator: self.sigma_estimator.unwrap_or(defaults.sigma_estimator),
            min_comparables: self.min_comparables.unwrap_or(defaults.min_comparables),
            confidence_level: self.confidence_level.unwrap_or(defaults.confidence_level),
            multiplier_bounds: self.multiplier_bounds.unwrap_or(defaults.multiplier_bounds),
            fair_band_percent: self.fair_band_percent.unwrap_or(defaults.fair_band_percent),
            reference_year: self.reference_year.unwrap_or(defaults.reference_year),
            require_fixed_match: self
                .require_fixed_match
                .unwrap_or(defaults.require_fixed_match),
            allow_low_confidence: self
                .allow_low_confidence
                .unwrap_or(defaults.allow_low_confidence),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub target: PropertyRecord,
    pub comparables: ComparableSet,
    #[serde(default)]
    pub options: ValuationOverrides,
}

/// Shared state behind the valuation routes.
pub struct ValuationState {
    pub engine: Arc<ValuationEngine>,
    pub defaults: ValuationOptions,
}

/// Router builder exposing the valuation endpoint.
pub fn valuation_router(engine: Arc<ValuationEngine>, defaults: ValuationOptions) -> Router {
    Router::new()
        .route("/api/v1/valuations", post(evaluate_handler))
        .with_state(Arc::new(ValuationState { engine, defaults }))
}

pub(crate) async fn evaluate_handler(
    State(state): State<Arc<ValuationState>>,
    axum::Json(request): axum::Json<ValuationRequest>,
) -> Response {
    let options = request.options.apply(&state.defaults);
    match state
        .engine
        .evaluate(&request.target, &request.comparables, &options)
    {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => {
            let payload = error_payload(&error);
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) fn error_payload(error: &ValuationError) -> serde_json::Value {
    let mut payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    match error {
        ValuationError::InsufficientComparables {
            found,
            required,
            stage,
        } => {
            payload["found"] = json!(found);
            payload["required"] = json!(required);
            payload["stage"] = json!(stage);
        }
        ValuationError::InsufficientData { field } => {
            payload["field"] = json!(field);
        }
        ValuationError::InvalidOptions { .. } | ValuationError::Distribution { .. } => {}
    }
    payload
}
