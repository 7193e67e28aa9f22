use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::valuation::domain::{
    Comparable, ComparableSet, PropertyRecord, RepairLevel, ViewType,
};
use crate::valuation::engine::{ValuationEngine, ValuationOptions};
use crate::valuation::router::ValuationState;
use crate::valuation::CoefficientTable;

pub(super) fn options() -> ValuationOptions {
    ValuationOptions {
        reference_year: 2025,
        ..ValuationOptions::default()
    }
}

pub(super) fn engine() -> ValuationEngine {
    ValuationEngine::new(CoefficientTable::default())
}

pub(super) fn priced(source: &str, price: f64, total_area: f64) -> PropertyRecord {
    PropertyRecord {
        price: Some(price),
        total_area: Some(total_area),
        ..PropertyRecord::new(source)
    }
}

/// Premium-finish flat with a water view, priced below its neighbourhood.
pub(super) fn scenario_target() -> PropertyRecord {
    PropertyRecord {
        repair_level: Some(RepairLevel::Premium),
        ceiling_height: Some(3.0),
        bathrooms: Some(2),
        view_type: Some(ViewType::Water),
        build_year: Some(2018),
        ..priced("https://listings.example/target", 8_500_000.0, 50.0)
    }
}

fn scenario_comparable(source: &str, price: f64, total_area: f64, ceiling: f64) -> Comparable {
    Comparable::from(PropertyRecord {
        repair_level: Some(RepairLevel::Standard),
        ceiling_height: Some(ceiling),
        bathrooms: Some(1),
        view_type: Some(ViewType::Street),
        ..priced(source, price, total_area)
    })
}

pub(super) fn scenario_comparables() -> ComparableSet {
    ComparableSet::new(vec![
        scenario_comparable("https://listings.example/a", 8_200_000.0, 48.0, 2.7),
        scenario_comparable("https://listings.example/b", 8_450_000.0, 51.0, 2.8),
        scenario_comparable("https://listings.example/c", 9_000_000.0, 55.0, 2.9),
    ])
}

/// Five comparables around 200,000 per m² with one listing at ten times that.
pub(super) fn comparables_with_outlier() -> ComparableSet {
    [
        ("a", 10_000_000.0),
        ("b", 10_250_000.0),
        ("c", 9_900_000.0),
        ("d", 10_100_000.0),
        ("e", 100_000_000.0),
    ]
    .into_iter()
    .map(|(source, price)| priced(source, price, 50.0))
    .collect()
}

pub(super) fn state(defaults: ValuationOptions) -> Arc<ValuationState> {
    Arc::new(ValuationState {
        engine: Arc::new(engine()),
        defaults,
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
