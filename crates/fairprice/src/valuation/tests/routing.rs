use super::common::*;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::valuation::router::{evaluate_handler, ValuationOverrides, ValuationRequest};
use crate::valuation::{valuation_router, ComparableSet};

fn request(comparables: ComparableSet) -> ValuationRequest {
    ValuationRequest {
        target: scenario_target(),
        comparables,
        options: ValuationOverrides::default(),
    }
}

#[tokio::test]
async fn evaluate_handler_returns_result() {
    let response = evaluate_handler(
        State(state(options())),
        axum::Json(request(scenario_comparables())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["classification"], "underpriced");
    assert_eq!(body["final_multiplier"], json!(1.4));
    assert_eq!(body["sample_size"], json!(3));
    assert!(body["adjustments"]["repair_level"]["coefficient_ratio"].is_number());
}

#[tokio::test]
async fn evaluate_handler_returns_unprocessable_for_small_samples() {
    let mut comparables = scenario_comparables();
    comparables.exclude(&crate::valuation::SourceRef(
        "https://listings.example/a".to_string(),
    ));

    let response =
        evaluate_handler(State(state(options())), axum::Json(request(comparables))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "insufficient_comparables");
    assert_eq!(body["found"], json!(2));
    assert_eq!(body["required"], json!(3));
    assert_eq!(body["stage"], "admitted");
}

#[tokio::test]
async fn request_overrides_take_precedence_over_defaults() {
    let mut request = request(scenario_comparables());
    request.options.min_comparables = Some(4);

    let response = evaluate_handler(State(state(options())), axum::Json(request)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["required"], json!(4));
}

#[tokio::test]
async fn valuation_route_accepts_json_payloads() {
    let router = valuation_router(Arc::new(engine()), options());
    let payload = json!({
        "target": {
            "source": "manual-1",
            "price": 8_500_000.0,
            "total_area": 50.0,
            "repair_level": "Премиум",
            "ceiling_height": 3.0,
            "bathrooms": 2,
            "view_type": "water"
        },
        "comparables": [
            { "source": "a", "price": 8_200_000.0, "total_area": 48.0, "repair_level": "стандартная", "view_type": "улица" },
            { "source": "b", "price": 8_450_000.0, "total_area": 51.0, "repair_level": "standard", "view_type": "street" },
            { "source": "c", "price": 9_000_000.0, "total_area": 55.0, "repair_level": "стандартная" },
            { "source": "d", "price": 1_000_000.0, "total_area": 40.0, "excluded": true }
        ],
        "options": { "confidence_level": 0.9 }
    });

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/valuations")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&payload).expect("serialize payload"),
                ))
                .expect("build request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["excluded_sources"], json!(["d"]));
    assert_eq!(body["confidence_interval"]["confidence_level"], json!(0.9));
    assert_eq!(body["aggregate"]["repair_level"], "стандартная");
}

#[tokio::test]
async fn valuation_route_rejects_malformed_json() {
    let router = valuation_router(Arc::new(engine()), options());

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/valuations")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{ not json"))
                .expect("build request"),
        )
        .await
        .expect("router response");

    assert!(response.status().is_client_error());
}
