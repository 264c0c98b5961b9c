use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use lab_results_cell::router::lab_results_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn bearer() -> String {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, Some(1));
    format!("Bearer {}", token)
}

fn extract_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract")
        .header("Authorization", bearer())
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn extract_flags_values_against_ranges() {
    let response = lab_results_routes(TestConfig::default().to_arc())
        .oneshot(extract_request(json!({
            "text": "Report header\nHemoglobin: 11.2 g/dL (12.0-15.5)\nSodium 140 mmol/L\nTSH 6.2 mIU/L"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);

    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["flag"], "low");
    assert_eq!(results[1]["flag"], "normal");
    assert_eq!(results[2]["flag"], "high");
    assert_eq!(body["data"]["abnormal_count"], 2);
    assert_eq!(body["data"]["unparsed_lines"], 1);
}

#[tokio::test]
async fn blank_text_is_a_validation_error() {
    let response = lab_results_routes(TestConfig::default().to_arc())
        .oneshot(extract_request(json!({ "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["success"], false);
}

#[tokio::test]
async fn sample_returns_text_and_report() {
    let response = lab_results_routes(TestConfig::default().to_arc())
        .oneshot(
            Request::builder()
                .uri("/sample")
                .header("Authorization", bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert!(body["data"]["text"].as_str().unwrap().contains("Hemoglobin"));
    assert_eq!(body["data"]["report"]["results"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn extraction_requires_a_session() {
    let response = lab_results_routes(TestConfig::default().to_arc())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/extract")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "text": "Glucose 90" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await, json!({ "success": false, "error": "Unauthorized" }));
}
