use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDataPlaneRows, TestConfig, TestUser};

async fn create_test_app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

fn mock_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_mock_server(&mock_server.uri()).to_app_config()
}

#[tokio::test]
async fn test_create_patient_success() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = create_test_app(config.clone()).await;

    let user_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.parent@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(12)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {
                "id": user_id,
                "name": "Test Parent",
                "email": "parent@example.com",
                "phone": "9000000002",
                "role": "patient",
                "status": "active",
                "createdAt": "2026-01-01T00:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockDataPlaneRows::patient_profile(&user_id, "P0012")
        ])))
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "childName": "Test Child",
        "parentName": "Test Parent",
        "email": "parent@example.com",
        "phone": "9000000002"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(request_body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK, "body: {}", json_response);
    assert_eq!(json_response["patient"]["patientCode"], "P0012");
}

#[tokio::test]
async fn test_create_patient_duplicate_email() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = create_test_app(config.clone()).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.dup@example.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": Uuid::new_v4().to_string() }])),
        )
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "childName": "C",
                "parentName": "P",
                "email": "dup@example.com"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_directory() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = create_test_app(config.clone()).await;

    let user_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::patient_profile(&user_id, "P0001")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Occupational Therapy", "isActive": true }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::package(&Uuid::new_v4().to_string(), 12, 18000)
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/booking-directory")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK, "body: {}", json_response);
    assert_eq!(
        json_response["directory"]["patients"][0]["patientCode"],
        "P0001"
    );
    assert!(json_response["directory"]["therapies"].is_array());
    assert!(json_response["directory"]["packages"].is_array());
}

#[tokio::test]
async fn test_unauthorized_requests() {
    let config = TestConfig::default().to_app_config();

    for (method, uri) in [("POST", "/"), ("GET", "/"), ("GET", "/booking-directory")] {
        let app = create_test_app(config.clone()).await;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "Failed for {} {}",
            method,
            uri
        );
    }
}
