use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::{
    availability_routes, booking_request_routes, booking_routes, capacity_routes,
};
use scheduling_cell::slots::SLOT_CATALOG;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDataPlaneRows, TestConfig, TestUser};

fn mock_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_mock_server(&mock_server.uri()).to_app_config()
}

fn capacity_row(date: &str, count: i32, booked: i32) -> serde_json::Value {
    let sessions: Vec<serde_json::Value> = SLOT_CATALOG
        .iter()
        .map(|slot| {
            json!({
                "slotId": slot.id,
                "label": slot.label,
                "limited": slot.limited,
                "count": if slot.limited { 0 } else { count },
                "booked": if slot.limited { 0 } else { booked }
            })
        })
        .collect();
    json!({
        "id": Uuid::new_v4(),
        "date": date,
        "sessions": sessions,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z"
    })
}

fn booking_row(
    id: &Uuid,
    appointment_code: &str,
    therapist_id: &str,
    therapist_code: &str,
    sessions: &[(&str, &str)],
) -> serde_json::Value {
    let session_entries: Vec<serde_json::Value> = sessions
        .iter()
        .map(|(date, slot_id)| {
            json!({
                "date": date,
                "slotId": slot_id,
                "time": null,
                "therapistId": therapist_id,
                "therapistCode": therapist_code
            })
        })
        .collect();
    json!({
        "id": id,
        "appointmentId": appointment_code,
        "patientId": Uuid::new_v4(),
        "therapistId": therapist_id,
        "therapistCode": therapist_code,
        "therapyId": Uuid::new_v4(),
        "packageId": Uuid::new_v4(),
        "sessions": session_entries,
        "discountInfo": {
            "couponCode": null,
            "discount": 0,
            "discountEnabled": false,
            "validityDays": null,
            "dateFrom": null,
            "coupon": null
        },
        "paymentId": "INV-2026-00001",
        "status": "confirmed",
        "notes": null,
        "channel": null,
        "referral": null,
        "createdAt": "2026-03-01T00:00:00Z",
        "updatedAt": null
    })
}

fn request_row(
    id: &Uuid,
    request_code: &str,
    therapist_id: &str,
    status: &str,
    sessions: &[(&str, &str)],
) -> serde_json::Value {
    let session_entries: Vec<serde_json::Value> = sessions
        .iter()
        .map(|(date, slot_id)| json!({ "date": date, "slotId": slot_id, "time": null }))
        .collect();
    json!({
        "id": id,
        "requestId": request_code,
        "patientId": Uuid::new_v4(),
        "therapistId": therapist_id,
        "therapyId": Uuid::new_v4(),
        "packageId": Uuid::new_v4(),
        "sessions": session_entries,
        "status": status,
        "bookingId": null,
        "notes": null,
        "createdAt": "2026-03-01T00:00:00Z",
        "updatedAt": null
    })
}

/// Mounts the two directory lookups behind `list_active_directory`.
async fn mount_directory(mock_server: &MockServer, therapists: &[(&str, &str, &[&str])]) {
    let accounts: Vec<serde_json::Value> = therapists
        .iter()
        .map(|(id, code, _)| json!({ "id": id, "name": format!("Therapist {}", code) }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.therapist"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts))
        .mount(mock_server)
        .await;

    let profiles: Vec<serde_json::Value> = therapists
        .iter()
        .map(|(id, code, holidays)| MockDataPlaneRows::therapist_profile(id, code, holidays))
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profiles))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// DAILY CAPACITY
// ==============================================================================

#[tokio::test]
async fn test_get_day_creates_blank_row() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/daily_capacity"))
        .and(query_param("date", "eq.2026-03-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/daily_capacity"))
        .and(body_partial_json(json!({ "date": "2026-03-02" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([capacity_row("2026-03-02", 0, 0)])),
        )
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/2026-03-02")
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
    assert_eq!(json_response["success"], true);
    let sessions = json_response["day"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 15);
    assert!(sessions.iter().all(|s| s["count"] == 0 && s["booked"] == 0));
}

#[tokio::test]
async fn test_get_day_rejects_bad_date() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    let request = Request::builder()
        .method("GET")
        .uri("/02-03-2026")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_day_counts_success() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/daily_capacity"))
        .and(query_param("date", "eq.2026-03-02"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([capacity_row("2026-03-02", 5, 0)])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/daily_capacity"))
        .and(query_param("date", "eq.2026-03-02"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([capacity_row("2026-03-02", 3, 0)])),
        )
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "sessions": [
            { "slotId": "1000-1045", "count": 3 },
            { "slotId": "not-a-slot", "count": 9 }
        ]
    });

    let request = Request::builder()
        .method("PUT")
        .uri("/2026-03-02")
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
    assert_eq!(json_response["success"], true);
}

#[tokio::test]
async fn test_update_day_counts_rejects_below_booked() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/daily_capacity"))
        .and(query_param("date", "eq.2026-03-02"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([capacity_row("2026-03-02", 5, 2)])),
        )
        .mount(&mock_server)
        .await;

    // A rejected update must not write anything back.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/daily_capacity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "sessions": [{ "slotId": "1000-1045", "count": 1 }]
    });

    let request = Request::builder()
        .method("PUT")
        .uri("/2026-03-02")
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

    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", json_response);
    assert!(json_response["error"]
        .as_str()
        .unwrap()
        .contains("Cannot decrease count below current booked (2)"));
}

#[tokio::test]
async fn test_update_day_counts_requires_admin() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let patient = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    let request = Request::builder()
        .method("PUT")
        .uri("/2026-03-02")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "sessions": [] }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rollout_writes_twelve_days() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/default_capacity_setting"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{ "id": 1, "defaultCapacity": 4 }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Any 14 consecutive days hold exactly two Sundays, so the rollout
    // always upserts twelve day rows.
    Mock::given(method("POST"))
        .and(path("/rest/v1/daily_capacity"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(12)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PUT")
        .uri("/default-capacity")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "defaultCapacity": 4 }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK, "body: {}", json_response);
    assert_eq!(json_response["defaultCapacity"], 4);
    assert_eq!(json_response["daysWritten"], 12);
}

#[tokio::test]
async fn test_rollout_rejects_negative_capacity() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    let request = Request::builder()
        .method("PUT")
        .uri("/default-capacity")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "defaultCapacity": -1 }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_default_capacity_zero_when_never_set() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = capacity_routes(Arc::new(config.clone()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/default_capacity_setting"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/default-capacity")
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
    assert_eq!(json_response["defaultCapacity"], 0);
}

// ==============================================================================
// AVAILABILITY REPORT
// ==============================================================================

#[tokio::test]
async fn test_availability_report_totals_and_holidays() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = availability_routes(Arc::new(config.clone()));

    let id_a = Uuid::new_v4().to_string();
    let id_b = Uuid::new_v4().to_string();
    mount_directory(
        &mock_server,
        &[
            (&id_a, "NPL001", &["2026-03-03"]),
            (&id_b, "NPL002", &[]),
        ],
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&id_a, "NPL001", "2026-03-02", "1000-1045"),
            MockDataPlaneRows::booking_session(&id_a, "NPL001", "2026-03-02", "0830-0915")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/report?from=2026-03-02&to=2026-03-03")
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

    // Two therapists on duty on the 2nd, one booked a normal and a
    // limited slot.
    let monday = &json_response["report"]["02-03-2026"];
    assert_eq!(monday["totalAvailableSlots"], 20);
    assert_eq!(monday["totalLimitedAvailableSlots"], 10);
    assert_eq!(monday["bookedSlots"], 1);
    assert_eq!(monday["limitedBookedSlots"], 1);
    let booked = monday["BookedSlots"]["NPL001"].as_array().unwrap();
    assert!(booked.iter().any(|s| s == "1000-1045"));
    assert!(booked.iter().any(|s| s == "0830-0915"));

    // NPL001 is on holiday on the 3rd, so the ceiling drops to one
    // therapist's worth of slots.
    let tuesday = &json_response["report"]["03-03-2026"];
    assert_eq!(tuesday["totalAvailableSlots"], 10);
    assert_eq!(tuesday["totalLimitedAvailableSlots"], 5);
    assert_eq!(tuesday["bookedSlots"], 0);
}

#[tokio::test]
async fn test_availability_report_unknown_therapist_filter() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = availability_routes(Arc::new(config.clone()));

    let id_a = Uuid::new_v4().to_string();
    mount_directory(&mock_server, &[(&id_a, "NPL001", &[])]).await;

    let request = Request::builder()
        .method("GET")
        .uri(&format!(
            "/report?from=2026-03-02&to=2026-03-02&therapistId={}",
            Uuid::new_v4()
        ))
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
    assert_eq!(json_response["report"]["02-03-2026"]["totalAvailableSlots"], 0);
}

#[tokio::test]
async fn test_availability_report_requires_range_params() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = availability_routes(Arc::new(config.clone()));

    let request = Request::builder()
        .method("GET")
        .uri("/report?from=2026-03-02")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==============================================================================
// BOOKING LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn test_create_booking_success() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let package_id = Uuid::new_v4().to_string();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .and(body_json(json!({ "counter_name": "appointment" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .and(body_json(json!({ "counter_name": "payment" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .and(query_param("id", format!("eq.{}", package_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::package(&package_id, 12, 18000)
        ])))
        .mount(&mock_server)
        .await;

    let booking_id = Uuid::new_v4();
    // The resolved short code must reach the commit even though the
    // client sent a bogus one.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .and(body_partial_json(json!({
            "booking": { "therapistCode": "NPL001", "appointmentId": "APT000001" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000001",
            &therapist_id,
            "NPL001",
            &[("2026-03-02", "1000-1045")]
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": package_id,
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": therapist_id,
        "therapistCode": "HACK999",
        "sessions": [{ "date": "2026-03-02", "slotId": "1000-1045" }],
        "discountEnabled": false
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
    assert_eq!(json_response["success"], true);
    assert_eq!(json_response["booking"]["appointmentId"], "APT000001");
    assert_eq!(json_response["booking"]["sessions"][0]["therapistCode"], "NPL001");
}

#[tokio::test]
async fn test_create_booking_slot_conflict() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&therapist_id, "NPL001", "2026-03-02", "1000-1045")
        ])))
        .mount(&mock_server)
        .await;

    // A conflicting request must never reach the commit.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": Uuid::new_v4(),
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": therapist_id,
        "sessions": [
            { "date": "2026-03-02", "slotId": "1000-1045" },
            { "date": "2026-03-02", "slotId": "1045-1130" }
        ],
        "discountEnabled": false
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

    assert_eq!(status, StatusCode::CONFLICT, "body: {}", json_response);
    assert_eq!(json_response["success"], false);
    assert_eq!(
        json_response["conflicts"],
        json!([{ "date": "2026-03-02", "slotId": "1000-1045" }])
    );
}

#[tokio::test]
async fn test_create_booking_other_therapist_same_slot() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let id_a = Uuid::new_v4().to_string();
    let id_b = Uuid::new_v4().to_string();
    let package_id = Uuid::new_v4().to_string();
    mount_directory(
        &mock_server,
        &[(&id_a, "NPL001", &[]), (&id_b, "NPL002", &[])],
    )
    .await;

    // The same slot is taken, but by the other therapist.
    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&id_b, "NPL002", "2026-03-02", "1000-1045")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(2)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::package(&package_id, 12, 18000)
        ])))
        .mount(&mock_server)
        .await;

    let booking_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000002",
            &id_a,
            "NPL001",
            &[("2026-03-02", "1000-1045")]
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": package_id,
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": id_a,
        "sessions": [{ "date": "2026-03-02", "slotId": "1000-1045" }],
        "discountEnabled": false
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
    assert_eq!(json_response["success"], true);
}

#[tokio::test]
async fn test_create_booking_missing_discount_flag() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let request_body = json!({
        "package": Uuid::new_v4(),
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": Uuid::new_v4(),
        "sessions": [{ "date": "2026-03-02", "slotId": "1000-1045" }]
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

    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", json_response);
    assert!(json_response["error"]
        .as_str()
        .unwrap()
        .contains("discountEnabled"));
}

#[tokio::test]
async fn test_create_booking_discount_reduces_payment() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let package_id = Uuid::new_v4().to_string();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(3)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::package(&package_id, 12, 18000)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/coupons"))
        .and(query_param("couponCode", "eq.WELCOME10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::coupon("WELCOME10", 10, true)
        ])))
        .mount(&mock_server)
        .await;

    let booking_id = Uuid::new_v4();
    // 10% off 18000 leaves a 16200 stub.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .and(body_partial_json(json!({
            "payment": { "totalAmount": 18000, "amount": 16200, "status": "pending" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000003",
            &therapist_id,
            "NPL001",
            &[("2026-03-02", "1000-1045")]
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": package_id,
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": therapist_id,
        "sessions": [{ "date": "2026-03-02", "slotId": "1000-1045" }],
        "discountEnabled": true,
        "discount": 10,
        "couponCode": "WELCOME10"
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
}

#[tokio::test]
async fn test_update_booking_exempts_own_sessions() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let booking_id = Uuid::new_v4();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000001",
            &therapist_id,
            "NPL001",
            &[("2026-03-02", "1000-1045")]
        )])))
        .mount(&mock_server)
        .await;

    // The scan still shows the booking's own session; keeping it must
    // not count as a conflict.
    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&therapist_id, "NPL001", "2026-03-02", "1000-1045")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking_update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000001",
            &therapist_id,
            "NPL001",
            &[("2026-03-02", "1000-1045"), ("2026-03-03", "1045-1130")]
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": Uuid::new_v4(),
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": therapist_id,
        "sessions": [
            { "date": "2026-03-02", "slotId": "1000-1045" },
            { "date": "2026-03-03", "slotId": "1045-1130" }
        ],
        "discountEnabled": false
    });

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}", booking_id))
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
    assert_eq!(json_response["booking"]["sessions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_booking_not_found() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("DELETE")
        .uri(&format!("/{}", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conflict_check_endpoint_lists_pairs() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = booking_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&therapist_id, "NPL001", "2026-03-02", "1000-1045")
        ])))
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "therapist": therapist_id,
        "sessions": [
            { "date": "2026-03-02", "slotId": "1000-1045" },
            { "date": "2026-03-02", "slotId": "1500-1545" }
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri("/conflicts/check")
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

    // The dry-run endpoint reports instead of failing.
    assert_eq!(status, StatusCode::OK, "body: {}", json_response);
    assert_eq!(json_response["clear"], false);
    assert_eq!(
        json_response["conflicts"],
        json!([{ "date": "2026-03-02", "slotId": "1000-1045" }])
    );
}

// ==============================================================================
// BOOKING REQUESTS
// ==============================================================================

#[tokio::test]
async fn test_submit_booking_request_mints_code() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = booking_request_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let request_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .and(body_json(json!({ "counter_name": "request" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/booking_requests"))
        .and(body_partial_json(json!({ "requestId": "REQ00042", "status": "pending" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([request_row(
            &request_id,
            "REQ00042",
            &therapist_id,
            "pending",
            &[("2026-03-02", "1000-1045")]
        )])))
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "package": Uuid::new_v4(),
        "patient": Uuid::new_v4(),
        "therapy": Uuid::new_v4(),
        "therapist": therapist_id,
        "sessions": [{ "date": "2026-03-02", "slotId": "1000-1045" }]
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
    assert_eq!(json_response["request"]["requestId"], "REQ00042");
    assert_eq!(json_response["request"]["status"], "pending");
}

#[tokio::test]
async fn test_approve_request_runs_booking_pipeline() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_request_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let request_id = Uuid::new_v4();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    // First read sees the pending row, the re-read after the commit
    // sees it approved.
    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("id", format!("eq.{}", request_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([request_row(
            &request_id,
            "REQ00007",
            &therapist_id,
            "pending",
            &[("2026-03-02", "1000-1045")]
        )])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("id", format!("eq.{}", request_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([request_row(
            &request_id,
            "REQ00007",
            &therapist_id,
            "approved",
            &[("2026-03-02", "1000-1045")]
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_sequence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(8)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::package(&Uuid::new_v4().to_string(), 12, 18000)
        ])))
        .mount(&mock_server)
        .await;

    let booking_id = Uuid::new_v4();
    // The commit carries the request link so approval flips atomically.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .and(body_partial_json(json!({ "approveRequest": request_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booking_row(
            &booking_id,
            "APT000008",
            &therapist_id,
            "NPL001",
            &[("2026-03-02", "1000-1045")]
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/approve", request_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK, "body: {}", json_response);
    assert_eq!(json_response["request"]["status"], "approved");
}

#[tokio::test]
async fn test_approve_conflicting_request_stays_pending() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_request_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let request_id = Uuid::new_v4();
    mount_directory(&mock_server, &[(&therapist_id, "NPL001", &[])]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([request_row(
            &request_id,
            "REQ00009",
            &therapist_id,
            "pending",
            &[("2026-03-02", "1000-1045")]
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDataPlaneRows::booking_session(&therapist_id, "NPL001", "2026-03-02", "1000-1045")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/commit_booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/approve", request_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reject_already_rejected_request() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(24));
    let app = booking_request_routes(Arc::new(config.clone()));

    let therapist_id = Uuid::new_v4().to_string();
    let request_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([request_row(
            &request_id,
            "REQ00010",
            &therapist_id,
            "rejected",
            &[("2026-03-02", "1000-1045")]
        )])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/reject", request_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_approve_requires_admin() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let patient = TestUser::patient("parent@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(24));
    let app = booking_request_routes(Arc::new(config.clone()));

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/approve", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unauthorized_requests() {
    let config = TestConfig::default().to_app_config();

    let cases: Vec<(fn(Arc<AppConfig>) -> Router, &str, &str)> = vec![
        (capacity_routes, "GET", "/2026-03-02"),
        (capacity_routes, "PUT", "/default-capacity"),
        (availability_routes, "GET", "/report"),
        (booking_routes, "POST", "/"),
        (booking_routes, "GET", "/"),
        (booking_request_routes, "POST", "/"),
    ];

    for (routes, method, uri) in cases {
        let app = routes(Arc::new(config.clone()));

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
