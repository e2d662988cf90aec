use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub data_plane_url: String,
    pub data_plane_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            data_plane_url: "http://localhost:54321".to_string(),
            data_plane_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a wiremock server so services talk to the mock
    /// instead of a live data plane.
    pub fn with_mock_server(url: &str) -> Self {
        Self {
            data_plane_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            data_plane_url: self.data_plane_url.clone(),
            data_plane_service_key: self.data_plane_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn therapist(email: &str) -> Self {
        Self::new(email, "therapist")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn superadmin(email: &str) -> Self {
        Self::new(email, "superadmin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned data-plane rows for wiremock setups. Column names are camelCase
/// to match the wire contract the API exposes.
pub struct MockDataPlaneRows;

impl MockDataPlaneRows {
    pub fn therapist_account(user_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "name": "Test Therapist",
            "email": "therapist@example.com",
            "phone": "9000000001",
            "role": "therapist",
            "status": status,
            "createdAt": "2026-01-01T00:00:00Z"
        })
    }

    pub fn therapist_profile(
        user_id: &str,
        short_code: &str,
        holidays: &[&str],
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "userId": user_id,
            "shortCode": short_code,
            "specialization": "Occupational Therapy",
            "experienceYears": 5,
            "holidays": holidays,
            "createdAt": "2026-01-01T00:00:00Z"
        })
    }

    pub fn patient_profile(user_id: &str, patient_code: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "userId": user_id,
            "patientCode": patient_code,
            "childName": "Test Child",
            "parentName": "Test Parent",
            "phone": "9000000002",
            "email": "parent@example.com",
            "createdAt": "2026-01-01T00:00:00Z"
        })
    }

    pub fn package(package_id: &str, session_count: u32, total_cost: i64) -> serde_json::Value {
        json!({
            "id": package_id,
            "name": format!("{} Session Pack", session_count),
            "sessionCount": session_count,
            "costPerSession": total_cost / session_count as i64,
            "totalCost": total_cost,
            "isActive": true
        })
    }

    pub fn coupon(code: &str, discount: u32, enabled: bool) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "couponCode": code,
            "discount": discount,
            "validityDays": 30,
            "discountEnabled": enabled,
            "isActive": true
        })
    }

    pub fn booking_session(
        therapist_id: &str,
        therapist_code: &str,
        date: &str,
        slot_id: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "bookingId": Uuid::new_v4(),
            "appointmentId": "APT000001",
            "therapistId": therapist_id,
            "therapistCode": therapist_code,
            "date": date,
            "slotId": slot_id
        })
    }

    pub fn payment(payment_code: &str, amount: i64, status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "paymentId": payment_code,
            "appointmentId": "APT000001",
            "patientId": Uuid::new_v4(),
            "totalAmount": amount,
            "amount": amount,
            "discountInfo": null,
            "status": status,
            "paymentMethod": null,
            "paymentTime": null,
            "createdAt": "2026-01-01T00:00:00Z"
        })
    }

    pub fn lead(lead_code: &str, status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "leadId": lead_code,
            "parentName": "Lead Parent",
            "parentMobile": "9000000003",
            "parentEmail": "lead@example.com",
            "childName": "Lead Child",
            "referralSource": "website",
            "status": status,
            "createdAt": "2026-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.data_plane_url, "http://localhost:54321");
        assert_eq!(app_config.data_plane_service_key, "test-service-key");
        assert!(!app_config.jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::therapist("t@example.com");
        assert_eq!(user.email, "t@example.com");
        assert_eq!(user.role, "therapist");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }
}
