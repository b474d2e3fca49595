use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User, PASSWORD_CHANGE_PURPOSE};

use crate::jwt::{issue_token, TokenSubject};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    /// Points the store client at a mock server.
    pub fn with_store_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: 24,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: format!("Test {}", role),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            name: Some(self.name.clone()),
            role: self.role,
            purpose: None,
            created_at: Some(Utc::now()),
        }
    }

    fn to_subject(&self, purpose: Option<&str>) -> TokenSubject {
        TokenSubject {
            id: self.id,
            email: Some(self.email.clone()),
            name: Some(self.name.clone()),
            role: self.role,
            purpose: purpose.map(str::to_string),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        issue_token(
            &user.to_subject(None),
            secret,
            Duration::hours(exp_hours.unwrap_or(24)),
        )
        .expect("test secret must not be empty")
    }

    pub fn create_password_change_token(user: &TestUser, secret: &str) -> String {
        issue_token(
            &user.to_subject(Some(PASSWORD_CHANGE_PURPOSE)),
            secret,
            Duration::hours(1),
        )
        .expect("test secret must not be empty")
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

    /// Correctly signed token whose role claim is outside the known set.
    pub fn create_unknown_role_token(secret: &str) -> String {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let header = general_purpose::URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(
            json!({
                "sub": Uuid::new_v4(),
                "role": "nurse",
                "exp": (Utc::now() + Duration::hours(1)).timestamp(),
            })
            .to_string(),
        );
        let signing_input = format!("{}.{}", header, payload);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }
}

/// Canned rows as the document store returns them.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn user_summary(user: &TestUser) -> serde_json::Value {
        json!({
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
        })
    }

    pub fn user_row(user: &TestUser, password_hash: &str) -> serde_json::Value {
        json!({
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "password_hash": password_hash,
            "role": user.role,
            "phone": null,
            "status": "active",
            "force_password_change": false,
            "last_login": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": date,
            "time": time,
            "notes": "",
            "status": status,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service_row(id: Uuid, title: &str, category: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": "",
            "category": category,
            "image": "",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn gallery_row(id: Uuid, doctor_id: Uuid, is_public: bool) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Smile makeover",
            "description": null,
            "before_image": "https://cdn.example.com/before.jpg",
            "after_image": "https://cdn.example.com/after.jpg",
            "treatment_type": "whitening",
            "doctor_id": doctor_id,
            "patient_consent": true,
            "is_public": is_public,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

/// Calendar date and `HH:MM` time of `instant` in UTC, in the stored string formats.
pub fn schedule_strings(instant: DateTime<Utc>) -> (String, String) {
    (
        instant.format("%Y-%m-%d").to_string(),
        instant.format("%H:%M").to_string(),
    )
}
