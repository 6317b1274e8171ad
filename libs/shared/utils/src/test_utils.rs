use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the config at a wiremock server.
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
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

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn sending_doctor(email: &str) -> Self {
        Self::new(email, "sending_doctor")
    }

    pub fn receiving_doctor(email: &str) -> Self {
        Self::new(email, "receiving_doctor")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are generated as uuids")
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
}

/// PostgREST row fixtures for the referral tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn office_hour_row(id: &str, doctor_id: &str, day_of_week: u8) -> serde_json::Value {
        json!({
            "id": id,
            "receiving_doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": "08:00:00",
            "end_time": "16:00:00",
            "slot_duration_minutes": 30,
            "break_start_time": "12:00:00",
            "break_end_time": "13:00:00",
            "is_active": true,
            "profiles": { "full_name": "Jana Nováková" }
        })
    }

    pub fn scheduled_appointment_row(id: &str, sending_doctor_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "sending_doctor_id": sending_doctor_id,
            "patient_number": "AA-2030-01-07-0900",
            "appointment_date": "2030-01-07T09:00:00Z",
            "status": "scheduled",
            "receiving_doctor_id": null,
            "examined_at": null,
            "examined_by": null,
            "notes": null,
            "created_at": "2029-12-01T00:00:00Z"
        })
    }

    pub fn completed_appointment_row(id: &str, sending_doctor_id: &str, receiving_doctor_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "sending_doctor_id": sending_doctor_id,
            "patient_number": "AA-2030-01-07-0900",
            "appointment_date": "2030-01-07T09:00:00Z",
            "status": "completed",
            "receiving_doctor_id": receiving_doctor_id,
            "examined_at": "2030-01-07T09:20:00Z",
            "examined_by": receiving_doctor_id,
            "notes": null,
            "created_at": "2029-12-01T00:00:00Z"
        })
    }

    pub fn commission_row(id: &str, sending_doctor_id: &str, appointment_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "sending_doctor_id": sending_doctor_id,
            "appointment_id": appointment_id,
            "amount_cents": 1400,
            "status": "pending",
            "paid_at": null,
            "created_at": "2030-01-07T09:20:00Z"
        })
    }

    pub fn invoice_row(id: &str, sending_doctor_id: &str, receiving_doctor_id: &str, patient_count: i64) -> serde_json::Value {
        json!({
            "id": id,
            "invoice_number": "INV-300107-0042",
            "sending_doctor_id": sending_doctor_id,
            "receiving_doctor_id": receiving_doctor_id,
            "total_amount_cents": patient_count * 1400,
            "patient_count": patient_count,
            "issue_date": "2030-01-07",
            "status": "pending",
            "paid_at": null,
            "notes": null,
            "created_at": "2030-01-07T10:00:00Z"
        })
    }

    pub fn profile_row(id: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": "doctor@example.com",
            "full_name": full_name,
            "ambulance_code": "AA",
            "bank_account": null,
            "invoice_name": null,
            "invoice_address": null,
            "invoice_ico": null,
            "invoice_dic": null,
            "signature_image": null,
            "created_at": "2029-01-01T00:00:00Z"
        })
    }
}
