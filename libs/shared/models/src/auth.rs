use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// The two parties of a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoctorRole {
    /// Refers patients and books appointments.
    Sending,
    /// Examines patients, publishes office hours, issues invoices.
    Receiving,
}

impl fmt::Display for DoctorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoctorRole::Sending => write!(f, "sending_doctor"),
            DoctorRole::Receiving => write!(f, "receiving_doctor"),
        }
    }
}

impl FromStr for DoctorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sending_doctor" | "sending" => Ok(DoctorRole::Sending),
            "receiving_doctor" | "receiving" => Ok(DoctorRole::Receiving),
            other => Err(format!("Unknown doctor role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Role from the `role` claim, falling back to `user_metadata.role`.
    pub fn doctor_role(&self) -> Option<DoctorRole> {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("role"))
                    .and_then(|r| r.as_str())
                    .and_then(|r| r.parse().ok())
            })
    }
}
