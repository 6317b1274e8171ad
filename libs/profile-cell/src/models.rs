use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

/// A doctor's profile row, including the data printed on invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub ambulance_code: Option<String>,
    /// IBAN payments are sent to.
    pub bank_account: Option<String>,
    pub invoice_name: Option<String>,
    pub invoice_address: Option<String>,
    pub invoice_ico: Option<String>,
    pub invoice_dic: Option<String>,
    /// Base64 encoded signature image.
    pub signature_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub ambulance_code: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.ambulance_code.is_none()
    }
}

/// Replaces the whole invoice block. Missing or blank fields are cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvoiceDataRequest {
    pub invoice_name: Option<String>,
    pub invoice_address: Option<String>,
    pub bank_account: Option<String>,
    pub invoice_ico: Option<String>,
    pub invoice_dic: Option<String>,
    pub signature_image: Option<String>,
}

/// Invoice data after normalization, ready to be written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceData {
    pub invoice_name: Option<String>,
    pub invoice_address: Option<String>,
    pub bank_account: Option<String>,
    pub invoice_ico: Option<String>,
    pub invoice_dic: Option<String>,
    pub signature_image: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for ProfileError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => ProfileError::NotFound,
            other => ProfileError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AppError::NotFound(err.to_string()),
            ProfileError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            ProfileError::DatabaseError(msg) => AppError::Database(msg),
            ProfileError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
