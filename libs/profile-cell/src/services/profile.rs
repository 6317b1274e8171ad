use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Profile, ProfileError, UpdateInvoiceDataRequest, UpdateProfileRequest};
use crate::services::validation::InvoiceDataValidator;

const TABLE: &str = "/rest/v1/profiles";

pub struct ProfileService {
    supabase: SupabaseClient,
    validator: InvoiceDataValidator,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Result<Self, ProfileError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            validator: InvoiceDataValidator::new()?,
        })
    }

    #[instrument(skip(self, auth_token))]
    pub async fn get_profile(&self, profile_id: Uuid, auth_token: &str) -> Result<Profile, ProfileError> {
        let path = format!("{}?id=eq.{}", TABLE, profile_id);
        let rows: Vec<Profile> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        rows.into_iter().next().ok_or(ProfileError::NotFound)
    }

    /// Partial update of the public part of the profile.
    #[instrument(skip(self, auth_token))]
    pub async fn update_profile(
        &self,
        profile_id: Uuid,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        if request.is_empty() {
            return Err(ProfileError::ValidationError("No updates provided".to_string()));
        }

        let mut changes = Map::new();
        if let Some(full_name) = request.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(ProfileError::ValidationError("Full name cannot be empty".to_string()));
            }
            changes.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(code) = request.ambulance_code {
            let code = code.trim().to_uppercase();
            self.validator.validate_ambulance_code(&code)?;
            changes.insert("ambulance_code".to_string(), json!(code));
        }

        let profile = self.patch(profile_id, Value::Object(changes), auth_token).await?;
        info!("Profile {} updated", profile_id);
        Ok(profile)
    }

    /// Replaces the invoice block after validating IBAN, IČO and DIČ.
    #[instrument(skip(self, request, auth_token))]
    pub async fn update_invoice_data(
        &self,
        profile_id: Uuid,
        request: UpdateInvoiceDataRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let data = self.validator.normalize(request)?;
        let body = serde_json::to_value(&data).map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        let profile = self.patch(profile_id, body, auth_token).await?;
        info!("Invoice data updated for profile {}", profile_id);
        Ok(profile)
    }

    async fn patch(&self, profile_id: Uuid, body: Value, auth_token: &str) -> Result<Profile, ProfileError> {
        let path = format!("{}?id=eq.{}", TABLE, profile_id);
        debug!("Patching profile {}", profile_id);

        let rows: Vec<Profile> = self.supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await?;

        rows.into_iter().next().ok_or(ProfileError::NotFound)
    }
}
