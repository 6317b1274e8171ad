use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    validate_schedule, BookableSlot, CreateOfficeHourRequest, OfficeHourRule, OfficeHoursError,
    UpdateOfficeHourRequest, DEFAULT_SLOT_DURATION_MINUTES,
};
use crate::services::slots::generate_slots;

const TABLE: &str = "/rest/v1/office_hours";
const SELECT_WITH_DOCTOR: &str = "select=*,profiles(full_name)";

pub struct OfficeHoursService {
    supabase: SupabaseClient,
}

impl OfficeHoursService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a weekly office hour rule for a receiving doctor
    #[instrument(skip(self, auth_token))]
    pub async fn create_office_hour(
        &self,
        doctor_id: Uuid,
        request: CreateOfficeHourRequest,
        auth_token: &str,
    ) -> Result<OfficeHourRule, OfficeHoursError> {
        let duration = request.slot_duration_minutes.unwrap_or(DEFAULT_SLOT_DURATION_MINUTES);

        validate_schedule(
            request.day_of_week,
            request.start_time,
            request.end_time,
            duration,
            request.break_start_time,
            request.break_end_time,
        )?;

        let row = json!({
            "receiving_doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "slot_duration_minutes": duration,
            "break_start_time": request.break_start_time.map(|t| t.format("%H:%M:%S").to_string()),
            "break_end_time": request.break_end_time.map(|t| t.format("%H:%M:%S").to_string()),
            "is_active": request.is_active.unwrap_or(true),
        });

        let created: Vec<OfficeHourRule> = self.supabase
            .write_returning(Method::POST, TABLE, Some(auth_token), Some(row))
            .await?;

        let rule = created.into_iter().next().ok_or_else(|| {
            OfficeHoursError::DatabaseError("Insert returned no office hour".to_string())
        })?;

        info!("Office hour {} created for doctor {}", rule.id, doctor_id);
        Ok(rule)
    }

    /// Partially update a rule owned by `doctor_id`
    #[instrument(skip(self, auth_token))]
    pub async fn update_office_hour(
        &self,
        office_hour_id: Uuid,
        doctor_id: Uuid,
        request: UpdateOfficeHourRequest,
        auth_token: &str,
    ) -> Result<OfficeHourRule, OfficeHoursError> {
        if request.is_empty() {
            return Err(OfficeHoursError::ValidationError("No fields to update".to_string()));
        }

        let existing = self.get_owned(office_hour_id, doctor_id, auth_token).await?;
        request.apply_to(&existing).validate()?;

        let mut update = Map::new();
        if let Some(start) = request.start_time {
            update.insert("start_time".to_string(), json!(start.format("%H:%M:%S").to_string()));
        }
        if let Some(end) = request.end_time {
            update.insert("end_time".to_string(), json!(end.format("%H:%M:%S").to_string()));
        }
        if let Some(duration) = request.slot_duration_minutes {
            update.insert("slot_duration_minutes".to_string(), json!(duration));
        }
        if let Some(break_start) = request.break_start_time {
            update.insert("break_start_time".to_string(), json!(break_start.map(|t| t.format("%H:%M:%S").to_string())));
        }
        if let Some(break_end) = request.break_end_time {
            update.insert("break_end_time".to_string(), json!(break_end.map(|t| t.format("%H:%M:%S").to_string())));
        }
        if let Some(active) = request.is_active {
            update.insert("is_active".to_string(), json!(active));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("{}?id=eq.{}&receiving_doctor_id=eq.{}", TABLE, office_hour_id, doctor_id);
        let updated: Vec<OfficeHourRule> = self.supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(update)))
            .await?;

        let rule = updated.into_iter().next().ok_or(OfficeHoursError::NotFound)?;
        info!("Office hour {} updated", rule.id);
        Ok(rule)
    }

    #[instrument(skip(self, auth_token))]
    pub async fn delete_office_hour(
        &self,
        office_hour_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), OfficeHoursError> {
        let path = format!("{}?id=eq.{}&receiving_doctor_id=eq.{}", TABLE, office_hour_id, doctor_id);
        let deleted: Vec<Value> = self.supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        if deleted.is_empty() {
            return Err(OfficeHoursError::NotFound);
        }

        info!("Office hour {} deleted", office_hour_id);
        Ok(())
    }

    /// All rules of one doctor, active or not
    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<OfficeHourRule>, OfficeHoursError> {
        debug!("Fetching office hours for doctor: {}", doctor_id);

        let path = format!(
            "{}?receiving_doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            TABLE, doctor_id
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    /// Active rules of every receiving doctor, with the doctor's name embedded
    pub async fn list_active(&self, auth_token: &str) -> Result<Vec<OfficeHourRule>, OfficeHoursError> {
        let path = format!(
            "{}?{}&is_active=eq.true&order=day_of_week.asc,start_time.asc",
            TABLE, SELECT_WITH_DOCTOR
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    /// Bookable slots on `date` across all receiving doctors
    #[instrument(skip(self, auth_token, now))]
    pub async fn available_slots<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        now: &DateTime<Tz>,
        auth_token: &str,
    ) -> Result<Vec<BookableSlot>, OfficeHoursError> {
        let rules = self.list_active(auth_token).await?;
        generate_slots(date, &rules, now)
    }

    async fn get_owned(
        &self,
        office_hour_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<OfficeHourRule, OfficeHoursError> {
        let path = format!("{}?id=eq.{}&receiving_doctor_id=eq.{}", TABLE, office_hour_id, doctor_id);
        let rows: Vec<OfficeHourRule> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter().next().ok_or(OfficeHoursError::NotFound)
    }
}
