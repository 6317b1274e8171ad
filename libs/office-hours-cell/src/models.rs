use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

pub const DEFAULT_SLOT_DURATION_MINUTES: i32 = 30;

// ==============================================================================
// OFFICE HOUR RULES
// ==============================================================================

/// Weekly recurring availability of a receiving doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeHourRule {
    pub id: Uuid,
    pub receiving_doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 6 = Saturday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub break_start_time: Option<NaiveTime>,
    pub break_end_time: Option<NaiveTime>,
    pub is_active: bool,
    /// Embedded `profiles(full_name)` of the owning doctor, when selected.
    #[serde(default, rename = "profiles", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorName {
    pub full_name: Option<String>,
}

impl OfficeHourRule {
    pub fn doctor_name(&self) -> Option<&str> {
        self.doctor.as_ref().and_then(|d| d.full_name.as_deref())
    }

    /// The break only takes effect when both ends are set.
    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.break_start_time, self.break_end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Write-time validation shared by create and update.
    pub fn validate(&self) -> Result<(), OfficeHoursError> {
        validate_schedule(
            self.day_of_week,
            self.start_time,
            self.end_time,
            self.slot_duration_minutes,
            self.break_start_time,
            self.break_end_time,
        )
    }
}

pub fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

pub fn validate_schedule(
    day_of_week: u8,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration_minutes: i32,
    break_start_time: Option<NaiveTime>,
    break_end_time: Option<NaiveTime>,
) -> Result<(), OfficeHoursError> {
    if day_of_week > 6 {
        return Err(OfficeHoursError::ValidationError(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    if slot_duration_minutes <= 0 {
        return Err(OfficeHoursError::InvalidConfiguration(format!(
            "Slot duration must be positive, got {} minutes", slot_duration_minutes
        )));
    }

    if end_time <= start_time {
        return Err(OfficeHoursError::InvalidConfiguration(
            "Start time must be before end time".to_string(),
        ));
    }

    match (break_start_time, break_end_time) {
        (None, None) => Ok(()),
        (Some(start), Some(end)) if start < end => Ok(()),
        (Some(_), Some(_)) => Err(OfficeHoursError::ValidationError(
            "Break start must be before break end".to_string(),
        )),
        _ => Err(OfficeHoursError::ValidationError(
            "Break needs both a start and an end time".to_string(),
        )),
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

/// A concrete bookable instant derived from an office hour rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub label: String,
    pub receiving_doctor_id: Uuid,
    pub receiving_doctor_name: Option<String>,
}

/// Doctor names carry the Slovak academic title in listings.
pub fn format_doctor_name(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => format!("MUDr. {}", n.trim()),
        _ => "—".to_string(),
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfficeHourRequest {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: Option<i32>,
    pub break_start_time: Option<NaiveTime>,
    pub break_end_time: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

/// Partial update. Break fields distinguish "absent" (keep) from `null` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOfficeHourRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub break_start_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "double_option")]
    pub break_end_time: Option<Option<NaiveTime>>,
    pub is_active: Option<bool>,
}

impl UpdateOfficeHourRequest {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.slot_duration_minutes.is_none()
            && self.break_start_time.is_none()
            && self.break_end_time.is_none()
            && self.is_active.is_none()
    }

    /// The rule as it would look after this update.
    pub fn apply_to(&self, rule: &OfficeHourRule) -> OfficeHourRule {
        let mut merged = rule.clone();
        if let Some(start) = self.start_time {
            merged.start_time = start;
        }
        if let Some(end) = self.end_time {
            merged.end_time = end;
        }
        if let Some(duration) = self.slot_duration_minutes {
            merged.slot_duration_minutes = duration;
        }
        if let Some(break_start) = self.break_start_time {
            merged.break_start_time = break_start;
        }
        if let Some(break_end) = self.break_end_time {
            merged.break_end_time = break_end;
        }
        if let Some(active) = self.is_active {
            merged.is_active = active;
        }
        merged
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum OfficeHoursError {
    #[error("Invalid office hour configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Office hour not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for OfficeHoursError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => OfficeHoursError::NotFound,
            other => OfficeHoursError::DatabaseError(other.to_string()),
        }
    }
}

impl From<OfficeHoursError> for AppError {
    fn from(err: OfficeHoursError) -> Self {
        match err {
            OfficeHoursError::InvalidConfiguration(_) | OfficeHoursError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            OfficeHoursError::NotFound => AppError::NotFound(err.to_string()),
            OfficeHoursError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
