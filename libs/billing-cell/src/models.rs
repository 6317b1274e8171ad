// libs/billing-cell/src/models.rs
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

/// Lifecycle of a referral. Examination data only exists on `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentState {
    Scheduled,
    Completed {
        examined_at: DateTime<Utc>,
        examined_by: Uuid,
    },
    Cancelled,
}

impl AppointmentState {
    pub fn status(&self) -> AppointmentStatus {
        match self {
            AppointmentState::Scheduled => AppointmentStatus::Scheduled,
            AppointmentState::Completed { .. } => AppointmentStatus::Completed,
            AppointmentState::Cancelled => AppointmentStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AppointmentRow", into = "AppointmentRow")]
pub struct Appointment {
    pub id: Uuid,
    pub sending_doctor_id: Uuid,
    pub patient_number: String,
    pub appointment_date: DateTime<Utc>,
    pub state: AppointmentState,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status(&self) -> AppointmentStatus {
        self.state.status()
    }

    /// The examining doctor, once the patient has been seen.
    pub fn receiving_doctor_id(&self) -> Option<Uuid> {
        match self.state {
            AppointmentState::Completed { examined_by, .. } => Some(examined_by),
            _ => None,
        }
    }

    pub fn is_examined(&self) -> bool {
        matches!(self.state, AppointmentState::Completed { .. })
    }
}

/// Flat storage shape of `appointments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub sending_doctor_id: Uuid,
    pub patient_number: String,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub receiving_doctor_id: Option<Uuid>,
    pub examined_at: Option<DateTime<Utc>>,
    pub examined_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = String;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let state = match row.status {
            AppointmentStatus::Scheduled => AppointmentState::Scheduled,
            AppointmentStatus::Cancelled => AppointmentState::Cancelled,
            AppointmentStatus::Completed => {
                let examined_by = row.examined_by.or(row.receiving_doctor_id);
                match (row.examined_at, examined_by) {
                    (Some(examined_at), Some(examined_by)) => AppointmentState::Completed { examined_at, examined_by },
                    _ => {
                        return Err(format!(
                            "appointment {} is completed but has no examination record", row.id
                        ))
                    }
                }
            }
        };

        if !matches!(state, AppointmentState::Completed { .. }) && row.examined_at.is_some() {
            warn!("Appointment {} is {} but carries examined_at; ignoring it", row.id, row.status);
        }

        Ok(Appointment {
            id: row.id,
            sending_doctor_id: row.sending_doctor_id,
            patient_number: row.patient_number,
            appointment_date: row.appointment_date,
            state,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

impl From<Appointment> for AppointmentRow {
    fn from(appointment: Appointment) -> Self {
        let status = appointment.status();
        let (examined_at, examined_by) = match appointment.state {
            AppointmentState::Completed { examined_at, examined_by } => (Some(examined_at), Some(examined_by)),
            _ => (None, None),
        };

        AppointmentRow {
            id: appointment.id,
            sending_doctor_id: appointment.sending_doctor_id,
            patient_number: appointment.patient_number,
            appointment_date: appointment.appointment_date,
            status,
            receiving_doctor_id: examined_by,
            examined_at,
            examined_by,
            notes: appointment.notes,
            created_at: appointment.created_at,
        }
    }
}

// ==============================================================================
// COMMISSIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Paid,
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "pending"),
            CommissionStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Per-patient handling fee owed to the sending doctor. At most one per appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub sending_doctor_id: Uuid,
    pub appointment_id: Uuid,
    pub amount_cents: i64,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Commission {
    pub fn pending(sending_doctor_id: Uuid, appointment_id: Uuid, amount_cents: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sending_doctor_id,
            appointment_id,
            amount_cents,
            status: CommissionStatus::Pending,
            paid_at: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub pending_count: usize,
    pub pending_cents: i64,
    pub paid_count: usize,
    pub paid_cents: i64,
}

impl CommissionSummary {
    pub fn from_commissions(commissions: &[Commission]) -> Self {
        commissions.iter().fold(Self::default(), |mut summary, c| {
            match c.status {
                CommissionStatus::Pending => {
                    summary.pending_count += 1;
                    summary.pending_cents += c.amount_cents;
                }
                CommissionStatus::Paid => {
                    summary.paid_count += 1;
                    summary.paid_cents += c.amount_cents;
                }
            }
            summary
        })
    }
}

// ==============================================================================
// INVOICES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub sending_doctor_id: Uuid,
    pub receiving_doctor_id: Uuid,
    pub total_amount_cents: i64,
    pub patient_count: i64,
    pub issue_date: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Links one examined appointment to the invoice that billed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub appointment_id: Uuid,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// An invoice together with the appointments it bills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub sending_doctor_id: Option<Uuid>,
    pub receiving_doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Lower bound on `appointment_date`.
    pub since: Option<DateTime<Utc>>,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub sending_doctor_id: Option<Uuid>,
    pub receiving_doctor_id: Option<Uuid>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub ambulance_code: String,
    /// Wall-clock time of the slot with the booking client's offset.
    pub appointment_date: DateTime<FixedOffset>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkExaminedRequest {
    pub examined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub sending_doctor_id: Uuid,
    pub appointment_ids: Vec<Uuid>,
    pub total_amount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceableQuery {
    pub sending_doctor_id: Uuid,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Illegal state transition: {0}")]
    IllegalStateTransition(String),

    #[error("Appointment {0} is already invoiced")]
    AlreadyInvoiced(Uuid),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for BillingError {
    fn from(err: DatabaseError) -> Self {
        BillingError::DatabaseError(err.to_string())
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            BillingError::IllegalStateTransition(_) | BillingError::AlreadyInvoiced(_) => {
                AppError::Conflict(err.to_string())
            }
            BillingError::NotFound(_) => AppError::NotFound(err.to_string()),
            BillingError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
