// libs/billing-cell/src/services/store.rs
//
// Persistence port for the billing engine. Every status change goes through a
// compare-and-swap method and every "at most once" rule is backed by a
// uniqueness constraint, so the engine never relies on check-then-act.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, BillingError, Commission, Invoice,
    InvoiceFilter, InvoiceItem,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of the cascading appointment delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentDeletion {
    /// The appointment, its commission and its invoice item are gone.
    Deleted,
    /// No appointment with that id was in the expected status. Nothing changed.
    Missing,
    /// The appointment is itemized on a paid invoice. Nothing changed.
    OnPaidInvoice,
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            DatabaseError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BillingError::NotFound(what),
            StoreError::Conflict(msg) => BillingError::IllegalStateTransition(msg),
            StoreError::Backend(msg) => BillingError::DatabaseError(msg),
        }
    }
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    // --- Appointments ---
    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment>;

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    /// `scheduled -> completed`. Returns `None` when the row is not scheduled (or gone).
    async fn complete_appointment(
        &self,
        id: Uuid,
        examined_at: DateTime<Utc>,
        examined_by: Uuid,
    ) -> StoreResult<Option<Appointment>>;

    /// `scheduled -> cancelled`. Returns `None` when the row is not scheduled (or gone).
    async fn cancel_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    /// Deletes the appointment while it is still in `expected` status, in one
    /// transaction with its commission and invoice item. A pending invoice that
    /// loses the item gets its totals recomputed from the remaining items, or is
    /// removed when none remain.
    async fn delete_appointment(&self, id: Uuid, expected: AppointmentStatus) -> StoreResult<AppointmentDeletion>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>>;

    // --- Commissions ---
    /// Insert-or-ignore keyed on `appointment_id`. `true` when this call created the row.
    async fn insert_commission_if_absent(&self, commission: &Commission) -> StoreResult<bool>;

    async fn get_commission(&self, id: Uuid) -> StoreResult<Option<Commission>>;

    async fn commission_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Commission>>;

    /// `pending -> paid`. Returns `None` when the commission is not pending (or gone).
    async fn mark_commission_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Commission>>;

    async fn list_commissions(&self, sending_doctor_id: Uuid) -> StoreResult<Vec<Commission>>;

    // --- Invoices ---
    /// Fails with `Conflict` when the invoice number is taken.
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<Invoice>;

    /// All-or-nothing. Fails with `Conflict` when any appointment is already itemized.
    async fn insert_invoice_items(&self, items: &[InvoiceItem]) -> StoreResult<Vec<InvoiceItem>>;

    /// The subset of `appointment_ids` referenced by some invoice item.
    async fn invoiced_appointment_ids(&self, appointment_ids: &[Uuid]) -> StoreResult<HashSet<Uuid>>;

    async fn get_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>>;

    async fn items_for_invoice(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceItem>>;

    /// `pending -> paid`. Returns `None` when the invoice is not pending (or gone).
    async fn mark_invoice_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Invoice>>;

    /// Removes the invoice and its items in one write. `false` when it did not exist.
    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool>;

    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>>;
}
