// libs/billing-cell/src/services/memory_store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentState, AppointmentStatus, Commission, CommissionStatus,
    Invoice, InvoiceFilter, InvoiceItem, InvoiceStatus, SortOrder,
};
use crate::services::store::{AppointmentDeletion, BillingStore, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    commissions: HashMap<Uuid, Commission>,
    invoices: HashMap<Uuid, Invoice>,
    items: HashMap<Uuid, InvoiceItem>,
}

/// Process-local store with the same uniqueness and compare-and-swap
/// guarantees as the Postgres schema. Each method holds the lock for its
/// whole body, which makes every call atomic.
#[derive(Default)]
pub struct InMemoryBillingStore {
    tables: Mutex<Tables>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn commission_count(&self) -> usize {
        self.tables.lock().await.commissions.len()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }
}

fn newest_first<T, K: Ord>(rows: &mut [T], key: impl Fn(&T) -> K) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        let mut tables = self.tables.lock().await;
        if tables.appointments.contains_key(&appointment.id) {
            return Err(StoreError::Conflict(format!("appointment {} exists", appointment.id)));
        }
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.lock().await.appointments.get(&id).cloned())
    }

    async fn complete_appointment(
        &self,
        id: Uuid,
        examined_at: DateTime<Utc>,
        examined_by: Uuid,
    ) -> StoreResult<Option<Appointment>> {
        let mut tables = self.tables.lock().await;
        match tables.appointments.get_mut(&id) {
            Some(row) if row.state == AppointmentState::Scheduled => {
                row.state = AppointmentState::Completed { examined_at, examined_by };
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let mut tables = self.tables.lock().await;
        match tables.appointments.get_mut(&id) {
            Some(row) if row.state == AppointmentState::Scheduled => {
                row.state = AppointmentState::Cancelled;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_appointment(&self, id: Uuid, expected: AppointmentStatus) -> StoreResult<AppointmentDeletion> {
        let mut tables = self.tables.lock().await;
        if tables.appointments.get(&id).map(Appointment::status) != Some(expected) {
            return Ok(AppointmentDeletion::Missing);
        }

        let item = tables.items.values().find(|i| i.appointment_id == id).cloned();
        if let Some(item) = &item {
            let paid = tables
                .invoices
                .get(&item.invoice_id)
                .map_or(false, |invoice| invoice.status == InvoiceStatus::Paid);
            if paid {
                return Ok(AppointmentDeletion::OnPaidInvoice);
            }
        }

        tables.appointments.remove(&id);
        tables.commissions.retain(|_, c| c.appointment_id != id);

        if let Some(item) = item {
            tables.items.remove(&item.id);
            let (count, total) = tables
                .items
                .values()
                .filter(|i| i.invoice_id == item.invoice_id)
                .fold((0i64, 0i64), |(count, total), i| (count + 1, total + i.amount_cents));
            if count == 0 {
                tables.invoices.remove(&item.invoice_id);
            } else if let Some(invoice) = tables.invoices.get_mut(&item.invoice_id) {
                invoice.patient_count = count;
                invoice.total_amount_cents = total;
            }
        }

        Ok(AppointmentDeletion::Deleted)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| filter.sending_doctor_id.map_or(true, |id| a.sending_doctor_id == id))
            .filter(|a| filter.receiving_doctor_id.map_or(true, |id| a.receiving_doctor_id() == Some(id)))
            .filter(|a| filter.status.map_or(true, |s| a.status() == s))
            .filter(|a| filter.since.map_or(true, |since| a.appointment_date >= since))
            .cloned()
            .collect();

        match filter.order {
            SortOrder::Ascending => rows.sort_by_key(|a| a.appointment_date),
            SortOrder::Descending => newest_first(&mut rows, |a| a.appointment_date),
        }
        Ok(rows)
    }

    async fn insert_commission_if_absent(&self, commission: &Commission) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.appointments.contains_key(&commission.appointment_id) {
            return Err(StoreError::NotFound(format!("appointment {}", commission.appointment_id)));
        }
        if tables.commissions.values().any(|c| c.appointment_id == commission.appointment_id) {
            return Ok(false);
        }
        tables.commissions.insert(commission.id, commission.clone());
        Ok(true)
    }

    async fn get_commission(&self, id: Uuid) -> StoreResult<Option<Commission>> {
        Ok(self.tables.lock().await.commissions.get(&id).cloned())
    }

    async fn commission_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Commission>> {
        let tables = self.tables.lock().await;
        Ok(tables.commissions.values().find(|c| c.appointment_id == appointment_id).cloned())
    }

    async fn mark_commission_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Commission>> {
        let mut tables = self.tables.lock().await;
        match tables.commissions.get_mut(&id) {
            Some(row) if row.status == CommissionStatus::Pending => {
                row.status = CommissionStatus::Paid;
                row.paid_at = Some(paid_at);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_commissions(&self, sending_doctor_id: Uuid) -> StoreResult<Vec<Commission>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Commission> = tables
            .commissions
            .values()
            .filter(|c| c.sending_doctor_id == sending_doctor_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |c| c.created_at);
        Ok(rows)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<Invoice> {
        let mut tables = self.tables.lock().await;
        if tables.invoices.values().any(|i| i.invoice_number == invoice.invoice_number) {
            return Err(StoreError::Conflict(format!("invoice number {} is taken", invoice.invoice_number)));
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice.clone())
    }

    async fn insert_invoice_items(&self, items: &[InvoiceItem]) -> StoreResult<Vec<InvoiceItem>> {
        let mut tables = self.tables.lock().await;

        let mut batch = HashSet::new();
        for item in items {
            if !tables.invoices.contains_key(&item.invoice_id) {
                return Err(StoreError::NotFound(format!("invoice {}", item.invoice_id)));
            }
            let taken = tables.items.values().any(|i| i.appointment_id == item.appointment_id);
            if taken || !batch.insert(item.appointment_id) {
                return Err(StoreError::Conflict(format!(
                    "appointment {} is already itemized", item.appointment_id
                )));
            }
        }

        for item in items {
            tables.items.insert(item.id, item.clone());
        }
        Ok(items.to_vec())
    }

    async fn invoiced_appointment_ids(&self, appointment_ids: &[Uuid]) -> StoreResult<HashSet<Uuid>> {
        let tables = self.tables.lock().await;
        let wanted: HashSet<&Uuid> = appointment_ids.iter().collect();
        Ok(tables
            .items
            .values()
            .filter(|i| wanted.contains(&i.appointment_id))
            .map(|i| i.appointment_id)
            .collect())
    }

    async fn get_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        Ok(self.tables.lock().await.invoices.get(&id).cloned())
    }

    async fn items_for_invoice(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceItem>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<InvoiceItem> = tables
            .items
            .values()
            .filter(|i| i.invoice_id == invoice_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.created_at, i.appointment_id));
        Ok(rows)
    }

    async fn mark_invoice_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Invoice>> {
        let mut tables = self.tables.lock().await;
        match tables.invoices.get_mut(&id) {
            Some(row) if row.status == InvoiceStatus::Pending => {
                row.status = InvoiceStatus::Paid;
                row.paid_at = Some(paid_at);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        tables.items.retain(|_, i| i.invoice_id != id);
        Ok(tables.invoices.remove(&id).is_some())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| filter.sending_doctor_id.map_or(true, |id| i.sending_doctor_id == id))
            .filter(|i| filter.receiving_doctor_id.map_or(true, |id| i.receiving_doctor_id == id))
            .cloned()
            .collect();
        newest_first(&mut rows, |i| (i.issue_date, i.created_at));
        Ok(rows)
    }
}
