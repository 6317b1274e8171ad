// libs/billing-cell/src/services/supabase_store.rs
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Commission, CommissionStatus, Invoice,
    InvoiceFilter, InvoiceItem, InvoiceStatus, SortOrder,
};
use crate::services::store::{AppointmentDeletion, BillingStore, StoreError, StoreResult};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const COMMISSIONS: &str = "/rest/v1/commissions";
const INVOICES: &str = "/rest/v1/invoices";
const INVOICE_ITEMS: &str = "/rest/v1/invoice_items";

/// Postgres function deleting an appointment with its dependents
/// (`supabase/migrations`).
const DELETE_APPOINTMENT_FN: &str = "delete_appointment_cascade";

/// PostgREST-backed store. Status changes are conditional `PATCH`es filtered on
/// the expected status, so an empty result means the swap lost.
pub struct SupabaseBillingStore {
    supabase: SupabaseClient,
    auth_token: String,
}

#[derive(Deserialize)]
struct AppointmentRef {
    appointment_id: Uuid,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

fn encode<T: serde::Serialize>(row: &T) -> StoreResult<Value> {
    serde_json::to_value(row).map_err(|e| StoreError::Backend(e.to_string()))
}

impl SupabaseBillingStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.to_string(),
        }
    }

    async fn select<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Vec<T>> {
        Ok(self.supabase.request(Method::GET, path, Some(&self.auth_token), None).await?)
    }

    async fn first<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<T>> {
        Ok(self.select(path).await?.into_iter().next())
    }

    async fn write<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> StoreResult<Vec<T>> {
        Ok(self.supabase.write_returning(method, path, Some(&self.auth_token), body).await?)
    }

    async fn insert_one<T: DeserializeOwned>(&self, table: &str, body: Value) -> StoreResult<T> {
        self.write(Method::POST, table, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", table)))
    }

    /// Conditional update; `None` when no row matched the filter.
    async fn patch_one<T: DeserializeOwned>(&self, path: &str, body: Value) -> StoreResult<Option<T>> {
        let rows: Vec<T> = self.write(Method::PATCH, path, Some(body)).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl BillingStore for SupabaseBillingStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        self.insert_one(APPOINTMENTS, encode(appointment)?).await
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.first(&format!("{}?id=eq.{}", APPOINTMENTS, id)).await
    }

    async fn complete_appointment(
        &self,
        id: Uuid,
        examined_at: DateTime<Utc>,
        examined_by: Uuid,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, id, AppointmentStatus::Scheduled);
        let body = json!({
            "status": AppointmentStatus::Completed,
            "examined_at": timestamp(examined_at),
            "examined_by": examined_by,
            "receiving_doctor_id": examined_by,
        });
        self.patch_one(&path, body).await
    }

    async fn cancel_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, id, AppointmentStatus::Scheduled);
        self.patch_one(&path, json!({ "status": AppointmentStatus::Cancelled })).await
    }

    async fn delete_appointment(&self, id: Uuid, expected: AppointmentStatus) -> StoreResult<AppointmentDeletion> {
        let args = json!({ "target_id": id, "expected_status": expected });
        debug!("Deleting appointment {} through {}", id, DELETE_APPOINTMENT_FN);
        Ok(self.supabase.rpc(DELETE_APPOINTMENT_FN, Some(&self.auth_token), args).await?)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let mut path = format!("{}?select=*", APPOINTMENTS);
        if let Some(id) = filter.sending_doctor_id {
            path.push_str(&format!("&sending_doctor_id=eq.{}", id));
        }
        if let Some(id) = filter.receiving_doctor_id {
            path.push_str(&format!("&receiving_doctor_id=eq.{}", id));
        }
        if let Some(status) = filter.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(since) = filter.since {
            path.push_str(&format!("&appointment_date=gte.{}", timestamp(since)));
        }
        path.push_str(match filter.order {
            SortOrder::Ascending => "&order=appointment_date.asc",
            SortOrder::Descending => "&order=appointment_date.desc",
        });

        debug!("Listing appointments: {}", path);
        self.select(&path).await
    }

    async fn insert_commission_if_absent(&self, commission: &Commission) -> StoreResult<bool> {
        let inserted: Vec<Commission> = self
            .supabase
            .insert_ignoring_duplicates(COMMISSIONS, "appointment_id", Some(&self.auth_token), encode(commission)?)
            .await?;
        Ok(!inserted.is_empty())
    }

    async fn get_commission(&self, id: Uuid) -> StoreResult<Option<Commission>> {
        self.first(&format!("{}?id=eq.{}", COMMISSIONS, id)).await
    }

    async fn commission_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Commission>> {
        self.first(&format!("{}?appointment_id=eq.{}", COMMISSIONS, appointment_id)).await
    }

    async fn mark_commission_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Commission>> {
        let path = format!("{}?id=eq.{}&status=eq.{}", COMMISSIONS, id, CommissionStatus::Pending);
        let body = json!({ "status": CommissionStatus::Paid, "paid_at": timestamp(paid_at) });
        self.patch_one(&path, body).await
    }

    async fn list_commissions(&self, sending_doctor_id: Uuid) -> StoreResult<Vec<Commission>> {
        self.select(&format!(
            "{}?sending_doctor_id=eq.{}&order=created_at.desc", COMMISSIONS, sending_doctor_id
        ))
        .await
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<Invoice> {
        self.insert_one(INVOICES, encode(invoice)?).await
    }

    async fn insert_invoice_items(&self, items: &[InvoiceItem]) -> StoreResult<Vec<InvoiceItem>> {
        // A bulk insert is one statement, so a single duplicate rejects the batch.
        self.write(Method::POST, INVOICE_ITEMS, Some(encode(&items)?)).await
    }

    async fn invoiced_appointment_ids(&self, appointment_ids: &[Uuid]) -> StoreResult<HashSet<Uuid>> {
        if appointment_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let refs: Vec<AppointmentRef> = self
            .select(&format!(
                "{}?select=appointment_id&appointment_id=in.({})", INVOICE_ITEMS, id_list(appointment_ids)
            ))
            .await?;
        Ok(refs.into_iter().map(|r| r.appointment_id).collect())
    }

    async fn get_invoice(&self, id: Uuid) -> StoreResult<Option<Invoice>> {
        self.first(&format!("{}?id=eq.{}", INVOICES, id)).await
    }

    async fn items_for_invoice(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceItem>> {
        self.select(&format!("{}?invoice_id=eq.{}&order=created_at.asc", INVOICE_ITEMS, invoice_id)).await
    }

    async fn mark_invoice_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Option<Invoice>> {
        let path = format!("{}?id=eq.{}&status=eq.{}", INVOICES, id, InvoiceStatus::Pending);
        let body = json!({ "status": InvoiceStatus::Paid, "paid_at": timestamp(paid_at) });
        self.patch_one(&path, body).await
    }

    async fn delete_invoice(&self, id: Uuid) -> StoreResult<bool> {
        // invoice_items.invoice_id is ON DELETE CASCADE
        let deleted: Vec<Value> = self
            .write(Method::DELETE, &format!("{}?id=eq.{}", INVOICES, id), None)
            .await?;
        Ok(!deleted.is_empty())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> StoreResult<Vec<Invoice>> {
        let mut path = format!("{}?select=*", INVOICES);
        if let Some(id) = filter.sending_doctor_id {
            path.push_str(&format!("&sending_doctor_id=eq.{}", id));
        }
        if let Some(id) = filter.receiving_doctor_id {
            path.push_str(&format!("&receiving_doctor_id=eq.{}", id));
        }
        path.push_str("&order=issue_date.desc,created_at.desc");
        self.select(&path).await
    }
}
