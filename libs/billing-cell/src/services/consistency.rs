// libs/billing-cell/src/services/consistency.rs
//
// Billing consistency engine. Keeps three invariants across concurrent requests:
//   * a commission exists exactly for examined appointments, at most one each
//   * an appointment is itemized on at most one invoice
//   * invoice totals match their items
// Races are settled by the store (conditional updates and unique keys), never
// by reading first and writing later.

use chrono::{DateTime, Months, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::DoctorRole;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentState, AppointmentStatus, BillingError,
    BookAppointmentRequest, Commission, CommissionStatus, CommissionSummary, CreateInvoiceRequest,
    Invoice, InvoiceDetail, InvoiceFilter, InvoiceItem, InvoiceStatus, SortOrder,
};
use crate::services::booking::{normalize_notes, patient_number, validate_ambulance_code};
use crate::services::invoice_number::{generate_invoice_number, MAX_ATTEMPTS};
use crate::services::lifecycle::{
    validate_appointment_transition, validate_commission_transition, validate_invoice_transition,
};
use crate::services::store::{AppointmentDeletion, BillingStore, StoreError};

pub struct BillingService<S: BillingStore> {
    store: S,
    fee_cents: i64,
    invoice_prefix: String,
    retention_years: u32,
}

impl<S: BillingStore> BillingService<S> {
    pub fn new(store: S, config: &AppConfig) -> Self {
        Self {
            store,
            fee_cents: config.patient_fee_cents,
            invoice_prefix: config.invoice_number_prefix.clone(),
            retention_years: config.data_retention_years,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fee_cents(&self) -> i64 {
        self.fee_cents
    }

    /// Oldest appointment date still shown in listings.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_months(Months::new(self.retention_years.saturating_mul(12)))
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    #[instrument(skip(self, request))]
    pub async fn book_appointment(
        &self,
        sending_doctor_id: Uuid,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BillingError> {
        validate_ambulance_code(&request.ambulance_code)?;

        let appointment_date = request.appointment_date.with_timezone(&Utc);
        if appointment_date <= now {
            return Err(BillingError::ValidationError(
                "Appointments cannot be booked in the past".to_string(),
            ));
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            sending_doctor_id,
            patient_number: patient_number(&request.ambulance_code, &request.appointment_date),
            appointment_date,
            state: AppointmentState::Scheduled,
            notes: normalize_notes(request.notes),
            created_at: now,
        };

        let created = self.store.insert_appointment(&appointment).await?;
        info!("Appointment {} booked as {}", created.id, created.patient_number);
        Ok(created)
    }

    /// Completes a scheduled appointment and records its commission.
    ///
    /// Retrying with the same examiner returns the completed appointment and
    /// never produces a second commission.
    #[instrument(skip(self))]
    pub async fn mark_examined(
        &self,
        appointment_id: Uuid,
        examined_by: Uuid,
        examined_at: DateTime<Utc>,
    ) -> Result<Appointment, BillingError> {
        let current = self.require_appointment(appointment_id).await?;

        let appointment = match current.state {
            AppointmentState::Scheduled => {
                match self.store.complete_appointment(appointment_id, examined_at, examined_by).await? {
                    Some(updated) => updated,
                    None => {
                        // Lost the swap: someone else moved the row first.
                        debug!("Appointment {} changed while examining, re-reading", appointment_id);
                        let latest = self.require_appointment(appointment_id).await?;
                        self.ensure_examined_by(&latest, examined_by)?;
                        latest
                    }
                }
            }
            _ => {
                self.ensure_examined_by(&current, examined_by)?;
                current
            }
        };

        let commission = Commission::pending(
            appointment.sending_doctor_id,
            appointment.id,
            self.fee_cents,
            examined_at,
        );
        if self.store.insert_commission_if_absent(&commission).await? {
            info!("Commission {} created for appointment {}", commission.id, appointment.id);
        } else {
            debug!("Commission for appointment {} already exists", appointment.id);
        }

        Ok(appointment)
    }

    fn ensure_examined_by(&self, appointment: &Appointment, examined_by: Uuid) -> Result<(), BillingError> {
        match appointment.state {
            AppointmentState::Completed { examined_by: by, .. } if by == examined_by => Ok(()),
            AppointmentState::Completed { .. } => Err(BillingError::IllegalStateTransition(format!(
                "appointment {} was examined by another doctor", appointment.id
            ))),
            AppointmentState::Scheduled => Err(BillingError::IllegalStateTransition(format!(
                "appointment {} is still scheduled", appointment.id
            ))),
            AppointmentState::Cancelled => {
                validate_appointment_transition(AppointmentStatus::Cancelled, AppointmentStatus::Completed)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_appointment(&self, appointment_id: Uuid, sending_doctor_id: Uuid) -> Result<Appointment, BillingError> {
        let current = self.require_appointment(appointment_id).await?;
        if current.sending_doctor_id != sending_doctor_id {
            return Err(BillingError::NotFound("Appointment".to_string()));
        }
        validate_appointment_transition(current.status(), AppointmentStatus::Cancelled)?;

        match self.store.cancel_appointment(appointment_id).await? {
            Some(cancelled) => {
                info!("Appointment {} cancelled", appointment_id);
                Ok(cancelled)
            }
            None => {
                let latest = self.require_appointment(appointment_id).await?;
                validate_appointment_transition(latest.status(), AppointmentStatus::Cancelled)?;
                Err(BillingError::IllegalStateTransition(format!(
                    "appointment {} changed concurrently", appointment_id
                )))
            }
        }
    }

    /// Deletes an appointment together with its commission and invoice item.
    ///
    /// The sending doctor and the examiner may delete it. While it is still
    /// waiting, any receiving doctor may. Removing an item from a pending
    /// invoice shrinks that invoice (or removes it when it was the last item).
    /// Appointments on a paid invoice stay.
    #[instrument(skip(self))]
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
        actor_role: Option<DoctorRole>,
    ) -> Result<(), BillingError> {
        let appointment = self.require_appointment(appointment_id).await?;
        let is_party = appointment.sending_doctor_id == actor_id
            || appointment.receiving_doctor_id() == Some(actor_id)
            || (appointment.state == AppointmentState::Scheduled && actor_role == Some(DoctorRole::Receiving));
        if !is_party {
            return Err(BillingError::NotFound("Appointment".to_string()));
        }

        // The status guard keeps the party check valid until the delete commits.
        match self.store.delete_appointment(appointment_id, appointment.status()).await? {
            AppointmentDeletion::Deleted => {
                info!("Appointment {} deleted with its billing records", appointment_id);
                Ok(())
            }
            AppointmentDeletion::OnPaidInvoice => Err(BillingError::IllegalStateTransition(format!(
                "appointment {} is billed on a paid invoice", appointment_id
            ))),
            AppointmentDeletion::Missing => match self.store.get_appointment(appointment_id).await? {
                Some(latest) => Err(BillingError::IllegalStateTransition(format!(
                    "appointment {} changed to {} while deleting", appointment_id, latest.status()
                ))),
                None => Err(BillingError::NotFound("Appointment".to_string())),
            },
        }
    }

    async fn require_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BillingError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("Appointment".to_string()))
    }

    // ==========================================================================
    // INVOICES
    // ==========================================================================

    /// Bills a batch of examined, not yet invoiced appointments of one sending doctor.
    #[instrument(skip(self, request), fields(count = request.appointment_ids.len()))]
    pub async fn create_invoice(
        &self,
        receiving_doctor_id: Uuid,
        request: CreateInvoiceRequest,
        issue_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<InvoiceDetail, BillingError> {
        let ids = &request.appointment_ids;
        if ids.is_empty() {
            return Err(BillingError::ValidationError("An invoice needs at least one appointment".to_string()));
        }
        let unique: HashSet<&Uuid> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(BillingError::ValidationError("Appointment ids must be distinct".to_string()));
        }

        let expected_total = ids.len() as i64 * self.fee_cents;
        if request.total_amount_cents != expected_total {
            return Err(BillingError::ValidationError(format!(
                "Total {} does not match {} patients x {}", request.total_amount_cents, ids.len(), self.fee_cents
            )));
        }

        for id in ids {
            let appointment = self.require_appointment(*id).await?;
            if appointment.sending_doctor_id != request.sending_doctor_id {
                return Err(BillingError::ValidationError(format!(
                    "Appointment {} belongs to another sending doctor", id
                )));
            }
            match appointment.state {
                AppointmentState::Completed { examined_by, .. } if examined_by == receiving_doctor_id => {}
                AppointmentState::Completed { .. } => {
                    return Err(BillingError::ValidationError(format!(
                        "Appointment {} was examined by another doctor", id
                    )))
                }
                _ => {
                    return Err(BillingError::IllegalStateTransition(format!(
                        "appointment {} is {} and cannot be invoiced", id, appointment.status()
                    )))
                }
            }
        }

        let invoiced = self.store.invoiced_appointment_ids(ids).await?;
        if let Some(id) = ids.iter().find(|id| invoiced.contains(id)) {
            return Err(BillingError::AlreadyInvoiced(*id));
        }

        let invoice = self
            .insert_with_fresh_number(receiving_doctor_id, &request, expected_total, issue_date, now)
            .await?;

        let items: Vec<InvoiceItem> = ids
            .iter()
            .map(|appointment_id| InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id: invoice.id,
                appointment_id: *appointment_id,
                amount_cents: self.fee_cents,
                created_at: now,
            })
            .collect();

        match self.store.insert_invoice_items(&items).await {
            Ok(items) => {
                info!("Invoice {} issued for {} patients", invoice.invoice_number, items.len());
                Ok(InvoiceDetail { invoice, items })
            }
            Err(err) => {
                warn!("Item insert for invoice {} failed, removing it: {}", invoice.invoice_number, err);
                self.store.delete_invoice(invoice.id).await?;
                match err {
                    StoreError::Conflict(_) => {
                        let taken = self.store.invoiced_appointment_ids(ids).await?;
                        let id = ids.iter().find(|id| taken.contains(id)).unwrap_or(&ids[0]);
                        Err(BillingError::AlreadyInvoiced(*id))
                    }
                    other => Err(other.into()),
                }
            }
        }
    }

    async fn insert_with_fresh_number(
        &self,
        receiving_doctor_id: Uuid,
        request: &CreateInvoiceRequest,
        total_amount_cents: i64,
        issue_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let invoice = Invoice {
                id: Uuid::new_v4(),
                invoice_number: generate_invoice_number(&self.invoice_prefix, issue_date, &mut rand::thread_rng()),
                sending_doctor_id: request.sending_doctor_id,
                receiving_doctor_id,
                total_amount_cents,
                patient_count: request.appointment_ids.len() as i64,
                issue_date,
                status: InvoiceStatus::Pending,
                paid_at: None,
                notes: normalize_notes(request.notes.clone()),
                created_at: now,
            };

            match self.store.insert_invoice(&invoice).await {
                Ok(created) => return Ok(created),
                Err(StoreError::Conflict(_)) => {
                    warn!("Invoice number {} taken, attempt {}/{}", invoice.invoice_number, attempt, MAX_ATTEMPTS);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::DatabaseError(format!(
            "Could not allocate a unique invoice number after {} attempts", MAX_ATTEMPTS
        )))
    }

    #[instrument(skip(self))]
    pub async fn mark_invoice_paid(
        &self,
        invoice_id: Uuid,
        receiving_doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        let invoice = self.require_invoice(invoice_id).await?;
        if invoice.receiving_doctor_id != receiving_doctor_id {
            return Err(BillingError::NotFound("Invoice".to_string()));
        }
        validate_invoice_transition(invoice.status, InvoiceStatus::Paid)?;

        let paid = self.store.mark_invoice_paid(invoice_id, now).await?.ok_or_else(|| {
            BillingError::IllegalStateTransition(format!("invoice {} is no longer pending", invoice.invoice_number))
        })?;

        info!("Invoice {} paid", paid.invoice_number);
        Ok(paid)
    }

    /// Removes the invoice and its items. Commissions are left alone and the
    /// appointments become invoiceable again.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: Uuid, receiving_doctor_id: Uuid) -> Result<(), BillingError> {
        let invoice = self.require_invoice(invoice_id).await?;
        if invoice.receiving_doctor_id != receiving_doctor_id {
            return Err(BillingError::NotFound("Invoice".to_string()));
        }

        if !self.store.delete_invoice(invoice_id).await? {
            return Err(BillingError::NotFound("Invoice".to_string()));
        }
        info!("Invoice {} deleted", invoice.invoice_number);
        Ok(())
    }

    pub async fn invoice_items(&self, invoice_id: Uuid, actor_id: Uuid) -> Result<Vec<InvoiceItem>, BillingError> {
        let invoice = self.require_invoice(invoice_id).await?;
        if invoice.receiving_doctor_id != actor_id && invoice.sending_doctor_id != actor_id {
            return Err(BillingError::NotFound("Invoice".to_string()));
        }
        Ok(self.store.items_for_invoice(invoice_id).await?)
    }

    pub async fn issued_invoices(&self, receiving_doctor_id: Uuid) -> Result<Vec<Invoice>, BillingError> {
        let filter = InvoiceFilter { receiving_doctor_id: Some(receiving_doctor_id), ..Default::default() };
        Ok(self.store.list_invoices(&filter).await?)
    }

    pub async fn received_invoices(&self, sending_doctor_id: Uuid) -> Result<Vec<Invoice>, BillingError> {
        let filter = InvoiceFilter { sending_doctor_id: Some(sending_doctor_id), ..Default::default() };
        Ok(self.store.list_invoices(&filter).await?)
    }

    async fn require_invoice(&self, invoice_id: Uuid) -> Result<Invoice, BillingError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("Invoice".to_string()))
    }

    // ==========================================================================
    // COMMISSIONS
    // ==========================================================================

    #[instrument(skip(self))]
    pub async fn mark_commission_paid(
        &self,
        commission_id: Uuid,
        receiving_doctor_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<Commission, BillingError> {
        let commission = self
            .store
            .get_commission(commission_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("Commission".to_string()))?;

        let appointment = self.require_appointment(commission.appointment_id).await?;
        if appointment.receiving_doctor_id() != Some(receiving_doctor_id) {
            return Err(BillingError::NotFound("Commission".to_string()));
        }
        validate_commission_transition(commission.status, CommissionStatus::Paid)?;

        let paid = self.store.mark_commission_paid(commission_id, paid_at).await?.ok_or_else(|| {
            BillingError::IllegalStateTransition(format!("commission {} is no longer pending", commission_id))
        })?;

        info!("Commission {} paid", commission_id);
        Ok(paid)
    }

    pub async fn commissions(&self, sending_doctor_id: Uuid) -> Result<Vec<Commission>, BillingError> {
        Ok(self.store.list_commissions(sending_doctor_id).await?)
    }

    pub async fn commission_summary(&self, sending_doctor_id: Uuid) -> Result<CommissionSummary, BillingError> {
        let commissions = self.store.list_commissions(sending_doctor_id).await?;
        Ok(CommissionSummary::from_commissions(&commissions))
    }

    // ==========================================================================
    // LISTINGS
    // ==========================================================================

    /// Bookings made by a sending doctor, newest first.
    pub async fn sent_appointments(&self, sending_doctor_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Appointment>, BillingError> {
        let filter = AppointmentFilter {
            sending_doctor_id: Some(sending_doctor_id),
            since: self.retention_cutoff(now),
            ..Default::default()
        };
        Ok(self.store.list_appointments(&filter).await?)
    }

    /// Patients waiting for examination, oldest first.
    pub async fn received_patients(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, BillingError> {
        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Scheduled),
            since: self.retention_cutoff(now),
            order: SortOrder::Ascending,
            ..Default::default()
        };
        Ok(self.store.list_appointments(&filter).await?)
    }

    pub async fn examined_patients(&self, receiving_doctor_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Appointment>, BillingError> {
        let filter = AppointmentFilter {
            receiving_doctor_id: Some(receiving_doctor_id),
            status: Some(AppointmentStatus::Completed),
            since: self.retention_cutoff(now),
            ..Default::default()
        };
        Ok(self.store.list_appointments(&filter).await?)
    }

    /// Examined appointments of the pair that no invoice item references yet.
    pub async fn invoiceable_appointments(
        &self,
        sending_doctor_id: Uuid,
        receiving_doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, BillingError> {
        let filter = AppointmentFilter {
            sending_doctor_id: Some(sending_doctor_id),
            receiving_doctor_id: Some(receiving_doctor_id),
            status: Some(AppointmentStatus::Completed),
            since: self.retention_cutoff(now),
            order: SortOrder::Ascending,
        };
        let examined = self.store.list_appointments(&filter).await?;

        let ids: Vec<Uuid> = examined.iter().map(|a| a.id).collect();
        let invoiced = self.store.invoiced_appointment_ids(&ids).await?;

        Ok(examined.into_iter().filter(|a| !invoiced.contains(&a.id)).collect())
    }
}
