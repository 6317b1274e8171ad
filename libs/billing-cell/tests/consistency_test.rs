use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use billing_cell::models::{
    Appointment, AppointmentState, BillingError, BookAppointmentRequest, CommissionStatus,
    CreateInvoiceRequest, InvoiceStatus,
};
use billing_cell::services::{BillingService, BillingStore, InMemoryBillingStore};
use shared_config::AppConfig;
use shared_models::auth::DoctorRole;
use shared_utils::test_utils::TestConfig;

const FEE: i64 = 1400;

fn config() -> AppConfig {
    AppConfig {
        patient_fee_cents: FEE,
        invoice_number_prefix: "INV".to_string(),
        data_retention_years: 1,
        ..TestConfig::default().to_app_config()
    }
}

fn service() -> BillingService<InMemoryBillingStore> {
    BillingService::new(InMemoryBillingStore::new(), &config())
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 8).unwrap()
}

fn issued_at() -> DateTime<Utc> {
    at(2030, 1, 8, 8, 0)
}

async fn book(service: &BillingService<InMemoryBillingStore>, sending: Uuid, slot: &str) -> Appointment {
    let request = BookAppointmentRequest {
        ambulance_code: "AB".to_string(),
        appointment_date: DateTime::parse_from_rfc3339(slot).unwrap(),
        notes: None,
    };
    service.book_appointment(sending, request, at(2030, 1, 1, 0, 0)).await.unwrap()
}

async fn examined(service: &BillingService<InMemoryBillingStore>, sending: Uuid, receiving: Uuid, slot: &str) -> Appointment {
    let appointment = book(service, sending, slot).await;
    service.mark_examined(appointment.id, receiving, at(2030, 1, 7, 12, 0)).await.unwrap()
}

fn invoice_request(sending: Uuid, ids: Vec<Uuid>) -> CreateInvoiceRequest {
    let total_amount_cents = ids.len() as i64 * FEE;
    CreateInvoiceRequest { sending_doctor_id: sending, appointment_ids: ids, total_amount_cents, notes: None }
}

#[tokio::test]
async fn booking_derives_patient_number_from_wall_clock() {
    let service = service();
    let appointment = book(&service, Uuid::new_v4(), "2030-01-07T09:30:00+01:00").await;

    assert_eq!(appointment.patient_number, "AB-2030-01-07-0930");
    assert_eq!(appointment.appointment_date, at(2030, 1, 7, 8, 30));
    assert_eq!(appointment.state, AppointmentState::Scheduled);
}

#[tokio::test]
async fn booking_in_the_past_is_rejected() {
    let service = service();
    let request = BookAppointmentRequest {
        ambulance_code: "AB".to_string(),
        appointment_date: DateTime::parse_from_rfc3339("2029-12-31T09:00:00+00:00").unwrap(),
        notes: None,
    };

    let result = service.book_appointment(Uuid::new_v4(), request, at(2030, 1, 1, 0, 0)).await;
    assert_matches!(result, Err(BillingError::ValidationError(_)));
}

#[tokio::test]
async fn examining_twice_creates_one_commission() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let appointment = book(&service, sending, "2030-01-07T09:00:00+00:00").await;
    let examined_at = at(2030, 1, 7, 9, 20);

    let first = service.mark_examined(appointment.id, receiving, examined_at).await.unwrap();
    let second = service.mark_examined(appointment.id, receiving, examined_at).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.receiving_doctor_id(), Some(receiving));
    assert_eq!(service.store().commission_count().await, 1);

    let commission = service.store().commission_for_appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(commission.amount_cents, FEE);
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.sending_doctor_id, sending);
}

#[tokio::test]
async fn examination_by_another_doctor_is_rejected() {
    let service = service();
    let appointment = examined(&service, Uuid::new_v4(), Uuid::new_v4(), "2030-01-07T09:00:00+00:00").await;

    let result = service.mark_examined(appointment.id, Uuid::new_v4(), Utc::now()).await;
    assert_matches!(result, Err(BillingError::IllegalStateTransition(_)));
    assert_eq!(service.store().commission_count().await, 1);
}

#[tokio::test]
async fn cancelled_appointment_cannot_be_examined() {
    let service = service();
    let sending = Uuid::new_v4();
    let appointment = book(&service, sending, "2030-01-07T09:00:00+00:00").await;

    service.cancel_appointment(appointment.id, sending).await.unwrap();

    let result = service.mark_examined(appointment.id, Uuid::new_v4(), Utc::now()).await;
    assert_matches!(result, Err(BillingError::IllegalStateTransition(_)));
    assert_eq!(service.store().commission_count().await, 0);

    let again = service.cancel_appointment(appointment.id, sending).await;
    assert_matches!(again, Err(BillingError::IllegalStateTransition(_)));
}

#[tokio::test]
async fn examining_unknown_appointment_is_not_found() {
    let service = service();
    let result = service.mark_examined(Uuid::new_v4(), Uuid::new_v4(), Utc::now()).await;
    assert_matches!(result, Err(BillingError::NotFound(_)));
}

#[tokio::test]
async fn appointment_is_invoiced_at_most_once() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let b = examined(&service, sending, receiving, "2030-01-07T09:30:00+00:00").await;
    let c = examined(&service, sending, receiving, "2030-01-07T10:00:00+00:00").await;

    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id, b.id]), issue_date(), issued_at())
        .await
        .unwrap();
    assert_eq!(detail.items.len(), 2);

    let second = service
        .create_invoice(receiving, invoice_request(sending, vec![c.id, a.id]), issue_date(), issued_at())
        .await;
    assert_matches!(second, Err(BillingError::AlreadyInvoiced(id)) if id == a.id);
    assert_eq!(service.store().item_count().await, 2);
}

#[tokio::test]
async fn invoice_total_matches_items() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let b = examined(&service, sending, receiving, "2030-01-07T09:30:00+00:00").await;

    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id, b.id]), issue_date(), issued_at())
        .await
        .unwrap();

    let invoice = &detail.invoice;
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.patient_count, 2);
    assert_eq!(invoice.total_amount_cents, detail.items.len() as i64 * FEE);
    assert_eq!(invoice.total_amount_cents, 2800);
    assert!(invoice.invoice_number.starts_with("INV-300108-"));
    assert!(detail.items.iter().all(|item| item.amount_cents == FEE));
}

#[tokio::test]
async fn billing_rows_are_stamped_with_the_supplied_time() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let appointment = book(&service, sending, "2030-01-07T09:00:00+00:00").await;
    let examined_at = at(2030, 1, 7, 9, 20);

    service.mark_examined(appointment.id, receiving, examined_at).await.unwrap();
    let commission = service.store().commission_for_appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(commission.created_at, examined_at);

    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![appointment.id]), issue_date(), issued_at())
        .await
        .unwrap();
    assert_eq!(detail.invoice.created_at, issued_at());
    assert!(detail.items.iter().all(|item| item.created_at == issued_at()));
}

#[tokio::test]
async fn mismatched_total_is_rejected() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;

    let mut request = invoice_request(sending, vec![a.id]);
    request.total_amount_cents = 1000;

    let result = service.create_invoice(receiving, request, issue_date(), issued_at()).await;
    assert_matches!(result, Err(BillingError::ValidationError(_)));
}

#[tokio::test]
async fn invoice_batch_must_be_examined_by_the_issuer() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let scheduled = book(&service, sending, "2030-01-07T09:00:00+00:00").await;
    let foreign = examined(&service, sending, Uuid::new_v4(), "2030-01-07T09:30:00+00:00").await;
    let other_sender = examined(&service, Uuid::new_v4(), receiving, "2030-01-07T10:00:00+00:00").await;

    let result = service.create_invoice(receiving, invoice_request(sending, vec![scheduled.id]), issue_date(), issued_at()).await;
    assert_matches!(result, Err(BillingError::IllegalStateTransition(_)));

    let result = service.create_invoice(receiving, invoice_request(sending, vec![foreign.id]), issue_date(), issued_at()).await;
    assert_matches!(result, Err(BillingError::ValidationError(_)));

    let result = service.create_invoice(receiving, invoice_request(sending, vec![other_sender.id]), issue_date(), issued_at()).await;
    assert_matches!(result, Err(BillingError::ValidationError(_)));

    let result = service.create_invoice(receiving, invoice_request(sending, vec![]), issue_date(), issued_at()).await;
    assert_matches!(result, Err(BillingError::ValidationError(_)));
}

#[tokio::test]
async fn deleting_appointment_removes_its_commission() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;

    service.delete_appointment(a.id, sending, Some(DoctorRole::Sending)).await.unwrap();

    assert_eq!(service.store().commission_count().await, 0);
    assert!(service.store().get_appointment(a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn any_receiving_doctor_can_remove_a_waiting_appointment() {
    let service = service();
    let sending = Uuid::new_v4();
    let waiting = book(&service, sending, "2030-01-07T09:00:00+00:00").await;

    let stranger = service.delete_appointment(waiting.id, Uuid::new_v4(), Some(DoctorRole::Sending)).await;
    assert_matches!(stranger, Err(BillingError::NotFound(_)));

    service
        .delete_appointment(waiting.id, Uuid::new_v4(), Some(DoctorRole::Receiving))
        .await
        .unwrap();
    assert!(service.store().get_appointment(waiting.id).await.unwrap().is_none());
}

#[tokio::test]
async fn examined_appointment_is_deletable_only_by_its_parties() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;

    let other_receiver = service.delete_appointment(a.id, Uuid::new_v4(), Some(DoctorRole::Receiving)).await;
    assert_matches!(other_receiver, Err(BillingError::NotFound(_)));
    assert_eq!(service.store().commission_count().await, 1);

    service.delete_appointment(a.id, receiving, Some(DoctorRole::Receiving)).await.unwrap();
    assert_eq!(service.store().commission_count().await, 0);
}

#[tokio::test]
async fn deleting_invoiced_appointment_shrinks_pending_invoice() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let b = examined(&service, sending, receiving, "2030-01-07T09:30:00+00:00").await;
    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id, b.id]), issue_date(), issued_at())
        .await
        .unwrap();

    service.delete_appointment(a.id, receiving, Some(DoctorRole::Receiving)).await.unwrap();

    let invoice = service.store().get_invoice(detail.invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.patient_count, 1);
    assert_eq!(invoice.total_amount_cents, FEE);
    assert_eq!(service.store().items_for_invoice(invoice.id).await.unwrap().len(), 1);

    // Last item gone takes the invoice with it.
    service.delete_appointment(b.id, sending, Some(DoctorRole::Sending)).await.unwrap();
    assert!(service.store().get_invoice(detail.invoice.id).await.unwrap().is_none());
}

#[tokio::test]
async fn appointment_on_paid_invoice_cannot_be_deleted() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id]), issue_date(), issued_at())
        .await
        .unwrap();
    service.mark_invoice_paid(detail.invoice.id, receiving, Utc::now()).await.unwrap();

    let result = service.delete_appointment(a.id, sending, Some(DoctorRole::Sending)).await;
    assert_matches!(result, Err(BillingError::IllegalStateTransition(_)));
    assert_eq!(service.store().commission_count().await, 1);
}

#[tokio::test]
async fn deleting_invoice_keeps_commissions_and_frees_appointments() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let b = examined(&service, sending, receiving, "2030-01-07T09:30:00+00:00").await;
    let now = at(2030, 1, 8, 0, 0);

    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id, b.id]), issue_date(), issued_at())
        .await
        .unwrap();
    assert!(service.invoiceable_appointments(sending, receiving, now).await.unwrap().is_empty());

    service.delete_invoice(detail.invoice.id, receiving).await.unwrap();

    assert_eq!(service.store().item_count().await, 0);
    assert_eq!(service.store().commission_count().await, 2);
    let invoiceable = service.invoiceable_appointments(sending, receiving, now).await.unwrap();
    assert_eq!(invoiceable.len(), 2);

    service
        .create_invoice(receiving, invoice_request(sending, vec![a.id, b.id]), issue_date(), issued_at())
        .await
        .unwrap();
}

#[tokio::test]
async fn paying_twice_is_an_illegal_transition() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id]), issue_date(), issued_at())
        .await
        .unwrap();
    let paid_at = at(2030, 2, 1, 10, 0);

    let invoice = service.mark_invoice_paid(detail.invoice.id, receiving, paid_at).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.paid_at, Some(paid_at));
    assert_matches!(
        service.mark_invoice_paid(detail.invoice.id, receiving, paid_at).await,
        Err(BillingError::IllegalStateTransition(_))
    );

    let commission = service.store().commission_for_appointment(a.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);

    let paid = service.mark_commission_paid(commission.id, receiving, paid_at).await.unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);
    assert_eq!(paid.paid_at, Some(paid_at));
    assert_matches!(
        service.mark_commission_paid(commission.id, receiving, paid_at).await,
        Err(BillingError::IllegalStateTransition(_))
    );

    let summary = service.commission_summary(sending).await.unwrap();
    assert_eq!(summary.paid_count, 1);
    assert_eq!(summary.paid_cents, FEE);
    assert_eq!(summary.pending_count, 0);
}

#[tokio::test]
async fn only_the_issuer_can_settle_an_invoice() {
    let service = service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let a = examined(&service, sending, receiving, "2030-01-07T09:00:00+00:00").await;
    let detail = service
        .create_invoice(receiving, invoice_request(sending, vec![a.id]), issue_date(), issued_at())
        .await
        .unwrap();

    assert_matches!(
        service.mark_invoice_paid(detail.invoice.id, Uuid::new_v4(), Utc::now()).await,
        Err(BillingError::NotFound(_))
    );
    assert_matches!(
        service.invoice_items(detail.invoice.id, Uuid::new_v4()).await,
        Err(BillingError::NotFound(_))
    );
    assert_eq!(service.invoice_items(detail.invoice.id, sending).await.unwrap().len(), 1);
}

#[tokio::test]
async fn listings_hide_appointments_past_retention() {
    let service = service();
    let sending = Uuid::new_v4();

    let old_request = BookAppointmentRequest {
        ambulance_code: "AB".to_string(),
        appointment_date: DateTime::parse_from_rfc3339("2028-06-01T09:00:00+00:00").unwrap(),
        notes: Some("  ".to_string()),
    };
    let old = service.book_appointment(sending, old_request, at(2028, 5, 1, 0, 0)).await.unwrap();
    assert_eq!(old.notes, None);
    let recent = book(&service, sending, "2030-01-07T09:00:00+00:00").await;

    let listed = service.sent_appointments(sending, at(2030, 1, 5, 0, 0)).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![recent.id]);

    let waiting = service.received_patients(at(2030, 1, 5, 0, 0)).await.unwrap();
    assert_eq!(waiting.len(), 1);
}
