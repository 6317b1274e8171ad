use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use billing_cell::models::{BillingError, BookAppointmentRequest, CreateInvoiceRequest};
use billing_cell::services::{BillingService, BillingStore, InMemoryBillingStore};
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

fn shared_service() -> Arc<BillingService<InMemoryBillingStore>> {
    let config = AppConfig {
        patient_fee_cents: 1400,
        ..TestConfig::default().to_app_config()
    };
    Arc::new(BillingService::new(InMemoryBillingStore::new(), &config))
}

async fn book(service: &BillingService<InMemoryBillingStore>, sending: Uuid, slot: &str) -> Uuid {
    let request = BookAppointmentRequest {
        ambulance_code: "CD".to_string(),
        appointment_date: DateTime::parse_from_rfc3339(slot).unwrap(),
        notes: None,
    };
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    service.book_appointment(sending, request, now).await.unwrap().id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_examinations_create_exactly_one_commission() {
    let service = shared_service();
    let receiving = Uuid::new_v4();
    let appointment_id = book(&service, Uuid::new_v4(), "2030-01-07T09:00:00+00:00").await;
    let examined_at = Utc.with_ymd_and_hms(2030, 1, 7, 9, 15, 0).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.mark_examined(appointment_id, receiving, examined_at).await })
        })
        .collect();

    for result in join_all(handles).await {
        let appointment = result.unwrap().unwrap();
        assert_eq!(appointment.receiving_doctor_id(), Some(receiving));
    }

    assert_eq!(service.store().commission_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invoices_bill_an_appointment_once() {
    let service = shared_service();
    let (sending, receiving) = (Uuid::new_v4(), Uuid::new_v4());
    let examined_at = Utc.with_ymd_and_hms(2030, 1, 7, 12, 0, 0).unwrap();

    let mut ids = Vec::new();
    for slot in ["2030-01-07T09:00:00+00:00", "2030-01-07T09:30:00+00:00"] {
        let id = book(&service, sending, slot).await;
        service.mark_examined(id, receiving, examined_at).await.unwrap();
        ids.push(id);
    }

    let issue_date = NaiveDate::from_ymd_opt(2030, 1, 8).unwrap();
    let issued_at = Utc.with_ymd_and_hms(2030, 1, 8, 8, 0, 0).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let request = CreateInvoiceRequest {
                sending_doctor_id: sending,
                appointment_ids: ids.clone(),
                total_amount_cents: 2800,
                notes: None,
            };
            tokio::spawn(async move { service.create_invoice(receiving, request, issue_date, issued_at).await })
        })
        .collect();

    let mut created = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(detail) => {
                created += 1;
                assert_eq!(detail.items.len(), 2);
            }
            Err(err) => assert_matches!(err, BillingError::AlreadyInvoiced(_)),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(service.store().item_count().await, 2);
    assert_eq!(service.issued_invoices(receiving).await.unwrap().len(), 1);
    assert_eq!(service.store().invoiced_appointment_ids(&ids).await.unwrap().len(), 2);
}
