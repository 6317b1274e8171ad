use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Local, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{DoctorRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, user_id};

use crate::models::{BookAppointmentRequest, CreateInvoiceRequest, InvoiceableQuery, MarkExaminedRequest};
use crate::services::{BillingService, SupabaseBillingStore};

fn billing_service(state: &AppConfig, auth_token: &str) -> BillingService<SupabaseBillingStore> {
    BillingService::new(SupabaseBillingStore::new(state, auth_token), state)
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let appointment = service.book_appointment(sending_doctor_id, request, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let appointments = service.sent_appointments(sending_doctor_id, Utc::now()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_received_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let appointments = service.received_patients(Utc::now()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_examined_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let appointments = service.examined_patients(receiving_doctor_id, Utc::now()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_invoiceable_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<InvoiceableQuery>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let appointments = service
        .invoiceable_appointments(query.sending_doctor_id, receiving_doctor_id, Utc::now())
        .await?;
    let total_amount_cents = appointments.len() as i64 * service.fee_cents();

    Ok(Json(json!({
        "sending_doctor_id": query.sending_doctor_id,
        "appointments": appointments,
        "total_amount_cents": total_amount_cents
    })))
}

#[axum::debug_handler]
pub async fn examine_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<MarkExaminedRequest>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let examined_at = request.examined_at.unwrap_or_else(Utc::now);
    let appointment = service
        .mark_examined(appointment_id, receiving_doctor_id, examined_at)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let appointment = service.cancel_appointment(appointment_id, sending_doctor_id).await?;

    Ok(Json(json!(appointment)))
}

/// Either party of the referral may delete it. A waiting appointment may also
/// be removed by any receiving doctor.
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor_id = user_id(&user)?;
    let service = billing_service(&state, auth.token());

    service
        .delete_appointment(appointment_id, actor_id, user.doctor_role())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// INVOICE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_invoice(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let now = Utc::now();
    let detail = service
        .create_invoice(receiving_doctor_id, request, now.with_timezone(&Local).date_naive(), now)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(detail))))
}

#[axum::debug_handler]
pub async fn list_issued_invoices(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let invoices = service.issued_invoices(receiving_doctor_id).await?;

    Ok(Json(json!({ "invoices": invoices, "total": invoices.len() })))
}

#[axum::debug_handler]
pub async fn list_received_invoices(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let invoices = service.received_invoices(sending_doctor_id).await?;

    Ok(Json(json!({ "invoices": invoices, "total": invoices.len() })))
}

#[axum::debug_handler]
pub async fn get_invoice_items(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor_id = user_id(&user)?;
    let service = billing_service(&state, auth.token());

    let items = service.invoice_items(invoice_id, actor_id).await?;

    Ok(Json(json!({ "invoice_id": invoice_id, "items": items })))
}

#[axum::debug_handler]
pub async fn pay_invoice(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let invoice = service.mark_invoice_paid(invoice_id, receiving_doctor_id, Utc::now()).await?;

    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn delete_invoice(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    service.delete_invoice(invoice_id, receiving_doctor_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// COMMISSION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_my_commissions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let commissions = service.commissions(sending_doctor_id).await?;

    Ok(Json(json!({ "commissions": commissions, "total": commissions.len() })))
}

#[axum::debug_handler]
pub async fn get_commission_summary(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let sending_doctor_id = require_role(&user, DoctorRole::Sending)?;
    let service = billing_service(&state, auth.token());

    let summary = service.commission_summary(sending_doctor_id).await?;

    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn pay_commission(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let receiving_doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = billing_service(&state, auth.token());

    let commission = service
        .mark_commission_paid(commission_id, receiving_doctor_id, Utc::now())
        .await?;

    Ok(Json(json!(commission)))
}
