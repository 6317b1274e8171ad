use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Local;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{DoctorRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreateOfficeHourRequest, SlotQuery, UpdateOfficeHourRequest};
use crate::services::office_hours::OfficeHoursService;

/// Bookable slots of all receiving doctors on a date. Slot times follow the
/// server's local timezone.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = OfficeHoursService::new(&state);

    let slots = service.available_slots(query.date, &Local::now(), auth.token()).await?;

    Ok(Json(json!({
        "date": query.date,
        "slots": slots,
        "total_slots": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_office_hours(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = OfficeHoursService::new(&state);

    let office_hours = service.list_for_doctor(doctor_id, auth.token()).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "office_hours": office_hours
    })))
}

#[axum::debug_handler]
pub async fn create_office_hour(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOfficeHourRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = OfficeHoursService::new(&state);

    let rule = service.create_office_hour(doctor_id, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(rule))))
}

#[axum::debug_handler]
pub async fn update_office_hour(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(office_hour_id): Path<Uuid>,
    Json(request): Json<UpdateOfficeHourRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = OfficeHoursService::new(&state);

    let rule = service
        .update_office_hour(office_hour_id, doctor_id, request, auth.token())
        .await?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn delete_office_hour(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(office_hour_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let doctor_id = require_role(&user, DoctorRole::Receiving)?;
    let service = OfficeHoursService::new(&state);

    service.delete_office_hour(office_hour_id, doctor_id, auth.token()).await?;

    Ok(StatusCode::NO_CONTENT)
}
