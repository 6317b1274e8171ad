use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::user_id;

use crate::models::{UpdateInvoiceDataRequest, UpdateProfileRequest};
use crate::services::ProfileService;

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile_id = user_id(&user)?;
    let service = ProfileService::new(&state)?;

    let profile = service.get_profile(profile_id, auth.token()).await?;

    Ok(Json(json!(profile)))
}

/// Counterparty profile, e.g. the invoice data of the doctor being billed.
#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileService::new(&state)?;

    let profile = service.get_profile(profile_id, auth.token()).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile_id = user_id(&user)?;
    let service = ProfileService::new(&state)?;

    let profile = service.update_profile(profile_id, request, auth.token()).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_my_invoice_data(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateInvoiceDataRequest>,
) -> Result<Json<Value>, AppError> {
    let profile_id = user_id(&user)?;
    let service = ProfileService::new(&state)?;

    let profile = service.update_invoice_data(profile_id, request, auth.token()).await?;

    Ok(Json(json!(profile)))
}
