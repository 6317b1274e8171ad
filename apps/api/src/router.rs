use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use billing_cell::router::{appointment_routes, commission_routes, invoice_routes};
use office_hours_cell::router::office_hours_routes;
use profile_cell::router::profile_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Referral billing API is running!" }))
        .nest("/office-hours", office_hours_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/invoices", invoice_routes(state.clone()))
        .nest("/commissions", commission_routes(state.clone()))
        .nest("/profiles", profile_routes(state))
}
