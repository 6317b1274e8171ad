use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/received", get(handlers::list_received_patients))
        .route("/examined", get(handlers::list_examined_patients))
        .route("/invoiceable", get(handlers::list_invoiceable_appointments))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        .route("/{appointment_id}/examine", post(handlers::examine_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn invoice_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_invoice))
        .route("/issued", get(handlers::list_issued_invoices))
        .route("/received", get(handlers::list_received_invoices))
        .route("/{invoice_id}", delete(handlers::delete_invoice))
        .route("/{invoice_id}/items", get(handlers::get_invoice_items))
        .route("/{invoice_id}/pay", post(handlers::pay_invoice))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn commission_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/mine", get(handlers::list_my_commissions))
        .route("/summary", get(handlers::get_commission_summary))
        .route("/{commission_id}/pay", post(handlers::pay_commission))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
