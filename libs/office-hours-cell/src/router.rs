use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn office_hours_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/slots", get(handlers::get_available_slots))
        .route("/doctors/{doctor_id}", get(handlers::list_doctor_office_hours))
        .route("/", post(handlers::create_office_hour))
        .route("/{office_hour_id}", put(handlers::update_office_hour).delete(handlers::delete_office_hour))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
