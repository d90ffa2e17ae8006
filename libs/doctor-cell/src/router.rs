use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/slots", get(handlers::get_available_slots))
        .route("/{doctor_id}/availability", get(handlers::get_schedule));

    let protected_routes = Router::new()
        .route("/{doctor_id}/profile", put(handlers::upsert_doctor))
        .route("/{doctor_id}/availability", put(handlers::replace_schedule))
        .route(
            "/{doctor_id}/availability/{weekday}",
            delete(handlers::delete_window),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
