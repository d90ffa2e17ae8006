use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn queue_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/check-in", post(handlers::check_in))
        .route("/status", get(handlers::get_my_status))
        .route("/doctors/{doctor_id}/token", get(handlers::get_token))
        .route("/{queue_id}", get(handlers::get_queue))
        .route("/{queue_id}/call-next", post(handlers::call_next))
        .route("/entries/{entry_id}/{action}", post(handlers::update_entry))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
