use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/emergency", post(handlers::admit_emergency))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route(
            "/admin/doctors/{doctor_id}/cancel",
            post(handlers::cancel_doctor_appointments),
        )
        .route("/{appointment_id}", patch(handlers::modify_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/admin-cancel",
            post(handlers::admin_cancel_appointment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
