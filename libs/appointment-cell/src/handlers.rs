use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::Appointment;
use shared_utils::extractor::actor_from_user;
use shared_utils::AppState;

use crate::models::{
    AdminCancelRequest, AppointmentListQuery, BookAppointmentRequest, BookingOutcome,
    BulkCancelRequest, CancellationOutcome, EmergencyIntakeRequest, EmergencyOutcome,
    ModifyAppointmentRequest,
};
use crate::services::{AdminCancellationService, AppointmentBookingService, EmergencyIntakeService};

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<BookingOutcome>), AppError> {
    let actor = actor_from_user(&user)?;
    let outcome = AppointmentBookingService::new(&state)
        .book_appointment(&actor, request)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_my_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = AppointmentBookingService::new(&state)
        .list_for_patient(&actor, &query)
        .await?;
    Ok(Json(appointments))
}

pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = AppointmentBookingService::new(&state)
        .list_for_doctor(&actor, doctor_id, &query)
        .await?;
    Ok(Json(appointments))
}

pub async fn modify_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<ModifyAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = AppointmentBookingService::new(&state)
        .modify_appointment(&actor, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = AppointmentBookingService::new(&state)
        .cancel_appointment(&actor, appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": appointment
    })))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

pub async fn admin_cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AdminCancelRequest>,
) -> Result<Json<CancellationOutcome>, AppError> {
    info!("Admin cancellation of {} requested by {}", appointment_id, user.id);
    let actor = actor_from_user(&user)?;
    let outcome = AdminCancellationService::new(&state)
        .cancel_single(&actor, appointment_id, request.reason)
        .await?;
    Ok(Json(outcome))
}

pub async fn cancel_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<BulkCancelRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Bulk cancellation for doctor {} requested by {}", doctor_id, user.id);
    let actor = actor_from_user(&user)?;
    let outcomes = AdminCancellationService::new(&state)
        .cancel_for_doctor(&actor, doctor_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "cancelled_count": outcomes.len(),
        "cancellations": outcomes
    })))
}

pub async fn admit_emergency(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<EmergencyIntakeRequest>,
) -> Result<(StatusCode, Json<EmergencyOutcome>), AppError> {
    let actor = actor_from_user(&user)?;
    let outcome = EmergencyIntakeService::new(&state)
        .admit(&actor, request)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
