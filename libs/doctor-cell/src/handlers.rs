use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Weekday;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;
use shared_utils::AppState;

use crate::models::{
    AvailableSlotsResponse, DoctorError, ReplaceScheduleRequest, ScheduleResponse, SlotQuery,
    UpsertDoctorRequest,
};
use crate::services::{AvailabilityService, DoctorDirectoryService, SlotGenerator};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    DoctorDirectoryService::new(state.db.clone())
        .get_doctor(doctor_id)
        .await?;

    let generator = SlotGenerator::new(state.db.clone(), state.config.rules.daily_cap);
    let slots = generator.available_slots(doctor_id, query.date).await;

    Ok(Json(AvailableSlotsResponse {
        doctor_id,
        date: query.date,
        slots,
    }))
}

pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let service = AvailabilityService::new(
        state.db.clone(),
        state.config.rules.default_slot_duration_minutes,
    );
    let windows = service.get_schedule(doctor_id).await;
    Ok(Json(ScheduleResponse { doctor_id, windows }))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

pub async fn replace_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<ReplaceScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let service = AvailabilityService::new(
        state.db.clone(),
        state.config.rules.default_slot_duration_minutes,
    );

    let windows = service
        .replace_schedule(&actor, doctor_id, request.windows)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability updated",
        "windows": windows
    })))
}

pub async fn delete_window(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((doctor_id, weekday)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let weekday = Weekday::from_str(&weekday)
        .map_err(|_| DoctorError::ValidationError(format!("Unknown weekday: {}", weekday)))?;

    let service = AvailabilityService::new(
        state.db.clone(),
        state.config.rules.default_slot_duration_minutes,
    );
    let removed = service.delete_window(&actor, doctor_id, weekday).await?;

    Ok(Json(json!({
        "success": true,
        "removed": removed
    })))
}

pub async fn upsert_doctor(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpsertDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Directory update for doctor {} by {}", doctor_id, user.id);
    let actor = actor_from_user(&user)?;

    let profile = DoctorDirectoryService::new(state.db.clone())
        .upsert_doctor(&actor, doctor_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": profile
    })))
}
