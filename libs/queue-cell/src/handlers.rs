use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;
use shared_utils::AppState;

use crate::models::{
    CallNextResponse, CheckInRequest, CheckInResponse, PatientQueueStatus, PatientStatusQuery,
    QueueSnapshot, TokenQuery, TokenResponse,
};
use crate::services::{CheckInGateway, QueueService};

pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, AppError> {
    let actor = actor_from_user(&user)?;
    debug!("Check-in scan by {}", user.id);

    let response = CheckInGateway::new(&state)
        .process_check_in(&actor, &request.token)
        .await?;
    Ok(Json(response))
}

pub async fn call_next(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<CallNextResponse>, AppError> {
    let actor = actor_from_user(&user)?;
    let response = QueueService::new(&state).call_next(&actor, queue_id).await?;
    Ok(Json(response))
}

pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<QueueSnapshot>, AppError> {
    let actor = actor_from_user(&user)?;
    let snapshot = QueueService::new(&state).snapshot(&actor, queue_id).await?;
    Ok(Json(snapshot))
}

pub async fn get_my_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientStatusQuery>,
) -> Result<Json<PatientQueueStatus>, AppError> {
    let actor = actor_from_user(&user)?;
    let status = QueueService::new(&state)
        .patient_status(&actor, query.doctor_id)
        .await?;
    Ok(Json(status))
}

pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, AppError> {
    let actor = actor_from_user(&user)?;
    let token = QueueService::new(&state)
        .issue_token(&actor, doctor_id, query.date)
        .await?;
    Ok(Json(token))
}

/// Staff actions on a single entry: `emergency`, `no-show`, `start`, `end`.
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((entry_id, action)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let service = QueueService::new(&state);

    let entry = match action.as_str() {
        "emergency" => service.mark_emergency(&actor, entry_id).await,
        "no-show" => service.mark_no_show(&actor, entry_id).await,
        "start" => service.start_consultation(&actor, entry_id).await,
        "end" => service.end_consultation(&actor, entry_id).await,
        other => {
            return Err(AppError::BadRequest(format!("Unknown queue action: {}", other)));
        }
    }
    .map_err(AppError::from)?;

    info!("Queue entry {} updated via {} by {}", entry_id, action, user.id);

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

