use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::{AvailabilityWindow, Specialization};

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertDoctorRequest {
    pub full_name: String,
    pub specialization: Specialization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRequest {
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Falls back to the clinic default when omitted.
    pub slot_duration_minutes: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceScheduleRequest {
    pub windows: Vec<WindowRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleResponse {
    pub doctor_id: Uuid,
    pub windows: Vec<AvailabilityWindow>,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Unauthorized access to doctor data")]
    UnauthorizedAccess,

    #[error("{0}")]
    ValidationError(String),

    #[error("No availability window for {0}")]
    WindowNotFound(Weekday),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::WindowNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            DoctorError::UnauthorizedAccess => AppError::Forbidden(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Database(e) => {
                error!("Doctor store failure: {}", e);
                AppError::Database(e.to_string())
            }
        }
    }
}
