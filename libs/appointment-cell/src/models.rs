use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use queue_cell::QueueError;
use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::{
    Appointment, AppointmentStatus, InvalidTransition, QueueEntry, QueueEntryStatus,
    Specialization,
};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_walk_in: bool,
    /// Required when staff book on a patient's behalf, ignored for patients.
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifyAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminCancelRequest {
    pub reason: Option<String>,
}

/// Cancels every upcoming active appointment of a doctor, or only those on
/// `date` when it is given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkCancelRequest {
    pub date: Option<NaiveDate>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyIntakeRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AppointmentListQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self.from.map_or(true, |from| appointment.date >= from)
            && self.to.map_or(true, |to| appointment.date <= to)
    }
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    /// Present for walk-ins, which join today's queue straight away.
    pub queue_entry: Option<QueueEntry>,
}

/// A free slot offered to a patient whose appointment was cancelled by the clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub specialization: Specialization,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub same_doctor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub appointment: Appointment,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyOutcome {
    /// The walk-in created for the patient, if they were not queued yet.
    pub appointment: Option<Appointment>,
    pub entry: QueueEntry,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Cannot book appointments in the past.")]
    PastDate,

    #[error("Walk-in appointments can only be booked for today.")]
    WalkInNotToday,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not available on {0}.")]
    DoctorNotAvailable(Weekday),

    #[error("This time slot is not available.")]
    SlotUnavailable,

    #[error("Doctor has reached the maximum of {cap} appointments for this day.")]
    DailyCapReached { cap: usize },

    #[error("You already have a {0} appointment on this date.")]
    SpecializationConflict(Specialization),

    #[error("This slot was just taken. Please choose another time.")]
    SlotTaken,

    #[error("Appointment not found")]
    NotFound,

    #[error("Only scheduled appointments can be modified (current status: {0}).")]
    NotModifiable(AppointmentStatus),

    #[error("Only scheduled appointments can be cancelled (current status: {0}).")]
    NotCancellable(AppointmentStatus),

    #[error("Appointment is already cancelled.")]
    AlreadyCancelled,

    #[error("Cannot cancel an appointment that is {0}.")]
    CannotCancelFinished(AppointmentStatus),

    #[error("Cannot cancel past appointments.")]
    CannotCancelPast,

    #[error("No active appointments found to cancel")]
    NoActiveAppointments,

    #[error("This patient already left today's queue ({0}) and cannot rejoin it.")]
    AlreadyLeftQueue(QueueEntryStatus),

    #[error("Not allowed to act on this appointment")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    InvalidStatusTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl AppointmentError {
    pub fn is_rejection(&self) -> bool {
        match self {
            AppointmentError::Database(_) => false,
            AppointmentError::Queue(e) => e.is_rejection(),
            _ => true,
        }
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation {
                constraint: "appointment_doctor_date_start_time",
            } => AppointmentError::SlotTaken,
            other => AppointmentError::Database(other),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::Forbidden => AppError::Forbidden(err.to_string()),
            AppointmentError::SlotTaken
            | AppointmentError::SpecializationConflict(_)
            | AppointmentError::AlreadyCancelled
            | AppointmentError::AlreadyLeftQueue(_)
            | AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Queue(e) => e.into(),
            AppointmentError::Database(e) => {
                error!("Appointment store failure: {}", e);
                AppError::Database(e.to_string())
            }
            other => AppError::BadRequest(other.to_string()),
        }
    }
}
