use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::error;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::InvalidTransition;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid QR code format.")]
    InvalidToken,

    #[error("Scan rejected: This QR code is for {token_date}, but today is {today}. Please use today's QR code.")]
    WrongDate {
        token_date: NaiveDate,
        today: NaiveDate,
    },

    #[error("Invalid QR code: Doctor not found.")]
    DoctorNotFound,

    #[error("No scheduled appointment found with {doctor} on {date}.")]
    NoScheduledAppointment { doctor: String, date: NaiveDate },

    #[error("You are already checked in for this appointment.")]
    AlreadyCheckedIn,

    #[error("This QR code is for a different doctor.")]
    WrongDoctor,

    #[error("No consultations scheduled for {date}.")]
    NoConsultations { date: NaiveDate },

    #[error("Check-in rejected: It is more than {late_minutes} minutes past your first appointment at {}.", .first_appointment.format("%H:%M"))]
    TooLate {
        late_minutes: i64,
        first_appointment: NaiveTime,
    },

    #[error("You have already checked in for today.")]
    DoctorAlreadyCheckedIn,

    #[error("Invalid user role.")]
    InvalidRole,

    #[error("Doctor hasn't checked in yet.")]
    DoctorNotCheckedIn,

    #[error("Another consultation is already in progress.")]
    ConsultationInProgress,

    #[error("You are not in this queue.")]
    NotQueued,

    #[error("Queue not found")]
    QueueNotFound,

    #[error("Queue entry not found")]
    EntryNotFound,

    #[error("Not allowed to manage this queue")]
    NotAuthorized,

    #[error("Check-in token key could not be initialised")]
    SigningKey,

    #[error(transparent)]
    InvalidStatusTransition(#[from] InvalidTransition),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl QueueError {
    /// Caller-fixable outcomes, as opposed to store faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, QueueError::Database(_) | QueueError::SigningKey)
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::QueueNotFound | QueueError::EntryNotFound | QueueError::NotQueued => {
                AppError::NotFound(err.to_string())
            }
            QueueError::NotAuthorized | QueueError::InvalidRole | QueueError::WrongDoctor => {
                AppError::Forbidden(err.to_string())
            }
            QueueError::AlreadyCheckedIn
            | QueueError::DoctorAlreadyCheckedIn
            | QueueError::ConsultationInProgress
            | QueueError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
            QueueError::Database(e) => {
                error!("Queue store failure: {}", e);
                AppError::Database(e.to_string())
            }
            QueueError::SigningKey => AppError::Internal(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}
