use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{Queue, QueueEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub token: String,
}

/// Role-specific payload of a successful check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckInData {
    Patient {
        queue_id: Uuid,
        entry_id: Uuid,
        position: u32,
        estimated_time: i64,
        queue_size: usize,
    },
    Doctor {
        queue_id: Uuid,
        consultations_count: usize,
        queue_size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<CheckInData>,
}

impl CheckInResponse {
    pub fn accepted(message: impl Into<String>, data: CheckInData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNextResponse {
    pub success: bool,
    pub message: String,
    pub entry: Option<QueueEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub queue_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientStatusQuery {
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientQueueStatus {
    pub queue_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub entry: QueueEntry,
    /// Entries that will be called before this one.
    pub people_ahead: usize,
    pub estimated_wait_minutes: i64,
    pub queue_size: usize,
    pub doctor_checked_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue: Queue,
    pub current: Option<QueueEntry>,
    /// Dispatch order: emergencies first, then by position.
    pub waiting: Vec<QueueEntry>,
    pub finished: Vec<QueueEntry>,
}
