use std::fmt;

use chrono::{Duration, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialization {
    Cardiology,
    Dermatology,
    Neurology,
    Orthopedics,
    Pediatrics,
    Psychiatry,
    General,
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Specialization::Cardiology => "Cardiology",
            Specialization::Dermatology => "Dermatology",
            Specialization::Neurology => "Neurology",
            Specialization::Orthopedics => "Orthopedics",
            Specialization::Pediatrics => "Pediatrics",
            Specialization::Psychiatry => "Psychiatry",
            Specialization::General => "General Medicine",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: Specialization,
}

impl fmt::Display for DoctorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dr. {}", self.full_name)
    }
}

/// A recurring weekly window in which a doctor sees patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub doctor_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i64,
    pub active: bool,
}

pub const MINUTES_PER_DAY: i64 = 24 * 60;

impl AvailabilityWindow {
    /// Clamped to a single day so a bad stored row cannot overflow.
    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_duration_minutes.clamp(1, MINUTES_PER_DAY))
    }
}

/// When a slot starting at `start` ends. Slots never run past midnight; one
/// that would is cut at 23:59:59.
pub fn slot_end(start: NaiveTime, duration: Duration) -> NaiveTime {
    match start.overflowing_add_signed(duration) {
        (end, 0) if end > start => end,
        _ => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(start),
    }
}
