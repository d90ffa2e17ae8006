use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transition::InvalidTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[CheckedIn, Cancelled, NoShow],
            CheckedIn => &[InProgress, Cancelled, NoShow],
            InProgress => &[Completed],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Counts toward the daily cap and the per-specialization rule.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::CheckedIn)
    }

    /// Occupies its (doctor, date, start_time) slot in the store.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::InProgress => "IN_PROGRESS",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Appointment {
    /// Moves the appointment through the status table, stamping `updated_at`.
    pub fn transition(
        &mut self,
        next: AppointmentStatus,
        at: DateTime<FixedOffset>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                entity: "appointment",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [Completed, Cancelled, NoShow] {
            assert!(status.is_terminal());
            for next in [Scheduled, CheckedIn, InProgress, Completed, Cancelled, NoShow] {
                assert!(!status.can_transition_to(next));
            }
        }
    }

    #[test]
    fn forward_path_is_allowed() {
        assert!(Scheduled.can_transition_to(CheckedIn));
        assert!(CheckedIn.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn only_scheduled_and_checked_in_are_active() {
        assert!(Scheduled.is_active());
        assert!(CheckedIn.is_active());
        assert!(!InProgress.is_active());
        assert!(InProgress.holds_slot());
        assert!(!Cancelled.holds_slot());
    }
}
