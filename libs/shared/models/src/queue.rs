use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transition::InvalidTransition;

/// One per (doctor, date). Created lazily the first time anyone needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub join_token: String,
    pub doctor_check_in_time: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl Queue {
    pub fn doctor_checked_in(&self) -> bool {
        self.doctor_check_in_time.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueEntryStatus {
    Waiting,
    InProgress,
    Terminated,
    Emergency,
    NoShow,
}

impl QueueEntryStatus {
    pub fn valid_transitions(&self) -> &'static [QueueEntryStatus] {
        use QueueEntryStatus::*;
        match self {
            Waiting => &[InProgress, Emergency, NoShow],
            Emergency => &[InProgress, NoShow],
            InProgress => &[Terminated],
            Terminated | NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: QueueEntryStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Still waiting to be called.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, QueueEntryStatus::Waiting | QueueEntryStatus::Emergency)
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueueEntryStatus::Waiting => "WAITING",
            QueueEntryStatus::InProgress => "IN_PROGRESS",
            QueueEntryStatus::Terminated => "TERMINATED",
            QueueEntryStatus::Emergency => "EMERGENCY",
            QueueEntryStatus::NoShow => "NO_SHOW",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub queue_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    /// Assigned once at insertion, never renumbered.
    pub position: u32,
    pub status: QueueEntryStatus,
    pub is_emergency: bool,
    pub check_in_time: DateTime<FixedOffset>,
    pub consultation_start_time: Option<DateTime<FixedOffset>>,
    pub consultation_end_time: Option<DateTime<FixedOffset>>,
    pub estimated_wait_minutes: i64,
}

impl QueueEntry {
    /// Sort key for call-next: emergencies first, then lowest position.
    pub fn dispatch_key(&self) -> (u8, u32) {
        let rank = match self.status {
            QueueEntryStatus::Emergency => 0,
            _ => 1,
        };
        (rank, self.position)
    }

    /// Applies a status move and stamps consultation times.
    pub fn transition(
        &mut self,
        next: QueueEntryStatus,
        at: DateTime<FixedOffset>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                entity: "queue entry",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        match next {
            QueueEntryStatus::InProgress => self.consultation_start_time = Some(at),
            QueueEntryStatus::Terminated => self.consultation_end_time = Some(at),
            QueueEntryStatus::Emergency => self.is_emergency = true,
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    /// Raises dispatch priority without touching position. An entry already
    /// in consultation keeps its status and only gains the flag.
    pub fn escalate(&mut self, at: DateTime<FixedOffset>) -> Result<(), InvalidTransition> {
        match self.status {
            QueueEntryStatus::Waiting => self.transition(QueueEntryStatus::Emergency, at),
            QueueEntryStatus::Emergency | QueueEntryStatus::InProgress => {
                self.is_emergency = true;
                Ok(())
            }
            QueueEntryStatus::Terminated | QueueEntryStatus::NoShow => Err(InvalidTransition {
                entity: "queue entry",
                from: self.status.to_string(),
                to: QueueEntryStatus::Emergency.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(position: u32, status: QueueEntryStatus) -> QueueEntry {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap().fixed_offset();
        QueueEntry {
            id: Uuid::new_v4(),
            queue_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            position,
            status,
            is_emergency: false,
            check_in_time: now,
            consultation_start_time: None,
            consultation_end_time: None,
            estimated_wait_minutes: 15 * position as i64,
        }
    }

    #[test]
    fn emergency_sorts_ahead_of_lower_positions() {
        let waiting = entry(1, QueueEntryStatus::Waiting);
        let emergency = entry(7, QueueEntryStatus::Emergency);
        assert!(emergency.dispatch_key() < waiting.dispatch_key());
        assert!(entry(2, QueueEntryStatus::Waiting).dispatch_key() < entry(3, QueueEntryStatus::Waiting).dispatch_key());
    }

    #[test]
    fn escalation_keeps_position() {
        let mut waiting = entry(4, QueueEntryStatus::Waiting);
        let at = waiting.check_in_time;
        waiting.escalate(at).unwrap();
        assert_eq!(waiting.status, QueueEntryStatus::Emergency);
        assert!(waiting.is_emergency);
        assert_eq!(waiting.position, 4);
    }

    #[test]
    fn escalating_in_progress_entry_only_sets_flag() {
        let mut busy = entry(1, QueueEntryStatus::InProgress);
        let at = busy.check_in_time;
        busy.escalate(at).unwrap();
        assert_eq!(busy.status, QueueEntryStatus::InProgress);
        assert!(busy.is_emergency);
    }

    #[test]
    fn terminated_entry_cannot_be_escalated() {
        let mut done = entry(1, QueueEntryStatus::Terminated);
        let at = done.check_in_time;
        assert!(done.escalate(at).is_err());
        assert!(!done.is_emergency);
    }

    #[test]
    fn transitions_stamp_consultation_times() {
        let mut e = entry(1, QueueEntryStatus::Waiting);
        let at = e.check_in_time;
        e.transition(QueueEntryStatus::InProgress, at).unwrap();
        assert_eq!(e.consultation_start_time, Some(at));
        e.transition(QueueEntryStatus::Terminated, at).unwrap();
        assert_eq!(e.consultation_end_time, Some(at));
        assert!(e.transition(QueueEntryStatus::Waiting, at).is_err());
    }
}
