use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingRules;
use shared_database::{ClinicDatabase, ClinicTables};
use shared_models::auth::{Actor, Role};
use shared_models::{AppointmentStatus, Queue, QueueEntry, QueueEntryStatus};
use shared_utils::{AppState, Clock, Notification, NotificationKind, Notifier};

use crate::error::QueueError;
use crate::models::{CallNextResponse, PatientQueueStatus, QueueSnapshot, TokenResponse};
use crate::services::token::TokenIssuer;

// Transaction-scoped primitives. They run inside `ClinicDatabase::transaction`
// and are shared with the booking ledger for walk-ins and emergencies.

/// The (doctor, date) queue, created with a fresh join token on first use.
pub fn ensure_queue(
    tables: &mut ClinicTables,
    tokens: &TokenIssuer,
    doctor_id: Uuid,
    date: NaiveDate,
    now: DateTime<FixedOffset>,
) -> Result<Queue, QueueError> {
    if let Some(queue) = tables.queue_for(doctor_id, date) {
        return Ok(queue.clone());
    }

    let queue = Queue {
        id: Uuid::new_v4(),
        doctor_id,
        date,
        join_token: tokens.issue(doctor_id, date)?,
        doctor_check_in_time: None,
        created_at: now,
    };
    tables.insert_queue(queue.clone())?;
    info!("Opened queue {} for doctor {} on {}", queue.id, doctor_id, date);
    Ok(queue)
}

/// Appends a WAITING entry at the next position.
pub fn enqueue(
    tables: &mut ClinicTables,
    queue_id: Uuid,
    patient_id: Uuid,
    appointment_id: Option<Uuid>,
    now: DateTime<FixedOffset>,
    consultation_estimate_minutes: i64,
) -> Result<QueueEntry, QueueError> {
    if tables.entry_for(queue_id, patient_id).is_some() {
        return Err(QueueError::AlreadyCheckedIn);
    }

    let mut entry = tables.append_entry(QueueEntry {
        id: Uuid::new_v4(),
        queue_id,
        patient_id,
        appointment_id,
        position: 0,
        status: QueueEntryStatus::Waiting,
        is_emergency: false,
        check_in_time: now,
        consultation_start_time: None,
        consultation_end_time: None,
        estimated_wait_minutes: 0,
    })?;
    entry.estimated_wait_minutes = entry.position as i64 * consultation_estimate_minutes;
    tables.update_entry(entry.clone())?;

    debug!("Patient {} queued at position {}", patient_id, entry.position);
    Ok(entry)
}

/// Waiting entries in call order.
pub fn dispatch_order(tables: &ClinicTables, queue_id: Uuid) -> Vec<QueueEntry> {
    let mut waiting: Vec<QueueEntry> = tables
        .entries_for_queue(queue_id)
        .into_iter()
        .filter(|e| e.status.is_dispatchable())
        .cloned()
        .collect();
    waiting.sort_by_key(QueueEntry::dispatch_key);
    waiting
}

/// Moves an entry and mirrors the move onto its appointment.
pub fn advance_entry(
    tables: &mut ClinicTables,
    entry_id: Uuid,
    next: QueueEntryStatus,
    now: DateTime<FixedOffset>,
) -> Result<QueueEntry, QueueError> {
    let mut entry = tables
        .entry(entry_id)
        .cloned()
        .ok_or(QueueError::EntryNotFound)?;
    entry.transition(next, now)?;
    tables.update_entry(entry.clone())?;
    sync_appointment(tables, &entry, now)?;
    Ok(entry)
}

fn sync_appointment(
    tables: &mut ClinicTables,
    entry: &QueueEntry,
    now: DateTime<FixedOffset>,
) -> Result<(), QueueError> {
    let Some(appointment_id) = entry.appointment_id else {
        return Ok(());
    };
    let target = match entry.status {
        QueueEntryStatus::InProgress => AppointmentStatus::InProgress,
        QueueEntryStatus::Terminated => AppointmentStatus::Completed,
        QueueEntryStatus::NoShow => AppointmentStatus::NoShow,
        QueueEntryStatus::Waiting | QueueEntryStatus::Emergency => return Ok(()),
    };
    let Some(mut appointment) = tables.appointment(appointment_id).cloned() else {
        warn!("Queue entry {} points at missing appointment {}", entry.id, appointment_id);
        return Ok(());
    };
    if appointment.status == target {
        return Ok(());
    }
    if !appointment.status.can_transition_to(target) {
        warn!(
            "Appointment {} left at {} while entry moved to {}",
            appointment.id, appointment.status, entry.status
        );
        return Ok(());
    }
    appointment.transition(target, now)?;
    tables.update_appointment(appointment)?;
    Ok(())
}

pub fn escalate_entry(
    tables: &mut ClinicTables,
    entry_id: Uuid,
    now: DateTime<FixedOffset>,
) -> Result<QueueEntry, QueueError> {
    let mut entry = tables
        .entry(entry_id)
        .cloned()
        .ok_or(QueueError::EntryNotFound)?;
    entry.escalate(now)?;
    tables.update_entry(entry.clone())?;
    Ok(entry)
}

/// Takes a cancelled appointment's entry out of dispatch.
pub fn release_entry_for_appointment(
    tables: &mut ClinicTables,
    appointment_id: Uuid,
    now: DateTime<FixedOffset>,
) -> Result<Option<QueueEntry>, QueueError> {
    let Some(mut entry) = tables.entry_for_appointment(appointment_id).cloned() else {
        return Ok(None);
    };
    if !entry.status.is_dispatchable() {
        return Ok(None);
    }
    entry.transition(QueueEntryStatus::NoShow, now)?;
    tables.update_entry(entry.clone())?;
    Ok(Some(entry))
}

fn queue_of_entry(tables: &ClinicTables, entry_id: Uuid) -> Result<(Queue, QueueEntry), QueueError> {
    let entry = tables
        .entry(entry_id)
        .cloned()
        .ok_or(QueueError::EntryNotFound)?;
    let queue = tables
        .queue(entry.queue_id)
        .cloned()
        .ok_or(QueueError::QueueNotFound)?;
    Ok((queue, entry))
}

fn authorize(actor: &Actor, queue: &Queue) -> Result<(), QueueError> {
    if actor.can_manage_doctor(queue.doctor_id) {
        Ok(())
    } else {
        warn!("{} {} may not manage queue {}", actor.role, actor.profile_id, queue.id);
        Err(QueueError::NotAuthorized)
    }
}

/// Staff-facing queue operations.
pub struct QueueService {
    db: ClinicDatabase,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    tokens: TokenIssuer,
    rules: SchedulingRules,
}

impl QueueService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
            tokens: TokenIssuer::new(&state.config.checkin_token_secret),
            rules: state.config.rules.clone(),
        }
    }

    /// Finishes the current consultation and calls the next patient:
    /// emergencies first, then lowest position.
    #[instrument(skip(self))]
    pub async fn call_next(
        &self,
        actor: &Actor,
        queue_id: Uuid,
    ) -> Result<CallNextResponse, QueueError> {
        let now = self.clock.now();

        let outcome = self
            .db
            .transaction(|tables| {
                let queue = tables
                    .queue(queue_id)
                    .cloned()
                    .ok_or(QueueError::QueueNotFound)?;
                authorize(actor, &queue)?;
                if !queue.doctor_checked_in() {
                    return Err(QueueError::DoctorNotCheckedIn);
                }

                let in_progress: Vec<Uuid> = tables
                    .entries_for_queue(queue_id)
                    .into_iter()
                    .filter(|e| e.status == QueueEntryStatus::InProgress)
                    .map(|e| e.id)
                    .collect();
                for entry_id in in_progress {
                    advance_entry(tables, entry_id, QueueEntryStatus::Terminated, now)?;
                }

                let waiting = dispatch_order(tables, queue_id);
                let Some(next) = waiting.first() else {
                    return Ok(None);
                };
                let called = advance_entry(tables, next.id, QueueEntryStatus::InProgress, now)?;
                let up_next = waiting.get(1).cloned();
                Ok(Some((called, up_next)))
            })
            .await;

        match outcome {
            Ok(Some((called, up_next))) => {
                info!("Queue {} called position {}", queue_id, called.position);
                self.notify_called(&called, up_next.as_ref(), now);
                Ok(CallNextResponse {
                    success: true,
                    message: format!("Called patient at position {}", called.position),
                    entry: Some(called),
                })
            }
            Ok(None) => Ok(CallNextResponse {
                success: true,
                message: "No more patients in queue.".to_string(),
                entry: None,
            }),
            Err(QueueError::DoctorNotCheckedIn) => {
                warn!("Call-next on queue {} before doctor check-in", queue_id);
                Ok(CallNextResponse {
                    success: false,
                    message: QueueError::DoctorNotCheckedIn.to_string(),
                    entry: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn mark_emergency(&self, actor: &Actor, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let now = self.clock.now();
        let entry = self
            .db
            .transaction(|tables| {
                let (queue, _) = queue_of_entry(tables, entry_id)?;
                authorize(actor, &queue)?;
                escalate_entry(tables, entry_id, now)
            })
            .await?;
        info!("Entry {} escalated to emergency at position {}", entry.id, entry.position);
        Ok(entry)
    }

    pub async fn mark_no_show(&self, actor: &Actor, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let now = self.clock.now();
        let entry = self
            .db
            .transaction(|tables| {
                let (queue, _) = queue_of_entry(tables, entry_id)?;
                authorize(actor, &queue)?;
                advance_entry(tables, entry_id, QueueEntryStatus::NoShow, now)
            })
            .await?;
        info!("Entry {} marked no-show", entry.id);
        Ok(entry)
    }

    /// Calls a specific patient in, outside the normal call-next order.
    pub async fn start_consultation(
        &self,
        actor: &Actor,
        entry_id: Uuid,
    ) -> Result<QueueEntry, QueueError> {
        let now = self.clock.now();
        let entry = self
            .db
            .transaction(|tables| {
                let (queue, _) = queue_of_entry(tables, entry_id)?;
                authorize(actor, &queue)?;
                if !queue.doctor_checked_in() {
                    return Err(QueueError::DoctorNotCheckedIn);
                }
                let busy = tables
                    .entries_for_queue(queue.id)
                    .into_iter()
                    .any(|e| e.status == QueueEntryStatus::InProgress);
                if busy {
                    return Err(QueueError::ConsultationInProgress);
                }
                advance_entry(tables, entry_id, QueueEntryStatus::InProgress, now)
            })
            .await?;

        info!("Consultation started for entry {}", entry.id);
        self.notify_called(&entry, None, now);
        Ok(entry)
    }

    pub async fn end_consultation(
        &self,
        actor: &Actor,
        entry_id: Uuid,
    ) -> Result<QueueEntry, QueueError> {
        let now = self.clock.now();
        let entry = self
            .db
            .transaction(|tables| {
                let (queue, _) = queue_of_entry(tables, entry_id)?;
                authorize(actor, &queue)?;
                advance_entry(tables, entry_id, QueueEntryStatus::Terminated, now)
            })
            .await?;
        info!("Consultation ended for entry {}", entry.id);
        Ok(entry)
    }

    pub async fn snapshot(&self, actor: &Actor, queue_id: Uuid) -> Result<QueueSnapshot, QueueError> {
        self.db
            .read(|tables| {
                let queue = tables
                    .queue(queue_id)
                    .cloned()
                    .ok_or(QueueError::QueueNotFound)?;
                authorize(actor, &queue)?;

                let entries = tables.entries_for_queue(queue_id);
                let current = entries
                    .iter()
                    .find(|e| e.status == QueueEntryStatus::InProgress)
                    .map(|e| (*e).clone());
                let finished = entries
                    .iter()
                    .filter(|e| e.status.is_terminal())
                    .map(|e| (*e).clone())
                    .collect();

                Ok(QueueSnapshot {
                    waiting: dispatch_order(tables, queue_id),
                    queue,
                    current,
                    finished,
                })
            })
            .await
    }

    /// A patient's own view of today's queue with one doctor.
    pub async fn patient_status(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
    ) -> Result<PatientQueueStatus, QueueError> {
        if actor.role != Role::Patient {
            return Err(QueueError::InvalidRole);
        }
        let today = self.clock.today();
        let estimate = self.rules.consultation_estimate_minutes;

        self.db
            .read(|tables| {
                let queue = tables
                    .queue_for(doctor_id, today)
                    .cloned()
                    .ok_or(QueueError::NotQueued)?;
                let entry = tables
                    .entry_for(queue.id, actor.profile_id)
                    .cloned()
                    .ok_or(QueueError::NotQueued)?;

                let waiting = dispatch_order(tables, queue.id);
                let people_ahead = if entry.status.is_dispatchable() {
                    waiting
                        .iter()
                        .take_while(|e| e.id != entry.id)
                        .count()
                } else {
                    0
                };

                Ok(PatientQueueStatus {
                    queue_id: queue.id,
                    doctor_id,
                    date: today,
                    estimated_wait_minutes: people_ahead as i64 * estimate,
                    people_ahead,
                    queue_size: waiting.len(),
                    doctor_checked_in: queue.doctor_checked_in(),
                    entry,
                })
            })
            .await
    }

    /// Join token for (doctor, date), opening the queue if needed.
    pub async fn issue_token(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<TokenResponse, QueueError> {
        if !actor.can_manage_doctor(doctor_id) {
            return Err(QueueError::NotAuthorized);
        }
        let now = self.clock.now();
        let date = date.unwrap_or_else(|| self.clock.today());

        let queue = self
            .db
            .transaction(|tables| {
                if tables.doctor(doctor_id).is_none() {
                    return Err(QueueError::DoctorNotFound);
                }
                ensure_queue(tables, &self.tokens, doctor_id, date, now)
            })
            .await?;

        Ok(TokenResponse {
            queue_id: queue.id,
            doctor_id,
            date,
            token: queue.join_token,
        })
    }

    fn notify_called(
        &self,
        called: &QueueEntry,
        up_next: Option<&QueueEntry>,
        now: DateTime<FixedOffset>,
    ) {
        self.notifier.notify(Notification::new(
            called.patient_id,
            NotificationKind::PatientCalled,
            "It's your turn",
            "Please proceed to the consultation room.",
            json!({ "queue_id": called.queue_id, "entry_id": called.id }),
            now,
        ));
        if let Some(next) = up_next {
            self.notifier.notify(Notification::new(
                next.patient_id,
                NotificationKind::QueuePositionChanged,
                "You're next",
                "You will be called after the current consultation.",
                json!({ "queue_id": next.queue_id, "entry_id": next.id, "position": next.position }),
                now,
            ));
        }
    }
}
