use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use queue_cell::services::queue::{enqueue, ensure_queue, escalate_entry};
use queue_cell::TokenIssuer;
use shared_config::SchedulingRules;
use shared_database::{ClinicDatabase, ClinicTables};
use shared_models::auth::Actor;
use shared_models::{slot_end, Appointment, AppointmentStatus, QueueEntryStatus, MINUTES_PER_DAY};
use shared_utils::{AppState, Clock, Notifier};

use crate::models::{AppointmentError, EmergencyIntakeRequest, EmergencyOutcome};
use crate::services::booking::log_rejection;
use crate::services::notices;

/// Front-desk intake for patients who must be seen first.
///
/// Emergencies bypass the daily cap and the specialization rule. A patient
/// already in today's queue is escalated in place; anyone else gets a walk-in
/// at the current minute, or the next free one. A patient whose entry already
/// ended today cannot rejoin, since each patient holds one entry per queue.
pub struct EmergencyIntakeService {
    db: ClinicDatabase,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    tokens: TokenIssuer,
    rules: SchedulingRules,
}

impl EmergencyIntakeService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
            tokens: TokenIssuer::new(&state.config.checkin_token_secret),
            rules: state.config.rules.clone(),
        }
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id, doctor_id = %request.doctor_id))]
    pub async fn admit(
        &self,
        actor: &Actor,
        request: EmergencyIntakeRequest,
    ) -> Result<EmergencyOutcome, AppointmentError> {
        if !actor.role.is_staff() {
            warn!("{} {} attempted emergency intake", actor.role, actor.profile_id);
            return Err(AppointmentError::Forbidden);
        }
        let now = self.clock.now();
        let today = self.clock.today();

        let outcome = self
            .db
            .transaction::<_, AppointmentError, _>(|tables| {
                let doctor = tables
                    .doctor(request.doctor_id)
                    .cloned()
                    .ok_or(AppointmentError::DoctorNotFound)?;

                let queued = tables
                    .queue_for(doctor.id, today)
                    .and_then(|queue| tables.entry_for(queue.id, request.patient_id))
                    .map(|entry| (entry.id, entry.status));
                if let Some((entry_id, status)) = queued {
                    if matches!(status, QueueEntryStatus::Terminated | QueueEntryStatus::NoShow) {
                        return Err(AppointmentError::AlreadyLeftQueue(status));
                    }
                    let entry = escalate_entry(tables, entry_id, now)?;
                    return Ok(EmergencyOutcome {
                        appointment: None,
                        entry,
                    });
                }

                let start_time = free_minute_from(tables, doctor.id, today, now.time())
                    .ok_or(AppointmentError::SlotTaken)?;
                let duration = tables
                    .window(doctor.id, today.weekday())
                    .filter(|w| w.active)
                    .map(|w| w.slot_duration())
                    .unwrap_or_else(|| {
                        Duration::minutes(
                            self.rules.default_slot_duration_minutes.clamp(1, MINUTES_PER_DAY),
                        )
                    });

                let appointment = Appointment {
                    id: Uuid::new_v4(),
                    patient_id: request.patient_id,
                    doctor_id: doctor.id,
                    date: today,
                    start_time,
                    end_time: slot_end(start_time, duration),
                    status: AppointmentStatus::CheckedIn,
                    notes: format!("[EMERGENCY] {}", request.notes.trim())
                        .trim_end()
                        .to_string(),
                    created_at: now,
                    updated_at: now,
                };
                tables.insert_appointment(appointment.clone())?;

                let queue = ensure_queue(tables, &self.tokens, doctor.id, today, now)?;
                let entry = enqueue(
                    tables,
                    queue.id,
                    request.patient_id,
                    Some(appointment.id),
                    now,
                    self.rules.consultation_estimate_minutes,
                )?;
                let entry = escalate_entry(tables, entry.id, now)?;

                Ok(EmergencyOutcome {
                    appointment: Some(appointment),
                    entry,
                })
            })
            .await
            .inspect_err(|e| log_rejection("Emergency intake", e))?;

        info!(
            "Emergency intake for patient {} at queue position {}",
            request.patient_id, outcome.entry.position
        );
        self.notifier.notify(notices::emergency_admitted(
            request.doctor_id,
            &outcome.entry,
            now,
        ));
        Ok(outcome)
    }
}

/// The first minute at or after `from` with no slot-holding appointment,
/// never wrapping past midnight.
fn free_minute_from(
    tables: &ClinicTables,
    doctor_id: Uuid,
    date: NaiveDate,
    from: NaiveTime,
) -> Option<NaiveTime> {
    let start = NaiveTime::from_hms_opt(from.hour(), from.minute(), 0)?;
    (0..MINUTES_PER_DAY)
        .map(|offset| start + Duration::minutes(offset))
        .take_while(|candidate| *candidate >= start)
        .find(|candidate| !tables.is_slot_taken(doctor_id, date, *candidate))
}
