use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::slots::candidate_slots;
use queue_cell::services::queue::{enqueue, ensure_queue};
use queue_cell::TokenIssuer;
use shared_config::SchedulingRules;
use shared_database::{ClinicDatabase, ClinicTables};
use shared_models::auth::{Actor, Role};
use shared_models::{slot_end, Appointment, AppointmentStatus, DoctorProfile, MINUTES_PER_DAY};
use shared_utils::{AppState, Clock, Notifier};

use crate::models::{
    AppointmentError, AppointmentListQuery, BookAppointmentRequest, BookingOutcome,
    ModifyAppointmentRequest,
};
use crate::services::notices;

/// Where a booking wants to land.
#[derive(Debug, Clone, Copy)]
pub struct SlotChoice {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub is_walk_in: bool,
}

/// Booking rules in their fixed order; the first failing check wins.
///
/// `exclude` names an appointment being moved, which must not collide with
/// itself. Returns the doctor and the computed end time.
pub fn validate_booking(
    tables: &ClinicTables,
    rules: &SchedulingRules,
    patient_id: Uuid,
    doctor_id: Uuid,
    choice: SlotChoice,
    today: NaiveDate,
    exclude: Option<Uuid>,
) -> Result<(DoctorProfile, NaiveTime), AppointmentError> {
    // **Step 1: Date**
    if choice.date < today {
        return Err(AppointmentError::PastDate);
    }
    if choice.is_walk_in && choice.date != today {
        return Err(AppointmentError::WalkInNotToday);
    }

    // **Step 2: Doctor and slot**
    let doctor = tables
        .doctor(doctor_id)
        .cloned()
        .ok_or(AppointmentError::DoctorNotFound)?;
    let window = tables
        .window(doctor_id, choice.date.weekday())
        .filter(|w| w.active);
    if !choice.is_walk_in {
        let window = window.ok_or(AppointmentError::DoctorNotAvailable(choice.date.weekday()))?;
        if !candidate_slots(window).contains(&choice.start_time) {
            return Err(AppointmentError::SlotUnavailable);
        }
    }

    let others_on_day: Vec<&Appointment> = tables
        .appointments_for_doctor_on(doctor_id, choice.date)
        .into_iter()
        .filter(|a| Some(a.id) != exclude)
        .collect();

    // **Step 3: Daily cap**
    let active = others_on_day.iter().filter(|a| a.status.is_active()).count();
    if active >= rules.daily_cap {
        return Err(AppointmentError::DailyCapReached {
            cap: rules.daily_cap,
        });
    }

    // **Step 4: One appointment per specialization per day**
    if rules.one_per_specialization_per_day {
        let clash = tables
            .appointments_for_patient_on(patient_id, choice.date)
            .into_iter()
            .filter(|a| a.status.is_active() && Some(a.id) != exclude)
            .filter_map(|a| tables.doctor(a.doctor_id))
            .any(|d| d.specialization == doctor.specialization);
        if clash {
            return Err(AppointmentError::SpecializationConflict(doctor.specialization));
        }
    }

    // **Step 5: Slot still free**
    if others_on_day
        .iter()
        .any(|a| a.status.holds_slot() && a.start_time == choice.start_time)
    {
        return Err(AppointmentError::SlotTaken);
    }

    let duration = window
        .map(|w| w.slot_duration())
        .unwrap_or_else(|| {
            Duration::minutes(rules.default_slot_duration_minutes.clamp(1, MINUTES_PER_DAY))
        });
    Ok((doctor, slot_end(choice.start_time, duration)))
}

/// Patient-facing ledger operations: book, move, cancel, list.
pub struct AppointmentBookingService {
    db: ClinicDatabase,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    tokens: TokenIssuer,
    rules: SchedulingRules,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
            tokens: TokenIssuer::new(&state.config.checkin_token_secret),
            rules: state.config.rules.clone(),
        }
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, date = %request.date))]
    pub async fn book_appointment(
        &self,
        actor: &Actor,
        request: BookAppointmentRequest,
    ) -> Result<BookingOutcome, AppointmentError> {
        let patient_id = resolve_patient(actor, request.patient_id)?;
        let now = self.clock.now();
        let today = self.clock.today();
        let choice = SlotChoice {
            date: request.date,
            start_time: request.start_time,
            is_walk_in: request.is_walk_in,
        };

        let (outcome, doctor) = self
            .db
            .transaction::<_, AppointmentError, _>(|tables| {
                let (doctor, end_time) = validate_booking(
                    tables,
                    &self.rules,
                    patient_id,
                    request.doctor_id,
                    choice,
                    today,
                    None,
                )?;

                let appointment = Appointment {
                    id: Uuid::new_v4(),
                    patient_id,
                    doctor_id: doctor.id,
                    date: choice.date,
                    start_time: choice.start_time,
                    end_time,
                    status: if choice.is_walk_in {
                        AppointmentStatus::CheckedIn
                    } else {
                        AppointmentStatus::Scheduled
                    },
                    notes: request.notes.trim().to_string(),
                    created_at: now,
                    updated_at: now,
                };
                tables.insert_appointment(appointment.clone())?;

                let queue_entry = if choice.is_walk_in {
                    let queue = ensure_queue(tables, &self.tokens, doctor.id, today, now)?;
                    Some(enqueue(
                        tables,
                        queue.id,
                        patient_id,
                        Some(appointment.id),
                        now,
                        self.rules.consultation_estimate_minutes,
                    )?)
                } else {
                    None
                };

                Ok((
                    BookingOutcome {
                        appointment,
                        queue_entry,
                    },
                    doctor,
                ))
            })
            .await
            .inspect_err(|e| log_rejection("Booking", e))?;

        info!(
            "Booked appointment {} for patient {} with {} on {} at {}",
            outcome.appointment.id, patient_id, doctor, choice.date, choice.start_time
        );
        self.notifier
            .notify_all(notices::booked(&outcome.appointment, &doctor, now));
        Ok(outcome)
    }

    #[instrument(skip(self, request))]
    pub async fn modify_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: ModifyAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let now = self.clock.now();
        let today = self.clock.today();

        let (appointment, doctor) = self
            .db
            .transaction(|tables| {
                let mut appointment = owned_appointment(tables, actor, appointment_id)?;
                if appointment.status != AppointmentStatus::Scheduled {
                    return Err(AppointmentError::NotModifiable(appointment.status));
                }

                let choice = SlotChoice {
                    date: request.date.unwrap_or(appointment.date),
                    start_time: request.start_time.unwrap_or(appointment.start_time),
                    is_walk_in: false,
                };
                let moved =
                    choice.date != appointment.date || choice.start_time != appointment.start_time;

                let doctor = if moved {
                    let (doctor, end_time) = validate_booking(
                        tables,
                        &self.rules,
                        appointment.patient_id,
                        appointment.doctor_id,
                        choice,
                        today,
                        Some(appointment.id),
                    )?;
                    appointment.date = choice.date;
                    appointment.start_time = choice.start_time;
                    appointment.end_time = end_time;
                    doctor
                } else {
                    tables
                        .doctor(appointment.doctor_id)
                        .cloned()
                        .ok_or(AppointmentError::DoctorNotFound)?
                };

                if let Some(notes) = &request.notes {
                    appointment.notes = notes.trim().to_string();
                }
                appointment.updated_at = now;
                tables.update_appointment(appointment.clone())?;
                Ok((appointment, doctor))
            })
            .await
            .inspect_err(|e| log_rejection("Modification", e))?;

        info!(
            "Appointment {} now {} at {}",
            appointment.id, appointment.date, appointment.start_time
        );
        self.notifier
            .notify_all(notices::modified(&appointment, &doctor, now));
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let now = self.clock.now();

        let appointment = self
            .db
            .transaction(|tables| {
                let mut appointment = owned_appointment(tables, actor, appointment_id)?;
                if appointment.status != AppointmentStatus::Scheduled {
                    return Err(AppointmentError::NotCancellable(appointment.status));
                }
                appointment.transition(AppointmentStatus::Cancelled, now)?;
                tables.update_appointment(appointment.clone())?;
                Ok(appointment)
            })
            .await
            .inspect_err(|e| log_rejection("Cancellation", e))?;

        info!("Patient {} cancelled appointment {}", appointment.patient_id, appointment.id);
        self.notifier
            .notify(notices::cancelled_by_patient(&appointment, now));
        Ok(appointment)
    }

    /// The caller's own appointments, newest first.
    pub async fn list_for_patient(
        &self,
        actor: &Actor,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if actor.role != Role::Patient {
            return Err(AppointmentError::Forbidden);
        }
        let appointments = self
            .db
            .read(|tables| {
                tables
                    .appointments_for_patient(actor.profile_id)
                    .into_iter()
                    .filter(|a| query.matches(a))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        debug!("Listed {} appointments for patient {}", appointments.len(), actor.profile_id);
        Ok(appointments)
    }

    /// A doctor's appointments in chronological order.
    pub async fn list_for_doctor(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.can_manage_doctor(doctor_id) {
            return Err(AppointmentError::Forbidden);
        }
        Ok(self
            .db
            .read(|tables| {
                tables
                    .appointments_for_doctor(doctor_id)
                    .into_iter()
                    .filter(|a| query.matches(a))
                    .cloned()
                    .collect()
            })
            .await)
    }
}

fn resolve_patient(actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppointmentError> {
    match actor.role {
        Role::Patient => Ok(actor.profile_id),
        Role::Admin | Role::Nurse => requested.ok_or_else(|| {
            AppointmentError::ValidationError(
                "patient_id is required when booking for a patient".to_string(),
            )
        }),
        Role::Doctor => Err(AppointmentError::Forbidden),
    }
}

/// The appointment, if the actor is its patient.
fn owned_appointment(
    tables: &ClinicTables,
    actor: &Actor,
    appointment_id: Uuid,
) -> Result<Appointment, AppointmentError> {
    let appointment = tables
        .appointment(appointment_id)
        .cloned()
        .ok_or(AppointmentError::NotFound)?;
    if actor.role != Role::Patient || appointment.patient_id != actor.profile_id {
        warn!(
            "{} {} tried to change appointment {}",
            actor.role, actor.profile_id, appointment_id
        );
        return Err(AppointmentError::Forbidden);
    }
    Ok(appointment)
}

pub(crate) fn log_rejection(operation: &str, err: &AppointmentError) {
    if err.is_rejection() {
        warn!("{} rejected: {}", operation, err);
    }
}
