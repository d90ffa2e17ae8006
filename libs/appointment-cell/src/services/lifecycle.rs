use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{info, instrument};
use uuid::Uuid;

use queue_cell::services::queue::release_entry_for_appointment;
use shared_config::SchedulingRules;
use shared_database::{ClinicDatabase, ClinicTables};
use shared_models::auth::{Actor, Role};
use shared_models::{Appointment, AppointmentStatus};
use shared_utils::{AppState, Clock, Notifier};

use crate::models::{AppointmentError, BulkCancelRequest, CancellationOutcome};
use crate::services::booking::log_rejection;
use crate::services::notices;
use crate::services::recommendation::recommend_alternatives;

/// Clinic-initiated cancellations. Patients are told why and offered
/// alternatives where any exist.
pub struct AdminCancellationService {
    db: ClinicDatabase,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    rules: SchedulingRules,
}

impl AdminCancellationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
            rules: state.config.rules.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_single(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, AppointmentError> {
        require_admin(actor)?;
        let now = self.clock.now();
        let today = self.clock.today();

        let appointment = self
            .db
            .transaction(|tables| {
                let appointment = tables
                    .appointment(appointment_id)
                    .cloned()
                    .ok_or(AppointmentError::NotFound)?;
                match appointment.status {
                    AppointmentStatus::Cancelled => return Err(AppointmentError::AlreadyCancelled),
                    AppointmentStatus::Completed | AppointmentStatus::NoShow => {
                        return Err(AppointmentError::CannotCancelFinished(appointment.status));
                    }
                    _ => {}
                }
                if appointment.date < today {
                    return Err(AppointmentError::CannotCancelPast);
                }
                cancel_in(tables, appointment, now)
            })
            .await
            .inspect_err(|e| log_rejection("Admin cancellation", e))?;

        info!("Admin {} cancelled appointment {}", actor.profile_id, appointment.id);
        let mut outcomes = self.follow_up(vec![appointment], reason, now).await;
        outcomes.pop().ok_or(AppointmentError::NotFound)
    }

    /// Cancels a doctor's active appointments from today on, or only those
    /// on `request.date`.
    #[instrument(skip(self))]
    pub async fn cancel_for_doctor(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: BulkCancelRequest,
    ) -> Result<Vec<CancellationOutcome>, AppointmentError> {
        require_admin(actor)?;
        let now = self.clock.now();
        let today = self.clock.today();

        let cancelled = self
            .db
            .transaction(|tables| {
                if tables.doctor(doctor_id).is_none() {
                    return Err(AppointmentError::DoctorNotFound);
                }
                let targets: Vec<Appointment> = tables
                    .appointments_for_doctor(doctor_id)
                    .into_iter()
                    .filter(|a| a.status.is_active() && a.date >= today)
                    .filter(|a| request.date.map_or(true, |date| a.date == date))
                    .cloned()
                    .collect();
                if targets.is_empty() {
                    return Err(AppointmentError::NoActiveAppointments);
                }
                targets
                    .into_iter()
                    .map(|appointment| cancel_in(tables, appointment, now))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await
            .inspect_err(|e| log_rejection("Bulk cancellation", e))?;

        info!(
            "Admin {} cancelled {} appointment(s) for doctor {}",
            actor.profile_id,
            cancelled.len(),
            doctor_id
        );
        Ok(self.follow_up(cancelled, request.reason, now).await)
    }

    /// Recommendations and notices, computed after the cancellation commits.
    async fn follow_up(
        &self,
        cancelled: Vec<Appointment>,
        reason: Option<String>,
        now: DateTime<FixedOffset>,
    ) -> Vec<CancellationOutcome> {
        let reason = reason.filter(|r| !r.trim().is_empty());

        let (outcomes, notifications) = self
            .db
            .read(|tables| {
                let mut outcomes = Vec::with_capacity(cancelled.len());
                let mut notifications = Vec::new();
                for appointment in cancelled {
                    let recommendations = recommend_alternatives(tables, &self.rules, &appointment, now);
                    if let Some(doctor) = tables.doctor(appointment.doctor_id) {
                        notifications.push(notices::cancelled_by_clinic(
                            &appointment,
                            doctor,
                            reason.as_deref(),
                            &recommendations,
                            now,
                        ));
                    }
                    outcomes.push(CancellationOutcome {
                        appointment,
                        recommendations,
                    });
                }
                (outcomes, notifications)
            })
            .await;

        self.notifier.notify_all(notifications);
        outcomes
    }
}

fn require_admin(actor: &Actor) -> Result<(), AppointmentError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden)
    }
}

/// Takes a checked-in patient out of the queue, then cancels.
fn cancel_in(
    tables: &mut ClinicTables,
    mut appointment: Appointment,
    now: DateTime<FixedOffset>,
) -> Result<Appointment, AppointmentError> {
    release_entry_for_appointment(tables, appointment.id, now)?;
    appointment.transition(AppointmentStatus::Cancelled, now)?;
    tables.update_appointment(appointment.clone())?;
    Ok(appointment)
}
