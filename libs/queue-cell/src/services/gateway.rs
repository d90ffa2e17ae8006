use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingRules;
use shared_database::ClinicDatabase;
use shared_models::auth::{Actor, Role};
use shared_models::{Appointment, AppointmentStatus, DoctorProfile, Queue, QueueEntry};
use shared_utils::{AppState, Clock, Notification, NotificationKind, Notifier};

use crate::error::QueueError;
use crate::models::{CheckInData, CheckInResponse};
use crate::services::queue::{dispatch_order, enqueue, ensure_queue};
use crate::services::token::TokenIssuer;

/// Entry point for QR scans. The same token serves the doctor's
/// bulk check-in and each patient's queue join.
pub struct CheckInGateway {
    db: ClinicDatabase,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    tokens: TokenIssuer,
    rules: SchedulingRules,
}

impl CheckInGateway {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
            tokens: TokenIssuer::new(&state.config.checkin_token_secret),
            rules: state.config.rules.clone(),
        }
    }

    /// Rejections come back as `success: false` with a readable message;
    /// only store faults surface as `Err`.
    #[instrument(skip(self, token), fields(role = %actor.role, profile_id = %actor.profile_id))]
    pub async fn process_check_in(
        &self,
        actor: &Actor,
        token: &str,
    ) -> Result<CheckInResponse, QueueError> {
        match self.check_in(actor, token).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_rejection() => {
                warn!("Check-in rejected: {}", e);
                Ok(CheckInResponse::rejected(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn check_in(&self, actor: &Actor, token: &str) -> Result<CheckInResponse, QueueError> {
        let scanned = self.tokens.parse(token)?;
        let today = self.clock.today();
        if scanned.date != today {
            return Err(QueueError::WrongDate {
                token_date: scanned.date,
                today,
            });
        }

        let doctor = self
            .db
            .read(|tables| tables.doctor(scanned.doctor_id).cloned())
            .await
            .ok_or(QueueError::DoctorNotFound)?;

        match actor.role {
            Role::Patient => self.patient_check_in(actor.profile_id, &doctor, today).await,
            Role::Doctor => self.doctor_check_in(actor.profile_id, &doctor, today).await,
            Role::Admin | Role::Nurse => Err(QueueError::InvalidRole),
        }
    }

    async fn patient_check_in(
        &self,
        patient_id: Uuid,
        doctor: &DoctorProfile,
        date: NaiveDate,
    ) -> Result<CheckInResponse, QueueError> {
        let now = self.clock.now();
        let estimate = self.rules.consultation_estimate_minutes;

        let (queue, entry, queue_size) = self
            .db
            .transaction(|tables| {
                if let Some(queue) = tables.queue_for(doctor.id, date) {
                    if tables.entry_for(queue.id, patient_id).is_some() {
                        return Err(QueueError::AlreadyCheckedIn);
                    }
                }

                // A doctor who checked in first has already moved the day's
                // bookings to CHECKED_IN, so those still count as joinable.
                let appointment: Appointment = tables
                    .appointments_for_doctor_on(doctor.id, date)
                    .into_iter()
                    .filter(|a| a.patient_id == patient_id)
                    .find(|a| match a.status {
                        AppointmentStatus::Scheduled => true,
                        AppointmentStatus::CheckedIn => tables.entry_for_appointment(a.id).is_none(),
                        _ => false,
                    })
                    .cloned()
                    .ok_or_else(|| QueueError::NoScheduledAppointment {
                        doctor: doctor.to_string(),
                        date,
                    })?;

                let queue = ensure_queue(tables, &self.tokens, doctor.id, date, now)?;
                let entry = enqueue(tables, queue.id, patient_id, Some(appointment.id), now, estimate)?;

                if appointment.status == AppointmentStatus::Scheduled {
                    let mut appointment = appointment;
                    appointment.transition(AppointmentStatus::CheckedIn, now)?;
                    tables.update_appointment(appointment)?;
                }

                let queue_size = dispatch_order(tables, queue.id).len();
                Ok((queue, entry, queue_size))
            })
            .await?;

        info!(
            "Patient {} joined queue {} at position {}",
            patient_id, queue.id, entry.position
        );
        self.notify_patient_checked_in(doctor, &entry, now);

        Ok(CheckInResponse::accepted(
            format!("Successfully checked in! Your position in queue: {}", entry.position),
            CheckInData::Patient {
                queue_id: queue.id,
                entry_id: entry.id,
                position: entry.position,
                estimated_time: entry.estimated_wait_minutes,
                queue_size,
            },
        ))
    }

    async fn doctor_check_in(
        &self,
        doctor_profile_id: Uuid,
        doctor: &DoctorProfile,
        date: NaiveDate,
    ) -> Result<CheckInResponse, QueueError> {
        if doctor_profile_id != doctor.id {
            return Err(QueueError::WrongDoctor);
        }
        let now = self.clock.now();
        let late_minutes = self.rules.doctor_late_checkin_minutes;

        let (queue, consultations, moved, queue_size) = self
            .db
            .transaction(|tables| {
                if tables
                    .queue_for(doctor.id, date)
                    .is_some_and(Queue::doctor_checked_in)
                {
                    return Err(QueueError::DoctorAlreadyCheckedIn);
                }

                // Patients who scanned first, walk-ins and emergencies are
                // already CHECKED_IN and still count as the day's consultations.
                let active: Vec<Appointment> = tables
                    .appointments_for_doctor_on(doctor.id, date)
                    .into_iter()
                    .filter(|a| a.status.is_active())
                    .cloned()
                    .collect();
                let Some(first) = active.first() else {
                    return Err(QueueError::NoConsultations { date });
                };

                let deadline = date.and_time(first.start_time) + Duration::minutes(late_minutes);
                if now.naive_local() > deadline {
                    return Err(QueueError::TooLate {
                        late_minutes,
                        first_appointment: first.start_time,
                    });
                }

                let mut moved = Vec::new();
                for appointment in active.iter().filter(|a| a.status == AppointmentStatus::Scheduled) {
                    let mut appointment = appointment.clone();
                    appointment.transition(AppointmentStatus::CheckedIn, now)?;
                    tables.update_appointment(appointment.clone())?;
                    moved.push(appointment);
                }

                let mut queue = ensure_queue(tables, &self.tokens, doctor.id, date, now)?;
                queue.doctor_check_in_time = Some(now);
                tables.update_queue(queue.clone())?;

                let queue_size = dispatch_order(tables, queue.id).len();
                Ok((queue, active.len(), moved, queue_size))
            })
            .await?;

        info!(
            "{} checked in for {} with {} consultations",
            doctor, date, consultations
        );
        self.notifier.notify_all(moved.iter().map(|appointment| {
            Notification::new(
                appointment.patient_id,
                NotificationKind::DoctorCheckedIn,
                "Your doctor has arrived",
                format!("{} has checked in. Please scan the queue code when you arrive.", doctor),
                json!({ "queue_id": queue.id, "appointment_id": appointment.id }),
                now,
            )
        }));

        Ok(CheckInResponse::accepted(
            format!(
                "Successfully checked in! You have {} consultations today.",
                consultations
            ),
            CheckInData::Doctor {
                queue_id: queue.id,
                consultations_count: consultations,
                queue_size,
            },
        ))
    }

    fn notify_patient_checked_in(
        &self,
        doctor: &DoctorProfile,
        entry: &QueueEntry,
        now: DateTime<FixedOffset>,
    ) {
        self.notifier.notify(Notification::new(
            entry.patient_id,
            NotificationKind::CheckedIn,
            "Checked in",
            format!(
                "You are number {} in the queue for {}. Estimated wait: {} minutes.",
                entry.position, doctor, entry.estimated_wait_minutes
            ),
            json!({
                "queue_id": entry.queue_id,
                "entry_id": entry.id,
                "position": entry.position,
            }),
            now,
        ));
    }
}
