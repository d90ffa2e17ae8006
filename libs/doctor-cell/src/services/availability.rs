use std::collections::HashSet;

use chrono::Weekday;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::ClinicDatabase;
use shared_models::auth::Actor;
use shared_models::AvailabilityWindow;

use crate::models::{DoctorError, WindowRequest};

pub struct AvailabilityService {
    db: ClinicDatabase,
    default_slot_duration_minutes: i64,
}

impl AvailabilityService {
    pub fn new(db: ClinicDatabase, default_slot_duration_minutes: i64) -> Self {
        Self {
            db,
            default_slot_duration_minutes,
        }
    }

    /// Replaces the listed weekdays wholesale: each named day's window is
    /// deleted and the new one inserted. Days not listed are untouched.
    #[instrument(skip(self, windows), fields(days = windows.len()))]
    pub async fn replace_schedule(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        windows: Vec<WindowRequest>,
    ) -> Result<Vec<AvailabilityWindow>, DoctorError> {
        if !actor.can_manage_doctor(doctor_id) {
            warn!("{} {} cannot edit schedule of {}", actor.role, actor.profile_id, doctor_id);
            return Err(DoctorError::UnauthorizedAccess);
        }

        let windows = self.validate(doctor_id, windows)?;

        let saved = windows.clone();
        self.db
            .transaction::<_, DoctorError, _>(|tables| {
                if tables.doctor(doctor_id).is_none() {
                    return Err(DoctorError::NotFound);
                }
                for window in windows {
                    tables.remove_window(doctor_id, window.weekday);
                    tables.insert_window(window)?;
                }
                Ok(())
            })
            .await?;

        info!("Replaced {} schedule day(s) for doctor {}", saved.len(), doctor_id);
        Ok(saved)
    }

    pub async fn get_schedule(&self, doctor_id: Uuid) -> Vec<AvailabilityWindow> {
        debug!("Fetching weekly schedule for doctor {}", doctor_id);
        self.db
            .read(|tables| tables.windows_for(doctor_id).into_iter().cloned().collect())
            .await
    }

    pub async fn delete_window(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        weekday: Weekday,
    ) -> Result<AvailabilityWindow, DoctorError> {
        if !actor.can_manage_doctor(doctor_id) {
            return Err(DoctorError::UnauthorizedAccess);
        }

        let removed = self
            .db
            .transaction(|tables| {
                tables
                    .remove_window(doctor_id, weekday)
                    .ok_or(DoctorError::WindowNotFound(weekday))
            })
            .await?;

        info!("Removed {} window for doctor {}", weekday, doctor_id);
        Ok(removed)
    }

    fn validate(
        &self,
        doctor_id: Uuid,
        requests: Vec<WindowRequest>,
    ) -> Result<Vec<AvailabilityWindow>, DoctorError> {
        let mut seen = HashSet::new();
        let mut windows = Vec::with_capacity(requests.len());

        for request in requests {
            if !seen.insert(request.weekday) {
                return Err(DoctorError::ValidationError(format!(
                    "{} is listed more than once",
                    request.weekday
                )));
            }
            if request.start_time >= request.end_time {
                return Err(DoctorError::ValidationError(format!(
                    "Start time must be before end time on {}",
                    request.weekday
                )));
            }
            let slot_duration_minutes = request
                .slot_duration_minutes
                .unwrap_or(self.default_slot_duration_minutes);
            if slot_duration_minutes <= 0 {
                return Err(DoctorError::ValidationError(
                    "Slot duration must be positive".to_string(),
                ));
            }
            let window_minutes = (request.end_time - request.start_time).num_minutes();
            if slot_duration_minutes > window_minutes {
                return Err(DoctorError::ValidationError(format!(
                    "Slot duration of {} minutes does not fit the {} window",
                    slot_duration_minutes, request.weekday
                )));
            }

            windows.push(AvailabilityWindow {
                doctor_id,
                weekday: request.weekday,
                start_time: request.start_time,
                end_time: request.end_time,
                slot_duration_minutes,
                active: request.active.unwrap_or(true),
            });
        }
        Ok(windows)
    }
}
