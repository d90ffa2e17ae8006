use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_database::{ClinicDatabase, ClinicTables};
use shared_models::AvailabilityWindow;

/// Every slot start inside the window whose full duration fits before the
/// window closes.
pub fn candidate_slots(window: &AvailabilityWindow) -> Vec<NaiveTime> {
    if !window.active || window.slot_duration_minutes <= 0 || window.start_time >= window.end_time {
        return Vec::new();
    }

    let Some(step) = window.slot_duration_minutes.checked_mul(60) else {
        return Vec::new();
    };
    let end = window.end_time.num_seconds_from_midnight() as i64;
    let mut cursor = window.start_time.num_seconds_from_midnight() as i64;
    let mut slots = Vec::new();

    while cursor + step <= end {
        if let Some(slot) = NaiveTime::from_num_seconds_from_midnight_opt(cursor as u32, 0) {
            slots.push(slot);
        }
        cursor += step;
    }
    slots
}

/// Appointments counting toward the doctor's daily cap.
pub fn booked_count(tables: &ClinicTables, doctor_id: Uuid, date: NaiveDate) -> usize {
    tables
        .appointments_for_doctor_on(doctor_id, date)
        .into_iter()
        .filter(|a| a.status.is_active())
        .count()
}

/// Free slots for (doctor, date), earliest first, truncated to the doctor's
/// remaining capacity for the day.
pub fn available_slots_in(
    tables: &ClinicTables,
    doctor_id: Uuid,
    date: NaiveDate,
    daily_cap: usize,
) -> Vec<NaiveTime> {
    let Some(window) = tables.window(doctor_id, date.weekday()) else {
        return Vec::new();
    };

    let booked = booked_count(tables, doctor_id, date);
    if booked >= daily_cap {
        return Vec::new();
    }

    let occupied: Vec<NaiveTime> = tables
        .appointments_for_doctor_on(doctor_id, date)
        .into_iter()
        .filter(|a| a.status.is_active())
        .map(|a| a.start_time)
        .collect();

    candidate_slots(window)
        .into_iter()
        .filter(|slot| !occupied.contains(slot))
        .take(daily_cap - booked)
        .collect()
}

/// Read-side slot lookup against the live store.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    db: ClinicDatabase,
    daily_cap: usize,
}

impl SlotGenerator {
    pub fn new(db: ClinicDatabase, daily_cap: usize) -> Self {
        Self { db, daily_cap }
    }

    pub async fn available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<NaiveTime> {
        let slots = self
            .db
            .read(|tables| available_slots_in(tables, doctor_id, date, self.daily_cap))
            .await;
        debug!(
            "Doctor {} has {} free slots on {}",
            doctor_id,
            slots.len(),
            date
        );
        slots
    }
}
