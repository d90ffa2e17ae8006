use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use tracing::debug;

use doctor_cell::services::slots::available_slots_in;
use shared_config::SchedulingRules;
use shared_database::ClinicTables;
use shared_models::{Appointment, DoctorProfile};

use crate::models::Recommendation;

/// Best-effort rebooking options for a clinic-cancelled appointment.
///
/// The same doctor is scanned first, one earliest slot per day over the
/// horizon after the cancelled date. Remaining room goes to other doctors of
/// the same specialization, one slot each, scanning from the cancelled date.
/// Days and times already behind `now` are never offered.
pub fn recommend_alternatives(
    tables: &ClinicTables,
    rules: &SchedulingRules,
    cancelled: &Appointment,
    now: DateTime<FixedOffset>,
) -> Vec<Recommendation> {
    let Some(doctor) = tables.doctor(cancelled.doctor_id) else {
        return Vec::new();
    };
    let limit = rules.max_recommendations;
    let horizon = rules.recommendation_horizon_days;
    let mut found = Vec::new();

    for offset in 1..=horizon {
        if found.len() >= limit {
            break;
        }
        let day = cancelled.date + Duration::days(offset);
        if let Some(slot) = first_free_slot(tables, rules, doctor, day, now) {
            found.push(offer(doctor, day, slot, true));
        }
    }

    if found.len() < limit {
        let colleagues = tables
            .doctors_by_specialization(doctor.specialization)
            .into_iter()
            .filter(|d| d.id != doctor.id)
            .take(limit);

        for colleague in colleagues {
            if found.len() >= limit {
                break;
            }
            let earliest = (0..=horizon).find_map(|offset| {
                let day = cancelled.date + Duration::days(offset);
                first_free_slot(tables, rules, colleague, day, now).map(|slot| (day, slot))
            });
            if let Some((day, slot)) = earliest {
                found.push(offer(colleague, day, slot, false));
            }
        }
    }

    debug!(
        "{} rebooking options for appointment {}",
        found.len(),
        cancelled.id
    );
    found
}

fn first_free_slot(
    tables: &ClinicTables,
    rules: &SchedulingRules,
    doctor: &DoctorProfile,
    day: NaiveDate,
    now: DateTime<FixedOffset>,
) -> Option<NaiveTime> {
    let today = now.date_naive();
    if day < today {
        return None;
    }
    available_slots_in(tables, doctor.id, day, rules.daily_cap)
        .into_iter()
        .find(|slot| day > today || *slot > now.time())
}

fn offer(doctor: &DoctorProfile, date: NaiveDate, start_time: NaiveTime, same_doctor: bool) -> Recommendation {
    Recommendation {
        doctor_id: doctor.id,
        doctor_name: doctor.full_name.clone(),
        specialization: doctor.specialization,
        date,
        start_time,
        same_doctor,
    }
}
