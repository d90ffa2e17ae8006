use chrono::{DateTime, FixedOffset};
use serde_json::json;
use uuid::Uuid;

use shared_models::{Appointment, DoctorProfile, QueueEntry};
use shared_utils::{Notification, NotificationKind};

use crate::models::Recommendation;

fn when(appointment: &Appointment) -> String {
    format!(
        "{} at {}",
        appointment.date.format("%A %d %B %Y"),
        appointment.start_time.format("%H:%M")
    )
}

/// Confirmation for the patient plus a heads-up for the doctor.
pub fn booked(
    appointment: &Appointment,
    doctor: &DoctorProfile,
    now: DateTime<FixedOffset>,
) -> Vec<Notification> {
    let context = json!({
        "appointment_id": appointment.id,
        "doctor_id": doctor.id,
        "date": appointment.date,
        "start_time": appointment.start_time,
    });
    vec![
        Notification::new(
            appointment.patient_id,
            NotificationKind::BookingConfirmation,
            "Appointment confirmed",
            format!("Your appointment with {} is booked for {}.", doctor, when(appointment)),
            context.clone(),
            now,
        ),
        Notification::new(
            doctor.id,
            NotificationKind::NewAppointment,
            "New appointment",
            format!("A patient booked {}.", when(appointment)),
            context,
            now,
        ),
    ]
}

pub fn modified(
    appointment: &Appointment,
    doctor: &DoctorProfile,
    now: DateTime<FixedOffset>,
) -> Vec<Notification> {
    let context = json!({
        "appointment_id": appointment.id,
        "date": appointment.date,
        "start_time": appointment.start_time,
    });
    vec![
        Notification::new(
            appointment.patient_id,
            NotificationKind::AppointmentModified,
            "Appointment updated",
            format!("Your appointment with {} is now {}.", doctor, when(appointment)),
            context.clone(),
            now,
        ),
        Notification::new(
            doctor.id,
            NotificationKind::AppointmentModified,
            "Appointment updated",
            format!("An appointment moved to {}.", when(appointment)),
            context,
            now,
        ),
    ]
}

pub fn cancelled_by_patient(
    appointment: &Appointment,
    now: DateTime<FixedOffset>,
) -> Notification {
    Notification::new(
        appointment.doctor_id,
        NotificationKind::AppointmentCancelled,
        "Appointment cancelled",
        format!("The patient cancelled the appointment on {}.", when(appointment)),
        json!({ "appointment_id": appointment.id }),
        now,
    )
}

/// Tells the patient the clinic cancelled, with any rebooking options.
pub fn cancelled_by_clinic(
    appointment: &Appointment,
    doctor: &DoctorProfile,
    reason: Option<&str>,
    recommendations: &[Recommendation],
    now: DateTime<FixedOffset>,
) -> Notification {
    let mut message = format!(
        "Your appointment with {} on {} has been cancelled by the clinic.",
        doctor,
        when(appointment)
    );
    if let Some(reason) = reason {
        message.push_str(&format!(" Reason: {}.", reason));
    }
    if !recommendations.is_empty() {
        message.push_str(" Suggested alternatives:");
        for option in recommendations {
            message.push_str(&format!(
                " Dr. {} on {} at {};",
                option.doctor_name,
                option.date,
                option.start_time.format("%H:%M")
            ));
        }
    }

    Notification::new(
        appointment.patient_id,
        NotificationKind::AppointmentCancelled,
        "Appointment cancelled",
        message,
        json!({
            "appointment_id": appointment.id,
            "reason": reason,
            "recommendations": recommendations,
        }),
        now,
    )
}

/// Heads-up for the doctor that an emergency joined the front of the queue.
pub fn emergency_admitted(
    doctor_id: Uuid,
    entry: &QueueEntry,
    now: DateTime<FixedOffset>,
) -> Notification {
    Notification::new(
        doctor_id,
        NotificationKind::QueuePositionChanged,
        "Emergency patient",
        format!(
            "An emergency patient (queue number {}) will be called next.",
            entry.position
        ),
        json!({ "queue_id": entry.queue_id, "entry_id": entry.id }),
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use shared_models::{AppointmentStatus, Specialization};

    fn sample() -> (Appointment, DoctorProfile, DateTime<FixedOffset>) {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap().fixed_offset();
        let doctor = DoctorProfile {
            id: Uuid::new_v4(),
            full_name: "Ana Costa".to_string(),
            specialization: Specialization::General,
        };
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: doctor.id,
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        (appointment, doctor, now)
    }

    #[test]
    fn booking_notifies_patient_and_doctor() {
        let (appointment, doctor, now) = sample();
        let sent = booked(&appointment, &doctor, now);

        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient, appointment.patient_id);
        assert_eq!(sent[0].kind, NotificationKind::BookingConfirmation);
        assert!(sent[0].message.contains("Dr. Ana Costa"));
        assert!(sent[0].message.contains("09:30"));
        assert_eq!(sent[1].recipient, doctor.id);
    }

    #[test]
    fn clinic_cancellation_lists_alternatives() {
        let (appointment, doctor, now) = sample();
        let option = Recommendation {
            doctor_id: doctor.id,
            doctor_name: doctor.full_name.clone(),
            specialization: doctor.specialization,
            date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            same_doctor: true,
        };

        let sent = cancelled_by_clinic(&appointment, &doctor, Some("Doctor unwell"), &[option], now);

        assert!(sent.message.contains("Reason: Doctor unwell."));
        assert!(sent.message.contains("2025-03-05 at 11:00"));
        assert_eq!(sent.context["recommendations"].as_array().unwrap().len(), 1);
    }
}
