use assert_matches::assert_matches;
use chrono::Weekday;
use uuid::Uuid;

use appointment_cell::{
    AppointmentBookingService, AppointmentError, BookAppointmentRequest, EmergencyIntakeRequest,
    EmergencyIntakeService,
};
use queue_cell::services::queue::dispatch_order;
use queue_cell::QueueService;
use shared_models::auth::Actor;
use shared_models::{AppointmentStatus, QueueEntryStatus, Specialization};
use shared_utils::test_utils::{time, ClinicFixture};
use shared_utils::NotificationKind;

async fn clinic_with_doctor() -> (ClinicFixture, Uuid) {
    let fixture = ClinicFixture::on_monday_morning();
    let doctor = fixture.add_doctor("Ana Costa", Specialization::General).await;
    fixture
        .add_window(doctor, Weekday::Mon, time(9, 0), time(12, 0), 30)
        .await;
    (fixture, doctor)
}

fn intake(doctor_id: Uuid, patient_id: Uuid) -> EmergencyIntakeRequest {
    EmergencyIntakeRequest {
        patient_id,
        doctor_id,
        notes: "chest pain".to_string(),
    }
}

#[tokio::test]
async fn new_patient_gets_a_walk_in_at_the_front_of_the_queue() {
    let (mut fixture, doctor) = clinic_with_doctor().await;
    let regular = AppointmentBookingService::new(&fixture.state)
        .book_appointment(
            &Actor::patient(Uuid::new_v4()),
            BookAppointmentRequest {
                doctor_id: doctor,
                date: fixture.today(),
                start_time: time(8, 0),
                notes: String::new(),
                is_walk_in: true,
                patient_id: None,
            },
        )
        .await
        .unwrap();
    fixture.drain_notifications();

    let patient = Uuid::new_v4();
    let outcome = EmergencyIntakeService::new(&fixture.state)
        .admit(&Actor::nurse(Uuid::new_v4()), intake(doctor, patient))
        .await
        .unwrap();

    let appointment = outcome.appointment.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::CheckedIn);
    assert_eq!(appointment.notes, "[EMERGENCY] chest pain");
    // 08:00 is held by the earlier walk-in.
    assert_eq!(appointment.start_time, time(8, 1));

    assert_eq!(outcome.entry.position, 2);
    assert_eq!(outcome.entry.status, QueueEntryStatus::Emergency);
    assert!(outcome.entry.is_emergency);

    let queue_id = outcome.entry.queue_id;
    let order = fixture
        .state
        .db
        .read(|tables| dispatch_order(tables, queue_id))
        .await;
    assert_eq!(order[0].patient_id, patient);
    assert_eq!(order[1].id, regular.queue_entry.unwrap().id);

    let sent = fixture.drain_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, doctor);
    assert_eq!(sent[0].kind, NotificationKind::QueuePositionChanged);
}

#[tokio::test]
async fn queued_patient_is_escalated_in_place() {
    let (fixture, doctor) = clinic_with_doctor().await;
    let patient = Uuid::new_v4();
    let booked = AppointmentBookingService::new(&fixture.state)
        .book_appointment(
            &Actor::patient(patient),
            BookAppointmentRequest {
                doctor_id: doctor,
                date: fixture.today(),
                start_time: time(8, 0),
                notes: String::new(),
                is_walk_in: true,
                patient_id: None,
            },
        )
        .await
        .unwrap();
    let entry = booked.queue_entry.unwrap();

    let outcome = EmergencyIntakeService::new(&fixture.state)
        .admit(&Actor::admin(Uuid::new_v4()), intake(doctor, patient))
        .await
        .unwrap();

    assert!(outcome.appointment.is_none());
    assert_eq!(outcome.entry.id, entry.id);
    assert_eq!(outcome.entry.position, entry.position);
    assert_eq!(outcome.entry.status, QueueEntryStatus::Emergency);
}

#[tokio::test]
async fn emergencies_ignore_the_daily_cap() {
    let (fixture, doctor) = clinic_with_doctor().await;
    for minute in 0..15 {
        fixture
            .seed_appointment(
                Uuid::new_v4(),
                doctor,
                fixture.today(),
                time(13, minute * 2),
                AppointmentStatus::Scheduled,
            )
            .await;
    }

    let outcome = EmergencyIntakeService::new(&fixture.state)
        .admit(&Actor::nurse(Uuid::new_v4()), intake(doctor, Uuid::new_v4()))
        .await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn patient_who_already_left_the_queue_cannot_be_readmitted() {
    let (fixture, doctor) = clinic_with_doctor().await;
    let patient = Uuid::new_v4();
    let nurse = Actor::nurse(Uuid::new_v4());
    let booked = AppointmentBookingService::new(&fixture.state)
        .book_appointment(
            &Actor::patient(patient),
            BookAppointmentRequest {
                doctor_id: doctor,
                date: fixture.today(),
                start_time: time(8, 0),
                notes: String::new(),
                is_walk_in: true,
                patient_id: None,
            },
        )
        .await
        .unwrap();
    QueueService::new(&fixture.state)
        .mark_no_show(&nurse, booked.queue_entry.unwrap().id)
        .await
        .unwrap();

    let result = EmergencyIntakeService::new(&fixture.state)
        .admit(&nurse, intake(doctor, patient))
        .await;

    let err = result.unwrap_err();
    assert_matches!(err, AppointmentError::AlreadyLeftQueue(QueueEntryStatus::NoShow));
    assert_eq!(
        err.to_string(),
        "This patient already left today's queue (NO_SHOW) and cannot rejoin it."
    );
}

#[tokio::test]
async fn late_night_emergency_ends_before_midnight() {
    let (fixture, doctor) = clinic_with_doctor().await;
    fixture.set_time(time(23, 50));

    let outcome = EmergencyIntakeService::new(&fixture.state)
        .admit(&Actor::nurse(Uuid::new_v4()), intake(doctor, Uuid::new_v4()))
        .await
        .unwrap();

    let appointment = outcome.appointment.unwrap();
    assert_eq!(appointment.start_time, time(23, 50));
    assert_eq!(appointment.end_time, chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap());
}

#[tokio::test]
async fn intake_is_staff_only_and_needs_a_real_doctor() {
    let (fixture, doctor) = clinic_with_doctor().await;
    let service = EmergencyIntakeService::new(&fixture.state);

    assert_matches!(
        service
            .admit(&Actor::patient(Uuid::new_v4()), intake(doctor, Uuid::new_v4()))
            .await,
        Err(AppointmentError::Forbidden)
    );
    assert_matches!(
        service
            .admit(&Actor::doctor(doctor), intake(doctor, Uuid::new_v4()))
            .await,
        Err(AppointmentError::Forbidden)
    );
    assert_matches!(
        service
            .admit(&Actor::nurse(Uuid::new_v4()), intake(Uuid::new_v4(), Uuid::new_v4()))
            .await,
        Err(AppointmentError::DoctorNotFound)
    );
}
