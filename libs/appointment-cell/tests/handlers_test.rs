use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::Weekday;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::appointment_routes;
use shared_models::auth::Role;
use shared_models::{AppointmentStatus, Specialization};
use shared_utils::test_utils::{time, ClinicFixture, JwtTestUtils, TestUser};

async fn send(fixture: &ClinicFixture, request: Request<Body>) -> (StatusCode, Value) {
    let response = appointment_routes(fixture.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn bearer(fixture: &ClinicFixture, user: &TestUser) -> String {
    format!(
        "Bearer {}",
        JwtTestUtils::create_test_token(user, &fixture.state.config.jwt_secret, None)
    )
}

fn post_json(uri: String, auth: String, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("Authorization", auth)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn clinic() -> (ClinicFixture, Uuid) {
    let fixture = ClinicFixture::on_monday_morning();
    let doctor = fixture.add_doctor("Ana Costa", Specialization::General).await;
    fixture
        .add_window(doctor, Weekday::Mon, time(9, 0), time(12, 0), 30)
        .await;
    (fixture, doctor)
}

#[tokio::test]
async fn patient_books_then_lists_then_cancels() {
    let (fixture, doctor) = clinic().await;
    let patient = TestUser::with_id(Uuid::new_v4(), Role::Patient);
    let auth = bearer(&fixture, &patient);

    let (status, body) = send(
        &fixture,
        post_json(
            "/".to_string(),
            auth.clone(),
            json!({ "doctor_id": doctor, "date": "2025-03-03", "start_time": "09:30:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["appointment"]["status"], "SCHEDULED");
    assert!(body["queue_entry"].is_null());
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &fixture,
        Request::get("/mine?status=SCHEDULED")
            .header("Authorization", auth.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &fixture,
        Request::post(format!("/{}/cancel", appointment_id))
            .header("Authorization", auth)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "CANCELLED");
}

#[tokio::test]
async fn booking_rejections_map_to_client_errors() {
    let (fixture, doctor) = clinic().await;
    let taken_by = Uuid::new_v4();
    fixture
        .seed_appointment(taken_by, doctor, fixture.today(), time(9, 0), AppointmentStatus::Scheduled)
        .await;
    let auth = bearer(&fixture, &TestUser::patient("p@clinic.test"));

    let (status, body) = send(
        &fixture,
        post_json(
            "/".to_string(),
            auth.clone(),
            json!({ "doctor_id": doctor, "date": "2025-03-01", "start_time": "09:00:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &fixture,
        post_json(
            "/".to_string(),
            auth.clone(),
            json!({ "doctor_id": doctor, "date": "2025-03-03", "start_time": "09:00:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &fixture,
        post_json(
            "/".to_string(),
            auth,
            json!({ "doctor_id": Uuid::new_v4(), "date": "2025-03-03", "start_time": "09:00:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_bulk_cancel_reports_count() {
    let (fixture, doctor) = clinic().await;
    for start in [time(9, 0), time(9, 30)] {
        fixture
            .seed_appointment(Uuid::new_v4(), doctor, fixture.today(), start, AppointmentStatus::Scheduled)
            .await;
    }
    let admin = TestUser::admin("admin@clinic.test");

    let (status, body) = send(
        &fixture,
        post_json(
            format!("/admin/doctors/{}/cancel", doctor),
            bearer(&fixture, &admin),
            json!({ "reason": "Clinic closed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled_count"], 2);

    let nurse = TestUser::nurse("nurse@clinic.test");
    let (status, _) = send(
        &fixture,
        post_json(
            format!("/admin/doctors/{}/cancel", doctor),
            bearer(&fixture, &nurse),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn nurse_admits_an_emergency() {
    let (fixture, doctor) = clinic().await;
    let nurse = TestUser::nurse("nurse@clinic.test");

    let (status, body) = send(
        &fixture,
        post_json(
            "/emergency".to_string(),
            bearer(&fixture, &nurse),
            json!({ "patient_id": Uuid::new_v4(), "doctor_id": doctor }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entry"]["status"], "EMERGENCY");
    assert_eq!(body["appointment"]["status"], "CHECKED_IN");
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let (fixture, _) = clinic().await;
    let (status, _) = send(
        &fixture,
        Request::get("/mine").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
