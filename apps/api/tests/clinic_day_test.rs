use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use clinic_queue_api::create_router;
use shared_models::auth::Role;
use shared_utils::test_utils::{ClinicFixture, JwtTestUtils, TestUser};

struct Api {
    app: Router,
    secret: String,
}

impl Api {
    fn new(fixture: &ClinicFixture) -> Self {
        Self {
            app: create_router(fixture.state.clone()),
            secret: fixture.state.config.jwt_secret.clone(),
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            let token = JwtTestUtils::create_test_token(user, &self.secret, None);
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }
}

#[tokio::test]
async fn liveness_banner_is_public() {
    let fixture = ClinicFixture::on_monday_morning();
    let (status, body) = Api::new(&fixture).call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Clinic queue API is running!");
}

#[tokio::test]
async fn a_full_clinic_morning() {
    let fixture = ClinicFixture::on_monday_morning();
    let api = Api::new(&fixture);

    let doctor_id = Uuid::new_v4();
    let doctor = TestUser::with_id(doctor_id, Role::Doctor);
    let admin = TestUser::admin("admin@clinic.test");
    let nurse = TestUser::nurse("nurse@clinic.test");
    let first = TestUser::with_id(Uuid::new_v4(), Role::Patient);
    let second = TestUser::with_id(Uuid::new_v4(), Role::Patient);

    // Directory entry and weekly schedule.
    let (status, _) = api
        .call(
            Method::PUT,
            &format!("/doctors/{}/profile", doctor_id),
            Some(&admin),
            Some(json!({ "full_name": "Ana Costa", "specialization": "GENERAL" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = api
        .call(
            Method::PUT,
            &format!("/doctors/{}/availability", doctor_id),
            Some(&doctor),
            Some(json!({ "windows": [
                { "weekday": "Mon", "start_time": "09:00:00", "end_time": "11:00:00", "slot_duration_minutes": 30 }
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, slots) = api
        .call(
            Method::GET,
            &format!("/doctors/{}/slots?date=2025-03-03", doctor_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        slots["slots"],
        json!(["09:00:00", "09:30:00", "10:00:00", "10:30:00"])
    );

    // Two bookings.
    for (patient, start) in [(&first, "09:00:00"), (&second, "09:30:00")] {
        let (status, _) = api
            .call(
                Method::POST,
                "/appointments",
                Some(patient),
                Some(json!({ "doctor_id": doctor_id, "date": "2025-03-03", "start_time": start })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Doctor checks in with today's token.
    let (_, token) = api
        .call(
            Method::GET,
            &format!("/queues/doctors/{}/token", doctor_id),
            Some(&doctor),
            None,
        )
        .await;
    let token = token["token"].as_str().unwrap().to_string();
    let queue_id = {
        let (_, again) = api
            .call(
                Method::GET,
                &format!("/queues/doctors/{}/token", doctor_id),
                Some(&nurse),
                None,
            )
            .await;
        assert_eq!(again["token"], token.as_str());
        again["queue_id"].as_str().unwrap().to_string()
    };

    let (_, body) = api
        .call(Method::POST, "/queues/check-in", Some(&doctor), Some(json!({ "token": token })))
        .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["consultations_count"], 2);

    // Patients scan in reverse order of their slots.
    let (_, body) = api
        .call(Method::POST, "/queues/check-in", Some(&second), Some(json!({ "token": token })))
        .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["position"], 1);
    let (_, body) = api
        .call(Method::POST, "/queues/check-in", Some(&first), Some(json!({ "token": token })))
        .await;
    assert_eq!(body["data"]["position"], 2);
    assert_eq!(body["data"]["estimated_time"], 30);

    // Nurse calls the first in line.
    let (_, called) = api
        .call(
            Method::POST,
            &format!("/queues/{}/call-next", queue_id),
            Some(&nurse),
            None,
        )
        .await;
    assert_eq!(called["success"], true);
    assert_eq!(called["entry"]["patient_id"], second.id.as_str());

    let (status, mine) = api
        .call(
            Method::GET,
            &format!("/queues/status?doctor_id={}", doctor_id),
            Some(&first),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["people_ahead"], 0);

    let (_, mine) = api
        .call(Method::GET, "/appointments/mine", Some(&second), None)
        .await;
    assert_eq!(mine[0]["status"], "IN_PROGRESS");
}
