use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tokio::sync::mpsc;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingRules};
use shared_database::{ClinicDatabase, DatabaseError};
use shared_models::auth::{Actor, Role, User};
use shared_models::{
    Appointment, AppointmentStatus, AvailabilityWindow, DoctorProfile, Specialization,
};

use crate::clock::{Clock, FixedClock};
use crate::notify::{Notification, Notifier};
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub checkin_token_secret: String,
    pub rules: SchedulingRules,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            checkin_token_secret: "test-checkin-secret".to_string(),
            rules: SchedulingRules::default(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            checkin_token_secret: self.checkin_token_secret.clone(),
            notification_webhook_url: None,
            utc_offset_minutes: Some(0),
            server_port: 0,
            rules: self.rules.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    /// A user whose id is an existing profile id.
    pub fn with_id(id: Uuid, role: Role) -> Self {
        Self {
            id: id.to_string(),
            email: format!("{}@clinic.test", id.simple()),
            role: role.to_string().to_lowercase(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn nurse(email: &str) -> Self {
        Self::new(email, "nurse")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::try_from(&self.to_user()).expect("test user has a valid role and id")
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid test time")
}

/// A clinic-local instant at UTC+0, matching the fixture config.
pub fn local(day: NaiveDate, at: NaiveTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&day.and_time(at)).fixed_offset()
}

/// An in-memory clinic with a settable clock and a captured notification feed.
pub struct ClinicFixture {
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl ClinicFixture {
    pub fn at(now: DateTime<FixedOffset>) -> Self {
        Self::with_config(TestConfig::default().to_app_config(), now)
    }

    pub fn with_config(config: AppConfig, now: DateTime<FixedOffset>) -> Self {
        let clock = Arc::new(FixedClock::new(now));
        let (notifier, notifications) = Notifier::channel();
        let state = Arc::new(AppState::new(
            Arc::new(config),
            ClinicDatabase::new(),
            clock.clone(),
            notifier,
        ));
        Self {
            state,
            clock,
            notifications,
        }
    }

    /// Monday 2025-03-03, 08:00.
    pub fn on_monday_morning() -> Self {
        Self::at(local(date(2025, 3, 3), time(8, 0)))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn set_time(&self, at: NaiveTime) {
        self.clock.set(local(self.today(), at));
    }

    pub async fn add_doctor(&self, full_name: &str, specialization: Specialization) -> Uuid {
        let profile = DoctorProfile {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            specialization,
        };
        let id = profile.id;
        self.state
            .db
            .transaction::<_, DatabaseError, _>(|tables| {
                tables.upsert_doctor(profile);
                Ok(())
            })
            .await
            .expect("doctor insert");
        id
    }

    pub async fn add_window(
        &self,
        doctor_id: Uuid,
        weekday: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        slot_duration_minutes: i64,
    ) {
        let window = AvailabilityWindow {
            doctor_id,
            weekday,
            start_time: start,
            end_time: end,
            slot_duration_minutes,
            active: true,
        };
        self.state
            .db
            .transaction(|tables| tables.insert_window(window))
            .await
            .expect("window insert");
    }

    /// Writes an appointment row directly, bypassing booking rules.
    pub async fn seed_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
        start: NaiveTime,
        status: AppointmentStatus,
    ) -> Appointment {
        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            date: day,
            start_time: start,
            end_time: start + Duration::minutes(30),
            status,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        let stored = appointment.clone();
        self.state
            .db
            .transaction(|tables| tables.insert_appointment(stored))
            .await
            .expect("appointment insert");
        appointment
    }

    pub async fn appointment(&self, id: Uuid) -> Appointment {
        self.state
            .db
            .read(|tables| tables.appointment(id).cloned())
            .await
            .expect("appointment exists")
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }
}
