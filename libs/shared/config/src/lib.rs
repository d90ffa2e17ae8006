use std::env;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Clinic business rules. Defaults mirror the clinic's historical constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingRules {
    /// Maximum SCHEDULED/CHECKED_IN appointments a doctor may hold on one date.
    pub daily_cap: usize,
    /// A patient may hold one active appointment per specialization per day.
    pub one_per_specialization_per_day: bool,
    /// Doctors may not check in later than this after their first appointment.
    pub doctor_late_checkin_minutes: i64,
    /// Per-consultation estimate used for the patient-facing wait display.
    pub consultation_estimate_minutes: i64,
    /// Slot length for walk-ins on days without an availability window.
    pub default_slot_duration_minutes: i64,
    pub recommendation_horizon_days: i64,
    pub max_recommendations: usize,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            daily_cap: 15,
            one_per_specialization_per_day: true,
            doctor_late_checkin_minutes: 30,
            consultation_estimate_minutes: 15,
            default_slot_duration_minutes: 30,
            recommendation_horizon_days: 14,
            max_recommendations: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub checkin_token_secret: String,
    pub notification_webhook_url: Option<String>,
    /// Fixed clinic offset from UTC; host local time when unset.
    pub utc_offset_minutes: Option<i32>,
    pub server_port: u16,
    pub rules: SchedulingRules,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| {
            warn!("SUPABASE_JWT_SECRET not set, using empty value");
            String::new()
        });

        let checkin_token_secret = env::var("CHECKIN_TOKEN_SECRET").unwrap_or_else(|_| {
            warn!("CHECKIN_TOKEN_SECRET not set, falling back to JWT secret");
            jwt_secret.clone()
        });

        let notification_webhook_url = env::var("NOTIFICATION_WEBHOOK_URL").ok();
        if notification_webhook_url.is_none() {
            warn!("NOTIFICATION_WEBHOOK_URL not set, notifications will only be logged");
        }

        let utc_offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|raw| match raw.parse::<i32>() {
                Ok(minutes) => Some(minutes),
                Err(_) => {
                    warn!("CLINIC_UTC_OFFSET_MINUTES is not a number, using host local time");
                    None
                }
            });

        let defaults = SchedulingRules::default();
        let rules = SchedulingRules {
            daily_cap: env_or("MAX_APPOINTMENTS_PER_DAY", defaults.daily_cap),
            one_per_specialization_per_day: env_or(
                "ONE_APPOINTMENT_PER_SPECIALIZATION",
                defaults.one_per_specialization_per_day,
            ),
            doctor_late_checkin_minutes: env_or(
                "DOCTOR_LATE_CHECKIN_MINUTES",
                defaults.doctor_late_checkin_minutes,
            ),
            consultation_estimate_minutes: env_or(
                "CONSULTATION_ESTIMATE_MINUTES",
                defaults.consultation_estimate_minutes,
            ),
            default_slot_duration_minutes: env_or(
                "DEFAULT_SLOT_DURATION_MINUTES",
                defaults.default_slot_duration_minutes,
            ),
            recommendation_horizon_days: env_or(
                "RECOMMENDATION_HORIZON_DAYS",
                defaults.recommendation_horizon_days,
            ),
            max_recommendations: env_or("MAX_RECOMMENDATIONS", defaults.max_recommendations),
        };

        let config = Self {
            jwt_secret,
            checkin_token_secret,
            notification_webhook_url,
            utc_offset_minutes,
            server_port: env_or("SERVER_PORT", 3000),
            rules,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty() && !self.checkin_token_secret.is_empty()
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
