use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    Nurse,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Nurse)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Admin => "ADMIN",
            Role::Nurse => "NURSE",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            "nurse" => Ok(Role::Nurse),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The caller of a core operation: who they are and which profile they act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub profile_id: Uuid,
}

impl Actor {
    pub fn new(role: Role, profile_id: Uuid) -> Self {
        Self { role, profile_id }
    }

    pub fn patient(profile_id: Uuid) -> Self {
        Self::new(Role::Patient, profile_id)
    }

    pub fn doctor(profile_id: Uuid) -> Self {
        Self::new(Role::Doctor, profile_id)
    }

    pub fn admin(profile_id: Uuid) -> Self {
        Self::new(Role::Admin, profile_id)
    }

    pub fn nurse(profile_id: Uuid) -> Self {
        Self::new(Role::Nurse, profile_id)
    }

    /// The owning doctor or clinic staff.
    pub fn can_manage_doctor(&self, doctor_id: Uuid) -> bool {
        self.role.is_staff() || (self.role == Role::Doctor && self.profile_id == doctor_id)
    }
}

impl TryFrom<&User> for Actor {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Auth)?;

        let profile_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user ID format".to_string()))?;

        Ok(Actor { role, profile_id })
    }
}
