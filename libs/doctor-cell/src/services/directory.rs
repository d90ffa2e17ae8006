use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::ClinicDatabase;
use shared_models::auth::{Actor, Role};
use shared_models::DoctorProfile;

use crate::models::{DoctorError, UpsertDoctorRequest};

pub struct DoctorDirectoryService {
    db: ClinicDatabase,
}

impl DoctorDirectoryService {
    pub fn new(db: ClinicDatabase) -> Self {
        Self { db }
    }

    /// Creates or updates a doctor's directory entry. Admin only.
    pub async fn upsert_doctor(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: UpsertDoctorRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        if actor.role != Role::Admin {
            warn!("{} {} tried to edit doctor {}", actor.role, actor.profile_id, doctor_id);
            return Err(DoctorError::UnauthorizedAccess);
        }

        let full_name = request.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(DoctorError::ValidationError("Doctor name cannot be empty".to_string()));
        }

        let profile = DoctorProfile {
            id: doctor_id,
            full_name,
            specialization: request.specialization,
        };
        let stored = profile.clone();
        self.db
            .transaction::<_, DoctorError, _>(|tables| {
                tables.upsert_doctor(stored);
                Ok(())
            })
            .await?;

        info!("Doctor {} listed under {}", doctor_id, profile.specialization);
        Ok(profile)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        self.db
            .read(|tables| tables.doctor(doctor_id).cloned())
            .await
            .ok_or(DoctorError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::Specialization;

    #[tokio::test]
    async fn only_admins_edit_the_directory() {
        let service = DoctorDirectoryService::new(ClinicDatabase::new());
        let request = UpsertDoctorRequest {
            full_name: "Lina Haddad".to_string(),
            specialization: Specialization::Neurology,
        };
        let result = service
            .upsert_doctor(&Actor::doctor(Uuid::new_v4()), Uuid::new_v4(), request)
            .await;
        assert_matches!(result, Err(DoctorError::UnauthorizedAccess));
    }

    #[tokio::test]
    async fn upsert_then_fetch() {
        let service = DoctorDirectoryService::new(ClinicDatabase::new());
        let id = Uuid::new_v4();
        service
            .upsert_doctor(
                &Actor::admin(Uuid::new_v4()),
                id,
                UpsertDoctorRequest {
                    full_name: "  Lina Haddad ".to_string(),
                    specialization: Specialization::Neurology,
                },
            )
            .await
            .unwrap();

        let fetched = service.get_doctor(id).await.unwrap();
        assert_eq!(fetched.full_name, "Lina Haddad");
        assert_matches!(service.get_doctor(Uuid::new_v4()).await, Err(DoctorError::NotFound));
    }
}
