use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::tables::ClinicTables;

/// Single-process clinic store.
///
/// Every write goes through [`ClinicDatabase::transaction`]: the closure runs
/// against a private copy of the tables under the store lock and the copy
/// replaces the live tables only when the closure returns `Ok`. Writers are
/// therefore serialised and an error leaves no partial state behind.
#[derive(Debug, Clone, Default)]
pub struct ClinicDatabase {
    tables: Arc<Mutex<ClinicTables>>,
}

impl ClinicDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut ClinicTables) -> Result<T, E>,
    {
        let mut live = self.tables.lock().await;
        let mut working = live.clone();
        match work(&mut working) {
            Ok(value) => {
                *live = working;
                Ok(value)
            }
            Err(e) => {
                debug!("Transaction rolled back");
                Err(e)
            }
        }
    }

    /// Consistent read-only view.
    pub async fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&ClinicTables) -> T,
    {
        let live = self.tables.lock().await;
        query(&live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use shared_models::{DoctorProfile, Specialization};
    use uuid::Uuid;

    fn doctor() -> DoctorProfile {
        DoctorProfile {
            id: Uuid::new_v4(),
            full_name: "Amina Diallo".to_string(),
            specialization: Specialization::General,
        }
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let db = ClinicDatabase::new();
        let profile = doctor();
        let id = profile.id;

        let result: Result<(), DatabaseError> = db
            .transaction(|tables| {
                tables.upsert_doctor(profile);
                Err(DatabaseError::NotFound { table: "doctors", id: "x".into() })
            })
            .await;

        assert!(result.is_err());
        assert!(db.read(|tables| tables.doctor(id).is_none()).await);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let db = ClinicDatabase::new();
        let profile = doctor();
        let id = profile.id;

        db.transaction::<_, DatabaseError, _>(|tables| {
            tables.upsert_doctor(profile);
            Ok(())
        })
        .await
        .unwrap();

        assert!(db.read(|tables| tables.doctor(id).is_some()).await);
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialised() {
        let db = ClinicDatabase::new();
        let specialization = Specialization::Cardiology;

        let writers = (0..20).map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.transaction::<_, DatabaseError, _>(move |tables| {
                    tables.upsert_doctor(DoctorProfile {
                        id: Uuid::new_v4(),
                        full_name: format!("Doctor {:02}", i),
                        specialization,
                    });
                    Ok(())
                })
                .await
            })
        });
        for result in futures::future::join_all(writers).await {
            result.unwrap().unwrap();
        }

        let count = db
            .read(|tables| tables.doctors_by_specialization(specialization).len())
            .await;
        assert_eq!(count, 20);
    }
}
