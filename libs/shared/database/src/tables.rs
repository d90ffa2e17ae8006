use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use shared_models::{
    Appointment, AvailabilityWindow, DoctorProfile, Queue, QueueEntry, Specialization,
};

use crate::error::DatabaseError;

type SlotKey = (Uuid, NaiveDate, NaiveTime);

/// Row storage plus the unique indexes backing the clinic's invariants.
#[derive(Debug, Clone, Default)]
pub struct ClinicTables {
    doctors: HashMap<Uuid, DoctorProfile>,
    availability: HashMap<(Uuid, Weekday), AvailabilityWindow>,
    appointments: HashMap<Uuid, Appointment>,
    slot_index: HashMap<SlotKey, Uuid>,
    queues: HashMap<Uuid, Queue>,
    queue_index: HashMap<(Uuid, NaiveDate), Uuid>,
    entries: HashMap<Uuid, QueueEntry>,
    entry_index: HashMap<(Uuid, Uuid), Uuid>,
}

fn slot_key(appointment: &Appointment) -> Option<SlotKey> {
    appointment
        .status
        .holds_slot()
        .then_some((appointment.doctor_id, appointment.date, appointment.start_time))
}

impl ClinicTables {
    // Doctors

    pub fn upsert_doctor(&mut self, doctor: DoctorProfile) {
        self.doctors.insert(doctor.id, doctor);
    }

    pub fn doctor(&self, id: Uuid) -> Option<&DoctorProfile> {
        self.doctors.get(&id)
    }

    /// Doctors of one specialization, ordered by name then id.
    pub fn doctors_by_specialization(&self, specialization: Specialization) -> Vec<&DoctorProfile> {
        let mut found: Vec<_> = self
            .doctors
            .values()
            .filter(|d| d.specialization == specialization)
            .collect();
        found.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        found
    }

    // Availability

    pub fn window(&self, doctor_id: Uuid, weekday: Weekday) -> Option<&AvailabilityWindow> {
        self.availability.get(&(doctor_id, weekday))
    }

    pub fn windows_for(&self, doctor_id: Uuid) -> Vec<&AvailabilityWindow> {
        let mut windows: Vec<_> = self
            .availability
            .values()
            .filter(|w| w.doctor_id == doctor_id)
            .collect();
        windows.sort_by_key(|w| w.weekday.num_days_from_monday());
        windows
    }

    pub fn insert_window(&mut self, window: AvailabilityWindow) -> Result<(), DatabaseError> {
        let key = (window.doctor_id, window.weekday);
        if self.availability.contains_key(&key) {
            return Err(DatabaseError::UniqueViolation {
                constraint: "availability_doctor_weekday",
            });
        }
        self.availability.insert(key, window);
        Ok(())
    }

    pub fn remove_window(&mut self, doctor_id: Uuid, weekday: Weekday) -> Option<AvailabilityWindow> {
        self.availability.remove(&(doctor_id, weekday))
    }

    // Appointments

    pub fn appointment(&self, id: Uuid) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    pub fn insert_appointment(&mut self, appointment: Appointment) -> Result<(), DatabaseError> {
        if self.appointments.contains_key(&appointment.id) {
            return Err(DatabaseError::UniqueViolation { constraint: "appointment_pkey" });
        }
        if let Some(key) = slot_key(&appointment) {
            if self.slot_index.contains_key(&key) {
                return Err(DatabaseError::UniqueViolation {
                    constraint: "appointment_doctor_date_start_time",
                });
            }
            self.slot_index.insert(key, appointment.id);
        }
        self.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    /// Rewrites a row, keeping the slot index consistent with its new
    /// date, time and status.
    pub fn update_appointment(&mut self, appointment: Appointment) -> Result<(), DatabaseError> {
        let previous = self
            .appointments
            .get(&appointment.id)
            .ok_or_else(|| DatabaseError::NotFound {
                table: "appointments",
                id: appointment.id.to_string(),
            })?;

        let old_key = slot_key(previous);
        let new_key = slot_key(&appointment);

        if let Some(key) = new_key {
            if let Some(holder) = self.slot_index.get(&key) {
                if *holder != appointment.id {
                    return Err(DatabaseError::UniqueViolation {
                        constraint: "appointment_doctor_date_start_time",
                    });
                }
            }
        }
        if let Some(key) = old_key {
            self.slot_index.remove(&key);
        }
        if let Some(key) = new_key {
            self.slot_index.insert(key, appointment.id);
        }
        self.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    /// A doctor's appointments on one date, in start-time order.
    pub fn appointments_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<&Appointment> {
        let mut found: Vec<_> = self
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date)
            .collect();
        found.sort_by_key(|a| (a.start_time, a.created_at));
        found
    }

    pub fn appointments_for_doctor(&self, doctor_id: Uuid) -> Vec<&Appointment> {
        let mut found: Vec<_> = self
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .collect();
        found.sort_by_key(|a| (a.date, a.start_time));
        found
    }

    pub fn appointments_for_patient(&self, patient_id: Uuid) -> Vec<&Appointment> {
        let mut found: Vec<_> = self
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .collect();
        found.sort_by(|a, b| (b.date, b.start_time).cmp(&(a.date, a.start_time)));
        found
    }

    pub fn appointments_for_patient_on(&self, patient_id: Uuid, date: NaiveDate) -> Vec<&Appointment> {
        let mut found: Vec<_> = self
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && a.date == date)
            .collect();
        found.sort_by_key(|a| a.start_time);
        found
    }

    pub fn is_slot_taken(&self, doctor_id: Uuid, date: NaiveDate, start_time: NaiveTime) -> bool {
        self.slot_index.contains_key(&(doctor_id, date, start_time))
    }

    // Queues

    pub fn queue(&self, id: Uuid) -> Option<&Queue> {
        self.queues.get(&id)
    }

    pub fn queue_for(&self, doctor_id: Uuid, date: NaiveDate) -> Option<&Queue> {
        self.queue_index
            .get(&(doctor_id, date))
            .and_then(|id| self.queues.get(id))
    }

    pub fn insert_queue(&mut self, queue: Queue) -> Result<(), DatabaseError> {
        let key = (queue.doctor_id, queue.date);
        if self.queue_index.contains_key(&key) {
            return Err(DatabaseError::UniqueViolation { constraint: "queue_doctor_date" });
        }
        self.queue_index.insert(key, queue.id);
        self.queues.insert(queue.id, queue);
        Ok(())
    }

    pub fn update_queue(&mut self, queue: Queue) -> Result<(), DatabaseError> {
        let stored = self.queues.get(&queue.id).ok_or_else(|| DatabaseError::NotFound {
            table: "queues",
            id: queue.id.to_string(),
        })?;
        if stored.doctor_id != queue.doctor_id || stored.date != queue.date {
            return Err(DatabaseError::ImmutableColumn {
                table: "queues",
                column: "doctor_date",
            });
        }
        if stored.join_token != queue.join_token {
            return Err(DatabaseError::ImmutableColumn {
                table: "queues",
                column: "join_token",
            });
        }
        self.queues.insert(queue.id, queue);
        Ok(())
    }

    // Queue entries

    pub fn entry(&self, id: Uuid) -> Option<&QueueEntry> {
        self.entries.get(&id)
    }

    pub fn entry_for(&self, queue_id: Uuid, patient_id: Uuid) -> Option<&QueueEntry> {
        self.entry_index
            .get(&(queue_id, patient_id))
            .and_then(|id| self.entries.get(id))
    }

    /// Entries of one queue in position order.
    pub fn entries_for_queue(&self, queue_id: Uuid) -> Vec<&QueueEntry> {
        let mut found: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.queue_id == queue_id)
            .collect();
        found.sort_by_key(|e| e.position);
        found
    }

    pub fn entry_for_appointment(&self, appointment_id: Uuid) -> Option<&QueueEntry> {
        self.entries
            .values()
            .find(|e| e.appointment_id == Some(appointment_id))
    }

    /// Appends an entry at `max(position) + 1`, overriding whatever position
    /// the caller supplied.
    pub fn append_entry(&mut self, mut entry: QueueEntry) -> Result<QueueEntry, DatabaseError> {
        if !self.queues.contains_key(&entry.queue_id) {
            return Err(DatabaseError::NotFound {
                table: "queues",
                id: entry.queue_id.to_string(),
            });
        }
        let key = (entry.queue_id, entry.patient_id);
        if self.entry_index.contains_key(&key) {
            return Err(DatabaseError::UniqueViolation {
                constraint: "queue_entry_queue_patient",
            });
        }
        entry.position = self
            .entries
            .values()
            .filter(|e| e.queue_id == entry.queue_id)
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
            + 1;
        self.entry_index.insert(key, entry.id);
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    pub fn update_entry(&mut self, entry: QueueEntry) -> Result<(), DatabaseError> {
        let stored = self.entries.get(&entry.id).ok_or_else(|| DatabaseError::NotFound {
            table: "queue_entries",
            id: entry.id.to_string(),
        })?;
        if stored.position != entry.position {
            return Err(DatabaseError::ImmutableColumn {
                table: "queue_entries",
                column: "position",
            });
        }
        if stored.queue_id != entry.queue_id || stored.patient_id != entry.patient_id {
            return Err(DatabaseError::ImmutableColumn {
                table: "queue_entries",
                column: "queue_patient",
            });
        }
        self.entries.insert(entry.id, entry);
        Ok(())
    }
}
