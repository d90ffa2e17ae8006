pub mod availability;
pub mod directory;
pub mod slots;

pub use availability::AvailabilityService;
pub use directory::DoctorDirectoryService;
pub use slots::SlotGenerator;
