pub mod booking;
pub mod emergency;
pub mod lifecycle;
pub mod notices;
pub mod recommendation;

pub use booking::{validate_booking, AppointmentBookingService, SlotChoice};
pub use emergency::EmergencyIntakeService;
pub use lifecycle::AdminCancellationService;
pub use recommendation::recommend_alternatives;
