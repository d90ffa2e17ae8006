pub mod appointment;
pub mod auth;
pub mod doctor;
pub mod error;
pub mod queue;
pub mod transition;

pub use appointment::*;
pub use doctor::*;
pub use queue::*;
pub use transition::InvalidTransition;
