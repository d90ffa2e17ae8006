pub mod gateway;
pub mod queue;
pub mod token;

pub use gateway::CheckInGateway;
pub use queue::QueueService;
pub use token::{ScannedToken, TokenIssuer};
