use thiserror::Error;

/// Raised by the status machines when a move is not in the transition table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {entity} status transition from {from} to {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}
