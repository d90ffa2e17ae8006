pub mod error;
pub mod store;
pub mod tables;

pub use error::DatabaseError;
pub use store::ClinicDatabase;
pub use tables::ClinicTables;
