use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },

    #[error("{table} row not found: {id}")]
    NotFound { table: &'static str, id: String },

    #[error("Column {table}.{column} cannot be changed after insert")]
    ImmutableColumn {
        table: &'static str,
        column: &'static str,
    },
}
