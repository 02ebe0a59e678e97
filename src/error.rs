//! Error taxonomy shared by the store and the engines built on it

use thiserror::Error;

/// Errors surfaced by QuoteDesk operations
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record does not exist at lookup time
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A customer or product name collides with an existing one (case-insensitive)
    #[error("{entity} '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// No unique quote number could be allocated within the retry bound
    #[error("could not allocate a unique quote number after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    /// Malformed or out-of-range input
    #[error("validation failed: {0}")]
    Validation(String),

    /// A computation needs a larger sample than is available
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a SQLite UNIQUE/constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::not_found("quote", 7).to_string(),
            "quote 7 not found"
        );
        assert_eq!(
            Error::DuplicateName {
                entity: "customer",
                name: "Acme".to_string()
            }
            .to_string(),
            "customer 'Acme' already exists"
        );
    }

    #[test]
    fn test_constraint_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: Error = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_constraint_violation());
        assert!(!Error::validation("x").is_constraint_violation());
    }
}
