use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Database is missing required tables: {}", missing.join(", "))]
    MissingTables { missing: Vec<String> },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Shared state lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        LedgerError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        LedgerError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LedgerError::validation("amount must be positive").to_string(),
            "Validation error: amount must be positive"
        );
        assert_eq!(LedgerError::not_found("memo 7").to_string(), "memo 7 not found");

        let missing = LedgerError::MissingTables {
            missing: vec!["memos".to_string(), "tags".to_string()],
        };
        assert_eq!(
            missing.to_string(),
            "Database is missing required tables: memos, tags"
        );
    }
}
