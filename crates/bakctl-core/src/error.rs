//! Error types for bakctl

use thiserror::Error;

/// Result type alias using bakctl-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared by every bakctl crate
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input: bad flag combination, empty name, bad size suffix
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A task, record or file that was looked up does not exist
    #[error("{what} not found: {key}")]
    NotFound { what: String, key: String },

    /// Uniqueness violation
    #[error("{what} already exists: {key}")]
    AlreadyExists { what: String, key: String },

    /// Checksum mismatch on restore
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    /// Archive pack/unpack failure
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Zip codec error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Invalid glob pattern in include/exclude rules
    #[error("Invalid rule pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl Error {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound {
            what: what.into(),
            key: key.to_string(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(what: impl Into<String>, key: impl ToString) -> Self {
        Self::AlreadyExists {
            what: what.into(),
            key: key.to_string(),
        }
    }

    /// Create an archive codec error
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for not-found errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Task", 42);
        assert_eq!(err.to_string(), "Task not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_integrity_message() {
        let err = Error::Integrity {
            path: "/tmp/a.zip".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.to_string().contains("expected aa, got bb"));
        assert!(!err.is_not_found());
    }
}
