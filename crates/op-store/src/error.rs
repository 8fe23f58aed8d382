//! Storage error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("not found: {entity} '{key}'")]
    NotFound {
        /// Type of entity (e.g. "Client").
        entity: &'static str,
        /// Lookup key.
        key: String,
    },

    /// Duplicate entity (unique constraint violation).
    #[error("duplicate {entity}: '{key}' already exists")]
    Duplicate {
        /// Type of entity.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// The backend did not answer within its time bound.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Internal store error.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            key: key.into(),
        }
    }

    /// Checks if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is a duplicate error.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error() {
        let err = StoreError::not_found("Client", "abc");
        assert!(err.is_not_found());
        assert!(!err.is_duplicate());
        assert!(err.to_string().contains("Client"));
    }

    #[test]
    fn duplicate_error() {
        let err = StoreError::duplicate("Client", "abc");
        assert!(err.is_duplicate());
        assert!(err.to_string().contains("abc"));
    }
}
