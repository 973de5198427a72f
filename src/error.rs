use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the user store and the actor that fronts it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable at {}: {reason}", path.display())]
    Unavailable { path: PathBuf, reason: String },
    #[error("User not found: {0}")]
    NotFound(u64),
    #[error("User conflict: {0}")]
    Conflict(String),
    /// A caller-supplied id is held by a row, or was handed out before.
    #[error("User id already taken: {0}")]
    IdTaken(u64),
    #[error("User validation error: {0}")]
    Validation(String),
    #[error("Actor communication error: {0}")]
    ActorCommunication(String),
}

impl StoreError {
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::StoreError;

    #[test]
    fn unavailable_names_the_file() {
        let err = StoreError::unavailable("/tmp/datos.csv", "file not found");
        assert_eq!(
            err.to_string(),
            "Store unavailable at /tmp/datos.csv: file not found"
        );
    }
}
