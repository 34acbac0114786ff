use thiserror::Error;

use crate::task::TITLE_MAX_CHARS;

/// Rejected user input. Nothing in the store changes when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title cannot be empty")]
    EmptyTitle,
    #[error("Task title must be at most {TITLE_MAX_CHARS} characters (got {len})")]
    TitleTooLong { len: usize },
}

/// Structural problems in a serialized task list.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("expected a JSON array of tasks")]
    NotAList,
    #[error("task #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
    #[error("task id {0} appears more than once")]
    DuplicateId(u64),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import file: {0}")]
    Records(#[from] RecordError),
    #[error("imported id {0} cannot be remapped without overflowing")]
    IdOverflow(u64),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read persisted tasks: {0}")]
    Read(String),
    #[error("persisted tasks are invalid: {0}")]
    Records(#[from] RecordError),
}

#[cfg(test)]
mod tests {
    use super::{ImportError, LoadError, RecordError, ValidationError};

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            ValidationError::EmptyTitle.to_string(),
            "Task title cannot be empty"
        );
        assert_eq!(
            ValidationError::TitleTooLong { len: 120 }.to_string(),
            "Task title must be at most 100 characters (got 120)"
        );

        let err = ImportError::from(RecordError::NotAList);
        assert_eq!(
            err.to_string(),
            "invalid import file: expected a JSON array of tasks"
        );

        let err = LoadError::from(RecordError::DuplicateId(4));
        assert_eq!(
            err.to_string(),
            "persisted tasks are invalid: task id 4 appears more than once"
        );
    }
}
