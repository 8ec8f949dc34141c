/// Errors reported by the stores and the persistence layer.
///
/// None of these ever escape the `App` intent handlers: they are turned into
/// a `false` return plus a notice on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Persistence(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Rejected(String),
}

impl NoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        NoteError::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        NoteError::Persistence(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        NoteError::Rejected(message.into())
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, NoteError::Persistence(_))
    }
}

pub type NoteResult<T> = Result<T, NoteError>;
