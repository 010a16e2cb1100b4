use thiserror::Error;

/// Failures reported by the strict entry points.
///
/// The lenient pipeline never fails; it degrades to `None` or drops entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    #[error("no JSON payload could be extracted from the reply")]
    NoPayload,
    #[error("payload produced an empty change set")]
    EmptyChangeSet,
}

/// A dynamic-template expression that could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expression error at byte {offset}: {message}")]
pub struct ExprError {
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
