use shared::error::ErrorsMap;
use thiserror::Error;

/// Raised while building a controller from its configuration. None of these
/// are recoverable at request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("controller configuration requires a template")]
    MissingTemplate,
    #[error("field '{field}' uses unknown formatter '{name}'")]
    UnknownFormatter { field: String, name: String },
    #[error("field '{field}' uses unknown validator '{name}'")]
    UnknownValidator { field: String, name: String },
    #[error("field '{field}' has invalid arguments for '{validator}': {reason}")]
    InvalidArguments {
        field: String,
        validator: String,
        reason: String,
    },
}

/// Failure of a request pipeline.
///
/// `Validation` is resolved locally by the error handler (flash + redirect).
/// The other variants are handed back to the caller untouched.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(ErrorsMap),
    #[error("form rejected: {0}")]
    Rejected(serde_json::Value),
    #[error(transparent)]
    Processing(#[from] anyhow::Error),
}

impl FormError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FormError::Validation(_))
    }

    pub fn validation_errors(&self) -> Option<&ErrorsMap> {
        match self {
            FormError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
