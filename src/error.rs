//! Unified error type.
//!
//! Two families share one enum. Registration and assembly errors surface as
//! `Err` from the call that caused them and are meant to abort start-up.
//! Request-time errors never unwind through the caller: the composed handler
//! hands them to the router's error pipeline inside
//! [`Outcome::Fail`](crate::Outcome::Fail).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Boxed error returned by user callbacks (preloaders, responders), or the
/// text of a callback's panic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable code attached to request-time failures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_PARAMETERS")]
    InvalidParameters,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameters => "INVALID_PARAMETERS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level complaint produced by a validator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), value: None }
    }

    /// Attach the offending input value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Which registry rejected a registration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Registrant {
    Conditional,
    Preloader,
}

impl fmt::Display for Registrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conditional => f.write_str("conditional"),
            Self::Preloader => f.write_str("preloader"),
        }
    }
}

/// The error type returned by tollgate's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A registration or configuration call received an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} `{name}` is already registered")]
    DuplicateRegistration { kind: Registrant, name: String },

    /// A route definition lacks `path`, `method` or `respond`.
    #[error("route definition is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    /// The dispatcher refused a path (bad syntax or a conflicting pattern).
    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    /// An assembly error tagged with the definition's source identifier.
    #[error("{origin}: {error}")]
    Definition {
        origin: String,
        #[source]
        error: Box<Error>,
    },

    #[error("unknown conditional `{0}`")]
    UnknownConditional(String),

    #[error("unknown preloader `{0}`")]
    UnknownPreloader(String),

    /// A conditional predicate panicked.
    #[error("conditional `{name}` failed: {source}")]
    ConditionFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The validator or the validation-error extraction panicked.
    #[error("validator failed: {0}")]
    ValidateFailed(#[source] BoxError),

    #[error("validation failed ({code}): {} field error(s)", .errors.len())]
    ValidationFailed { code: ErrorCode, errors: Vec<FieldError> },

    /// The first preloader to fail, by name.
    #[error("preloader `{name}` failed: {source}")]
    PreloadFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The responder returned an error or panicked.
    #[error("responder failed: {0}")]
    RespondFailed(#[source] BoxError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(errors: Vec<FieldError>) -> Self {
        Self::ValidationFailed { code: ErrorCode::InvalidParameters, errors }
    }

    /// Tag the error with the identifier of the definition that caused it.
    pub fn within(self, origin: impl Into<String>) -> Self {
        Self::Definition { origin: origin.into(), error: Box::new(self) }
    }

    /// The error with every origin annotation peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Self::Definition { error, .. } => error.root(),
            other => other,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self.root() {
            Self::ValidationFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Field errors carried by a validation failure, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self.root() {
            Self::ValidationFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}
