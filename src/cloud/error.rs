//! # Cloud Errors
//!
//! Failure taxonomy shared by functions, triggers and the data API.
//! Every variant maps to one HTTP status and one envelope code.

use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for handler and dispatch operations
pub type CloudResult<T> = Result<T, CloudError>;

/// Envelope codes sent in `{"code": .., "error": ..}` bodies
pub mod codes {
    pub const INTERNAL_SERVER_ERROR: i32 = 1;
    pub const OBJECT_NOT_FOUND: i32 = 101;
    pub const INVALID_JSON: i32 = 107;
    pub const OPERATION_FORBIDDEN: i32 = 119;
    pub const SCRIPT_FAILED: i32 = 141;
    pub const VALIDATION_ERROR: i32 = 142;
    pub const USERNAME_TAKEN: i32 = 202;
    pub const INVALID_SESSION_TOKEN: i32 = 209;
}

/// Cloud errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// Unknown function, route or object
    #[error("{message}")]
    NotFound { code: i32, message: String },

    /// A `before*` trigger rejected the mutation
    #[error("{0}")]
    Validation(String),

    /// Business-rule failure raised by a handler
    #[error("{message}")]
    Application { code: i32, message: String },

    /// Caller lacks the required credential or role
    #[error("{message}")]
    Authorization { code: i32, message: String },

    /// Request body is not the JSON shape the endpoint expects
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Underlying persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// Unexpected fault (handler panic, broken invariant)
    #[error("internal error: {0}")]
    Internal(String),
}

impl CloudError {
    /// Application failure with the default script-failed code
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            code: codes::SCRIPT_FAILED,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Authorization {
            code: codes::OPERATION_FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn object_not_found() -> Self {
        Self::NotFound {
            code: codes::OBJECT_NOT_FOUND,
            message: "Object not found.".to_string(),
        }
    }

    pub fn function_not_found(name: &str) -> Self {
        Self::NotFound {
            code: codes::SCRIPT_FAILED,
            message: format!("Invalid function: \"{name}\""),
        }
    }

    /// Get HTTP status code
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Application { .. } | Self::InvalidJson(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope code
    pub const fn code(&self) -> i32 {
        match self {
            Self::NotFound { code, .. }
            | Self::Application { code, .. }
            | Self::Authorization { code, .. } => *code,
            Self::Validation(_) => codes::VALIDATION_ERROR,
            Self::InvalidJson(_) => codes::INVALID_JSON,
            Self::Store(_) | Self::Internal(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-visible envelope. Faults never leak their detail.
    pub fn envelope(&self) -> ErrorEnvelope {
        let error = match self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorEnvelope {
            code: self.code(),
            error,
        }
    }
}

impl From<StoreError> for CloudError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::object_not_found(),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Wire shape of a failure response
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: i32,
    pub error: String,
}
