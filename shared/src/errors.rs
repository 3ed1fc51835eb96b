//! # Application Error Types
//!
//! Unified error handling shared by every part of the emulator, with
//! automatic conversion to the AWS Cognito Identity Provider JSON-1.1
//! error shape.
//!
//! ## Design Philosophy
//!
//! This module follows the "make illegal states unrepresentable" principle.
//! Each error variant maps to both an HTTP status code and a wire `__type`
//! string matching the real service's error taxonomy.
//!
//! ## Wire Error Format
//!
//! All errors are serialized to the shape the real service returns:
//!
//! ```json
//! {
//!   "__type": "NotAuthorizedException",
//!   "message": "Incorrect username or password."
//! }
//! ```
//!
//! ## Framework Integration
//!
//! This module implements `ResponseError` so handlers can simply return
//! `Result<T, ApiError>` and let Actix-web render the wire-shaped body.
//!
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Result type alias used throughout the emulator.
///
/// Use this instead of `Result<T, ApiError>` for cleaner signatures:
///
/// ```rust,ignore
/// async fn handler() -> ApiResult<User> { ... }
/// ```
pub type ApiResult<T> = Result<T, ApiError>;

/// Application error type with automatic HTTP status + wire `__type` mapping.
///
/// ## Adding New Variants
///
/// When adding new error types:
/// 1. Choose the appropriate HTTP status code
/// 2. Add the variant with `#[error("...")]` for the message format
/// 3. Update `status_code()`
/// 4. Update `wire_type()`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials invalid, user disabled/unconfirmed mismatch, or token
    /// invalid. Also the mapping target for a password mismatch: it is
    /// deliberately reported the same way as a bad token, matching
    /// upstream's information-hiding.
    #[error("Incorrect username or password.")]
    NotAuthorized,

    /// No user exists with the given identifier.
    #[error("User does not exist.")]
    UserNotFound,

    /// Sign-up completed but the account has not confirmed its email/code.
    #[error("User is not confirmed.")]
    UserNotConfirmed,

    /// The user's password was force-reset by an administrator and must be
    /// replaced via `ForgotPassword`/`ConfirmForgotPassword` before login.
    #[error("Password reset required for the user.")]
    PasswordResetRequired,

    /// A confirmation or MFA code did not match the one on file.
    #[error("Invalid code provided, please request a code again.")]
    CodeMismatch,

    /// A confirmation code existed but is past its validity window.
    #[error("Invalid code provided, please request a code again.")]
    ExpiredCode,

    /// Malformed or missing request input.
    #[error("{message}")]
    InvalidParameter {
        /// Human-readable description of what's wrong.
        message: String,
    },

    /// `SignUp`/`AdminCreateUser` with a username already taken in the pool.
    #[error("User already exists.")]
    UsernameExists,

    /// A proposed password does not meet the pool's configured password
    /// policy (length, character-class requirements).
    #[error("{message}")]
    InvalidPassword {
        /// Which requirement the password failed, from `PasswordPolicy::check`.
        message: String,
    },

    /// Pool, client, or other named resource does not exist.
    #[error("{resource} not found.")]
    ResourceNotFound {
        /// Identifier of the missing resource (e.g. "pool:us-east-1_abc").
        resource: String,
    },

    /// A pool- or client-scoped limit was exceeded.
    #[error("{detail}")]
    LimitExceeded {
        /// Description of which limit was hit.
        detail: String,
    },

    /// Emulator limitation: a feature the real service has, that this
    /// local emulator deliberately does not implement.
    #[error("This emulator does not support: {detail}")]
    Unsupported {
        /// What isn't supported.
        detail: String,
    },

    /// Caller request failed validation-crate checks.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// A synchronous trigger invocation aborted the calling operation with
    /// its own message (`PreTokenGeneration`, `PreAuthentication`, etc).
    #[error("{message}")]
    TriggerAborted {
        /// Message reported by the trigger handler.
        message: String,
    },

    /// Persistence, key generation, or other unexpected internal failure.
    #[error("Internal error")]
    InternalError {
        /// Internal message for logging (not exposed to the client).
        message: String,
    },
}

impl ApiError {
    /// HTTP status code for this error. Source of truth for the Actix
    /// integration below.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthorized
            | Self::UserNotConfirmed
            | Self::PasswordResetRequired => StatusCode::UNAUTHORIZED,
            Self::UserNotFound | Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::CodeMismatch | Self::ExpiredCode => StatusCode::BAD_REQUEST,
            Self::InvalidParameter { .. } | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::UsernameExists => StatusCode::BAD_REQUEST,
            Self::InvalidPassword { .. } => StatusCode::BAD_REQUEST,
            Self::LimitExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::Unsupported { .. } => StatusCode::BAD_REQUEST,
            Self::TriggerAborted { .. } => StatusCode::BAD_REQUEST,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `__type` field the real service puts on every error body.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "NotAuthorizedException",
            Self::UserNotFound => "UserNotFoundException",
            Self::UserNotConfirmed => "UserNotConfirmedException",
            Self::PasswordResetRequired => "PasswordResetRequiredException",
            Self::CodeMismatch => "CodeMismatchException",
            Self::ExpiredCode => "ExpiredCodeException",
            Self::InvalidParameter { .. } | Self::ValidationError(_) => {
                "InvalidParameterException"
            }
            Self::UsernameExists => "UsernameExistsException",
            Self::InvalidPassword { .. } => "InvalidPasswordException",
            Self::ResourceNotFound { .. } => "ResourceNotFoundException",
            Self::LimitExceeded { .. } => "LimitExceededException",
            Self::Unsupported { .. } => "UnsupportedOperationException",
            Self::TriggerAborted { .. } => "UnexpectedLambdaException",
            Self::InternalError { .. } => "InternalErrorException",
        }
    }

    /// `true` for errors that should be logged loudly and monitored.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::InternalError { .. })
    }
}

/// Wire-shaped error body: `{"__type": "...", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct WireError {
    #[serde(rename = "__type")]
    pub error_type: String,
    pub message: String,
}

impl WireError {
    pub fn new(error: &ApiError) -> Self {
        Self {
            error_type: error.wire_type().to_string(),
            message: error.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        ApiError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_error() {
            tracing::error!(error = %self, "internal error handling request");
        } else {
            tracing::warn!(error = %self, wire_type = self.wire_type(), "request failed");
        }
        HttpResponse::build(ResponseError::status_code(self)).json(WireError::new(self))
    }
}
