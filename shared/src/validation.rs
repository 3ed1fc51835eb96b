//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate,
//! plus the password-policy check every pool enforces on its own terms.
//!
//! ## Overview
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validate_request`] | Validate a struct implementing `Validate` |
//! | [`parse_and_validate`] | Parse JSON and validate in one step |
//! | [`validators`] | Custom validation functions |
//!
//! ## How Validation Works
//!
//! We use the [`validator`](https://docs.rs/validator/) crate which provides
//! derive macros for declarative validation:
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct InitiateAuthRequest {
//!     #[validate(custom(function = "validators::not_blank"))]
//!     client_id: String,
//! }
//! ```
//!
//! ## Error Response Format
//!
//! When validation fails, the API returns a 400 with the wire-shaped body:
//!
//! ```json
//! {
//!   "__type": "InvalidParameterException",
//!   "message": "..."
//! }
//! ```
//!
//! ## Related Documentation
//!
//! - [`validator` crate](https://docs.rs/validator/)
//! - [`crate::errors::ApiError`] - error handling

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// ## Errors
///
/// Returns `ApiError::ValidationError` with field-level details if
/// validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::ValidationError)
}

/// Parses a JSON body and validates it in one step.
///
/// ## Errors
///
/// - `ApiError::InvalidParameter` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    let data: T = serde_json::from_str(json).map_err(|e| ApiError::InvalidParameter {
        message: e.to_string(),
    })?;

    validate_request(&data)?;

    Ok(data)
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }
}

/// A pool's password strength requirements, as carried on `UserPool`.
///
/// Mirrors the character-class requirements a real pool's password policy
/// expresses: a minimum length plus any subset of the four character
/// classes below.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub minimum_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            minimum_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_symbols: false,
        }
    }
}

const SYMBOL_CHARS: &str = "^$*.[]{}()?\"!@#%&/\\,><':;|_~`+=-";

impl PasswordPolicy {
    /// Checks `candidate` against this policy, returning a human-readable
    /// description of the first unmet requirement.
    pub fn check(&self, candidate: &str) -> Result<(), String> {
        if candidate.chars().count() < self.minimum_length {
            return Err(format!(
                "Password must be at least {} characters",
                self.minimum_length
            ));
        }
        if self.require_uppercase && !candidate.chars().any(|c| c.is_ascii_uppercase()) {
            return Err("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !candidate.chars().any(|c| c.is_ascii_lowercase()) {
            return Err("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_numbers && !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err("Password must contain at least one number".to_string());
        }
        if self.require_symbols && !candidate.chars().any(|c| SYMBOL_CHARS.contains(c)) {
            return Err("Password must contain at least one symbol".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
