//! Error types and error code constants for modernize.
//!
//! This module provides a unified error type (`ModernizeError`) for every
//! fallible entry point of the toolchain, plus the stable integer codes used
//! for JSON error responses and CLI exit codes.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Input errors (directory missing or unreadable)
//! - `4`: Precondition errors (facts unusable for planning or comparison)
//! - `10`: Internal errors (bugs, cache or serialization failures)
//!
//! ## Design
//!
//! Per-file problems are never errors. Unreadable files and incompletely
//! parsed constructs are recorded as [`Diagnostic`](crate::facts::Diagnostic)
//! entries on the facts so a batch always completes. Only problems that make a
//! whole call meaningless surface as `ModernizeError`.

use std::fmt;
use std::io;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad flag values, malformed config).
    InvalidArguments = 2,
    /// Input could not be read (missing directory, unreadable root).
    InputError = 3,
    /// Facts do not satisfy the preconditions of the requested operation.
    PreconditionFailed = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for all modernize operations.
#[derive(Debug, Error)]
pub enum ModernizeError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Input that the whole operation depends on could not be read.
    #[error("input error at {path}: {message}")]
    InputError { path: String, message: String },

    /// A planning or comparison precondition does not hold.
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// The facts cache could not be used.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result alias used across the workspace.
pub type ModernizeResult<T> = Result<T, ModernizeError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&ModernizeError> for OutputErrorCode {
    fn from(err: &ModernizeError) -> Self {
        match err {
            ModernizeError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            ModernizeError::InputError { .. } => OutputErrorCode::InputError,
            ModernizeError::Precondition { .. } => OutputErrorCode::PreconditionFailed,
            ModernizeError::Cache { .. } => OutputErrorCode::InternalError,
            ModernizeError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<ModernizeError> for OutputErrorCode {
    fn from(err: ModernizeError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<io::Error> for ModernizeError {
    fn from(err: io::Error) -> Self {
        ModernizeError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for ModernizeError {
    fn from(err: serde_json::Error) -> Self {
        ModernizeError::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl ModernizeError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        ModernizeError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an input error for a path.
    pub fn input(path: impl Into<String>, message: impl Into<String>) -> Self {
        ModernizeError::InputError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        ModernizeError::Precondition {
            message: message.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        ModernizeError::Cache {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ModernizeError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
