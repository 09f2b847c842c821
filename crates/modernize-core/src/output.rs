//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** every response has `status` as its first field
//! 2. **Deterministic:** same input, same output (field order, array order)
//! 3. **Nullable vs absent:** absent field means "not applicable"
//! 4. **Versioned:** `schema_version` enables forward compatibility; each
//!    payload carries its own schema version as well
//!
//! | Command | Response | Payload |
//! |---------|----------|---------|
//! | `facts` | [`FactsResponse`] | [`ProjectFacts`] |
//! | `plan` | [`PlanResponse`] | [`MigrationPlan`] |
//! | `compare` | [`CompareResponse`] | [`CoverageReport`] |
//! | `cache clean` | [`CacheCleanResponse`] | removed entry count |
//! | any failure | [`ErrorResponse`] | [`ErrorInfo`] |

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::compare::CoverageReport;
use crate::error::{ModernizeError, OutputErrorCode};
use crate::facts::ProjectFacts;
use crate::mapper::MigrationPlan;

/// Current schema version of the response envelopes.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Error Responses
// ============================================================================

/// Error information for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (see [`OutputErrorCode`]).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Input path the error refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorInfo {
    /// Create from a ModernizeError.
    pub fn from_error(err: &ModernizeError) -> Self {
        let path = match err {
            ModernizeError::InputError { path, .. } => Some(path.clone()),
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            path,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a ModernizeError.
    pub fn from_error(err: &ModernizeError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }

    /// Create an error response with just code and message.
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo {
                code,
                message: message.into(),
                path: None,
            },
        }
    }
}

// ============================================================================
// Success Responses
// ============================================================================

/// Response for the `facts` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// Analyzed directory.
    pub root: String,
    pub facts: ProjectFacts,
}

impl FactsResponse {
    pub fn new(root: impl Into<String>, facts: ProjectFacts) -> Self {
        FactsResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            root: root.into(),
            facts,
        }
    }
}

/// Response for the `plan` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub root: String,
    /// Diagnostics of the analyzed facts, so partial input stays visible.
    pub diagnostic_count: usize,
    pub plan: MigrationPlan,
}

impl PlanResponse {
    pub fn new(root: impl Into<String>, diagnostic_count: usize, plan: MigrationPlan) -> Self {
        PlanResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            root: root.into(),
            diagnostic_count,
            plan,
        }
    }
}

/// Response for the `compare` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub source_root: String,
    pub target_root: String,
    pub report: CoverageReport,
}

impl CompareResponse {
    pub fn new(
        source_root: impl Into<String>,
        target_root: impl Into<String>,
        report: CoverageReport,
    ) -> Self {
        CompareResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            source_root: source_root.into(),
            target_root: target_root.into(),
            report,
        }
    }
}

/// Response for the `cache clean` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheCleanResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub cache_dir: String,
    pub removed: usize,
}

impl CacheCleanResponse {
    pub fn new(cache_dir: impl Into<String>, removed: usize) -> Self {
        CacheCleanResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            cache_dir: cache_dir.into(),
            removed,
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
