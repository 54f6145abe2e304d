//! Error types for litegate
//!
//! This module defines all error types used throughout the gateway.

use thiserror::Error;

use crate::registry::StatementHandle;

/// The main error type for litegate
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========== Engine Errors ==========
    /// An error reported by the embedded engine, propagated verbatim.
    #[error("Engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// Transient lock contention. Distinct from permanent errors so that
    /// callers may retry; the gateway itself never retries.
    #[error("Engine busy: {0}")]
    Busy(String),

    // ========== Startup Errors ==========
    /// The database file could not be opened. The gateway never reaches
    /// the open state and accepts no commands.
    #[error("Failed to open database '{path}' (code {code}): {message}")]
    OpenFailed {
        path: String,
        code: i32,
        message: String,
    },

    // ========== Protocol Errors ==========
    #[error("Stale statement handle {0}")]
    StaleHandle(StatementHandle),

    #[error("Malformed parameters: {0}")]
    MalformedParams(String),

    #[error("Unsupported parameter type: {0}")]
    UnsupportedType(String),

    #[error("Invalid SQL text: {0}")]
    InvalidSql(String),

    // ========== Lifecycle Errors ==========
    #[error("Gateway is closed")]
    Closed,

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the transient contention condition that callers may retry.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy(_))
    }
}

/// Result type alias for litegate operations
pub type Result<T> = std::result::Result<T, Error>;
