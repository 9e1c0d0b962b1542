//! # Error Handling
//!
//! Centralized error types for Tessera core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every failure is fatal to the call that raised it; nothing in the core
//! retries. The variants are grouped the way callers react to them:
//! configuration, resolution, binding and infrastructure.

use thiserror::Error;

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Tessera runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Word delimiter specification rejected
    #[error("{reason}")]
    InvalidDelimiter {
        /// Why the specification was rejected
        reason: String,
    },

    /// Path delimiter specification rejected
    #[error("Invalid path delimiter")]
    InvalidPathDelimiter,

    /// Controller directory missing or unreadable
    #[error("Directory \"{path}\" not found or not readable")]
    DirectoryNotReadable {
        /// The offending directory
        path: String,
    },

    /// No controller registered under the resolved class name
    #[error("Invalid controller class (\"{class}\")")]
    ControllerNotFound {
        /// The fully qualified class name that was looked up
        class: String,
    },

    /// A controller registration or instance does not honour the controller contract
    #[error("Controller '{class}' is not an action controller: {reason}")]
    InvalidController {
        /// The class name involved
        class: String,
        /// Reason for rejection
        reason: String,
    },

    /// The fallback invocation path found no such action
    #[error("Action '{action}' does not exist on {controller}")]
    ActionNotFound {
        /// Formatted action method name
        action: String,
        /// Controller class name
        controller: String,
    },

    /// Controllers kept forwarding past the configured limit
    #[error("Dispatch loop exceeded {limit} iterations")]
    DispatchLoopExceeded {
        /// Configured iteration limit
        limit: usize,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Bind parameter could not be resolved against the statement placeholders
    #[error("Invalid bind-variable position '{parameter}'")]
    InvalidBindPosition {
        /// The parameter as supplied by the caller
        parameter: String,
    },

    /// Unsupported fetch mode
    #[error("Invalid fetch mode specified: {mode}")]
    InvalidFetchMode {
        /// The rejected mode
        mode: String,
    },

    /// Column index or name absent from the current row
    #[error("Column {column} not found in result row")]
    ColumnNotFound {
        /// The requested column
        column: String,
    },

    /// Configuration could not be loaded or applied
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
