//! Unified error types for the vessel workspace.
//!
//! The taxonomy distinguishes fatal bootstrap categories (protocol,
//! privilege setup, controller I/O) from transient connection errors;
//! compatibility conditions are warnings in logs, never error values.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VesselError {
    /// The bootstrap synchronization protocol was violated.
    ///
    /// Always fatal: the protocol has no resynchronization mechanism, so a
    /// short frame, an unknown tag, or an out-of-order message leaves the
    /// channel unusable.
    #[error("bootstrap protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A privilege-sensitive setup step failed (ID maps, setgroups,
    /// time-namespace offsets). The partially constructed process must be
    /// torn down by the caller.
    #[error("container setup failed: {message}")]
    Setup {
        /// Description of the failed step.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A control-group reporting file contained a malformed value.
    ///
    /// Missing optional controllers report zero stats instead; a number
    /// that is present but unparsable indicates an API mismatch and is
    /// always fatal.
    #[error("malformed value {value:?} in {path}")]
    Parse {
        /// File the value was read from.
        path: PathBuf,
        /// The offending token.
        value: String,
    },

    /// The systemd control-plane connection failed.
    #[error("systemd connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesselError>;
