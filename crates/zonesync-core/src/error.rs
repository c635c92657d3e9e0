//! Error types for zone synchronization
//!
//! This module defines all error types used throughout the crate.

use std::path::Path;
use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zone synchronization
#[derive(Error, Debug)]
pub enum Error {
    /// The inventory snapshot could not be fetched (unreachable endpoint,
    /// timeout, non-success status)
    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),

    /// The fetched document is not a usable inventory snapshot
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    /// The zone template failed to render
    #[error("Failed to render zone {zone}: {message}")]
    Render {
        /// Zone being rendered
        zone: String,
        /// Renderer message
        message: String,
    },

    /// Writing or renaming the temporary zone file failed
    #[error("Failed to commit {path}: {message}")]
    Commit {
        /// Destination zone file
        path: String,
        /// I/O message
        message: String,
    },

    /// The next serial would not fit the YYYYMMDDnn form
    #[error("Serial for zone {zone} cannot advance past {serial}")]
    SerialOverflow {
        /// Zone whose serial overflowed
        zone: String,
        /// Serial that could not be advanced or rendered
        serial: u64,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more zone files could not be written
    #[error("{failed} of {total} zone file(s) failed to update")]
    ZoneWrite {
        /// Number of failed zones
        failed: usize,
        /// Number of zones attempted
        total: usize,
    },
}

impl Error {
    /// Create a snapshot fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create an invalid snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a render error for a zone
    pub fn render(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create a commit error for a destination path
    pub fn commit(path: &Path, message: impl Into<String>) -> Self {
        Self::Commit {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
