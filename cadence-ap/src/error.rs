//! Error types for cadence-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use cadence_common::events::TrackError;
use thiserror::Error;

/// Main error type for cadence-ap
#[derive(Error, Debug)]
pub enum Error {
    /// The selected track could not be prepared for playback
    #[error("Track not played: {0}")]
    TrackNotPlayed(#[from] TrackError),

    /// No track at the requested playlist index
    #[error("No track at playlist index {0}")]
    TrackNotFound(usize),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Errors raised by cadence-common helpers
    #[error(transparent)]
    Common(#[from] cadence_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using cadence-ap Error
pub type Result<T> = std::result::Result<T, Error>;
