//! Track-related type definitions
//!
//! Serializable snapshots of tracks and the preparation error taxonomy, so
//! events can carry them to any subscriber.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Reason a track could not be made ready for playback
///
/// Attached to the track that failed, then surfaced either to a direct `play`
/// caller or through a `TrackNotPlayed` event.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackError {
    /// The file no longer exists
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Container or codec is not supported
    #[error("Unsupported format for {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Data could not be parsed
    #[error("Corrupt audio data in {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Any other I/O failure while opening the file
    #[error("I/O error reading {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

impl TrackError {
    /// File the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            TrackError::FileNotFound { path }
            | TrackError::UnsupportedFormat { path, .. }
            | TrackError::Corrupt { path, .. }
            | TrackError::Io { path, .. } => path,
        }
    }
}

/// Snapshot of a playlist track at a given index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Playlist index at the time of the snapshot
    pub index: usize,
    /// Stable track identity
    pub track_id: Uuid,
    pub path: PathBuf,
    /// Display title (falls back to file stem when no tag is present)
    pub title: String,
    /// Duration in seconds, 0.0 if not yet known
    pub duration_secs: f64,
}

/// Progress of a bulk playlist add
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddProgress {
    /// Number of files processed so far
    pub tracks_added: usize,
    /// Total number of files to process
    pub total_tracks: usize,
    /// Percentage processed (0.0 when total is zero)
    pub percentage: f64,
}

impl AddProgress {
    pub fn new(tracks_added: usize, total_tracks: usize) -> Self {
        let percentage = if total_tracks > 0 {
            tracks_added as f64 * 100.0 / total_tracks as f64
        } else {
            0.0
        };

        Self {
            tracks_added,
            total_tracks,
            percentage,
        }
    }
}
