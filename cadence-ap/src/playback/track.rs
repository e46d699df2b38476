//! Playlist tracks and their preparation state
//!
//! Tracks are owned by the playlist and shared as `Arc<Track>`. The controller
//! and the preparation pipeline only read metadata and flip the
//! `prepared_for_playback` flag; both may do so concurrently, which is safe
//! because preparation is idempotent.

use cadence_common::events::{TrackError, TrackInfo};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Metadata filled in lazily by a `TrackPreparer`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    /// Duration in seconds
    pub duration_secs: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Outcome of the most recent preparation attempt
#[derive(Debug, Default)]
struct PreparationRecord {
    metadata: TrackMetadata,
    error: Option<TrackError>,
}

/// A playlist track
#[derive(Debug)]
pub struct Track {
    id: Uuid,
    path: PathBuf,

    /// Set only after `record` holds complete metadata
    prepared: AtomicBool,

    record: RwLock<PreparationRecord>,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            prepared: AtomicBool::new(false),
            record: RwLock::new(PreparationRecord::default()),
        }
    }

    /// Track with metadata already known (e.g. restored from a library)
    pub fn with_metadata(path: impl Into<PathBuf>, metadata: TrackMetadata) -> Self {
        let track = Self::new(path);
        track.mark_prepared(metadata);
        track
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_prepared_for_playback(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    /// Error recorded by the last failed preparation, if any
    pub fn preparation_error(&self) -> Option<TrackError> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .clone()
    }

    pub fn preparation_failed(&self) -> bool {
        self.preparation_error().is_some()
    }

    pub fn metadata(&self) -> TrackMetadata {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .metadata
            .clone()
    }

    /// Duration in seconds, 0.0 until prepared
    pub fn duration_secs(&self) -> f64 {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .metadata
            .duration_secs
    }

    /// Title tag, or the file stem when untagged
    pub fn display_name(&self) -> String {
        if let Some(title) = self.metadata().title {
            return title;
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Record successful preparation
    ///
    /// Metadata is stored before the flag is published, so anyone observing
    /// `is_prepared_for_playback() == true` also sees the metadata.
    pub(crate) fn mark_prepared(&self, metadata: TrackMetadata) {
        {
            let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
            record.metadata = metadata;
            record.error = None;
        }
        self.prepared.store(true, Ordering::Release);
    }

    /// Record failed preparation; the track stays unprepared so a later
    /// attempt can retry
    pub(crate) fn mark_failed(&self, error: TrackError) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        record.error = Some(error);
    }
}

/// A track together with the playlist index it was found at
#[derive(Debug, Clone)]
pub struct IndexedTrack {
    pub index: usize,
    pub track: Arc<Track>,
}

impl IndexedTrack {
    pub fn new(index: usize, track: Arc<Track>) -> Self {
        Self { index, track }
    }

    /// Serializable snapshot for events
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            index: self.index,
            track_id: self.track.id(),
            path: self.track.path().to_path_buf(),
            title: self.track.display_name(),
            duration_secs: self.track.duration_secs(),
        }
    }

    /// Identity comparison of the underlying track
    pub fn is_same_track(&self, other: &IndexedTrack) -> bool {
        Arc::ptr_eq(&self.track, &other.track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_track_is_unprepared() {
        let track = Track::new("/music/a.flac");
        assert!(!track.is_prepared_for_playback());
        assert!(!track.preparation_failed());
        assert_eq!(track.duration_secs(), 0.0);
        assert_eq!(track.display_name(), "a");
    }

    #[test]
    fn test_mark_prepared_clears_previous_error() {
        let track = Track::new("/music/a.flac");
        track.mark_failed(TrackError::FileNotFound {
            path: PathBuf::from("/music/a.flac"),
        });
        assert!(track.preparation_failed());
        assert!(!track.is_prepared_for_playback());

        track.mark_prepared(TrackMetadata {
            duration_secs: 180.0,
            title: Some("Song A".to_string()),
            ..Default::default()
        });
        assert!(track.is_prepared_for_playback());
        assert!(!track.preparation_failed());
        assert_eq!(track.duration_secs(), 180.0);
        assert_eq!(track.display_name(), "Song A");
    }

    #[test]
    fn test_indexed_track_info_snapshot() {
        let track = Arc::new(Track::with_metadata(
            "/music/b.mp3",
            TrackMetadata {
                duration_secs: 42.5,
                ..Default::default()
            },
        ));
        let indexed = IndexedTrack::new(3, Arc::clone(&track));
        let info = indexed.info();

        assert_eq!(info.index, 3);
        assert_eq!(info.track_id, track.id());
        assert_eq!(info.title, "b");
        assert_eq!(info.duration_secs, 42.5);
        assert!(indexed.is_same_track(&IndexedTrack::new(0, track)));
    }
}
