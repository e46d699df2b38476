//! Playlist collaborator interfaces and an in-memory playlist
//!
//! The controller only needs `PlaylistAccessor` (lookups) and reacts to
//! `PlaylistChange` notifications. `Playlist` is the reference implementation
//! used by the binary and the tests.

use crate::playback::track::{IndexedTrack, Track};
use cadence_common::events::{AddProgress, CadenceEvent, EventBus, TrackError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info, warn};

/// File extensions accepted by bulk add
pub const SUPPORTED_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "aac", "mp4", "ogg", "wav"];

/// Read access to the tracks the controller plays
pub trait PlaylistAccessor: Send + Sync {
    /// Track at `index`, or None if out of range
    fn track_at(&self, index: usize) -> Option<IndexedTrack>;

    fn size(&self) -> usize;

    /// Sum of known durations in seconds
    fn total_duration_secs(&self) -> f64;
}

/// Structural change to a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistChange {
    /// A track was inserted at this index
    TrackAdded(usize),
    /// The track at this index was removed
    TrackRemoved(usize),
    /// A single track moved from `old` to `new`
    TrackReordered { old: usize, new: usize },
    /// The whole playlist was reordered (e.g. sorted); `cursor` is the new
    /// index of the track the sequence was positioned on
    PlaylistReordered { cursor: Option<usize> },
    PlaylistCleared,
}

/// Receives playlist change notifications
pub trait PlaylistChangeListener: Send + Sync {
    fn playlist_changed(&self, change: PlaylistChange);
}

/// In-memory playlist
///
/// Listeners are held weakly and notified after the playlist lock is
/// released, so a listener may call back into the playlist.
pub struct Playlist {
    tracks: RwLock<Vec<Arc<Track>>>,
    listeners: RwLock<Vec<Weak<dyn PlaylistChangeListener>>>,
    events: EventBus,
}

impl Playlist {
    pub fn new(events: EventBus) -> Self {
        Self {
            tracks: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Register a listener; dropped listeners are pruned on the next notify
    pub fn add_listener(&self, listener: Weak<dyn PlaylistChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn notify(&self, change: PlaylistChange) {
        let listeners: Vec<Arc<dyn PlaylistChangeListener>> = {
            let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
            guard.retain(|l| l.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.playlist_changed(change);
        }
    }

    /// Append an already-constructed track
    pub fn push(&self, track: Arc<Track>) -> usize {
        let index = {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            tracks.push(track);
            tracks.len() - 1
        };
        self.notify(PlaylistChange::TrackAdded(index));
        index
    }

    /// Bulk-add files, publishing progress events
    ///
    /// Missing files and unsupported extensions are collected and reported in
    /// a single `TracksNotAdded` event. Returns the indices of added tracks.
    pub fn add_tracks(&self, paths: &[PathBuf]) -> Vec<usize> {
        let total = paths.len();
        info!("Adding {} files to playlist", total);
        self.events.emit_lossy(CadenceEvent::StartedAddingTracks {
            total_tracks: total,
            timestamp: chrono::Utc::now(),
        });

        let mut added = Vec::new();
        let mut errors = Vec::new();

        for (processed, path) in paths.iter().enumerate() {
            if let Err(e) = check_addable(path) {
                debug!("Not adding {}: {}", path.display(), e);
                errors.push(e);
                continue;
            }

            let index = self.push(Arc::new(Track::new(path.clone())));
            added.push(index);
            self.events.emit_lossy(CadenceEvent::TrackAdded {
                track_index: index,
                progress: AddProgress::new(processed + 1, total),
                timestamp: chrono::Utc::now(),
            });
        }

        let progress = AddProgress::new(total, total);
        if !errors.is_empty() {
            warn!("{} of {} files could not be added", errors.len(), total);
            self.events.emit_lossy(CadenceEvent::TracksNotAdded {
                errors,
                progress,
                timestamp: chrono::Utc::now(),
            });
        }
        self.events.emit_lossy(CadenceEvent::DoneAddingTracks {
            progress,
            timestamp: chrono::Utc::now(),
        });

        added
    }

    /// Remove the track at `index`
    pub fn remove(&self, index: usize) -> Option<Arc<Track>> {
        let removed = {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            (index < tracks.len()).then(|| tracks.remove(index))
        };
        if removed.is_some() {
            self.notify(PlaylistChange::TrackRemoved(index));
        }
        removed
    }

    /// Move a track from `old` to `new`; returns false if either is out of range
    pub fn reorder(&self, old: usize, new: usize) -> bool {
        {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            if old >= tracks.len() || new >= tracks.len() {
                return false;
            }
            let track = tracks.remove(old);
            tracks.insert(new, track);
        }
        if old != new {
            self.notify(PlaylistChange::TrackReordered { old, new });
        }
        true
    }

    /// Sort by file path, keeping track of where `cursor` ends up
    pub fn sort_by_path(&self, cursor: Option<usize>) -> Option<usize> {
        let new_cursor = {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            let cursor_track = cursor.and_then(|c| tracks.get(c).cloned());
            tracks.sort_by(|a, b| a.path().cmp(b.path()));
            cursor_track.and_then(|t| tracks.iter().position(|x| Arc::ptr_eq(x, &t)))
        };
        self.notify(PlaylistChange::PlaylistReordered { cursor: new_cursor });
        new_cursor
    }

    pub fn clear(&self) {
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.notify(PlaylistChange::PlaylistCleared);
    }

    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PlaylistAccessor for Playlist {
    fn track_at(&self, index: usize) -> Option<IndexedTrack> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .map(|t| IndexedTrack::new(index, Arc::clone(t)))
    }

    fn size(&self) -> usize {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn total_duration_secs(&self) -> f64 {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.duration_secs())
            .sum()
    }
}

fn check_addable(path: &Path) -> Result<(), TrackError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !supported {
        return Err(TrackError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "unsupported file extension".to_string(),
        });
    }
    if !path.is_file() {
        return Err(TrackError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener(Mutex<Vec<PlaylistChange>>);

    impl PlaylistChangeListener for RecordingListener {
        fn playlist_changed(&self, change: PlaylistChange) {
            self.0.lock().unwrap().push(change);
        }
    }

    fn playlist_with(paths: &[&str]) -> Playlist {
        let playlist = Playlist::new(EventBus::new(100));
        for path in paths {
            playlist.push(Arc::new(Track::new(*path)));
        }
        playlist
    }

    fn paths(playlist: &Playlist) -> Vec<PathBuf> {
        playlist.tracks().iter().map(|t| t.path().to_path_buf()).collect()
    }

    #[test]
    fn test_track_at_and_size() {
        let playlist = playlist_with(&["/m/a.mp3", "/m/b.mp3"]);
        assert_eq!(playlist.size(), 2);
        assert_eq!(playlist.track_at(1).unwrap().index, 1);
        assert!(playlist.track_at(2).is_none());
    }

    #[test]
    fn test_listeners_notified_of_changes() {
        let playlist = playlist_with(&["/m/a.mp3", "/m/b.mp3", "/m/c.mp3"]);
        let listener = Arc::new(RecordingListener::default());
        let weak: Weak<dyn PlaylistChangeListener> =
            Arc::downgrade(&(listener.clone() as Arc<dyn PlaylistChangeListener>));
        playlist.add_listener(weak);

        playlist.reorder(0, 2);
        playlist.remove(1);
        playlist.clear();

        assert_eq!(
            *listener.0.lock().unwrap(),
            vec![
                PlaylistChange::TrackReordered { old: 0, new: 2 },
                PlaylistChange::TrackRemoved(1),
                PlaylistChange::PlaylistCleared,
            ]
        );
    }

    #[test]
    fn test_reorder_moves_track() {
        let playlist = playlist_with(&["/m/a.mp3", "/m/b.mp3", "/m/c.mp3"]);
        assert!(playlist.reorder(2, 0));
        assert_eq!(
            paths(&playlist),
            vec![
                PathBuf::from("/m/c.mp3"),
                PathBuf::from("/m/a.mp3"),
                PathBuf::from("/m/b.mp3")
            ]
        );
        assert!(!playlist.reorder(0, 5));
    }

    #[test]
    fn test_sort_tracks_cursor() {
        let playlist = playlist_with(&["/m/c.mp3", "/m/a.mp3", "/m/b.mp3"]);
        let cursor = playlist.sort_by_path(Some(0));
        assert_eq!(cursor, Some(2));
        assert_eq!(playlist.track_at(0).unwrap().track.path(), Path::new("/m/a.mp3"));
    }

    #[test]
    fn test_bulk_add_reports_progress_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        std::fs::write(&good, b"RIFF").unwrap();
        let missing = dir.path().join("missing.flac");
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();

        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let playlist = Playlist::new(bus);

        let added = playlist.add_tracks(&[good.clone(), missing.clone(), text.clone()]);
        assert_eq!(added, vec![0]);
        assert_eq!(playlist.size(), 1);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "StartedAddingTracks",
                "TrackAdded",
                "TracksNotAdded",
                "DoneAddingTracks"
            ]
        );

        match &events[1] {
            CadenceEvent::TrackAdded { track_index, progress, .. } => {
                assert_eq!(*track_index, 0);
                assert_eq!(progress.tracks_added, 1);
                assert_eq!(progress.total_tracks, 3);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        match &events[2] {
            CadenceEvent::TracksNotAdded { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert!(matches!(errors[0], TrackError::FileNotFound { .. }));
                assert!(matches!(errors[1], TrackError::UnsupportedFormat { .. }));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        match &events[3] {
            CadenceEvent::DoneAddingTracks { progress, .. } => {
                assert_eq!(progress.percentage, 100.0);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_total_duration_sums_known_durations() {
        use crate::playback::track::TrackMetadata;

        let playlist = Playlist::new(EventBus::new(10));
        playlist.push(Arc::new(Track::with_metadata(
            "/m/a.mp3",
            TrackMetadata {
                duration_secs: 60.0,
                ..Default::default()
            },
        )));
        playlist.push(Arc::new(Track::new("/m/b.mp3")));
        assert_eq!(playlist.total_duration_secs(), 60.0);
    }
}
