//! Controller fixtures

use super::mock_renderer::MockRenderer;
use cadence_ap::playback::{
    PlaybackController, PlaybackSequence, PlaybackSequencer, Playlist, PlaylistAccessor,
    PlaylistChangeListener, Track, TrackMetadata, TrackPreparer,
};
use cadence_common::events::{CadenceEvent, EventBus, TrackError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Seek length used by every fixture
pub const SEEK_LENGTH_SECS: u32 = 5;

/// Preparer that never touches the filesystem
///
/// Durations come from the fixture's track list; any path containing
/// "broken" fails with `TrackError::Corrupt`.
#[derive(Default)]
pub struct CountingPreparer {
    durations: Mutex<HashMap<PathBuf, f64>>,
    calls: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingPreparer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_duration(&self, path: &str, duration_secs: f64) {
        self.durations
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), duration_secs);
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }
}

impl TrackPreparer for CountingPreparer {
    fn prepare(&self, path: &Path) -> Result<TrackMetadata, TrackError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        if path.to_string_lossy().contains("broken") {
            return Err(TrackError::Corrupt {
                path: path.to_path_buf(),
                reason: "bad frame header".to_string(),
            });
        }

        let duration_secs = self
            .durations
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(180.0);
        Ok(TrackMetadata {
            duration_secs,
            title: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned()),
            ..Default::default()
        })
    }
}

pub struct TestPlayer {
    pub controller: Arc<PlaybackController>,
    pub renderer: Arc<MockRenderer>,
    pub preparer: Arc<CountingPreparer>,
    pub playlist: Arc<Playlist>,
    pub events: broadcast::Receiver<CadenceEvent>,
}

impl TestPlayer {
    /// Everything published so far, oldest first
    pub fn drain_events(&mut self) -> Vec<CadenceEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }

    /// `(old index, new index)` of every `TrackChanged` published so far
    pub fn track_changes(&mut self) -> Vec<(Option<usize>, Option<usize>)> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                CadenceEvent::TrackChanged {
                    old_track,
                    new_track,
                    ..
                } => Some((old_track.map(|t| t.index), new_track.map(|t| t.index))),
                _ => None,
            })
            .collect()
    }

    /// Wait for background lookahead preparation to drain
    pub fn flush_preparation(&self) {
        self.controller.preparation().flush();
    }
}

/// Player over `tracks` (path, duration) with repeat and shuffle off
pub fn build_player(tracks: &[(&str, f64)]) -> TestPlayer {
    build_player_with_sequence(tracks, Box::new(PlaybackSequencer::new(tracks.len())))
}

pub fn build_player_with_sequence(
    tracks: &[(&str, f64)],
    sequence: Box<dyn PlaybackSequence>,
) -> TestPlayer {
    let bus = EventBus::new(256);
    let events = bus.subscribe();

    let preparer = Arc::new(CountingPreparer::new());
    let playlist = Arc::new(Playlist::new(bus.clone()));
    for (path, duration) in tracks {
        preparer.set_duration(path, *duration);
        playlist.push(Arc::new(Track::new(*path)));
    }

    let renderer = Arc::new(MockRenderer::new());
    let controller = Arc::new(
        PlaybackController::new(
            renderer.clone(),
            Arc::clone(&playlist) as Arc<dyn PlaylistAccessor>,
            sequence,
            preparer.clone(),
            bus,
            SEEK_LENGTH_SECS,
        )
        .unwrap(),
    );

    let listener: Arc<dyn PlaylistChangeListener> = controller.clone();
    playlist.add_listener(Arc::downgrade(&listener));

    TestPlayer {
        controller,
        renderer,
        preparer,
        playlist,
        events,
    }
}
