//! Event types for the Cadence event system
//!
//! Provides shared event definitions and the EventBus used to notify
//! subscribers (UI, persistence, integrations) of playback outcomes.

// Sub-modules (supporting types)
mod playback_types;
mod track_types;

pub use playback_types::{PlaybackState, RepeatMode, ShuffleMode};
pub use track_types::{AddProgress, TrackError, TrackInfo};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Cadence event types
///
/// Events are broadcast via EventBus and are serializable so they can be
/// logged or forwarded as JSON. Publishing is fire-and-forget: nothing in the
/// player depends on a subscriber being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CadenceEvent {
    /// The playing track changed without a direct caller (automatic advance)
    ///
    /// Triggers:
    /// - UI: Refresh now-playing display
    TrackChanged {
        /// Track playing before the change (None if nothing was playing)
        old_track: Option<TrackInfo>,
        /// Track playing after the change (None if the sequence ended)
        new_track: Option<TrackInfo>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Automatic advance selected a track that could not be prepared
    TrackNotPlayed {
        /// Track playing before the failed attempt
        old_track: Option<TrackInfo>,
        /// Why the track could not be played
        error: TrackError,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Metadata for a track became available after background preparation
    TrackInfoUpdated {
        /// Playlist index the track had when preparation was scheduled; may
        /// be stale if the playlist changed in between
        track_index: usize,
        /// Stable identity of the prepared track
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bulk add started
    StartedAddingTracks {
        total_tracks: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One track from a bulk add landed in the playlist
    TrackAdded {
        track_index: usize,
        progress: AddProgress,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Some files of a bulk add were rejected
    TracksNotAdded {
        errors: Vec<TrackError>,
        progress: AddProgress,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bulk add finished
    DoneAddingTracks {
        progress: AddProgress,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Derived playback state changed as a result of a user operation
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Repeat or shuffle mode toggled
    SequenceModesChanged {
        repeat_mode: RepeatMode,
        shuffle_mode: ShuffleMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CadenceEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            CadenceEvent::TrackChanged { .. } => "TrackChanged",
            CadenceEvent::TrackNotPlayed { .. } => "TrackNotPlayed",
            CadenceEvent::TrackInfoUpdated { .. } => "TrackInfoUpdated",
            CadenceEvent::StartedAddingTracks { .. } => "StartedAddingTracks",
            CadenceEvent::TrackAdded { .. } => "TrackAdded",
            CadenceEvent::TracksNotAdded { .. } => "TracksNotAdded",
            CadenceEvent::DoneAddingTracks { .. } => "DoneAddingTracks",
            CadenceEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            CadenceEvent::SequenceModesChanged { .. } => "SequenceModesChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cadence_common::events::{CadenceEvent, EventBus, PlaybackState};
/// use std::sync::Arc;
///
/// let event_bus = Arc::new(EventBus::new(1000));
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(CadenceEvent::PlaybackStateChanged {
///     old_state: PlaybackState::Paused,
///     new_state: PlaybackState::Playing,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CadenceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped (the subscriber then sees `Lagged`).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CadenceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CadenceEvent,
    ) -> Result<usize, broadcast::error::SendError<CadenceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CadenceEvent) {
        let _ = self.emit(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
