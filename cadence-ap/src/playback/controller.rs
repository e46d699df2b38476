//! Playback controller: the orchestrating state machine
//!
//! **Responsibilities:**
//! - User operations: play/pause/resume/stop/seek/next/previous
//! - Automatic advance when the render engine reports completion
//! - Session bookkeeping so stale completion signals are discarded
//! - Lookahead preparation of the tracks most likely to play next
//! - Publishing outcomes (including failures) on the EventBus
//!
//! Playback state is never stored here; it is always read from the render
//! engine.
//!
//! Every operation and every accepted completion signal runs under the control
//! lock, which also guards the playback sequence. That lock is the single
//! foreground path: a completion signal is checked against the current
//! session and acted on without any user operation interleaving.

use crate::error::{Error, Result};
use crate::playback::events::RenderEvent;
use crate::playback::playlist::{PlaylistAccessor, PlaylistChange, PlaylistChangeListener};
use crate::playback::preparation::{TrackPreparationPipeline, TrackPreparer};
use crate::playback::renderer::RenderEngine;
use crate::playback::sequence::PlaybackSequence;
use crate::playback::session::{Session, SessionRegistry};
use crate::playback::track::IndexedTrack;
use cadence_common::events::{
    CadenceEvent, EventBus, PlaybackState, RepeatMode, ShuffleMode, TrackInfo,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Result of `toggle_play_pause`
#[derive(Debug, Clone)]
pub struct PlayPauseOutcome {
    pub state: PlaybackState,
    pub playing_track: Option<IndexedTrack>,
    /// True when a new track was started (toggle from `NoTrack`)
    pub track_changed: bool,
}

/// Playback position of the playing track
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeekPosition {
    pub seconds: f64,
    /// `seconds * 100 / duration`, 0.0 when the duration is unknown
    pub percentage: f64,
}

/// Playback controller
pub struct PlaybackController {
    render: Arc<dyn RenderEngine>,
    playlist: Arc<dyn PlaylistAccessor>,

    /// Current session slot; written only under the control lock
    sessions: Arc<SessionRegistry>,

    preparation: TrackPreparationPipeline,
    events: EventBus,
    seek_length_secs: f64,

    /// Control lock guarding the playback sequence
    control: Mutex<Box<dyn PlaybackSequence>>,

    /// Taken by the completion listener on `start`
    render_event_rx: Mutex<Option<mpsc::UnboundedReceiver<RenderEvent>>>,
}

impl PlaybackController {
    /// Create the controller and connect it to the render engine
    ///
    /// Spawns the preparation worker thread. Call `start` from within a tokio
    /// runtime to begin processing completion signals.
    pub fn new(
        render: Arc<dyn RenderEngine>,
        playlist: Arc<dyn PlaylistAccessor>,
        sequence: Box<dyn PlaybackSequence>,
        preparer: Arc<dyn TrackPreparer>,
        events: EventBus,
        seek_length_secs: u32,
    ) -> Result<Self> {
        let preparation = TrackPreparationPipeline::new(preparer, Some(events.clone()))?;

        let (render_event_tx, render_event_rx) = mpsc::unbounded_channel();
        render.connect(render_event_tx);

        info!(
            "Playback controller created ({} tracks, seek length {}s)",
            playlist.size(),
            seek_length_secs
        );

        Ok(Self {
            render,
            playlist,
            sessions: Arc::new(SessionRegistry::new()),
            preparation,
            events,
            seek_length_secs: f64::from(seek_length_secs),
            control: Mutex::new(sequence),
            render_event_rx: Mutex::new(Some(render_event_rx)),
        })
    }

    /// Spawn the task that drains render-engine completion signals
    ///
    /// The task holds only a weak reference, so dropping the last
    /// `Arc<PlaybackController>` ends it. Can be called once.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut rx = self
            .render_event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                Error::InvalidState("Completion listener already started".to_string())
            })?;

        let controller = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            debug!("Completion listener started");
            while let Some(event) = rx.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.handle_render_event(event);
            }
            debug!("Completion listener stopped");
        });

        Ok(handle)
    }

    // ========================================
    // User operations
    // ========================================

    /// Play/pause toggle
    ///
    /// - `NoTrack`: plays the subsequent track in the sequence
    /// - `Paused`: resumes
    /// - `Playing`: pauses
    pub fn toggle_play_pause(&self) -> Result<PlayPauseOutcome> {
        self.with_control(|sequence| {
            let mut track_changed = false;

            match self.render.state() {
                PlaybackState::NoTrack => {
                    let index = sequence.subsequent();
                    let track = self.resolve(index);
                    track_changed = self.play_track(sequence, track)?.is_some();
                }
                PlaybackState::Paused => self.render.resume(),
                PlaybackState::Playing => self.render.pause(),
            }

            Ok(PlayPauseOutcome {
                state: self.render.state(),
                playing_track: self.playing_track_in(sequence),
                track_changed,
            })
        })
    }

    /// Play the track at `index`, interrupting whatever is playing
    pub fn play(&self, index: usize) -> Result<IndexedTrack> {
        self.with_control(|sequence| self.play_index(sequence, index))
    }

    /// Play the track at `index` unless something is already loaded and
    /// `interrupt_playback` is false, in which case nothing happens
    pub fn play_with_interrupt(
        &self,
        index: usize,
        interrupt_playback: bool,
    ) -> Result<Option<IndexedTrack>> {
        self.with_control(|sequence| {
            if interrupt_playback || self.render.state() == PlaybackState::NoTrack {
                self.play_index(sequence, index).map(Some)
            } else {
                debug!("Not interrupting playback to play index {}", index);
                Ok(None)
            }
        })
    }

    /// Skip to the next track; `None` if the sequence is exhausted
    pub fn next_track(&self) -> Result<Option<IndexedTrack>> {
        self.with_control(|sequence| {
            let index = sequence.next();
            let track = self.resolve(index);
            self.play_track(sequence, track)
        })
    }

    /// Skip to the previous track; `None` if the sequence is exhausted
    pub fn previous_track(&self) -> Result<Option<IndexedTrack>> {
        self.with_control(|sequence| {
            let index = sequence.previous();
            let track = self.resolve(index);
            self.play_track(sequence, track)
        })
    }

    pub fn pause(&self) {
        let _ = self.with_control(|_| {
            if self.render.state() == PlaybackState::Playing {
                self.render.pause();
            }
            Ok(())
        });
    }

    pub fn resume(&self) {
        let _ = self.with_control(|_| {
            if self.render.state() == PlaybackState::Paused {
                self.render.resume();
            }
            Ok(())
        });
    }

    /// End the current session and stop the render engine
    pub fn stop(&self) {
        let _ = self.with_control(|_| {
            self.stop_playback();
            Ok(())
        });
    }

    /// Seek ahead by the configured seek length
    ///
    /// Reaching the end of the track counts as completion and advances.
    pub fn seek_forward(&self) {
        let _ = self.with_control(|sequence| {
            if let Some((track, duration)) = self.seekable_track(sequence) {
                let target = (self.render.position_secs() + self.seek_length_secs).min(duration);
                self.seek_or_complete(sequence, track, target, duration);
            }
            Ok(())
        });
    }

    /// Seek back by the configured seek length, stopping at 0
    ///
    /// Never counts as completion, even for a track of unknown duration.
    pub fn seek_backward(&self) {
        let _ = self.with_control(|sequence| {
            if let Some((track, _)) = self.seekable_track(sequence) {
                let target = (self.render.position_secs() - self.seek_length_secs).max(0.0);
                self.seek_within(track, target);
            }
            Ok(())
        });
    }

    /// Seek to `percentage` (0-100) of the track duration
    pub fn seek_to_percentage(&self, percentage: f64) {
        let _ = self.with_control(|sequence| {
            if let Some((track, duration)) = self.seekable_track(sequence) {
                let target = (percentage * duration / 100.0).clamp(0.0, duration);
                self.seek_or_complete(sequence, track, target, duration);
            }
            Ok(())
        });
    }

    /// Position of the playing track; `(0, 0)` when nothing is playing
    pub fn seek_position(&self) -> SeekPosition {
        let sequence = self.lock_control();
        let Some(track) = self.playing_track_in(&**sequence) else {
            return SeekPosition::default();
        };

        let seconds = self.render.position_secs();
        let duration = track.track.duration_secs();
        let percentage = if duration > 0.0 {
            seconds * 100.0 / duration
        } else {
            0.0
        };

        SeekPosition {
            seconds,
            percentage,
        }
    }

    pub fn toggle_repeat_mode(&self) -> (RepeatMode, ShuffleMode) {
        let mut sequence = self.lock_control();
        let modes = sequence.toggle_repeat_mode();
        self.modes_changed(&mut **sequence, modes);
        modes
    }

    pub fn toggle_shuffle_mode(&self) -> (RepeatMode, ShuffleMode) {
        let mut sequence = self.lock_control();
        let modes = sequence.toggle_shuffle_mode();
        self.modes_changed(&mut **sequence, modes);
        modes
    }

    pub fn modes(&self) -> (RepeatMode, ShuffleMode) {
        self.lock_control().modes()
    }

    // ========================================
    // Queries
    // ========================================

    pub fn playback_state(&self) -> PlaybackState {
        self.render.state()
    }

    /// Track at the sequence cursor, if the render engine has one loaded
    pub fn playing_track(&self) -> Option<IndexedTrack> {
        let sequence = self.lock_control();
        self.playing_track_in(&**sequence)
    }

    /// Read-only handle to the session registry
    pub fn session_registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    pub fn preparation(&self) -> &TrackPreparationPipeline {
        &self.preparation
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CadenceEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    // ========================================
    // Render engine signals
    // ========================================

    pub fn handle_render_event(&self, event: RenderEvent) {
        match event {
            RenderEvent::PlaybackCompleted { session } => {
                self.handle_playback_completed(&session);
            }
        }
    }

    /// React to the render engine finishing `session`
    ///
    /// Returns false (and does nothing) if `session` is stale.
    pub fn handle_playback_completed(&self, session: &Session) -> bool {
        let accepted = self.with_control(|sequence| {
            // Checked under the control lock so no user operation can slip in
            // between the check and the advance
            if !self.sessions.is_current(session) {
                trace!("Discarding completion of stale session {}", session.id());
                return Ok(false);
            }

            debug!(
                "Session {} completed ({})",
                session.id(),
                session.track().path().display()
            );
            self.complete_playback(sequence);
            Ok(true)
        });

        accepted.unwrap_or(false)
    }

    // ========================================
    // Internals (all called with the control lock held)
    // ========================================

    fn lock_control(&self) -> std::sync::MutexGuard<'_, Box<dyn PlaybackSequence>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the control lock, publishing a state change if the
    /// render engine's state differs afterwards
    fn with_control<T>(
        &self,
        op: impl FnOnce(&mut dyn PlaybackSequence) -> Result<T>,
    ) -> Result<T> {
        let mut sequence = self.lock_control();
        let old_state = self.render.state();
        let result = op(&mut **sequence);
        let new_state = self.render.state();
        drop(sequence);

        if old_state != new_state {
            self.events.emit_lossy(CadenceEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
        result
    }

    fn resolve(&self, index: Option<usize>) -> Option<IndexedTrack> {
        index.and_then(|i| self.playlist.track_at(i))
    }

    fn play_index(
        &self,
        sequence: &mut dyn PlaybackSequence,
        index: usize,
    ) -> Result<IndexedTrack> {
        let track = self
            .playlist
            .track_at(index)
            .ok_or(Error::TrackNotFound(index))?;
        sequence.select(index);
        self.play_track(sequence, Some(track.clone()))?;
        Ok(track)
    }

    /// The play primitive
    ///
    /// 1. stop whatever is playing
    /// 2. nothing resolved: stay at `NoTrack`
    /// 3. start a session
    /// 4. prepare synchronously; on failure end the session and return the error
    /// 5. start the render engine
    /// 6. schedule lookahead preparation
    fn play_track(
        &self,
        sequence: &mut dyn PlaybackSequence,
        track: Option<IndexedTrack>,
    ) -> Result<Option<IndexedTrack>> {
        self.stop_playback();

        let Some(track) = track else {
            debug!("Sequence exhausted, nothing to play");
            return Ok(None);
        };

        let session = self.sessions.start(track.clone());

        if let Err(e) = self.preparation.prepare_now(&track.track) {
            warn!("Cannot play track {}: {}", track.index, e);
            self.sessions.end_current();
            return Err(Error::TrackNotPlayed(e));
        }

        info!(
            "Playing track {} ({}) in session {}",
            track.index,
            track.track.display_name(),
            session.id()
        );
        self.render.play(&session);

        self.prepare_lookahead(sequence, Some(&track));
        Ok(Some(track))
    }

    /// End the current session and stop the render engine if it has a track
    fn stop_playback(&self) {
        self.sessions.end_current();
        if self.render.state() != PlaybackState::NoTrack {
            self.render.stop();
        }
    }

    /// Natural end of the current track (or a seek past its end)
    fn complete_playback(&self, sequence: &mut dyn PlaybackSequence) {
        let old_track = self.playing_track_in(sequence).map(|t| t.info());
        self.stop_playback();

        let index = sequence.subsequent();
        let track = self.resolve(index);

        match self.play_track(sequence, track) {
            Ok(new_track) => {
                self.events.emit_lossy(CadenceEvent::TrackChanged {
                    old_track,
                    new_track: new_track.map(|t| t.info()),
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(Error::TrackNotPlayed(error)) => {
                self.events.emit_lossy(CadenceEvent::TrackNotPlayed {
                    old_track,
                    error,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                error!("Automatic advance failed: {}", e);
            }
        }
    }

    /// Playing track and its duration, only while actually playing
    fn seekable_track(&self, sequence: &dyn PlaybackSequence) -> Option<(IndexedTrack, f64)> {
        if self.render.state() != PlaybackState::Playing {
            return None;
        }
        let track = self.playing_track_in(sequence)?;
        let duration = track.track.duration_secs();
        Some((track, duration))
    }

    /// `target >= duration` is treated as completion, for forward and
    /// percentage seeks alike
    fn seek_or_complete(
        &self,
        sequence: &mut dyn PlaybackSequence,
        track: IndexedTrack,
        target: f64,
        duration: f64,
    ) {
        if target >= duration {
            debug!("Seek reached end of track {}, advancing", track.index);
            self.complete_playback(sequence);
            return;
        }
        self.seek_within(track, target);
    }

    fn seek_within(&self, track: IndexedTrack, target: f64) {
        // Pre-seek scheduling may still report completion; a fresh session
        // makes that signal stale
        let session = self.sessions.start(track);
        trace!("Seeking to {:.2}s in session {}", target, session.id());
        self.render.seek_to(&session, target);
    }

    fn playing_track_in(&self, sequence: &dyn PlaybackSequence) -> Option<IndexedTrack> {
        if self.render.state() == PlaybackState::NoTrack {
            return None;
        }
        self.resolve(sequence.cursor())
    }

    /// Schedule background preparation for the likely-next tracks
    ///
    /// Candidates: subsequent (track completes), next (skip forward), previous
    /// (skip back). Duplicates, the playing track, and tracks whose last
    /// preparation failed are skipped; playing a failed track retries it
    /// synchronously. Returns the number of tracks queued.
    fn prepare_lookahead(
        &self,
        sequence: &dyn PlaybackSequence,
        playing: Option<&IndexedTrack>,
    ) -> usize {
        let candidates = [
            sequence.peek_subsequent(),
            sequence.peek_next(),
            sequence.peek_previous(),
        ];

        let mut seen: Vec<Uuid> = Vec::with_capacity(candidates.len());
        let mut scheduled = 0;

        for track in candidates.into_iter().filter_map(|i| self.resolve(i)) {
            if playing.is_some_and(|p| p.is_same_track(&track)) {
                continue;
            }
            if seen.contains(&track.track.id()) {
                continue;
            }
            seen.push(track.track.id());

            if track.track.preparation_failed() {
                trace!("Not rescheduling failed track {}", track.index);
                continue;
            }

            if self.preparation.schedule_preparation(&track) {
                scheduled += 1;
            }
        }

        if scheduled > 0 {
            debug!("Scheduled lookahead preparation for {} tracks", scheduled);
        }
        scheduled
    }

    fn refresh_lookahead(&self, sequence: &dyn PlaybackSequence) {
        let playing = self.playing_track_in(sequence);
        self.prepare_lookahead(sequence, playing.as_ref());
    }

    fn modes_changed(&self, sequence: &mut dyn PlaybackSequence, modes: (RepeatMode, ShuffleMode)) {
        info!("Sequence modes: repeat={}, shuffle={}", modes.0, modes.1);
        self.events.emit_lossy(CadenceEvent::SequenceModesChanged {
            repeat_mode: modes.0,
            shuffle_mode: modes.1,
            timestamp: chrono::Utc::now(),
        });
        self.refresh_lookahead(sequence);
    }
}

impl PlaylistChangeListener for PlaybackController {
    fn playlist_changed(&self, change: PlaylistChange) {
        let _ = self.with_control(|sequence| {
            // The playlist has already changed, so the removed track is only
            // reachable through the session
            let loaded = self.render.state() != PlaybackState::NoTrack;
            let playing_removed = loaded
                && match change {
                    PlaylistChange::TrackRemoved(index) => sequence.cursor() == Some(index),
                    PlaylistChange::PlaylistCleared => true,
                    _ => false,
                };

            sequence.playlist_changed(change);

            if playing_removed {
                let old_track: Option<TrackInfo> =
                    self.sessions.current().map(|s| s.indexed_track().info());
                info!("Playing track removed from playlist, stopping");
                self.stop_playback();
                self.events.emit_lossy(CadenceEvent::TrackChanged {
                    old_track,
                    new_track: None,
                    timestamp: chrono::Utc::now(),
                });
            }

            match change {
                PlaylistChange::PlaylistCleared => {}
                PlaylistChange::TrackRemoved(_) if self.playlist.size() == 0 => {}
                _ => self.refresh_lookahead(sequence),
            }
            Ok(())
        });
    }
}
