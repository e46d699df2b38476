//! Wall-clock render engine
//!
//! Stands in for an audio output device: "plays" a track by letting its
//! prepared duration elapse on a tokio timer and then reporting completion for
//! the session that started it. Used by the binary and for end-to-end tests of
//! the controller's session handling.
//!
//! Every play/pause/seek/stop bumps a generation counter; a pending timer only
//! fires if the generation it was armed with is still current.

use crate::playback::events::RenderEvent;
use crate::playback::renderer::{RenderEngine, RenderEventSender};
use crate::playback::session::Session;
use cadence_common::events::PlaybackState;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct ClockState {
    state: PlaybackState,
    session: Option<Session>,
    duration_secs: f64,

    /// Position when the clock last (re)started or paused
    base_position: f64,
    started_at: Option<Instant>,

    generation: u64,
    events: Option<RenderEventSender>,
}

impl ClockState {
    fn position(&self) -> f64 {
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.base_position + elapsed).min(self.duration_secs)
    }
}

/// `RenderEngine` driven by tokio timers instead of an audio device
pub struct ClockRenderer {
    runtime: Handle,
    inner: Arc<Mutex<ClockState>>,
}

impl ClockRenderer {
    /// Create a renderer whose timers run on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            inner: Arc::new(Mutex::new(ClockState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a completion timer for the remaining time of the loaded track
    fn arm_timer(&self, clock: &mut ClockState) {
        clock.generation += 1;
        let generation = clock.generation;

        let Some(session) = clock.session.clone() else {
            return;
        };
        let remaining = (clock.duration_secs - clock.base_position).max(0.0);
        let inner = Arc::clone(&self.inner);

        trace!(
            "Completion timer armed for session {} in {:.3}s",
            session.id(),
            remaining
        );

        self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;

            let sender = {
                let mut clock = inner.lock().unwrap_or_else(PoisonError::into_inner);
                if clock.generation != generation || clock.state != PlaybackState::Playing {
                    return;
                }
                clock.base_position = clock.duration_secs;
                clock.started_at = None;
                clock.events.clone()
            };

            session.mark_playback_completed();
            debug!("Session {} finished playing", session.id());

            match sender {
                Some(sender) => {
                    if sender.send(RenderEvent::PlaybackCompleted { session }).is_err() {
                        warn!("Completion listener gone, dropping completion signal");
                    }
                }
                None => warn!("Render engine not connected, dropping completion signal"),
            }
        });
    }
}

impl RenderEngine for ClockRenderer {
    fn connect(&self, events: RenderEventSender) {
        self.lock().events = Some(events);
    }

    fn play(&self, session: &Session) {
        let mut clock = self.lock();
        clock.session = Some(session.clone());
        clock.duration_secs = session.track().duration_secs();
        clock.base_position = 0.0;
        clock.started_at = Some(Instant::now());
        clock.state = PlaybackState::Playing;
        self.arm_timer(&mut clock);
    }

    fn pause(&self) {
        let mut clock = self.lock();
        if clock.state != PlaybackState::Playing {
            return;
        }
        clock.base_position = clock.position();
        clock.started_at = None;
        clock.state = PlaybackState::Paused;
        clock.generation += 1;
    }

    fn resume(&self) {
        let mut clock = self.lock();
        if clock.state != PlaybackState::Paused {
            return;
        }
        clock.started_at = Some(Instant::now());
        clock.state = PlaybackState::Playing;
        self.arm_timer(&mut clock);
    }

    fn stop(&self) {
        let mut clock = self.lock();
        clock.generation += 1;
        clock.state = PlaybackState::NoTrack;
        clock.session = None;
        clock.duration_secs = 0.0;
        clock.base_position = 0.0;
        clock.started_at = None;
    }

    fn seek_to(&self, session: &Session, position_secs: f64) {
        let mut clock = self.lock();
        if clock.state == PlaybackState::NoTrack {
            return;
        }
        clock.session = Some(session.clone());
        clock.base_position = position_secs.clamp(0.0, clock.duration_secs);

        if clock.state == PlaybackState::Playing {
            clock.started_at = Some(Instant::now());
            self.arm_timer(&mut clock);
        } else {
            clock.generation += 1;
        }
    }

    fn position_secs(&self) -> f64 {
        self.lock().position()
    }

    fn state(&self) -> PlaybackState {
        self.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::session::SessionRegistry;
    use crate::playback::track::{IndexedTrack, Track, TrackMetadata};
    use tokio::sync::mpsc;

    fn track_lasting(secs: f64) -> IndexedTrack {
        let metadata = TrackMetadata {
            duration_secs: secs,
            ..Default::default()
        };
        IndexedTrack::new(0, Arc::new(Track::with_metadata("/music/a.flac", metadata)))
    }

    fn connected() -> (ClockRenderer, mpsc::UnboundedReceiver<RenderEvent>) {
        let renderer = ClockRenderer::new(Handle::current());
        let (tx, rx) = mpsc::unbounded_channel();
        renderer.connect(tx);
        (renderer, rx)
    }

    #[tokio::test]
    async fn test_completion_reported_for_playing_session() {
        let (renderer, mut rx) = connected();
        let registry = SessionRegistry::new();
        let session = registry.start(track_lasting(0.05));

        renderer.play(&session);
        assert_eq!(renderer.state(), PlaybackState::Playing);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("completion should arrive")
            .expect("channel open");
        let RenderEvent::PlaybackCompleted { session: completed } = event;
        assert_eq!(completed, session);
        assert!(session.is_playback_completed());
    }

    #[tokio::test]
    async fn test_pause_cancels_completion() {
        let (renderer, mut rx) = connected();
        let registry = SessionRegistry::new();
        let session = registry.start(track_lasting(0.05));

        renderer.play(&session);
        renderer.pause();
        assert_eq!(renderer.state(), PlaybackState::Paused);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());

        let paused_at = renderer.position_secs();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(renderer.position_secs(), paused_at);
    }

    #[tokio::test]
    async fn test_seek_rearms_with_new_session() {
        let (renderer, mut rx) = connected();
        let registry = SessionRegistry::new();
        let first = registry.start(track_lasting(10.0));
        renderer.play(&first);

        let second = registry.start(first.indexed_track().clone());
        renderer.seek_to(&second, 9.95);
        assert!(renderer.position_secs() >= 9.95);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("completion should arrive")
            .expect("channel open");
        let RenderEvent::PlaybackCompleted { session } = event;
        assert_eq!(session, second);
        assert!(!first.is_playback_completed());
    }

    #[tokio::test]
    async fn test_stop_unloads_track() {
        let (renderer, mut rx) = connected();
        let registry = SessionRegistry::new();
        renderer.play(&registry.start(track_lasting(0.05)));

        renderer.stop();
        assert_eq!(renderer.state(), PlaybackState::NoTrack);
        assert_eq!(renderer.position_secs(), 0.0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }
}
