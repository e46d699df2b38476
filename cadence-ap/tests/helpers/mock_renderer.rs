//! Render engine double
//!
//! Applies state transitions immediately and never completes on its own;
//! tests decide when (and for which session) completion is reported.

use cadence_ap::playback::{RenderEngine, RenderEvent, RenderEventSender, Session};
use cadence_common::events::PlaybackState;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Play { session: Uuid, path: PathBuf },
    Pause,
    Resume,
    Stop,
    SeekTo { session: Uuid, position_secs: f64 },
}

#[derive(Debug, Default)]
struct MockState {
    state: PlaybackState,
    position_secs: f64,
    session: Option<Session>,
    calls: Vec<RenderCall>,
    sender: Option<RenderEventSender>,
}

#[derive(Debug, Default)]
pub struct MockRenderer {
    inner: Mutex<MockState>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_position(&self, position_secs: f64) {
        self.lock().position_secs = position_secs;
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.lock().calls.clone()
    }

    pub fn play_calls(&self) -> Vec<PathBuf> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Play { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_seek(&self) -> Option<(Uuid, f64)> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            RenderCall::SeekTo {
                session,
                position_secs,
            } => Some((*session, *position_secs)),
            _ => None,
        })
    }

    /// Session of the most recent play or seek
    pub fn loaded_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Report completion of `session` over the connected channel
    pub fn send_completion(&self, session: &Session) -> bool {
        let sender = self.lock().sender.clone();
        sender.is_some_and(|s| {
            s.send(RenderEvent::PlaybackCompleted {
                session: session.clone(),
            })
            .is_ok()
        })
    }

    /// Report completion of whatever is loaded
    pub fn finish_loaded(&self) -> bool {
        match self.loaded_session() {
            Some(session) => self.send_completion(&session),
            None => false,
        }
    }
}

impl RenderEngine for MockRenderer {
    fn connect(&self, events: RenderEventSender) {
        self.lock().sender = Some(events);
    }

    fn play(&self, session: &Session) {
        let mut inner = self.lock();
        inner.calls.push(RenderCall::Play {
            session: session.id(),
            path: session.track().path().to_path_buf(),
        });
        inner.session = Some(session.clone());
        inner.state = PlaybackState::Playing;
        inner.position_secs = 0.0;
    }

    fn pause(&self) {
        let mut inner = self.lock();
        inner.calls.push(RenderCall::Pause);
        if inner.state == PlaybackState::Playing {
            inner.state = PlaybackState::Paused;
        }
    }

    fn resume(&self) {
        let mut inner = self.lock();
        inner.calls.push(RenderCall::Resume);
        if inner.state == PlaybackState::Paused {
            inner.state = PlaybackState::Playing;
        }
    }

    fn stop(&self) {
        let mut inner = self.lock();
        inner.calls.push(RenderCall::Stop);
        inner.state = PlaybackState::NoTrack;
        inner.session = None;
        inner.position_secs = 0.0;
    }

    fn seek_to(&self, session: &Session, position_secs: f64) {
        let mut inner = self.lock();
        inner.calls.push(RenderCall::SeekTo {
            session: session.id(),
            position_secs,
        });
        inner.session = Some(session.clone());
        inner.position_secs = position_secs;
    }

    fn position_secs(&self) -> f64 {
        self.lock().position_secs
    }

    fn state(&self) -> PlaybackState {
        self.lock().state
    }
}
