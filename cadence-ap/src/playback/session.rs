//! Playback sessions
//!
//! A session represents one playback attempt. It begins when a track is
//! requested (play, next, previous, seek, or automatic advance) and ends when
//! a new attempt starts or playback is stopped.
//!
//! ```text
//! start(A) -> session 1 current
//! start(B) -> session 2 current, session 1 implicitly invalidated
//! end_current() -> no current session
//! ```
//!
//! Completion signals from the render engine carry the session they belong
//! to; anything not matching the current session is stale and is dropped.
//!
//! While alive a session moves through three phases:
//! 1. scheduling and playback ongoing
//! 2. scheduling completed (render engine hit end of file), playback ongoing
//! 3. scheduling and playback completed
//!
//! Both flags are monotonic.

use crate::playback::track::{IndexedTrack, Track};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug)]
struct SessionInner {
    id: Uuid,
    track: IndexedTrack,
    scheduling_completed: AtomicBool,
    playback_completed: AtomicBool,
}

/// Identity token for one playback attempt
///
/// Cheap to clone; clones share identity and flags. Equality is by identity,
/// never by track: the same track played twice yields two distinct sessions.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    fn new(track: IndexedTrack) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                track,
                scheduling_completed: AtomicBool::new(false),
                playback_completed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Track (and its playlist index at start time) this session plays
    pub fn indexed_track(&self) -> &IndexedTrack {
        &self.inner.track
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.inner.track.track
    }

    /// Called by the render engine when it has scheduled the last buffer
    pub fn mark_scheduling_completed(&self) {
        self.inner.scheduling_completed.store(true, Ordering::Release);
    }

    pub fn is_scheduling_completed(&self) -> bool {
        self.inner.scheduling_completed.load(Ordering::Acquire)
    }

    /// Called by the render engine when the last buffer finished playing.
    /// Implies scheduling completed.
    pub fn mark_playback_completed(&self) {
        self.inner.scheduling_completed.store(true, Ordering::Release);
        self.inner.playback_completed.store(true, Ordering::Release);
    }

    pub fn is_playback_completed(&self) -> bool {
        self.inner.playback_completed.load(Ordering::Acquire)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Session {}

/// Holder of the single current session
///
/// Owned by the `PlaybackController`, which is the only writer. Other
/// components receive an `Arc` handle and may only query it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: RwLock<Option<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session for `track`, replacing (and thereby invalidating)
    /// any current one
    pub(crate) fn start(&self, track: IndexedTrack) -> Session {
        let session = Session::new(track);
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session.clone());

        trace!(
            "Session {} started (superseded: {:?})",
            session.id(),
            previous.map(|s| s.id())
        );
        session
    }

    /// Clear the current session. Idempotent.
    pub(crate) fn end_current(&self) {
        if let Some(ended) = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            trace!("Session {} ended", ended.id());
        }
    }

    /// True iff `session` is the one currently held
    pub fn is_current(&self, session: &Session) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|current| current == session)
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
