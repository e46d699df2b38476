//! Track Preparation Pipeline
//!
//! Eagerly readies tracks that are likely to play next (open file, read
//! metadata, check the codec is supported) so that starting them later is
//! fast.
//!
//! A single worker thread drains the queue in submission order. Serial
//! execution means two preparations never contend for the same file; a
//! thread pool must not be substituted here.
//!
//! Preparation is idempotent. The foreground `prepare_now` and the worker may
//! both prepare the same track; the result is the same either way.

use crate::playback::track::{IndexedTrack, Track, TrackMetadata};
use cadence_common::events::{CadenceEvent, EventBus, TrackError};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Reads whatever is needed to know a track is playable
///
/// Implementations must be idempotent and must not decode the full file.
pub trait TrackPreparer: Send + Sync {
    fn prepare(&self, path: &Path) -> Result<TrackMetadata, TrackError>;
}

/// Run `preparer` for `track` and record the outcome on the track
///
/// No-op if the track is already prepared. On failure the error is stored on
/// the track and also returned.
pub fn prepare_track(preparer: &dyn TrackPreparer, track: &Track) -> Result<(), TrackError> {
    if track.is_prepared_for_playback() {
        return Ok(());
    }

    match preparer.prepare(track.path()) {
        Ok(metadata) => {
            trace!(
                "Prepared {} ({:.2}s)",
                track.path().display(),
                metadata.duration_secs
            );
            track.mark_prepared(metadata);
            Ok(())
        }
        Err(e) => {
            debug!("Preparation failed for {}: {}", track.path().display(), e);
            track.mark_failed(e.clone());
            Err(e)
        }
    }
}

enum PreparationTask {
    Prepare(IndexedTrack),
    /// Acknowledged once every earlier task has run
    Barrier(mpsc::Sender<()>),
}

/// Single-worker background preparation queue
pub struct TrackPreparationPipeline {
    preparer: Arc<dyn TrackPreparer>,

    /// None after shutdown
    sender: Mutex<Option<mpsc::Sender<PreparationTask>>>,

    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TrackPreparationPipeline {
    /// Create the pipeline and spawn its worker thread
    ///
    /// When `events` is given, a `TrackInfoUpdated` event is published after
    /// each successful background preparation.
    pub fn new(
        preparer: Arc<dyn TrackPreparer>,
        events: Option<EventBus>,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker_preparer = Arc::clone(&preparer);

        let handle = thread::Builder::new()
            .name("track-prep".to_string())
            .spawn(move || Self::worker_loop(receiver, worker_preparer, events))?;

        info!("Track preparation pipeline started with 1 worker thread");

        Ok(Self {
            preparer,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue `track` for background preparation
    ///
    /// Returns false without queueing if the track is already prepared or the
    /// pipeline has been shut down. Fire-and-forget: failures are recorded on
    /// the track and surface when it is actually played.
    pub fn schedule_preparation(&self, track: &IndexedTrack) -> bool {
        if track.track.is_prepared_for_playback() {
            return false;
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            warn!(
                "Preparation pipeline shut down, not scheduling {}",
                track.track.path().display()
            );
            return false;
        };

        trace!(
            "Scheduling preparation of {} (index {})",
            track.track.path().display(),
            track.index
        );
        sender.send(PreparationTask::Prepare(track.clone())).is_ok()
    }

    /// Prepare `track` on the calling thread unless already prepared
    ///
    /// This is the blocking step on the path to starting playback.
    pub fn prepare_now(&self, track: &Track) -> Result<(), TrackError> {
        prepare_track(self.preparer.as_ref(), track)
    }

    /// Block until every task scheduled before this call has run
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        let sent = {
            let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            sender
                .as_ref()
                .is_some_and(|s| s.send(PreparationTask::Barrier(ack_tx)).is_ok())
        };
        if sent {
            let _ = ack_rx.recv();
        }
    }

    /// Stop accepting work, let queued tasks finish, and join the worker
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        // Closing the channel ends the worker loop once the queue drains
        drop(sender);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Track preparation worker panicked");
            }
        }
        info!("Track preparation pipeline stopped");
    }

    fn worker_loop(
        receiver: mpsc::Receiver<PreparationTask>,
        preparer: Arc<dyn TrackPreparer>,
        events: Option<EventBus>,
    ) {
        debug!("Track preparation worker started");

        while let Ok(task) = receiver.recv() {
            match task {
                PreparationTask::Prepare(indexed) => {
                    // Already handled by the foreground or an earlier duplicate task
                    if indexed.track.is_prepared_for_playback() {
                        continue;
                    }

                    if prepare_track(preparer.as_ref(), &indexed.track).is_ok() {
                        if let Some(events) = &events {
                            events.emit_lossy(CadenceEvent::TrackInfoUpdated {
                                track_index: indexed.index,
                                track_id: indexed.track.id(),
                                timestamp: chrono::Utc::now(),
                            });
                        }
                    }
                }
                PreparationTask::Barrier(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!("Track preparation worker exiting");
    }
}

impl Drop for TrackPreparationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
