//! Render engine collaborator interface
//!
//! The render engine schedules and outputs audio; this crate only tells it
//! what to do and listens for completion. Playback state is always read back
//! from the engine so the controller and the engine cannot drift apart.

use crate::playback::events::RenderEvent;
use crate::playback::session::Session;
use cadence_common::events::PlaybackState;
use tokio::sync::mpsc;

/// Channel on which the render engine reports completion
pub type RenderEventSender = mpsc::UnboundedSender<RenderEvent>;

/// Operations the controller needs from an audio output engine
pub trait RenderEngine: Send + Sync {
    /// Hand the engine the channel for `RenderEvent`s. Called once by the
    /// controller at construction.
    fn connect(&self, events: RenderEventSender);

    /// Begin playing the session's track from the start
    fn play(&self, session: &Session);

    fn pause(&self);

    fn resume(&self);

    /// Stop and unload the current track
    fn stop(&self);

    /// Restart scheduling of the session's track at `position_secs`
    fn seek_to(&self, session: &Session, position_secs: f64);

    /// Playback position of the loaded track in seconds
    fn position_secs(&self) -> f64;

    fn state(&self) -> PlaybackState;
}
