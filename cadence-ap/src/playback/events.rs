//! Internal render-engine events (not published on the EventBus)
//!
//! The render engine sends these to the controller over an unbounded mpsc
//! channel. The controller converts the outcome into `CadenceEvent`s.

use crate::playback::session::Session;

/// Signals from the render engine to the controller
#[derive(Debug, Clone)]
pub enum RenderEvent {
    /// The last buffer of `session` finished playing
    ///
    /// May arrive after the session was superseded; the controller checks it
    /// against the session registry before acting.
    PlaybackCompleted { session: Session },
}
