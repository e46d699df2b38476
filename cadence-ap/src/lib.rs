//! # Cadence Audio Player Library (cadence-ap)
//!
//! Playback control core: decides what is "now playing", sequences track
//! transitions, discards stale render-engine signals through playback
//! sessions, and prepares likely-next tracks on a single background worker.
//!
//! **Architecture:** The controller is written against collaborator traits
//! (`RenderEngine`, `PlaylistAccessor`, `PlaybackSequence`, `TrackPreparer`);
//! reference implementations of each live alongside it.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
pub use playback::PlaybackController;
