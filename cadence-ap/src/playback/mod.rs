//! Playback control
//!
//! **Components:**
//! - `controller`: `PlaybackController`, the orchestrating state machine
//! - `session`: playback sessions and the current-session registry
//! - `preparation`: synchronous and background track preparation
//! - `sequence`: repeat/shuffle-aware track ordering
//! - `playlist`: in-memory playlist and change notifications
//! - `renderer`: render engine interface
//! - `events`: render engine to controller signals

pub mod controller;
pub mod events;
pub mod playlist;
pub mod preparation;
pub mod renderer;
pub mod sequence;
pub mod session;
pub mod track;

pub use controller::{PlayPauseOutcome, PlaybackController, SeekPosition};
pub use events::RenderEvent;
pub use playlist::{Playlist, PlaylistAccessor, PlaylistChange, PlaylistChangeListener};
pub use preparation::{TrackPreparationPipeline, TrackPreparer};
pub use renderer::{RenderEngine, RenderEventSender};
pub use sequence::{PlaybackSequence, PlaybackSequencer};
pub use session::{Session, SessionRegistry};
pub use track::{IndexedTrack, Track, TrackMetadata};
