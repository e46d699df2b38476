//! Reference collaborators for the playback controller
//!
//! - `probe`: `SymphoniaPreparer`, metadata-only track preparation
//! - `clock_renderer`: `ClockRenderer`, a timer-driven render engine

pub mod clock_renderer;
pub mod probe;

pub use clock_renderer::ClockRenderer;
pub use probe::SymphoniaPreparer;
