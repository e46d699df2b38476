//! # Cadence Common Library
//!
//! Shared code for the Cadence player crates including:
//! - Event types (CadenceEvent enum) and the EventBus
//! - Playback state and sequence mode enums
//! - Track preparation error taxonomy
//! - Configuration file resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
