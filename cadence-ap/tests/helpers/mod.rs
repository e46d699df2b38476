//! Test helper modules for cadence-ap integration tests
//!
//! - MockRenderer: scriptable render engine that records every call
//! - CountingPreparer: in-memory preparer that counts invocations per path
//! - TestPlayer: controller wired to both, plus an event receiver

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_renderer;

pub use fixtures::{build_player, build_player_with_sequence, CountingPreparer, TestPlayer};
pub use mock_renderer::{MockRenderer, RenderCall};
