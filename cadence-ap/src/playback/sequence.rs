//! Playback sequence: which playlist index plays next
//!
//! The controller consumes the `PlaybackSequence` trait only. `PlaybackSequencer`
//! is the reference implementation with repeat and shuffle support.
//!
//! Three kinds of movement:
//! - `subsequent`: automatic advance when a track finishes (honours repeat one)
//! - `next` / `previous`: user-initiated skips (repeat one acts like off)
//! - `peek_*`: same answers without moving the cursor
//!
//! Running off either end with repeat off clears the cursor.

use crate::playback::playlist::PlaylistChange;
use cadence_common::events::{RepeatMode, ShuffleMode};
use rand::seq::SliceRandom;
use tracing::debug;

/// Cursor and ordering policy over playlist indices
pub trait PlaybackSequence: Send {
    fn subsequent(&mut self) -> Option<usize>;
    fn next(&mut self) -> Option<usize>;
    fn previous(&mut self) -> Option<usize>;

    fn peek_subsequent(&self) -> Option<usize>;
    fn peek_next(&self) -> Option<usize>;
    fn peek_previous(&self) -> Option<usize>;

    /// Position the cursor on `index` (user picked a specific track)
    fn select(&mut self, index: usize);
    fn cursor(&self) -> Option<usize>;

    fn toggle_repeat_mode(&mut self) -> (RepeatMode, ShuffleMode);
    fn toggle_shuffle_mode(&mut self) -> (RepeatMode, ShuffleMode);
    fn modes(&self) -> (RepeatMode, ShuffleMode);

    /// Keep the cursor pointing at the same track across playlist edits
    fn playlist_changed(&mut self, change: PlaylistChange);
}

/// Repeat/shuffle-aware sequence over `size` playlist entries
#[derive(Debug, Clone)]
pub struct PlaybackSequencer {
    size: usize,
    cursor: Option<usize>,
    repeat: RepeatMode,
    shuffle: ShuffleMode,
    /// Play order while shuffling; empty when shuffle is off
    order: Vec<usize>,
}

impl PlaybackSequencer {
    pub fn new(size: usize) -> Self {
        Self::with_modes(size, RepeatMode::Off, ShuffleMode::Off)
    }

    pub fn with_modes(size: usize, repeat: RepeatMode, shuffle: ShuffleMode) -> Self {
        let mut sequencer = Self {
            size,
            cursor: None,
            repeat,
            shuffle: ShuffleMode::Off,
            order: Vec::new(),
        };
        if shuffle == ShuffleMode::On {
            sequencer.enable_shuffle();
        }
        sequencer
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Shuffle order, empty when shuffle is off
    pub fn shuffle_order(&self) -> &[usize] {
        &self.order
    }

    fn enable_shuffle(&mut self) {
        self.shuffle = ShuffleMode::On;
        if self.repeat == RepeatMode::One {
            self.repeat = RepeatMode::Off;
        }
        self.reshuffle();
    }

    fn disable_shuffle(&mut self) {
        self.shuffle = ShuffleMode::Off;
        self.order.clear();
    }

    /// New random order, starting with the cursor track if there is one
    fn reshuffle(&mut self) {
        let first = self.cursor.filter(|c| *c < self.size);
        let mut rest: Vec<usize> = (0..self.size).filter(|i| Some(*i) != first).collect();
        rest.shuffle(&mut rand::thread_rng());
        self.order = first.into_iter().chain(rest).collect();
    }

    fn order_position(&self, index: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == index)
    }

    fn first(&self) -> Option<usize> {
        match self.shuffle {
            ShuffleMode::On => self.order.first().copied(),
            ShuffleMode::Off => Some(0),
        }
    }

    fn last(&self) -> Option<usize> {
        match self.shuffle {
            ShuffleMode::On => self.order.last().copied(),
            ShuffleMode::Off => Some(self.size - 1),
        }
    }

    fn forward(&self, from: Option<usize>) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        let Some(current) = from else {
            return self.first();
        };

        let candidate = match self.shuffle {
            ShuffleMode::Off => Some(current + 1).filter(|i| *i < self.size),
            ShuffleMode::On => match self.order_position(current) {
                Some(pos) => self.order.get(pos + 1).copied(),
                None => return self.first(),
            },
        };

        candidate.or_else(|| {
            if self.repeat == RepeatMode::All {
                self.first()
            } else {
                None
            }
        })
    }

    fn backward(&self, from: Option<usize>) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        let current = from?;

        let candidate = match self.shuffle {
            ShuffleMode::Off => current.checked_sub(1),
            ShuffleMode::On => self
                .order_position(current)
                .and_then(|pos| pos.checked_sub(1))
                .and_then(|pos| self.order.get(pos).copied()),
        };

        candidate.or_else(|| {
            if self.repeat == RepeatMode::All {
                self.last()
            } else {
                None
            }
        })
    }

    fn subsequent_target(&self) -> Option<usize> {
        match (self.repeat, self.cursor) {
            (RepeatMode::One, Some(current)) if current < self.size => Some(current),
            _ => self.forward(self.cursor),
        }
    }

    fn move_to(&mut self, target: Option<usize>) -> Option<usize> {
        self.cursor = target;
        target
    }
}

impl PlaybackSequence for PlaybackSequencer {
    fn subsequent(&mut self) -> Option<usize> {
        let target = self.subsequent_target();
        self.move_to(target)
    }

    fn next(&mut self) -> Option<usize> {
        let target = self.forward(self.cursor);
        self.move_to(target)
    }

    fn previous(&mut self) -> Option<usize> {
        let target = self.backward(self.cursor);
        self.move_to(target)
    }

    fn peek_subsequent(&self) -> Option<usize> {
        self.subsequent_target()
    }

    fn peek_next(&self) -> Option<usize> {
        self.forward(self.cursor)
    }

    fn peek_previous(&self) -> Option<usize> {
        self.backward(self.cursor)
    }

    fn select(&mut self, index: usize) {
        if index >= self.size {
            debug!("Ignoring select of index {} (size {})", index, self.size);
            return;
        }
        self.cursor = Some(index);
        if self.shuffle == ShuffleMode::On {
            self.reshuffle();
        }
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn toggle_repeat_mode(&mut self) -> (RepeatMode, ShuffleMode) {
        self.repeat = self.repeat.toggled();
        // Repeating one track and shuffling are mutually exclusive
        if self.repeat == RepeatMode::One && self.shuffle == ShuffleMode::On {
            self.disable_shuffle();
        }
        self.modes()
    }

    fn toggle_shuffle_mode(&mut self) -> (RepeatMode, ShuffleMode) {
        match self.shuffle {
            ShuffleMode::Off => self.enable_shuffle(),
            ShuffleMode::On => self.disable_shuffle(),
        }
        self.modes()
    }

    fn modes(&self) -> (RepeatMode, ShuffleMode) {
        (self.repeat, self.shuffle)
    }

    fn playlist_changed(&mut self, change: PlaylistChange) {
        match change {
            PlaylistChange::TrackAdded(index) => {
                self.size += 1;
                let shift = |i: usize| if i >= index { i + 1 } else { i };
                self.cursor = self.cursor.map(shift);
                if self.shuffle == ShuffleMode::On {
                    for entry in self.order.iter_mut() {
                        *entry = shift(*entry);
                    }
                    self.order.push(index);
                }
            }
            PlaylistChange::TrackRemoved(index) => {
                if index >= self.size {
                    return;
                }
                self.size -= 1;
                self.cursor = match self.cursor {
                    Some(c) if c == index => None,
                    Some(c) if c > index => Some(c - 1),
                    other => other,
                };
                if self.shuffle == ShuffleMode::On {
                    self.order.retain(|&i| i != index);
                    for entry in self.order.iter_mut() {
                        if *entry > index {
                            *entry -= 1;
                        }
                    }
                }
            }
            PlaylistChange::TrackReordered { old, new } => {
                let remap = |i: usize| {
                    if i == old {
                        new
                    } else if old < new && i > old && i <= new {
                        i - 1
                    } else if new < old && i >= new && i < old {
                        i + 1
                    } else {
                        i
                    }
                };
                self.cursor = self.cursor.map(remap);
                for entry in self.order.iter_mut() {
                    *entry = remap(*entry);
                }
            }
            PlaylistChange::PlaylistReordered { cursor } => {
                self.cursor = cursor.filter(|c| *c < self.size);
                if self.shuffle == ShuffleMode::On {
                    self.reshuffle();
                }
            }
            PlaylistChange::PlaylistCleared => {
                self.size = 0;
                self.cursor = None;
                self.order.clear();
            }
        }
    }
}
