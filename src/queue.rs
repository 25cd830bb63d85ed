//! Per-session waiting list.
//!
//! The entry that is currently playing lives in the session, not here:
//!
//! ```text
//! Now playing: A          (session state)
//! ─────────────────────
//! Waiting:
//!   1. B
//!   2. C
//! ```
//!
//! Positions exposed to users are 1-based.

use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::repeat::RepeatMode;
use crate::track::{RequesterId, TrackEntry};

#[derive(Debug, Clone, Default)]
pub struct Queue {
    entries: VecDeque<TrackEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Returns the 1-based position.
    pub fn enqueue(&mut self, entry: TrackEntry) -> usize {
        if let Some(pos) = self.position_of(&entry) {
            return pos;
        }
        self.entries.push_back(entry);
        self.entries.len()
    }

    /// Insert right after the current play position, which is always the
    /// head of the waiting list.
    pub fn enqueue_next(&mut self, entry: TrackEntry) -> usize {
        if let Some(pos) = self.position_of(&entry) {
            self.entries.remove(pos - 1);
        }
        self.entries.push_front(entry);
        1
    }

    pub fn remove_at(&mut self, index: usize) -> Result<TrackEntry> {
        let slot = self.slot(index)?;
        self.entries
            .remove(slot)
            .ok_or(SessionError::OutOfRange { index, len: self.entries.len() })
    }

    /// Remove every entry requested by `requester`. Returns how many went.
    pub fn remove_all_by(&mut self, requester: RequesterId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.requester() != requester);
        before - self.entries.len()
    }

    /// Relocate the entry at `from` so it ends up at `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<TrackEntry> {
        let from_slot = self.slot(from)?;
        let to_slot = self.slot(to)?;
        let entry = self
            .entries
            .remove(from_slot)
            .ok_or(SessionError::OutOfRange { index: from, len: self.entries.len() })?;
        self.entries.insert(to_slot, entry);
        self.entries
            .get(to_slot)
            .cloned()
            .ok_or(SessionError::OutOfRange { index: to, len: self.entries.len() })
    }

    /// Randomly permute the waiting entries. Returns how many were shuffled.
    pub fn shuffle(&mut self) -> usize {
        let mut rng = thread_rng();
        self.entries.make_contiguous().shuffle(&mut rng);
        self.entries.len()
    }

    /// Consume the next entry to play.
    ///
    /// `just_finished` is the entry that was playing, if any. Under `Track`
    /// it is handed straight back; under `Queue` it goes to the tail (unless
    /// it is already waiting) before the head is taken; under `Off` it is
    /// dropped.
    pub(crate) fn take_next(
        &mut self,
        mode: RepeatMode,
        just_finished: Option<TrackEntry>,
    ) -> Option<TrackEntry> {
        match (mode, just_finished) {
            (RepeatMode::Track, Some(entry)) => Some(entry),
            (RepeatMode::Queue, Some(entry)) => {
                if self.position_of(&entry).is_none() {
                    self.entries.push_back(entry);
                }
                self.entries.pop_front()
            }
            _ => self.entries.pop_front(),
        }
    }

    /// Ordered copy for display.
    pub fn snapshot(&self) -> Vec<TrackEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of known durations; live entries count as zero.
    pub fn total_duration(&self) -> Duration {
        self.entries.iter().filter_map(TrackEntry::duration).sum()
    }

    fn position_of(&self, entry: &TrackEntry) -> Option<usize> {
        self.entries.iter().position(|e| e == entry).map(|i| i + 1)
    }

    fn slot(&self, index: usize) -> Result<usize> {
        if index == 0 || index > self.entries.len() {
            return Err(SessionError::OutOfRange { index, len: self.entries.len() });
        }
        Ok(index - 1)
    }
}
