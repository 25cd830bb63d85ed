//! Skip votes for the currently playing entry.

use std::collections::HashSet;

use crate::player::Generation;
use crate::track::RequesterId;

/// Votes cast against one play request. A new generation starts a fresh
/// ballot.
#[derive(Debug, Default)]
pub struct SkipVotes {
    generation: Generation,
    voters: HashSet<RequesterId>,
}

impl SkipVotes {
    /// Record a vote. Returns the tally for `generation`.
    pub fn cast(&mut self, generation: Generation, voter: RequesterId) -> usize {
        if generation != self.generation {
            self.generation = generation;
            self.voters.clear();
        }
        self.voters.insert(voter);
        self.voters.len()
    }

    pub fn reset(&mut self) {
        self.voters.clear();
    }
}

/// Votes needed among `listeners` non-bot members. Never below one.
pub fn quorum(listeners: usize, ratio: f64) -> usize {
    ((listeners as f64 * ratio).ceil() as usize).max(1)
}
