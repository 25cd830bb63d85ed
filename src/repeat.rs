//! Repeat mode state machine.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Governs what the queue hands out when the current entry ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Queue drains forward
    #[default]
    Off,

    /// Current entry plays again on every advance
    Track,

    /// Finished entries go back to the tail
    Queue,
}

/// Why the current entry stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Reached the end on its own
    Finished,

    /// Skipped by a user
    Skipped,

    /// Forced stop; never advances
    Stopped,

    /// Player could not load or play it
    Failed,
}

impl RepeatMode {
    /// Mode the queue should apply for an advance caused by `reason`.
    ///
    /// Skipping under `Track` moves past the entry, and failed entries are
    /// never replayed or requeued.
    pub fn effective(self, reason: EndReason) -> RepeatMode {
        match (self, reason) {
            (_, EndReason::Failed | EndReason::Stopped) => RepeatMode::Off,
            (RepeatMode::Track, EndReason::Skipped) => RepeatMode::Off,
            (mode, EndReason::Finished | EndReason::Skipped) => mode,
        }
    }

    /// Whether the reason continues on to another entry at all.
    pub fn advances(reason: EndReason) -> bool {
        !matches!(reason, EndReason::Stopped)
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "false" => Ok(RepeatMode::Off),
            "track" | "one" | "single" | "song" => Ok(RepeatMode::Track),
            "queue" | "all" | "on" | "true" => Ok(RepeatMode::Queue),
            other => Err(format!("unknown repeat mode '{other}' (expected off, track or queue)")),
        }
    }
}
