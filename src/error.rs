//! Error types for the playback core.
//!
//! Structural errors are returned to the calling command; playback and
//! display failures stay internal and are only logged or broadcast.

use std::time::Duration;
use thiserror::Error;

use crate::track::format_duration;

/// Errors returned synchronously by session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Track is longer than the configured cap
    #[error("This track ({}) is longer than the allowed maximum of {}", clock(.duration), clock(.max))]
    TrackTooLong { duration: Duration, max: Duration },

    /// No active voice session for this server
    #[error("Not connected to a voice channel")]
    NotConnected,

    /// A join for this server is already in flight
    #[error("Already connecting to a voice channel")]
    AlreadyConnecting,

    /// Queue position outside `[1, len]`
    #[error("Position {index} is not valid, the queue has {len} entries")]
    OutOfRange { index: usize, len: usize },

    /// Skip, pause or resume with nothing playing
    #[error("Nothing is playing")]
    NothingPlaying,

    /// The session was stopped while the request was being resolved
    #[error("Playback was stopped before the request finished loading")]
    Cancelled,

    #[error("Volume must be between 0 and 150, got {0}")]
    VolumeOutOfRange(u16),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors reported by a [`Resolver`](crate::Resolver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No results found")]
    NotFound,

    #[error("That source can't be played: {0}")]
    Unplayable(String),

    #[error("The source is rate limiting requests, try again later")]
    RateLimited,
}

/// A synchronous failure from a [`Player`](crate::Player) call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("player error: {0}")]
pub struct PlayerError(pub String);

/// A failure from the now-playing display sink. Never leaves the presenter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("display error: {0}")]
pub struct DisplayError(pub String);

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] json5::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn clock(duration: &Duration) -> String {
    format_duration(*duration)
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
