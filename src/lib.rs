//! musicq - per-session playback queue and scheduler for a voice chat bot.
//!
//! Each voice session owns one [`Session`]: an ordered queue of requested
//! tracks, a repeat mode, and a single [`Player`] it drives through that
//! queue. User commands and asynchronous player events meet in the session,
//! which serializes every change to its state.
//!
//! The crate stays out of media resolution, audio transport and command
//! parsing. Those plug in through the [`Resolver`], [`Player`] and
//! [`DisplaySink`] traits.
//!
//! ```rust,no_run
//! use musicq::{SessionId, SessionRegistry};
//!
//! # async fn demo(registry: SessionRegistry) -> musicq::Result<()> {
//! let session = registry.get(SessionId(42))?;
//! let snapshot = session.snapshot().await?;
//! println!("{} waiting", snapshot.entries.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod display;
mod error;
pub mod idle;
pub mod player;
pub mod presenter;
pub mod queue;
pub mod registry;
pub mod repeat;
pub mod resolver;
pub mod session;
pub mod track;
pub mod vote;

pub use display::{DisplayHandle, DisplaySink, NowPlayingCard};
pub use error::{ConfigError, DisplayError, PlayerError, ResolveError, Result, SessionError};
pub use player::{EventReporter, Generation, Player, PlayerEvent, SessionSignal};
pub use queue::Queue;
pub use registry::{ConnectionState, JoinTicket, Joined, SessionRegistry};
pub use repeat::{EndReason, RepeatMode};
pub use resolver::Resolver;
pub use session::{
    Activity, BatchOutcome, DurationPolicy, NowPlaying, Placement, PlayOutcome, QueueSnapshot,
    Session, SessionId, SessionNotice, SessionSettings, SkipOutcome, SkipRequest, TeardownReason,
};
pub use track::{EntryId, RequesterId, ResolvedTrack, TrackEntry, format_duration};
