//! Contract for the audio player a session drives, and the events it reports.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::PlayerError;
use crate::repeat::EndReason;
use crate::track::TrackEntry;

/// Tag of one play request. Events carrying an older generation are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn bump(&mut self) -> Generation {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Started,
    Ended(EndReason),
    Failed(String),
}

/// Everything that flows into a session's serialized event pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Player {
        generation: Generation,
        event: PlayerEvent,
    },
    IdleExpired {
        arm: u64,
    },
}

/// Handed to the player with every play request; tags what the player
/// reports with the request's generation.
#[derive(Debug, Clone)]
pub struct EventReporter {
    generation: Generation,
    tx: UnboundedSender<SessionSignal>,
}

impl EventReporter {
    pub(crate) fn new(generation: Generation, tx: UnboundedSender<SessionSignal>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn started(&self) {
        self.send(PlayerEvent::Started);
    }

    pub fn ended(&self, reason: EndReason) {
        self.send(PlayerEvent::Ended(reason));
    }

    pub fn failed(&self, cause: impl Into<String>) {
        self.send(PlayerEvent::Failed(cause.into()));
    }

    fn send(&self, event: PlayerEvent) {
        // The session may already be gone; nothing left to tell.
        let _ = self.tx.send(SessionSignal::Player {
            generation: self.generation,
            event,
        });
    }
}

/// The single audio player owned by one session.
///
/// `play_now` replaces whatever is playing. Asynchronous outcomes go through
/// the `EventReporter`; a returned error means the request never got going
/// and is handled as a failed track.
#[async_trait]
pub trait Player: Send + Sync {
    async fn play_now(
        &self,
        entry: &TrackEntry,
        volume: u8,
        events: EventReporter,
    ) -> Result<(), PlayerError>;

    async fn stop(&self) -> Result<(), PlayerError>;

    async fn set_paused(&self, paused: bool) -> Result<(), PlayerError>;

    async fn set_volume(&self, volume: u8) -> Result<(), PlayerError>;

    /// Drop the voice connection.
    async fn leave(&self) -> Result<(), PlayerError>;
}
