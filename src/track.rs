//! Track entries: a resolved playable item plus who asked for it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a queued entry. Unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// The user who requested a track (a Discord user id in the bot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequesterId(pub u64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.0)
    }
}

/// What the resolver hands back. The player only needs `url`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedTrack {
    pub title: String,
    pub url: String,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
}

/// A queued, resolved playable item. Immutable once created; cloning shares
/// the resolved track and keeps the same [`EntryId`].
#[derive(Debug, Clone)]
pub struct TrackEntry {
    id: EntryId,
    track: Arc<ResolvedTrack>,
    requester: RequesterId,
    enqueued_at: SystemTime,
    duration: Option<Duration>,
}

impl TrackEntry {
    /// `duration` is `None` for live streams or when the source doesn't say.
    pub fn new(track: ResolvedTrack, requester: RequesterId, duration: Option<Duration>) -> Self {
        Self {
            id: EntryId::next(),
            track: Arc::new(track),
            requester,
            enqueued_at: SystemTime::now(),
            duration,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn track(&self) -> &ResolvedTrack {
        &self.track
    }

    pub fn title(&self) -> &str {
        &self.track.title
    }

    pub fn requester(&self) -> RequesterId {
        self.requester
    }

    pub fn enqueued_at(&self) -> SystemTime {
        self.enqueued_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Checks the entry against a cap in whole seconds; `max_seconds <= 0`
    /// disables the cap and unknown durations always pass.
    pub fn exceeds(&self, max_seconds: i64) -> bool {
        if max_seconds <= 0 {
            return false;
        }
        match self.duration {
            Some(d) => (d.as_millis() as f64 / 1000.0).round() as i64 > max_seconds,
            None => false,
        }
    }
}

impl PartialEq for TrackEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TrackEntry {}

impl fmt::Display for TrackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self
            .duration
            .map(format_duration)
            .unwrap_or_else(|| "LIVE".to_string());
        write!(f, "`[{}]` **{}** - {}", length, self.track.title, self.requester)
    }
}

/// `H:MM:SS` when there are hours, `MM:SS` otherwise.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
