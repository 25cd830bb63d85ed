//! Contract for the "now playing" display (a chat message in the bot).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::DisplayError;
use crate::repeat::RepeatMode;
use crate::track::{RequesterId, format_duration};

/// Where a shown card lives so it can be replaced or cleared later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    pub channel: u64,
    pub message: u64,
}

/// Content of the now-playing card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlayingCard {
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub requester: RequesterId,
    pub duration: Option<Duration>,
    pub paused: bool,
    pub volume: u8,
    pub repeat: RepeatMode,
    pub waiting: usize,
}

impl NowPlayingCard {
    pub fn status_line(&self) -> String {
        let state = if self.paused { "Paused" } else { "Playing" };
        let length = self
            .duration
            .map(format_duration)
            .unwrap_or_else(|| "LIVE".into());
        let mut line = format!(
            "{state} | {length} | Volume {} | Repeat {}",
            self.volume, self.repeat
        );
        if self.waiting > 0 {
            line.push_str(&format!(" | {} up next", self.waiting));
        }
        line
    }
}

/// Each call may fail (missing permissions, deleted channel). Failures are
/// the presenter's business and never reach playback control.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn show(&self, card: &NowPlayingCard) -> Result<DisplayHandle, DisplayError>;

    async fn replace(&self, handle: DisplayHandle, card: &NowPlayingCard)
    -> Result<(), DisplayError>;

    async fn clear(&self, handle: DisplayHandle) -> Result<(), DisplayError>;
}
