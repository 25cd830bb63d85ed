#![allow(dead_code)]

use async_trait::async_trait;
use musicq::{
    DisplayError, DisplayHandle, DisplaySink, EventReporter, NowPlayingCard, Player, PlayerError,
    RequesterId, ResolveError, ResolvedTrack, Resolver, Session, SessionId, SessionSettings,
    TrackEntry,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn entry(title: &str, secs: u64) -> TrackEntry {
    entry_by(title, secs, 1)
}

pub fn entry_by(title: &str, secs: u64, requester: u64) -> TrackEntry {
    TrackEntry::new(
        ResolvedTrack {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            ..Default::default()
        },
        RequesterId(requester),
        Some(Duration::from_secs(secs)),
    )
}

/// Let the pump and presenter tasks catch up.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
struct PlayerLog {
    played: Vec<String>,
    reporters: Vec<EventReporter>,
    stops: usize,
    leaves: usize,
    paused: Option<bool>,
    volume: Option<u8>,
}

/// Records every call. Titles in `failing` are rejected by `play_now`.
#[derive(Default)]
pub struct MockPlayer {
    log: Mutex<PlayerLog>,
    failing: HashSet<String>,
}

impl MockPlayer {
    pub fn failing(titles: &[&str]) -> Self {
        Self {
            failing: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.log.lock().unwrap().played.clone()
    }

    pub fn last_reporter(&self) -> EventReporter {
        self.log.lock().unwrap().reporters.last().cloned().expect("nothing was played")
    }

    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    pub fn leaves(&self) -> usize {
        self.log.lock().unwrap().leaves
    }

    pub fn paused(&self) -> Option<bool> {
        self.log.lock().unwrap().paused
    }

    pub fn volume(&self) -> Option<u8> {
        self.log.lock().unwrap().volume
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play_now(
        &self,
        entry: &TrackEntry,
        volume: u8,
        events: EventReporter,
    ) -> Result<(), PlayerError> {
        let mut log = self.log.lock().unwrap();
        log.played.push(entry.title().to_string());
        if self.failing.contains(entry.title()) {
            return Err(PlayerError(format!("cannot open {}", entry.title())));
        }
        log.volume = Some(volume);
        log.paused = Some(false);
        log.reporters.push(events);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<(), PlayerError> {
        self.log.lock().unwrap().paused = Some(paused);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<(), PlayerError> {
        self.log.lock().unwrap().volume = Some(volume);
        Ok(())
    }

    async fn leave(&self) -> Result<(), PlayerError> {
        self.log.lock().unwrap().leaves += 1;
        Ok(())
    }
}

#[derive(Default)]
struct DisplayLog {
    shown: usize,
    replaced: usize,
    cleared: usize,
    last: Option<NowPlayingCard>,
}

#[derive(Default)]
pub struct RecordingDisplay {
    log: Mutex<DisplayLog>,
}

impl RecordingDisplay {
    pub fn shown(&self) -> usize {
        self.log.lock().unwrap().shown
    }

    pub fn replaced(&self) -> usize {
        self.log.lock().unwrap().replaced
    }

    pub fn cleared(&self) -> usize {
        self.log.lock().unwrap().cleared
    }

    pub fn last(&self) -> Option<NowPlayingCard> {
        self.log.lock().unwrap().last.clone()
    }
}

#[async_trait]
impl DisplaySink for RecordingDisplay {
    async fn show(&self, card: &NowPlayingCard) -> Result<DisplayHandle, DisplayError> {
        let mut log = self.log.lock().unwrap();
        log.shown += 1;
        log.last = Some(card.clone());
        Ok(DisplayHandle {
            channel: 1,
            message: log.shown as u64,
        })
    }

    async fn replace(
        &self,
        _handle: DisplayHandle,
        card: &NowPlayingCard,
    ) -> Result<(), DisplayError> {
        let mut log = self.log.lock().unwrap();
        log.replaced += 1;
        log.last = Some(card.clone());
        Ok(())
    }

    async fn clear(&self, _handle: DisplayHandle) -> Result<(), DisplayError> {
        let mut log = self.log.lock().unwrap();
        log.cleared += 1;
        log.last = None;
        Ok(())
    }
}

/// Resolves every query to the same entries.
pub struct StaticResolver(pub Vec<TrackEntry>);

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(
        &self,
        _query: &str,
        _requester: RequesterId,
    ) -> Result<Vec<TrackEntry>, ResolveError> {
        Ok(self.0.clone())
    }
}

/// Blocks in `resolve` until `release` is called.
pub struct GatedResolver {
    pub gate: Notify,
    pub entries: Vec<TrackEntry>,
}

impl GatedResolver {
    pub fn new(entries: Vec<TrackEntry>) -> Self {
        Self {
            gate: Notify::new(),
            entries,
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Resolver for GatedResolver {
    async fn resolve(
        &self,
        _query: &str,
        _requester: RequesterId,
    ) -> Result<Vec<TrackEntry>, ResolveError> {
        self.gate.notified().await;
        Ok(self.entries.clone())
    }
}

pub struct Harness {
    pub session: Arc<Session>,
    pub player: Arc<MockPlayer>,
    pub display: Arc<RecordingDisplay>,
}

impl Harness {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with(settings, 0, MockPlayer::default())
    }

    pub fn with(settings: SessionSettings, max_track_seconds: i64, player: MockPlayer) -> Self {
        let player = Arc::new(player);
        let display = Arc::new(RecordingDisplay::default());
        let session = Session::spawn(
            SessionId(1),
            settings,
            Arc::new(max_track_seconds),
            player.clone(),
            display.clone(),
        );
        Self {
            session,
            player,
            display,
        }
    }

    /// Generation of the most recent successful play request.
    pub fn generation(&self) -> musicq::Generation {
        self.player.last_reporter().generation()
    }

    pub async fn playing(&self) -> Option<String> {
        self.session
            .now_playing()
            .await
            .unwrap()
            .map(|np| np.entry.title().to_string())
    }

    pub async fn waiting(&self) -> Vec<String> {
        self.session
            .snapshot()
            .await
            .unwrap()
            .entries
            .iter()
            .map(|e| e.title().to_string())
            .collect()
    }
}
