//! Session scheduler.
//!
//! One [`Session`] per active voice connection. It is the only writer of
//! its queue, repeat mode and playback state. Commands lock the session
//! state directly; player events and idle expiries arrive on a signal
//! channel drained by a single pump task that takes the same lock, so every
//! mutation is serialized.
//!
//! ```text
//!   commands ──────────────┐
//!                          ▼
//!   player ─┐          ┌────────┐      ┌──────────┐
//!           ├─signals─▶│ state  │─────▶│ presenter│──▶ display sink
//!   idle ───┘          └────────┘      └──────────┘
//!                          │
//!                          ▼
//!                        player
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::display::{DisplaySink, NowPlayingCard};
use crate::error::{PlayerError, Result, SessionError};
use crate::idle::IdleMonitor;
use crate::player::{EventReporter, Generation, Player, PlayerEvent, SessionSignal};
use crate::presenter::Presenter;
use crate::queue::Queue;
use crate::repeat::{EndReason, RepeatMode};
use crate::resolver::Resolver;
use crate::track::{RequesterId, TrackEntry};
use crate::vote::{SkipVotes, quorum};

pub const MAX_VOLUME: u16 = 150;

/// Identity of a voice session (the guild id in the bot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum allowed track length in seconds, read once per play call.
/// Zero or negative means unlimited.
pub trait DurationPolicy: Send + Sync {
    fn max_track_seconds(&self) -> i64;
}

impl DurationPolicy for i64 {
    fn max_track_seconds(&self) -> i64 {
        *self
    }
}

impl DurationPolicy for AtomicI64 {
    fn max_track_seconds(&self) -> i64 {
        self.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Zero keeps the session joined forever
    pub idle_timeout: Duration,
    pub default_volume: u8,
    pub default_repeat: RepeatMode,
    pub vote_skip: bool,
    /// Fraction of non-bot listeners needed to skip by vote
    pub skip_ratio: f64,
    /// Consecutive failures before auto-advance gives up
    pub failure_threshold: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            default_volume: 35,
            default_repeat: RepeatMode::Off,
            vote_skip: true,
            skip_ratio: 0.55,
            failure_threshold: 3,
        }
    }
}

/// Sub-state of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Playing,
    Paused,
    /// Connected with nothing playing
    Waiting,
}

/// Where new entries go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Last,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Handed straight to the player
    Started(TrackEntry),
    Queued { entry: TrackEntry, position: usize },
    /// The entry is the one playing; nothing changed
    AlreadyPlaying(TrackEntry),
}

/// Result of queueing several entries at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub started: Option<TrackEntry>,
    pub queued: usize,
    pub first_position: Option<usize>,
    /// Entries dropped for exceeding the duration cap
    pub too_long: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRequest {
    pub requester: RequesterId,
    /// False when the caller has authority to skip outright
    pub vote_required: bool,
    /// Non-bot members currently listening
    pub listeners: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped {
        skipped: Option<TrackEntry>,
        next: Option<TrackEntry>,
    },
    VoteRecorded {
        votes: usize,
        required: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// A user asked the bot to leave
    Requested,
    IdleTimeout,
    /// Removed from the voice channel by someone else
    Kicked,
    Shutdown,
}

/// Asynchronous happenings for the reporting layer to relay to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    TrackFailed { title: String, cause: String },
    /// Too many failures in a row; auto-advance stopped
    AutoAdvanceHalted { failures: u32 },
    TornDown(TeardownReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub entry: TrackEntry,
    pub paused: bool,
    pub volume: u8,
    pub repeat: RepeatMode,
    pub generation: Generation,
}

/// Consistent copy of the session for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub now_playing: Option<NowPlaying>,
    pub entries: Vec<TrackEntry>,
    pub repeat: RepeatMode,
    pub activity: Activity,
    /// Known length of the waiting entries
    pub total: Duration,
}

struct SessionState {
    queue: Queue,
    repeat: RepeatMode,
    current: Option<TrackEntry>,
    /// The player confirmed the current generation started
    started: bool,
    activity: Activity,
    volume: u8,
    generation: Generation,
    failures: u32,
    votes: SkipVotes,
    idle: IdleMonitor,
    /// Bumped by stop and teardown; in-flight resolves compare against it
    epoch: u64,
}

type Detach = Box<dyn FnOnce() + Send>;

pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    policy: Arc<dyn DurationPolicy>,
    player: Arc<dyn Player>,
    presenter: Presenter,
    state: Mutex<SessionState>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    notices: broadcast::Sender<SessionNotice>,
    closed: AtomicBool,
    detach: std::sync::Mutex<Option<Detach>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session that starts out waiting with an empty queue, and
    /// spawn its event pump and presenter. Must run inside a tokio runtime.
    pub fn spawn(
        id: SessionId,
        settings: SessionSettings,
        policy: Arc<dyn DurationPolicy>,
        player: Arc<dyn Player>,
        display: Arc<dyn DisplaySink>,
    ) -> Arc<Session> {
        let (signals, rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(32);

        let mut idle = IdleMonitor::new(settings.idle_timeout);
        idle.arm(&signals);

        let state = SessionState {
            queue: Queue::new(),
            repeat: settings.default_repeat,
            current: None,
            started: false,
            activity: Activity::Waiting,
            volume: settings.default_volume,
            generation: Generation::default(),
            failures: 0,
            votes: SkipVotes::default(),
            idle,
            epoch: 0,
        };

        let session = Arc::new(Session {
            id,
            presenter: Presenter::spawn(id, display),
            settings,
            policy,
            player,
            state: Mutex::new(state),
            signals,
            notices,
            closed: AtomicBool::new(false),
            detach: std::sync::Mutex::new(None),
        });

        tokio::spawn(pump(Arc::downgrade(&session), rx));
        info!(session = %id, "session started");
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub(crate) fn set_detach(&self, detach: Detach) {
        let mut slot = self.detach.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(detach);
    }

    // ---- commands -------------------------------------------------------

    /// Play `entry` now if nothing is playing, otherwise append it.
    pub async fn play(&self, entry: TrackEntry) -> Result<PlayOutcome> {
        self.play_with(entry, Placement::Last).await
    }

    /// Like [`play`](Self::play) but queued entries go to the head.
    pub async fn play_next(&self, entry: TrackEntry) -> Result<PlayOutcome> {
        self.play_with(entry, Placement::Next).await
    }

    async fn play_with(&self, entry: TrackEntry, placement: Placement) -> Result<PlayOutcome> {
        self.check_length(&entry, self.policy.max_track_seconds())?;
        let mut st = self.lock_open().await?;
        Ok(self.place_locked(&mut st, entry, placement).await)
    }

    /// Queue a batch (a playlist). Entries over the cap are dropped and
    /// counted; a lone entry over the cap is an error.
    pub async fn play_all(
        &self,
        entries: Vec<TrackEntry>,
        placement: Placement,
    ) -> Result<BatchOutcome> {
        self.place_batch(entries, placement, None).await
    }

    /// Resolve `query` with no lock held, then queue the result. If the
    /// session is stopped or torn down while resolving, the result is
    /// discarded.
    pub async fn request(
        &self,
        resolver: &dyn Resolver,
        query: &str,
        requester: RequesterId,
        placement: Placement,
    ) -> Result<BatchOutcome> {
        let epoch = self.lock_open().await?.epoch;
        let entries = resolver.resolve(query, requester).await?;
        debug!(session = %self.id, query, found = entries.len(), "resolved request");
        self.place_batch(entries, placement, Some(epoch)).await
    }

    pub async fn skip(&self, request: SkipRequest) -> Result<SkipOutcome> {
        let mut st = self.lock_open().await?;

        let Some(current) = st.current.clone() else {
            if st.queue.is_empty() {
                return Err(SessionError::NothingPlaying);
            }
            self.advance_locked(&mut st, EndReason::Skipped).await;
            return Ok(SkipOutcome::Skipped {
                skipped: None,
                next: st.current.clone(),
            });
        };

        let needs_vote = self.settings.vote_skip
            && request.vote_required
            && request.requester != current.requester();
        if needs_vote {
            let required = quorum(request.listeners, self.settings.skip_ratio);
            let generation = st.generation;
            let votes = st.votes.cast(generation, request.requester);
            if votes < required {
                debug!(session = %self.id, votes, required, "skip vote recorded");
                return Ok(SkipOutcome::VoteRecorded { votes, required });
            }
        }

        info!(session = %self.id, title = current.title(), "skipping");
        self.advance_locked(&mut st, EndReason::Skipped).await;
        if st.current.is_none() {
            self.stop_player().await;
        }
        Ok(SkipOutcome::Skipped {
            skipped: Some(current),
            next: st.current.clone(),
        })
    }

    /// Clear the queue and stop playback but stay connected.
    pub async fn stop(&self) -> Result<()> {
        let mut st = self.lock_open().await?;
        st.queue.clear();
        st.epoch += 1;
        self.enter_waiting(&mut st);
        self.stop_player().await;
        info!(session = %self.id, "stopped");
        Ok(())
    }

    /// Stop everything and leave voice.
    pub async fn leave(&self) -> Result<()> {
        if self.teardown(TeardownReason::Requested).await {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Returns the activity after the change.
    pub async fn set_paused(&self, paused: bool) -> Result<Activity> {
        let mut st = self.lock_open().await?;
        if st.current.is_none() {
            return Err(SessionError::NothingPlaying);
        }
        let target = if paused { Activity::Paused } else { Activity::Playing };
        if st.activity == target {
            return Ok(target);
        }

        if let Err(e) = self.player.set_paused(paused).await {
            warn!(session = %self.id, error = %e, paused, "player rejected pause toggle");
            return Ok(st.activity);
        }
        st.activity = target;
        if !paused {
            st.idle.disarm();
        }
        self.refresh_card(&st);
        Ok(target)
    }

    pub async fn set_volume(&self, volume: u16) -> Result<u8> {
        if volume > MAX_VOLUME {
            return Err(SessionError::VolumeOutOfRange(volume));
        }
        let volume = volume as u8;
        let mut st = self.lock_open().await?;
        st.volume = volume;
        if st.current.is_some() {
            if let Err(e) = self.player.set_volume(volume).await {
                warn!(session = %self.id, error = %e, volume, "player rejected volume change");
            }
        }
        self.refresh_card(&st);
        Ok(volume)
    }

    /// Takes effect on the next advance.
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<RepeatMode> {
        let mut st = self.lock_open().await?;
        let previous = std::mem::replace(&mut st.repeat, mode);
        self.refresh_card(&st);
        Ok(previous)
    }

    pub async fn shuffle(&self) -> Result<usize> {
        let mut st = self.lock_open().await?;
        let shuffled = st.queue.shuffle();
        self.refresh_card(&st);
        Ok(shuffled)
    }

    pub async fn remove_at(&self, index: usize) -> Result<TrackEntry> {
        let mut st = self.lock_open().await?;
        let removed = st.queue.remove_at(index)?;
        self.after_removal(&mut st);
        Ok(removed)
    }

    pub async fn remove_all_by(&self, requester: RequesterId) -> Result<usize> {
        let mut st = self.lock_open().await?;
        let removed = st.queue.remove_all_by(requester);
        self.after_removal(&mut st);
        Ok(removed)
    }

    pub async fn move_to(&self, from: usize, to: usize) -> Result<TrackEntry> {
        let mut st = self.lock_open().await?;
        st.queue.move_to(from, to)
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        let st = self.lock_open().await?;
        Ok(QueueSnapshot {
            now_playing: now_playing(&st),
            entries: st.queue.snapshot(),
            repeat: st.repeat,
            activity: st.activity,
            total: st.queue.total_duration(),
        })
    }

    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let st = self.lock_open().await?;
        Ok(now_playing(&st))
    }

    pub async fn activity(&self) -> Result<Activity> {
        Ok(self.lock_open().await?.activity)
    }

    pub async fn idle_armed(&self) -> bool {
        self.state.lock().await.idle.is_armed()
    }

    /// Tear the session down exactly once. Returns false if it already was.
    pub async fn teardown(&self, reason: TeardownReason) -> bool {
        {
            let mut st = self.state.lock().await;
            if self.closed.swap(true, Ordering::AcqRel) {
                return false;
            }
            st.idle.disarm();
            st.queue.clear();
            st.current = None;
            st.activity = Activity::Waiting;
            st.generation.bump();
            st.epoch += 1;
        }

        self.presenter.clear();
        self.presenter.settled().await;
        self.stop_player().await;
        if let Err(e) = self.player.leave().await {
            warn!(session = %self.id, error = %e, "failed to leave voice");
        }

        let detach = self.detach.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(detach) = detach {
            detach();
        }
        let _ = self.notices.send(SessionNotice::TornDown(reason));
        info!(session = %self.id, ?reason, "session torn down");
        true
    }

    // ---- player events --------------------------------------------------

    pub async fn on_track_started(&self, generation: Generation) {
        let mut st = self.state.lock().await;
        if !self.is_current(&st, generation) {
            return;
        }
        st.failures = 0;
        st.started = true;
        if let Some(entry) = &st.current {
            info!(session = %self.id, %generation, title = entry.title(), "track started");
        }
        self.refresh_card(&st);
    }

    pub async fn on_track_ended(&self, generation: Generation, reason: EndReason) {
        let mut st = self.state.lock().await;
        if !self.is_current(&st, generation) || st.current.is_none() {
            return;
        }
        debug!(session = %self.id, %generation, ?reason, "track ended");

        if !RepeatMode::advances(reason) {
            self.enter_waiting(&mut st);
            return;
        }
        self.advance_locked(&mut st, reason).await;
    }

    pub async fn on_track_failed(&self, generation: Generation, cause: String) {
        let mut st = self.state.lock().await;
        if !self.is_current(&st, generation) {
            return;
        }
        let Some(entry) = st.current.clone() else {
            return;
        };
        if self.record_failure(&mut st, &entry, cause) {
            return;
        }
        self.advance_locked(&mut st, EndReason::Failed).await;
    }

    async fn handle_signal(&self, signal: SessionSignal) {
        match signal {
            SessionSignal::Player { generation, event } => match event {
                PlayerEvent::Started => self.on_track_started(generation).await,
                PlayerEvent::Ended(reason) => self.on_track_ended(generation, reason).await,
                PlayerEvent::Failed(cause) => self.on_track_failed(generation, cause).await,
            },
            SessionSignal::IdleExpired { arm } => {
                let expired = {
                    let mut st = self.state.lock().await;
                    !self.is_closed() && st.idle.fire(arm)
                };
                if expired {
                    info!(session = %self.id, "idle timeout");
                    self.teardown(TeardownReason::IdleTimeout).await;
                }
            }
        }
    }

    // ---- internals ------------------------------------------------------

    async fn lock_open(&self) -> Result<tokio::sync::MutexGuard<'_, SessionState>> {
        let st = self.state.lock().await;
        if self.is_closed() {
            return Err(SessionError::NotConnected);
        }
        Ok(st)
    }

    fn check_length(&self, entry: &TrackEntry, max_seconds: i64) -> Result<()> {
        if entry.exceeds(max_seconds) {
            return Err(too_long(entry, max_seconds));
        }
        Ok(())
    }

    fn is_current(&self, st: &SessionState, generation: Generation) -> bool {
        if self.is_closed() || generation != st.generation {
            debug!(session = %self.id, %generation, current = %st.generation, "dropping stale player event");
            return false;
        }
        true
    }

    async fn place_batch(
        &self,
        entries: Vec<TrackEntry>,
        placement: Placement,
        ticket: Option<u64>,
    ) -> Result<BatchOutcome> {
        if entries.is_empty() {
            return Err(crate::error::ResolveError::NotFound.into());
        }

        let max_seconds = self.policy.max_track_seconds();
        let (accepted, rejected): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| !e.exceeds(max_seconds));
        if let ([], [only]) = (accepted.as_slice(), rejected.as_slice()) {
            return Err(too_long(only, max_seconds));
        }

        let mut st = self.lock_open().await?;
        if ticket.is_some_and(|epoch| epoch != st.epoch) {
            debug!(session = %self.id, "discarding request resolved after stop");
            return Err(SessionError::Cancelled);
        }

        let mut outcome = BatchOutcome {
            too_long: rejected.len(),
            ..Default::default()
        };
        let mut rest = accepted.into_iter();
        let first = if st.current.is_none() { rest.next() } else { None };

        // Queue the tail before starting the head so a failed start can
        // advance into it.
        let playing = first.clone().or_else(|| st.current.clone());
        let rest: Vec<_> = rest.filter(|e| playing.as_ref() != Some(e)).collect();
        let before = st.queue.len();
        match placement {
            Placement::Last => {
                for entry in rest {
                    let len = st.queue.len();
                    let position = st.queue.enqueue(entry);
                    if st.queue.len() > len {
                        outcome.first_position.get_or_insert(position);
                    }
                }
            }
            Placement::Next => {
                if !rest.is_empty() {
                    outcome.first_position = Some(1);
                }
                for entry in rest.into_iter().rev() {
                    st.queue.enqueue_next(entry);
                }
            }
        }
        outcome.queued = st.queue.len() - before;

        if let Some(first) = first {
            self.place_locked(&mut st, first.clone(), placement).await;
            outcome.started = Some(first);
        }
        self.refresh_card(&st);
        Ok(outcome)
    }

    async fn place_locked(
        &self,
        st: &mut SessionState,
        entry: TrackEntry,
        placement: Placement,
    ) -> PlayOutcome {
        if st.current.as_ref() == Some(&entry) {
            debug!(session = %self.id, title = entry.title(), "already playing");
            return PlayOutcome::AlreadyPlaying(entry);
        }
        if st.current.is_none() {
            if let Err(e) = self.start_locked(st, entry.clone()).await {
                if !self.record_failure(st, &entry, e.to_string()) {
                    self.advance_locked(st, EndReason::Failed).await;
                }
            }
            return PlayOutcome::Started(entry);
        }

        let position = match placement {
            Placement::Last => st.queue.enqueue(entry.clone()),
            Placement::Next => st.queue.enqueue_next(entry.clone()),
        };
        debug!(session = %self.id, title = entry.title(), position, "queued");
        self.refresh_card(st);
        PlayOutcome::Queued { entry, position }
    }

    /// Hand `entry` to the player under a fresh generation.
    async fn start_locked(
        &self,
        st: &mut SessionState,
        entry: TrackEntry,
    ) -> std::result::Result<(), PlayerError> {
        st.idle.disarm();
        let generation = st.generation.bump();
        st.current = Some(entry.clone());
        st.started = false;
        st.activity = Activity::Playing;
        st.votes.reset();

        debug!(session = %self.id, %generation, title = entry.title(), "requesting playback");
        let events = EventReporter::new(generation, self.signals.clone());
        self.player.play_now(&entry, st.volume, events).await
    }

    /// Move on from the current entry. Synchronous player failures feed the
    /// failure counter and the loop tries the next entry.
    async fn advance_locked(&self, st: &mut SessionState, reason: EndReason) {
        let mut reason = reason;
        loop {
            let finished = st.current.take();
            let mode = st.repeat.effective(reason);
            let Some(next) = st.queue.take_next(mode, finished) else {
                self.enter_waiting(st);
                return;
            };

            match self.start_locked(st, next.clone()).await {
                Ok(()) => return,
                Err(e) => {
                    if self.record_failure(st, &next, e.to_string()) {
                        return;
                    }
                    reason = EndReason::Failed;
                }
            }
        }
    }

    /// Count a failure. Returns true when the threshold was hit and the
    /// session has been parked in `Waiting`.
    fn record_failure(&self, st: &mut SessionState, entry: &TrackEntry, cause: String) -> bool {
        st.failures += 1;
        warn!(
            session = %self.id,
            title = entry.title(),
            failures = st.failures,
            %cause,
            "playback failure"
        );

        if st.failures >= self.settings.failure_threshold {
            let failures = st.failures;
            st.failures = 0;
            self.enter_waiting(st);
            warn!(session = %self.id, failures, "too many failures in a row, auto-advance halted");
            let _ = self.notices.send(SessionNotice::AutoAdvanceHalted { failures });
            return true;
        }

        let _ = self.notices.send(SessionNotice::TrackFailed {
            title: entry.title().to_string(),
            cause,
        });
        false
    }

    fn enter_waiting(&self, st: &mut SessionState) {
        st.current = None;
        st.started = false;
        st.activity = Activity::Waiting;
        st.votes.reset();
        st.generation.bump();
        self.presenter.clear();
        if st.queue.is_empty() {
            st.idle.arm(&self.signals);
        }
        debug!(session = %self.id, queued = st.queue.len(), "waiting");
    }

    fn after_removal(&self, st: &mut SessionState) {
        if st.activity == Activity::Waiting && st.queue.is_empty() && !st.idle.is_armed() {
            st.idle.arm(&self.signals);
        }
        self.refresh_card(st);
    }

    fn refresh_card(&self, st: &SessionState) {
        if !st.started {
            return;
        }
        if let Some(entry) = &st.current {
            let track = entry.track();
            self.presenter.show(NowPlayingCard {
                title: track.title.clone(),
                url: track.url.clone(),
                thumbnail: track.thumbnail.clone(),
                requester: entry.requester(),
                duration: entry.duration(),
                paused: st.activity == Activity::Paused,
                volume: st.volume,
                repeat: st.repeat,
                waiting: st.queue.len(),
            });
        }
    }

    async fn stop_player(&self) {
        if let Err(e) = self.player.stop().await {
            warn!(session = %self.id, error = %e, "failed to stop player");
        }
    }
}

fn too_long(entry: &TrackEntry, max_seconds: i64) -> SessionError {
    SessionError::TrackTooLong {
        duration: entry.duration().unwrap_or_default(),
        max: Duration::from_secs(max_seconds.max(0) as u64),
    }
}

fn now_playing(st: &SessionState) -> Option<NowPlaying> {
    st.current.as_ref().map(|entry| NowPlaying {
        entry: entry.clone(),
        paused: st.activity == Activity::Paused,
        volume: st.volume,
        repeat: st.repeat,
        generation: st.generation,
    })
}

/// Drains player events and idle expiries one at a time.
async fn pump(session: Weak<Session>, mut rx: mpsc::UnboundedReceiver<SessionSignal>) {
    while let Some(signal) = rx.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        session.handle_signal(signal).await;
        if session.is_closed() {
            break;
        }
    }
}
