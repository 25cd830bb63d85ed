use musicq::{EndReason, EventReporter, Player, PlayerError, TrackEntry};
use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::input::{Input, YoutubeDl};
use songbird::tracks::TrackHandle;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Plays entries through the guild's songbird call, one track at a time.
pub struct SongbirdPlayer {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdPlayer {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http: reqwest::Client) -> Self {
        Self {
            manager,
            guild_id,
            http,
            current: Mutex::new(None),
        }
    }
}

fn gain(volume: u8) -> f32 {
    f32::from(volume) / 100.0
}

fn player_err(e: impl std::fmt::Debug) -> PlayerError {
    PlayerError(format!("{e:?}"))
}

#[derive(Clone, Copy)]
enum Relay {
    Playable,
    End,
    Error,
}

struct TrackRelay {
    events: EventReporter,
    relay: Relay,
}

#[async_trait]
impl VoiceEventHandler for TrackRelay {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match self.relay {
            Relay::Playable => self.events.started(),
            Relay::End => self.events.ended(EndReason::Finished),
            Relay::Error => {
                let cause = match ctx {
                    EventContext::Track(tracks) => tracks
                        .first()
                        .map(|(state, _)| format!("{:?}", state.playing))
                        .unwrap_or_else(|| "unknown error".into()),
                    _ => "unknown error".into(),
                };
                self.events.failed(cause);
            }
        }
        None
    }
}

#[async_trait]
impl Player for SongbirdPlayer {
    async fn play_now(
        &self,
        entry: &TrackEntry,
        volume: u8,
        events: EventReporter,
    ) -> Result<(), PlayerError> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| PlayerError("not in a voice channel".into()))?;

        let input: Input = YoutubeDl::new(self.http.clone(), entry.track().url.clone())
            .user_args(vec!["-f".into(), "bestaudio[ext=webm]/bestaudio/best".into()])
            .into();

        let mut current = self.current.lock().await;
        if let Some(old) = current.take() {
            let _ = old.stop();
        }

        let handle = call.lock().await.play_only_input(input);
        handle.set_volume(gain(volume)).map_err(player_err)?;

        for (event, relay) in [
            (TrackEvent::Playable, Relay::Playable),
            (TrackEvent::End, Relay::End),
            (TrackEvent::Error, Relay::Error),
        ] {
            handle
                .add_event(Event::Track(event), TrackRelay { events: events.clone(), relay })
                .map_err(player_err)?;
        }

        debug!(guild = %self.guild_id, generation = %events.generation(), title = entry.title(), "track handed to songbird");
        *current = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        if let Some(handle) = self.current.lock().await.take() {
            handle.stop().map_err(player_err)?;
        }
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<(), PlayerError> {
        let current = self.current.lock().await;
        let handle = current
            .as_ref()
            .ok_or_else(|| PlayerError("no track loaded".into()))?;
        if paused {
            handle.pause().map_err(player_err)
        } else {
            handle.play().map_err(player_err)
        }
    }

    async fn set_volume(&self, volume: u8) -> Result<(), PlayerError> {
        if let Some(handle) = self.current.lock().await.as_ref() {
            handle.set_volume(gain(volume)).map_err(player_err)?;
        }
        Ok(())
    }

    async fn leave(&self) -> Result<(), PlayerError> {
        self.current.lock().await.take();
        if self.manager.get(self.guild_id).is_none() {
            return Ok(());
        }
        self.manager.remove(self.guild_id).await.map_err(player_err)
    }
}
