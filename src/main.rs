use dotenvy::dotenv;
use musicq::config::{DurationCap, config_path, load_config};
use musicq::{SessionId, SessionRegistry, TeardownReason};
use serenity::all::Interaction;
use serenity::{
    async_trait,
    builder::{CreateEmbed, CreateMessage},
    model::{channel::Message, gateway::Ready, voice::VoiceState},
    prelude::*,
};
use songbird::SerenityInit;
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod bot;

use crate::bot::commands::{USAGE, handle_component, handle_music};
use crate::bot::media::ensure_media_tools;
use crate::bot::resolver::YtDlpResolver;
use crate::bot::{MusicState, MusicStore, music_state, voice_channel_for_user_id};

struct Handler {
    prefix: String,
    color: u32,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        // move any data we need out of the potentially non-Send `Message` before awaiting
        let author_is_bot = msg.author.bot;
        let channel_id = msg.channel_id;
        let author_id = msg.author.id;
        let guild_id = msg.guild_id;
        let content = msg.content.clone();
        drop(msg);

        if author_is_bot {
            return;
        }
        let Some(command) = content.trim().strip_prefix(self.prefix.as_str()) else {
            return;
        };
        let command = command.trim();
        let cmd = command.split_whitespace().next().unwrap_or("").to_ascii_lowercase();

        match cmd.as_str() {
            "ping" => {
                if let Err(why) = channel_id.say(&ctx.http, "Pong!").await {
                    warn!(error = ?why, "failed to send pong");
                }
            }
            "help" | "" => {
                let fields: Vec<(String, String, bool)> = USAGE
                    .iter()
                    .map(|(name, desc)| (format!("{}{}", self.prefix, name), (*desc).to_string(), false))
                    .collect();

                let embed = CreateEmbed::new()
                    .title("Help Menu")
                    .description("Use the commands below with the prefix")
                    .color(self.color)
                    .fields(fields);

                if let Err(why) = channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await
                {
                    warn!(error = ?why, "failed to send help");
                }
            }
            _ => {
                let user_vc = guild_id.and_then(|gid| voice_channel_for_user_id(&ctx, gid, author_id));
                if let Err(why) =
                    handle_music(&ctx, channel_id, user_vc, author_id, guild_id, command).await
                {
                    error!(error = %why, "music command handler failed");
                }
            }
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ctx.cache.guild_count(), "connected");
    }

    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Ok(state) = music_state(&ctx).await else {
            return;
        };
        // Our own leave also lands here; by then the session is already gone.
        if state
            .registry
            .teardown(SessionId(guild_id.get()), TeardownReason::Kicked)
            .await
        {
            info!(guild = %guild_id, "removed from voice, session closed");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(mc) = interaction {
            handle_component(&ctx, &mc).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("musicq=info,warn")),
        )
        .init();

    dotenv().ok();
    let token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN not set")?;

    let path = config_path();
    let config = load_config(&path).await?;
    info!(path = %path.display(), prefix = %config.prefix, "config loaded");

    let http = reqwest::Client::builder().build()?;
    ensure_media_tools(&http).await?;

    let registry = SessionRegistry::new();
    let state = Arc::new(MusicState {
        registry: registry.clone(),
        resolver: Arc::new(YtDlpResolver::new(http.clone())),
        settings: config.music.session_settings(),
        cap: Arc::new(DurationCap::new(config.music.max_track_seconds)),
        http,
        color: config.embed_color,
    });

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES;

    let handler = Handler {
        prefix: config.prefix.clone(),
        color: config.embed_color,
    };
    let mut client = Client::builder(token, intents)
        .register_songbird()
        .event_handler(handler)
        .await?;

    client.data.write().await.insert::<MusicStore>(state);

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(sessions = registry.active_count(), "shutting down");
            registry.shutdown().await;
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start().await {
        error!(error = ?why, "client error");
    }
    Ok(())
}
