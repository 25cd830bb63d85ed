//! Discord side of the bot: songbird playback, yt-dlp lookups and the
//! prefix commands that drive a [`musicq::Session`] per guild.

pub mod commands;
pub mod display;
pub mod media;
pub mod notices;
pub mod player;
pub mod resolver;

use musicq::config::DurationCap;
use musicq::{SessionRegistry, SessionSettings};
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::model::prelude::*;
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use self::resolver::YtDlpResolver;

pub type MusicResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Everything the command handlers share, stored once in the client's TypeMap.
pub struct MusicState {
    pub registry: SessionRegistry,
    pub resolver: Arc<YtDlpResolver>,
    pub settings: SessionSettings,
    pub cap: Arc<DurationCap>,
    pub http: reqwest::Client,
    pub color: u32,
}

pub struct MusicStore;
impl TypeMapKey for MusicStore {
    type Value = Arc<MusicState>;
}

pub async fn music_state(ctx: &Context) -> MusicResult<Arc<MusicState>> {
    ctx.data
        .read()
        .await
        .get::<MusicStore>()
        .cloned()
        .ok_or_else(|| "music state was not initialised".into())
}

pub async fn send_info(
    ctx: &Context,
    channel: ChannelId,
    color: u32,
    title: &str,
    desc: &str,
) -> MusicResult<()> {
    let embed = CreateEmbed::new().title(title).description(desc).color(color);
    channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Plain message that deletes itself after a few seconds.
pub async fn send_temp_info(ctx: &Context, channel: ChannelId, content: &str) -> MusicResult<()> {
    let msg = channel
        .send_message(&ctx.http, CreateMessage::new().content(content))
        .await?;

    let http = ctx.http.clone();
    let id = msg.id;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = channel.delete_message(&http, id).await;
    });
    Ok(())
}

pub fn voice_channel_for_user_id(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id))
}

/// Non-bot, undeafened members in the bot's voice channel.
pub fn listeners(ctx: &Context, guild_id: GuildId) -> usize {
    let bot_id = ctx.cache.current_user().id;
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };
    let Some(channel) = guild.voice_states.get(&bot_id).and_then(|vs| vs.channel_id) else {
        return 0;
    };
    guild
        .voice_states
        .values()
        .filter(|vs| vs.channel_id == Some(channel) && vs.user_id != bot_id)
        .filter(|vs| !vs.deaf && !vs.self_deaf)
        .filter(|vs| !vs.member.as_ref().is_some_and(|m| m.user.bot))
        .count()
}

/// Members with Manage Guild may skip without a vote.
pub fn is_moderator(ctx: &Context, guild_id: GuildId, user_id: UserId) -> bool {
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| {
            guild
                .members
                .get(&user_id)
                .map(|member| guild.member_permissions(member).manage_guild())
        })
        .unwrap_or(false)
}
