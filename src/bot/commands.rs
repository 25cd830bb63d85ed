use musicq::config::config_path;
use musicq::{
    Activity, BatchOutcome, Joined, NowPlaying, Placement, QueueSnapshot, RepeatMode, RequesterId,
    Session, SessionError, SessionId, SkipOutcome, SkipRequest, format_duration,
};
use serenity::all::ButtonStyle;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage,
};
use serenity::model::application::ComponentInteraction;
use serenity::model::prelude::*;
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::display::ChannelDisplay;
use super::notices::spawn_notice_relay;
use super::player::SongbirdPlayer;
use super::{
    MusicResult, MusicState, is_moderator, listeners, music_state, send_info, send_temp_info,
    voice_channel_for_user_id,
};

const PAGE_SIZE: usize = 10;
const VOLUME_STEP: u16 = 10;

pub const USAGE: &[(&str, &str)] = &[
    ("join [#channel]", "Join your voice channel"),
    ("play <song or url>", "Play now, or add to the end of the queue"),
    ("playnext <song or url>", "Add to the front of the queue"),
    ("skip", "Vote to skip the current track"),
    ("forceskip", "Skip without a vote (Manage Server)"),
    ("pause / resume", "Pause or resume playback"),
    ("stop", "Clear the queue and stop playing"),
    ("leave", "Disconnect from voice"),
    ("queue [page]", "Show the queue"),
    ("np", "Show the current track"),
    ("volume [0-150]", "Show or set the volume"),
    ("repeat <off|track|queue>", "Set the repeat mode"),
    ("shuffle", "Shuffle the queue"),
    ("remove <position|mine>", "Remove a queued track, or all of yours"),
    ("move <from> <to>", "Move a queued track"),
    ("control", "Show the control panel"),
    ("reload", "Re-read the config file (Manage Server)"),
];

/// One command invocation in a guild.
struct Invocation<'a> {
    ctx: &'a Context,
    state: Arc<MusicState>,
    channel: ChannelId,
    guild_id: GuildId,
    user_id: UserId,
    user_voice: Option<ChannelId>,
}

pub async fn handle_music(
    ctx: &Context,
    channel: ChannelId,
    user_voice: Option<ChannelId>,
    user_id: UserId,
    guild_id: Option<GuildId>,
    command: &str,
) -> MusicResult<()> {
    let state = music_state(ctx).await?;
    let color = state.color;

    let mut parts = command.split_whitespace();
    let sub = parts.next().unwrap_or("").to_ascii_lowercase();
    let remainder = parts.collect::<Vec<_>>().join(" ");

    let Some(guild_id) = guild_id else {
        return send_info(ctx, channel, color, "Music", "This command only works in a guild").await;
    };

    let inv = Invocation {
        ctx,
        state,
        channel,
        guild_id,
        user_id,
        user_voice,
    };

    let result: MusicResult<()> = match sub.as_str() {
        "join" => inv.join(&remainder).await,
        "play" | "p" => inv.play(&remainder, Placement::Last).await,
        "playnext" | "pn" => inv.play(&remainder, Placement::Next).await,
        "skip" | "s" => inv.skip(false).await,
        "forceskip" | "fs" => inv.skip(true).await,
        "pause" => inv.pause(true).await,
        "resume" | "unpause" => inv.pause(false).await,
        "stop" => inv.stop().await,
        "leave" | "disconnect" => inv.leave().await,
        "queue" | "q" => inv.queue(&remainder).await,
        "np" | "nowplaying" => inv.now_playing().await,
        "volume" | "vol" => inv.volume(&remainder).await,
        "repeat" | "loop" => inv.repeat(&remainder).await,
        "shuffle" => inv.shuffle().await,
        "remove" => inv.remove(&remainder).await,
        "move" => inv.move_entry(&remainder).await,
        "control" => inv.control_panel().await,
        "reload" => inv.reload().await,
        _ => {
            let names: Vec<&str> = USAGE.iter().map(|(name, _)| *name).collect();
            send_info(ctx, channel, color, "Music", &format!("Subcommands: {}", names.join(", "))).await
        }
    };

    if let Err(err) = result {
        warn!(guild = %guild_id, command = %sub, error = %err, "music command failed");
        let _ = send_info(ctx, channel, color, "Music", &err.to_string()).await;
    }
    Ok(())
}

impl Invocation<'_> {
    fn session_id(&self) -> SessionId {
        SessionId(self.guild_id.get())
    }

    fn requester(&self) -> RequesterId {
        RequesterId(self.user_id.get())
    }

    fn session(&self) -> MusicResult<Arc<Session>> {
        Ok(self.state.registry.get(self.session_id())?)
    }

    async fn info(&self, desc: &str) -> MusicResult<()> {
        send_info(self.ctx, self.channel, self.state.color, "Music", desc).await
    }

    /// Existing session, or join voice and start one. The bool is true when
    /// a new session was created.
    async fn connect(&self, explicit: Option<ChannelId>) -> MusicResult<(Arc<Session>, bool)> {
        let ticket = match self.state.registry.join(self.session_id())? {
            Joined::Existing(session) => return Ok((session, false)),
            Joined::Pending(ticket) => ticket,
        };

        let voice = explicit
            .or_else(|| voice_channel_for_user_id(self.ctx, self.guild_id, self.user_id))
            .or(self.user_voice)
            .ok_or("Join a voice channel first, or name one: join <#channel>")?;

        let manager = songbird::get(self.ctx)
            .await
            .ok_or("Songbird voice client was not registered")?
            .clone();
        manager.join(self.guild_id, voice).await?;
        info!(guild = %self.guild_id, channel = %voice, "joined voice");

        let player = Arc::new(SongbirdPlayer::new(
            manager,
            self.guild_id,
            self.state.http.clone(),
        ));
        let display = Arc::new(ChannelDisplay::new(
            self.ctx.http.clone(),
            self.channel,
            self.state.color,
        ));
        let session = ticket.activate(
            self.state.settings.clone(),
            self.state.cap.clone(),
            player,
            display,
        );
        spawn_notice_relay(
            self.ctx.http.clone(),
            self.channel,
            self.state.color,
            session.subscribe(),
        );
        Ok((session, true))
    }

    async fn join(&self, args: &str) -> MusicResult<()> {
        let explicit = parse_channel(args);
        let (_, created) = self.connect(explicit).await?;
        if created {
            self.info("Joined your voice channel").await
        } else {
            self.info("Already connected").await
        }
    }

    async fn play(&self, query: &str, placement: Placement) -> MusicResult<()> {
        if query.trim().is_empty() {
            return self.info("Usage: play <song or url>").await;
        }
        let (session, _) = self.connect(None).await?;
        let _ = send_temp_info(self.ctx, self.channel, &format!("Searching for `{query}`...")).await;

        let outcome = session
            .request(self.state.resolver.as_ref(), query, self.requester(), placement)
            .await?;
        self.info(&describe_batch(&outcome)).await
    }

    async fn skip(&self, force: bool) -> MusicResult<()> {
        let session = self.session()?;
        if force && !is_moderator(self.ctx, self.guild_id, self.user_id) {
            return self.info("You need the Manage Server permission to force skip").await;
        }
        let request = SkipRequest {
            requester: self.requester(),
            vote_required: !force,
            listeners: listeners(self.ctx, self.guild_id),
        };
        let outcome = session.skip(request).await?;
        self.info(&describe_skip(&outcome)).await
    }

    async fn pause(&self, paused: bool) -> MusicResult<()> {
        let activity = self.session()?.set_paused(paused).await?;
        let msg = match (paused, activity) {
            (true, Activity::Paused) => "Paused",
            (false, Activity::Playing) => "Resumed",
            (true, _) => "Couldn't pause playback",
            (false, _) => "Couldn't resume playback",
        };
        self.info(msg).await
    }

    async fn stop(&self) -> MusicResult<()> {
        self.session()?.stop().await?;
        self.info("Stopped and cleared the queue").await
    }

    async fn leave(&self) -> MusicResult<()> {
        self.session()?.leave().await?;
        self.info("Left the voice channel").await
    }

    async fn queue(&self, args: &str) -> MusicResult<()> {
        let page = args.trim().parse::<usize>().unwrap_or(1);
        let snapshot = self.session()?.snapshot().await?;
        let (desc, footer) = render_queue(&snapshot, page);

        let embed = CreateEmbed::new()
            .title("Queue")
            .description(desc)
            .footer(CreateEmbedFooter::new(footer))
            .color(self.state.color);
        self.channel
            .send_message(&self.ctx.http, CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }

    async fn now_playing(&self) -> MusicResult<()> {
        let np = self.session()?.now_playing().await?;
        self.info(&describe_now_playing(np.as_ref())).await
    }

    async fn volume(&self, args: &str) -> MusicResult<()> {
        let session = self.session()?;
        let arg = args.trim();
        if arg.is_empty() {
            let np = session.now_playing().await?.ok_or(SessionError::NothingPlaying)?;
            return self.info(&format!("Volume is {}", np.volume)).await;
        }
        let requested: u16 = arg.parse().map_err(|_| format!("'{arg}' is not a volume"))?;
        let volume = session.set_volume(requested).await?;
        self.info(&format!("Volume set to {volume}")).await
    }

    async fn repeat(&self, args: &str) -> MusicResult<()> {
        let session = self.session()?;
        if args.trim().is_empty() {
            let snapshot = session.snapshot().await?;
            return self.info(&format!("Repeat is {}", snapshot.repeat)).await;
        }
        let mode: RepeatMode = args.parse()?;
        let previous = session.set_repeat_mode(mode).await?;
        self.info(&format!("Repeat changed from {previous} to {mode}")).await
    }

    async fn shuffle(&self) -> MusicResult<()> {
        let count = self.session()?.shuffle().await?;
        if count == 0 {
            self.info("The queue is empty").await
        } else {
            self.info(&format!("Shuffled {count} entries")).await
        }
    }

    async fn remove(&self, args: &str) -> MusicResult<()> {
        let session = self.session()?;
        let arg = args.trim();
        if arg.eq_ignore_ascii_case("mine") {
            let removed = session.remove_all_by(self.requester()).await?;
            return self.info(&format!("Removed {removed} of your entries")).await;
        }
        let index: usize = arg.parse().map_err(|_| "Usage: remove <position|mine>")?;
        let removed = session.remove_at(index).await?;
        self.info(&format!("Removed **{}**", removed.title())).await
    }

    async fn move_entry(&self, args: &str) -> MusicResult<()> {
        let (from, to) = parse_move(args).ok_or("Usage: move <from> <to>")?;
        let moved = self.session()?.move_to(from, to).await?;
        self.info(&format!("Moved **{}** to position {to}", moved.title())).await
    }

    async fn reload(&self) -> MusicResult<()> {
        if !is_moderator(self.ctx, self.guild_id, self.user_id) {
            return self.info("You need the Manage Server permission to reload the config").await;
        }
        let max_seconds = self.state.cap.reload(&config_path()).await?;
        info!(guild = %self.guild_id, max_seconds, "config reloaded");
        let limit = if max_seconds > 0 {
            format_duration(Duration::from_secs(max_seconds as u64))
        } else {
            "none".to_string()
        };
        self.info(&format!("Config reloaded. Track length limit: {limit}")).await
    }

    async fn control_panel(&self) -> MusicResult<()> {
        let np = self.session()?.now_playing().await?;
        let guild = self.guild_id.get();
        let button = |action: &str, label: &str, style: ButtonStyle| {
            CreateButton::new(format!("music:{action}:{guild}"))
                .style(style)
                .label(label)
        };

        let rows = vec![
            CreateActionRow::Buttons(vec![
                button("pause", "Pause", ButtonStyle::Primary),
                button("resume", "Resume", ButtonStyle::Success),
                button("skip", "Skip", ButtonStyle::Secondary),
                button("stop", "Stop", ButtonStyle::Danger),
            ]),
            CreateActionRow::Buttons(vec![
                button("vol_down", "Vol -", ButtonStyle::Secondary),
                button("vol_up", "Vol +", ButtonStyle::Secondary),
            ]),
        ];

        let embed = CreateEmbed::new()
            .title("Music Controls")
            .description(describe_now_playing(np.as_ref()))
            .color(self.state.color);
        self.channel
            .send_message(&self.ctx.http, CreateMessage::new().embed(embed).components(rows))
            .await?;
        Ok(())
    }
}

/// Buttons from the control panel. custom_id is `music:<action>:<guild_id>`.
pub async fn handle_component(ctx: &Context, mc: &ComponentInteraction) {
    let mut parts = mc.data.custom_id.split(':');
    if parts.next() != Some("music") {
        return;
    }
    let action = parts.next().unwrap_or("");
    let Some(guild_id) = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .map(GuildId::new)
    else {
        return;
    };

    let reply = match control_action(ctx, guild_id, mc.user.id, action).await {
        Ok(text) => text,
        Err(e) => e.to_string(),
    };
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(reply)
            .ephemeral(true),
    );
    if let Err(e) = mc.create_response(&ctx.http, response).await {
        warn!(guild = %guild_id, error = %e, "failed to answer control panel");
    }
}

async fn control_action(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    action: &str,
) -> MusicResult<String> {
    let state = music_state(ctx).await?;
    let session = state.registry.get(SessionId(guild_id.get()))?;

    let text = match action {
        "pause" | "resume" => {
            let activity = session.set_paused(action == "pause").await?;
            format!("Now {}", activity_label(activity))
        }
        "skip" => {
            let request = SkipRequest {
                requester: RequesterId(user_id.get()),
                vote_required: true,
                listeners: listeners(ctx, guild_id),
            };
            describe_skip(&session.skip(request).await?)
        }
        "stop" => {
            session.stop().await?;
            "Stopped and cleared the queue".to_string()
        }
        "vol_up" | "vol_down" => {
            let np = session.now_playing().await?.ok_or(SessionError::NothingPlaying)?;
            let current = u16::from(np.volume);
            let target = if action == "vol_up" {
                (current + VOLUME_STEP).min(musicq::session::MAX_VOLUME)
            } else {
                current.saturating_sub(VOLUME_STEP)
            };
            format!("Volume: {}", session.set_volume(target).await?)
        }
        _ => "Unknown action".to_string(),
    };
    Ok(text)
}

fn activity_label(activity: Activity) -> &'static str {
    match activity {
        Activity::Playing => "playing",
        Activity::Paused => "paused",
        Activity::Waiting => "waiting",
    }
}

/// `<#123>` or a bare id.
fn parse_channel(args: &str) -> Option<ChannelId> {
    args.split_whitespace()
        .next()
        .and_then(|s| s.trim_start_matches("<#").trim_end_matches('>').parse::<u64>().ok())
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

fn parse_move(args: &str) -> Option<(usize, usize)> {
    let mut nums = args.split_whitespace().map(str::parse::<usize>);
    match (nums.next(), nums.next(), nums.next()) {
        (Some(Ok(from)), Some(Ok(to)), None) => Some((from, to)),
        _ => None,
    }
}

fn describe_batch(outcome: &BatchOutcome) -> String {
    let mut msg = match (&outcome.started, outcome.first_position) {
        (Some(entry), _) => format!("Now playing **{}**", entry.title()),
        (None, Some(pos)) => format!("Added to the queue at position {pos}"),
        (None, None) => "Nothing was added".to_string(),
    };
    let extra = if outcome.started.is_some() {
        outcome.queued
    } else {
        outcome.queued.saturating_sub(1)
    };
    if extra > 0 {
        msg.push_str(&format!(", plus {extra} more queued"));
    }
    if outcome.too_long > 0 {
        msg.push_str(&format!(" ({} skipped for being too long)", outcome.too_long));
    }
    msg
}

fn describe_skip(outcome: &SkipOutcome) -> String {
    match outcome {
        SkipOutcome::VoteRecorded { votes, required } => {
            format!("Skip vote recorded ({votes}/{required})")
        }
        SkipOutcome::Skipped { skipped, next } => {
            let mut msg = match skipped {
                Some(entry) => format!("Skipped **{}**", entry.title()),
                None => "Skipped".to_string(),
            };
            match next {
                Some(entry) => msg.push_str(&format!(", now playing **{}**", entry.title())),
                None => msg.push_str(", nothing left in the queue"),
            }
            msg
        }
    }
}

fn describe_now_playing(np: Option<&NowPlaying>) -> String {
    match np {
        None => "Nothing is playing".to_string(),
        Some(np) => format!(
            "{}\n{} | Volume {} | Repeat {}",
            np.entry,
            if np.paused { "Paused" } else { "Playing" },
            np.volume,
            np.repeat
        ),
    }
}

/// Description and footer for one page of the queue.
fn render_queue(snapshot: &QueueSnapshot, page: usize) -> (String, String) {
    let count = snapshot.entries.len();
    let pages = count.div_ceil(PAGE_SIZE).max(1);
    let page = page.clamp(1, pages);

    let mut desc = String::new();
    if let Some(np) = &snapshot.now_playing {
        let icon = if np.paused { "\u{23F8}" } else { "\u{25B6}" };
        desc.push_str(&format!("{icon} {}\n\n", np.entry));
    }
    if count == 0 {
        desc.push_str("The queue is empty.");
    }
    for (i, entry) in snapshot
        .entries
        .iter()
        .enumerate()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
    {
        desc.push_str(&format!("`{}.` {}\n", i + 1, entry));
    }

    let footer = format!(
        "Page {page}/{pages} | {count} entries | {} | Repeat {}",
        format_duration(snapshot.total),
        snapshot.repeat
    );
    (desc, footer)
}
