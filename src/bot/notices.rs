use musicq::{SessionNotice, TeardownReason};
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Forward session notices to the text channel until the session is gone.
pub fn spawn_notice_relay(
    http: Arc<Http>,
    channel: ChannelId,
    color: u32,
    mut notices: broadcast::Receiver<SessionNotice>,
) {
    tokio::spawn(async move {
        loop {
            let notice = match notices.recv().await {
                Ok(notice) => notice,
                Err(RecvError::Lagged(missed)) => {
                    warn!(%channel, missed, "notice relay fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let done = matches!(notice, SessionNotice::TornDown(_));
            if let Some(text) = describe(&notice) {
                let embed = CreateEmbed::new().title("Music").description(text).color(color);
                if let Err(e) = channel
                    .send_message(&http, CreateMessage::new().embed(embed))
                    .await
                {
                    warn!(%channel, error = %e, "failed to post notice");
                }
            }
            if done {
                break;
            }
        }
        debug!(%channel, "notice relay finished");
    });
}

fn describe(notice: &SessionNotice) -> Option<String> {
    match notice {
        SessionNotice::TrackFailed { title, cause } => {
            Some(format!("Couldn't play **{title}** ({cause}), skipping it"))
        }
        SessionNotice::AutoAdvanceHalted { failures } => Some(format!(
            "{failures} tracks in a row failed to load, so playback stopped. Use skip to carry on"
        )),
        SessionNotice::TornDown(TeardownReason::IdleTimeout) => {
            Some("Left the voice channel after being idle".into())
        }
        SessionNotice::TornDown(TeardownReason::Kicked) => {
            Some("Disconnected from the voice channel, the queue was cleared".into())
        }
        SessionNotice::TornDown(TeardownReason::Requested | TeardownReason::Shutdown) => None,
    }
}
