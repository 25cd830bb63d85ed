use musicq::{DisplayError, DisplayHandle, DisplaySink, NowPlayingCard};
use serenity::async_trait;
use serenity::builder::{CreateEmbed, CreateMessage, EditMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};
use std::sync::Arc;

/// Posts the now-playing card as an embed in the text channel the session
/// was started from.
pub struct ChannelDisplay {
    http: Arc<Http>,
    channel: ChannelId,
    color: u32,
}

impl ChannelDisplay {
    pub fn new(http: Arc<Http>, channel: ChannelId, color: u32) -> Self {
        Self { http, channel, color }
    }

    fn embed(&self, card: &NowPlayingCard) -> CreateEmbed {
        let mut title: String = card.title.chars().take(240).collect();
        if title.len() < card.title.len() {
            title.push_str("...");
        }

        let mut embed = CreateEmbed::new()
            .title(format!("Now playing: {title}"))
            .description(format!(
                "Requested by {}\n{}",
                card.requester,
                card.status_line()
            ))
            .color(self.color);
        if card.url.starts_with("http") {
            embed = embed.url(card.url.clone());
        }
        if let Some(thumbnail) = &card.thumbnail {
            embed = embed.thumbnail(thumbnail.clone());
        }
        embed
    }
}

fn display_err(e: serenity::Error) -> DisplayError {
    DisplayError(e.to_string())
}

#[async_trait]
impl DisplaySink for ChannelDisplay {
    async fn show(&self, card: &NowPlayingCard) -> Result<DisplayHandle, DisplayError> {
        let message = self
            .channel
            .send_message(&self.http, CreateMessage::new().embed(self.embed(card)))
            .await
            .map_err(display_err)?;
        Ok(DisplayHandle {
            channel: message.channel_id.get(),
            message: message.id.get(),
        })
    }

    async fn replace(
        &self,
        handle: DisplayHandle,
        card: &NowPlayingCard,
    ) -> Result<(), DisplayError> {
        ChannelId::new(handle.channel)
            .edit_message(
                &self.http,
                MessageId::new(handle.message),
                EditMessage::new().embed(self.embed(card)),
            )
            .await
            .map_err(display_err)?;
        Ok(())
    }

    async fn clear(&self, handle: DisplayHandle) -> Result<(), DisplayError> {
        ChannelId::new(handle.channel)
            .delete_message(&self.http, MessageId::new(handle.message))
            .await
            .map_err(display_err)
    }
}
