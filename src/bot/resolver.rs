use musicq::{RequesterId, ResolveError, ResolvedTrack, Resolver, TrackEntry};
use serenity::async_trait;
use songbird::input::{AudioStreamError, Compose, YoutubeDl};
use tracing::debug;

/// Looks queries up with yt-dlp. URLs are used as given, anything else is
/// a search and takes the first hit.
pub struct YtDlpResolver {
    http: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

fn classify(err: AudioStreamError, searched: bool) -> ResolveError {
    match err {
        AudioStreamError::RetryIn(_) => ResolveError::RateLimited,
        AudioStreamError::Unsupported => ResolveError::Unplayable("unsupported source".into()),
        _ if searched => ResolveError::NotFound,
        other => ResolveError::Unplayable(other.to_string()),
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(
        &self,
        query: &str,
        requester: RequesterId,
    ) -> Result<Vec<TrackEntry>, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound);
        }

        let searched = !is_url(query);
        let mut source = if searched {
            YoutubeDl::new_search(self.http.clone(), query.to_string())
        } else {
            YoutubeDl::new(self.http.clone(), query.to_string())
        };

        let meta = source
            .aux_metadata()
            .await
            .map_err(|e| classify(e, searched))?;

        let url = meta.source_url.clone().unwrap_or_else(|| query.to_string());
        let title = meta
            .title
            .clone()
            .or_else(|| meta.track.clone())
            .unwrap_or_else(|| url.clone());
        debug!(query, %title, duration = ?meta.duration, "resolved");

        let track = ResolvedTrack {
            title,
            url,
            artist: meta.artist.clone(),
            thumbnail: meta.thumbnail.clone(),
        };
        Ok(vec![TrackEntry::new(track, requester, meta.duration)])
    }
}
