//! Contract for turning a user query into playable entries.

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::track::{RequesterId, TrackEntry};

/// May be slow and network-bound. Sessions never call it with their lock held.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// One entry for a single track, several for a playlist.
    async fn resolve(
        &self,
        query: &str,
        requester: RequesterId,
    ) -> Result<Vec<TrackEntry>, ResolveError>;
}
