// components/spotify_client/src/types.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no content found for {0}")]
    NotFound(String),

    #[error("spotify request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spotify rejected the request ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("spotify authentication failed: {0}")]
    Auth(String),
}

/// Normalized description of one song, independent of its eventual audio
/// source. Produced once by the resolver and consumed once per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
    pub source_url: String,
}

#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    /// Look up a single track by its content URL.
    async fn resolve_track(&self, url: &str) -> Result<TrackDescriptor, ResolverError>;

    /// Display name of a playlist or album, pre-sanitization.
    async fn resolve_collection_name(&self, url: &str) -> Result<String, ResolverError>;

    /// The complete ordered track list of a playlist or album. The resolver
    /// follows upstream pagination cursors internally.
    async fn resolve_collection_tracks(&self, url: &str)
        -> Result<Vec<TrackDescriptor>, ResolverError>;
}
