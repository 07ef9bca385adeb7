// components/spotify_client/src/lib.rs
mod client;
mod types;
mod url;

pub use client::SpotifyClient;
pub use types::{Resolver, ResolverError, TrackDescriptor};
pub use crate::url::{classify, normalize, ContentKind, ContentRef};
