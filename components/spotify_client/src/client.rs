// components/spotify_client/src/client.rs
use crate::types::{Resolver, ResolverError, TrackDescriptor};
use crate::url::{classify, ContentKind, ContentRef};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Client-credentials client for the Spotify Web API. The access token is
/// cached and refreshed shortly before it expires.
pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl SpotifyClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, ResolverError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("requesting a fresh client-credentials token");
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ResolverError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        // Refresh a minute before upstream expiry.
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ResolverError> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ResolverError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolverError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    fn content_ref(url: &str) -> Result<ContentRef, ResolverError> {
        classify(url).ok_or_else(|| ResolverError::NotFound(url.to_string()))
    }

    async fn playlist_tracks(&self, id: &str) -> Result<Vec<TrackDescriptor>, ResolverError> {
        let mut page_url = format!("{API_BASE}/playlists/{id}/tracks");
        let mut tracks = Vec::new();
        loop {
            let page: ApiPage<ApiPlaylistItem> = self.get_json(&page_url).await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(descriptor_from_track),
            );
            match page.next {
                Some(next) => page_url = next,
                None => break,
            }
        }
        Ok(tracks)
    }

    async fn album_tracks(&self, id: &str) -> Result<Vec<TrackDescriptor>, ResolverError> {
        // Album track listings carry no album name or artwork of their own,
        // so fetch the album object once and fill those in.
        let album: ApiAlbum = self.get_json(&format!("{API_BASE}/albums/{id}")).await?;
        let cover_url = album.images.first().map(|image| image.url.clone());

        let mut page_url = format!("{API_BASE}/albums/{id}/tracks");
        let mut tracks = Vec::new();
        loop {
            let page: ApiPage<ApiAlbumTrack> = self.get_json(&page_url).await?;
            tracks.extend(page.items.into_iter().map(|track| TrackDescriptor {
                title: track.name,
                artist: first_artist(&track.artists),
                album: album.name.clone(),
                cover_url: cover_url.clone(),
                source_url: track.external_urls.spotify.unwrap_or_default(),
            }));
            match page.next {
                Some(next) => page_url = next,
                None => break,
            }
        }
        Ok(tracks)
    }
}

#[async_trait]
impl Resolver for SpotifyClient {
    async fn resolve_track(&self, url: &str) -> Result<TrackDescriptor, ResolverError> {
        let reference = Self::content_ref(url)?;
        let track: ApiTrack = self
            .get_json(&format!("{API_BASE}/tracks/{}", reference.id))
            .await?;
        Ok(descriptor_from_track(track))
    }

    async fn resolve_collection_name(&self, url: &str) -> Result<String, ResolverError> {
        let reference = Self::content_ref(url)?;
        match reference.kind {
            ContentKind::Playlist => {
                let playlist: ApiNamed = self
                    .get_json(&format!("{API_BASE}/playlists/{}?fields=name", reference.id))
                    .await?;
                Ok(playlist.name)
            }
            ContentKind::Album => {
                let album: ApiNamed = self
                    .get_json(&format!("{API_BASE}/albums/{}", reference.id))
                    .await?;
                Ok(album.name)
            }
            ContentKind::Track => Err(ResolverError::NotFound(url.to_string())),
        }
    }

    async fn resolve_collection_tracks(
        &self,
        url: &str,
    ) -> Result<Vec<TrackDescriptor>, ResolverError> {
        let reference = Self::content_ref(url)?;
        match reference.kind {
            ContentKind::Playlist => self.playlist_tracks(&reference.id).await,
            ContentKind::Album => self.album_tracks(&reference.id).await,
            ContentKind::Track => Err(ResolverError::NotFound(url.to_string())),
        }
    }
}

// Wire shapes, limited to the fields the resolver actually selects.

#[derive(Deserialize)]
struct ApiTrack {
    name: String,
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbumRef>,
    external_urls: ApiExternalUrls,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiAlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Deserialize)]
struct ApiAlbum {
    name: String,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Deserialize)]
struct ApiExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct ApiNamed {
    name: String,
}

#[derive(Deserialize)]
struct ApiPage<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiAlbumTrack {
    name: String,
    artists: Vec<ApiArtist>,
    external_urls: ApiExternalUrls,
}

fn first_artist(artists: &[ApiArtist]) -> String {
    artists
        .first()
        .map(|artist| artist.name.clone())
        .unwrap_or_else(|| "Unknown Artist".to_string())
}

fn descriptor_from_track(track: ApiTrack) -> TrackDescriptor {
    let artist = first_artist(&track.artists);
    let (album, cover_url) = match track.album {
        Some(album) => {
            let cover = album.images.first().map(|image| image.url.clone());
            (album.name, cover)
        }
        None => ("Unknown Album".to_string(), None),
    };
    TrackDescriptor {
        title: track.name,
        artist,
        album,
        cover_url,
        source_url: track.external_urls.spotify.unwrap_or_default(),
    }
}
