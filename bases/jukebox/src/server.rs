// bases/jukebox/src/server.rs
use crate::config::Config;
use crate::pipeline::Pipeline;
use axum::{
    body::Body,
    extract::{Path as UrlPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use library_store::{LibraryEntry, LibraryStore};
use media_downloader::MediaDownloader;
use serde::Deserialize;
use serde_json::json;
use spotify_client::SpotifyClient;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

const DEFAULT_COVER: &[u8] = include_bytes!("../static/default_cover.png");
const LONG_CACHE: &str = "public, max-age=31536000";

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    store: Arc<LibraryStore>,
}

/// Run the jukebox HTTP server
pub async fn run(config: Config) -> color_eyre::Result<()> {
    let resolver = Arc::new(SpotifyClient::new(
        config.credentials.client_id.clone(),
        config.credentials.client_secret.clone(),
    ));
    let downloader = Arc::new(MediaDownloader::new(&config.download_dir).await?);
    let store = Arc::new(LibraryStore::new(config.download_dir.clone()));
    let limiter = Arc::new(Semaphore::new(config.max_concurrent_downloads));
    let pipeline = Arc::new(Pipeline::new(
        resolver,
        downloader,
        limiter,
        config.job_timeout,
    ));

    let state = AppState { pipeline, store };

    let app = Router::new()
        .route("/download", post(download))
        .route("/stats", get(stats))
        .route("/play/*path", get(play))
        .route("/download/*path", get(download_file))
        .route("/cover/*path", get(cover))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .nest_service("/static", ServeDir::new(config.static_dir.clone()))
        .fallback_service(ServeDir::new(config.static_dir.clone()))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Jukebox listening on http://localhost:{}", config.port);
    info!("Library root: {}", config.download_dir.display());

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    url: String,
}

/// POST /download: stream job progress back as newline-delimited JSON. The
/// first event reaches the client before the job finishes; dropping the
/// connection drops the stream and cancels the in-flight worker call.
async fn download(State(state): State<AppState>, Json(request): Json<DownloadRequest>) -> Response {
    info!("download requested for {}", request.url);

    let events = state.pipeline.clone().run(request.url);
    let body = Body::from_stream(events.map(|event| {
        let mut line = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        Ok::<_, Infallible>(line)
    }));

    (
        [(header::CONTENT_TYPE, "application/json".to_string())],
        body,
    )
        .into_response()
}

/// GET /stats: library overview grouped by folder plus a flat newest-first
/// track list.
async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.store.clone();
    let payload = tokio::task::spawn_blocking(move || stats_payload(&store))
        .await
        .unwrap_or_else(|_| empty_stats());
    Json(payload)
}

fn empty_stats() -> serde_json::Value {
    json!({"count": 0, "size": "0.00 MB", "library": {}, "tracks": []})
}

fn stats_payload(store: &LibraryStore) -> serde_json::Value {
    let entries = store.list_entries();
    let count = entries.len();
    let size_bytes: u64 = entries.iter().map(|entry| entry.size_bytes).sum();

    let mut library: BTreeMap<String, Vec<&LibraryEntry>> = BTreeMap::new();
    for entry in &entries {
        library.entry(entry.folder.clone()).or_default().push(entry);
    }

    json!({
        "count": count,
        "size": format!("{:.2} MB", size_bytes as f64 / (1024.0 * 1024.0)),
        "library": library,
        "tracks": entries,
    })
}

/// GET /play/<path>: audio streamed with Range support so players can seek.
async fn play(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
    request: Request,
) -> Response {
    serve_audio(&state.store, &path, false, request).await
}

/// GET /download/<path>: the same file served as an attachment.
async fn download_file(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
    request: Request,
) -> Response {
    serve_audio(&state.store, &path, true, request).await
}

async fn serve_audio(
    store: &LibraryStore,
    relative_path: &str,
    as_attachment: bool,
    request: Request,
) -> Response {
    let not_found =
        || (StatusCode::NOT_FOUND, Json(json!({"error": "File not found"}))).into_response();

    let full_path = match store.resolve(relative_path) {
        Ok(path) => path,
        Err(_) => return not_found(),
    };
    match tokio::fs::metadata(&full_path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return not_found(),
    }

    // ServeFile honors Range and conditional request headers.
    let served = match ServeFile::new(&full_path).try_call(request).await {
        Ok(response) => response,
        Err(_) => return not_found(),
    };

    let mut response = served.map(Body::new);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(LONG_CACHE));
    if as_attachment {
        let filename = full_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative_path.to_string());
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

/// GET /cover/<path>: embedded cover art, or the placeholder image for
/// missing, unreadable, or pictureless files. Never an error to the caller.
async fn cover(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    let store = state.store.clone();
    let (bytes, mime) = tokio::task::spawn_blocking(move || store.read_cover(&path))
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| (DEFAULT_COVER.to_vec(), "image/png".to_string()));

    (
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, LONG_CACHE.to_string()),
        ],
        bytes,
    )
        .into_response()
}
