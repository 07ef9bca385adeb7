// bases/jukebox/src/pipeline.rs
//! Download job pipeline. One job per track descriptor, driven sequentially
//! so the emitted event order matches the track order; a global semaphore
//! bounds how many worker invocations run at once across all requests.

use async_stream::stream;
use futures::Stream;
use media_downloader::MediaDownloader;
use serde::Serialize;
use spotify_client::{classify, normalize, ContentKind, Resolver, TrackDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Completed,
    Error,
}

/// One unit of the newline-delimited status stream returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: EventStatus,
    pub message: String,
}

impl ProgressEvent {
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Processing,
            message: message.into(),
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Completed,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Completed | EventStatus::Error)
    }
}

/// Job statuses in the order they may occur. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStatus {
    Pending,
    Searching,
    Downloading,
    Transcoding,
    Completed,
    Failed,
}

/// Whether a job stands alone or belongs to a playlist or album. Collection
/// items name themselves in their failure message since many tracks share
/// one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Single,
    CollectionItem,
}

/// One download job for one track descriptor. Lives only for the duration of
/// its request and is consumed when the terminal event is emitted.
struct DownloadJob {
    descriptor: TrackDescriptor,
    kind: JobKind,
    status: JobStatus,
    result_filename: Option<String>,
    error: Option<String>,
}

impl DownloadJob {
    fn new(descriptor: TrackDescriptor, kind: JobKind) -> Self {
        Self {
            descriptor,
            kind,
            status: JobStatus::Pending,
            result_filename: None,
            error: None,
        }
    }

    /// Move to a later status; attempts to go backwards are ignored.
    fn advance(&mut self, next: JobStatus) {
        if next > self.status {
            self.status = next;
        }
    }

    fn complete(&mut self, filename: String) {
        self.result_filename = Some(filename);
        self.advance(JobStatus::Completed);
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.advance(JobStatus::Failed);
    }

    fn into_terminal_event(self) -> ProgressEvent {
        match self.status {
            JobStatus::Completed => {
                if let Some(filename) = &self.result_filename {
                    info!("stored '{}' as {}", self.descriptor.title, filename);
                }
                ProgressEvent::completed(format!("Downloaded: {}", self.descriptor.title))
            }
            _ => {
                let reason = self.error.unwrap_or_else(|| "Unknown error".to_string());
                match self.kind {
                    JobKind::Single => ProgressEvent::error(reason),
                    JobKind::CollectionItem => {
                        ProgressEvent::error(format!("Failed: {} - {reason}", self.descriptor.title))
                    }
                }
            }
        }
    }
}

pub struct Pipeline {
    resolver: Arc<dyn Resolver>,
    downloader: Arc<MediaDownloader>,
    limiter: Arc<Semaphore>,
    job_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        downloader: Arc<MediaDownloader>,
        limiter: Arc<Semaphore>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            downloader,
            limiter,
            job_timeout,
        }
    }

    /// Drive the whole download job for one content URL, yielding events as
    /// they happen. Events are append-only and in order; every track ends in
    /// exactly one terminal `completed` or `error` event, and a failed track
    /// never aborts the rest of a collection. Dropping the stream cancels
    /// the in-flight worker call.
    pub fn run(self: Arc<Self>, url: String) -> impl Stream<Item = ProgressEvent> {
        stream! {
            // Share links carry tracking query parameters; strip them up
            // front so every later lookup and log line sees the clean form.
            let url = normalize(&url);
            let content = match classify(&url) {
                Some(content) => content,
                None => {
                    yield ProgressEvent::error("Invalid Spotify URL");
                    return;
                }
            };

            match content.kind {
                ContentKind::Track => {
                    yield ProgressEvent::processing("Fetching track info...");
                    let track = match self.resolver.resolve_track(&url).await {
                        Ok(track) => track,
                        Err(err) => {
                            error!("track lookup failed for {url}: {err}");
                            yield ProgressEvent::error("Could not fetch track info");
                            return;
                        }
                    };

                    yield ProgressEvent::processing(format!(
                        "Found: {} - {}",
                        track.title, track.artist
                    ));
                    yield ProgressEvent::processing(format!(
                        "Searching YouTube for: {} {}",
                        track.title, track.artist
                    ));

                    // Single tracks are filed under the artist's name.
                    let folder = track.artist.clone();
                    yield self.download_one(&track, &folder, JobKind::Single).await;
                }
                ContentKind::Playlist | ContentKind::Album => {
                    let label = match content.kind {
                        ContentKind::Playlist => "playlist",
                        _ => "album",
                    };
                    yield ProgressEvent::processing(format!("Fetching {label} info..."));

                    let name = match self.resolver.resolve_collection_name(&url).await {
                        Ok(name) => name,
                        Err(err) => {
                            error!("{label} name lookup failed for {url}: {err}");
                            yield ProgressEvent::error(format!("Could not fetch {label} info"));
                            return;
                        }
                    };
                    let tracks = match self.resolver.resolve_collection_tracks(&url).await {
                        Ok(tracks) if !tracks.is_empty() => tracks,
                        Ok(_) => {
                            yield ProgressEvent::error(format!("Could not fetch {label} info"));
                            return;
                        }
                        Err(err) => {
                            error!("{label} track lookup failed for {url}: {err}");
                            yield ProgressEvent::error(format!("Could not fetch {label} info"));
                            return;
                        }
                    };

                    let total = tracks.len();
                    yield ProgressEvent::processing(format!(
                        "Found {label} '{name}' with {total} tracks"
                    ));

                    for (index, track) in tracks.iter().enumerate() {
                        yield ProgressEvent::processing(format!(
                            "Downloading {}/{}: {}",
                            index + 1,
                            total,
                            track.title
                        ));
                        yield self.download_one(track, &name, JobKind::CollectionItem).await;
                    }
                }
            }
        }
    }

    /// One worker invocation under the global concurrency bound and the
    /// per-job timeout. Always resolves to the track's terminal event.
    async fn download_one(
        &self,
        track: &TrackDescriptor,
        target_folder: &str,
        kind: JobKind,
    ) -> ProgressEvent {
        let mut job = DownloadJob::new(track.clone(), kind);

        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                job.fail("download slots closed");
                return job.into_terminal_event();
            }
        };

        job.advance(JobStatus::Searching);
        let search_text = format!("{} {}", track.title, track.artist);
        job.advance(JobStatus::Downloading);
        let result = timeout(
            self.job_timeout,
            self.downloader.fetch_and_transcode(&search_text, target_folder),
        )
        .await;
        drop(permit);

        match result {
            Ok(Ok(outcome)) => {
                // Transcoding happens inside the tool; by the time it
                // returns, the file is in its final form.
                job.advance(JobStatus::Transcoding);
                job.complete(outcome.filename);
            }
            Ok(Err(err)) => {
                error!("download failed for '{}': {err}", track.title);
                job.fail(err.to_string());
            }
            Err(_) => {
                error!("download timed out for '{}'", track.title);
                job.fail("timed out");
            }
        }
        job.into_terminal_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use media_downloader::{DownloadError, DownloadOutcome, FetchTool};
    use spotify_client::ResolverError;
    use std::path::Path;
    use tempfile::TempDir;

    struct StubResolver {
        name: String,
        tracks: Vec<TrackDescriptor>,
        fail: bool,
        seen: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl StubResolver {
        fn new(name: &str, tracks: Vec<TrackDescriptor>, fail: bool) -> Self {
            Self {
                name: name.to_string(),
                tracks,
                fail,
                seen: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }

        fn seen_urls(&self) -> Arc<std::sync::Mutex<Vec<String>>> {
            self.seen.clone()
        }
    }

    fn descriptor(title: &str) -> TrackDescriptor {
        TrackDescriptor {
            title: title.to_string(),
            artist: "Test Artist".to_string(),
            album: "Test Album".to_string(),
            cover_url: None,
            source_url: format!("https://open.spotify.com/track/{title}"),
        }
    }

    #[async_trait]
    impl Resolver for StubResolver {
        async fn resolve_track(&self, url: &str) -> Result<TrackDescriptor, ResolverError> {
            self.seen.lock().unwrap().push(url.to_string());
            if self.fail {
                return Err(ResolverError::NotFound(url.to_string()));
            }
            Ok(self.tracks[0].clone())
        }

        async fn resolve_collection_name(&self, url: &str) -> Result<String, ResolverError> {
            if self.fail {
                return Err(ResolverError::NotFound(url.to_string()));
            }
            Ok(self.name.clone())
        }

        async fn resolve_collection_tracks(
            &self,
            url: &str,
        ) -> Result<Vec<TrackDescriptor>, ResolverError> {
            if self.fail {
                return Err(ResolverError::NotFound(url.to_string()));
            }
            Ok(self.tracks.clone())
        }
    }

    /// Fails any track whose title contains "Two".
    struct SelectiveFetchTool;

    #[async_trait]
    impl FetchTool for SelectiveFetchTool {
        async fn check_available(&self) -> Result<(), DownloadError> {
            Ok(())
        }

        async fn fetch_audio(
            &self,
            search_text: &str,
            _target_dir: &Path,
        ) -> Result<DownloadOutcome, DownloadError> {
            if search_text.contains("Two") {
                return Err(DownloadError::Failed("no suitable source".to_string()));
            }
            Ok(DownloadOutcome {
                filename: format!("{search_text}.mp3"),
                title: search_text.to_string(),
            })
        }
    }

    async fn pipeline_with(
        resolver: StubResolver,
        temp_dir: &TempDir,
    ) -> Arc<Pipeline> {
        let downloader = MediaDownloader::with_tool(temp_dir.path(), Arc::new(SelectiveFetchTool))
            .await
            .unwrap();
        Arc::new(Pipeline::new(
            Arc::new(resolver),
            Arc::new(downloader),
            Arc::new(Semaphore::new(2)),
            Duration::from_secs(30),
        ))
    }

    async fn collect(pipeline: Arc<Pipeline>, url: &str) -> Vec<ProgressEvent> {
        pipeline.run(url.to_string()).collect().await
    }

    #[tokio::test]
    async fn unrecognized_url_yields_a_single_error_event() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("", vec![], false);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://example.com/watch?v=abc").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, EventStatus::Error);
        assert_eq!(events[0].message, "Invalid Spotify URL");
    }

    #[tokio::test]
    async fn single_track_has_one_terminal_event_after_processing() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("", vec![descriptor("Song One")], false);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/track/abc123").await;

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1, "events: {events:?}");
        assert_eq!(terminal[0].status, EventStatus::Completed);
        assert_eq!(terminal[0].message, "Downloaded: Song One");

        // At least one processing event precedes the terminal one.
        assert!(events.len() > 1);
        assert!(events[..events.len() - 1]
            .iter()
            .all(|e| e.status == EventStatus::Processing));
    }

    #[tokio::test]
    async fn failed_resolver_lookup_is_a_terminal_error() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("", vec![], true);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/track/abc123").await;
        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Error);
        assert_eq!(last.message, "Could not fetch track info");
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn collection_failure_does_not_abort_remaining_tracks() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new(
            "Road Trip",
            vec![
                descriptor("Song One"),
                descriptor("Song Two"),
                descriptor("Song Three"),
            ],
            false,
        );
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/playlist/p123").await;

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 3, "events: {events:?}");
        assert_eq!(terminal[0].status, EventStatus::Completed);
        assert_eq!(terminal[1].status, EventStatus::Error);
        assert!(terminal[1].message.starts_with("Failed: Song Two"));
        assert_eq!(terminal[2].status, EventStatus::Completed);

        // Each track's terminal event is preceded by its own progress line.
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        let first = messages
            .iter()
            .position(|m| *m == "Downloading 1/3: Song One")
            .unwrap();
        let second = messages
            .iter()
            .position(|m| *m == "Downloading 2/3: Song Two")
            .unwrap();
        let third = messages
            .iter()
            .position(|m| *m == "Downloading 3/3: Song Three")
            .unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn album_events_announce_the_album_name() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("Greatest Hits", vec![descriptor("Song One")], false);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/album/a123").await;
        assert!(events
            .iter()
            .any(|e| e.message == "Found album 'Greatest Hits' with 1 tracks"));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn empty_collection_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("Empty", vec![], false);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/playlist/p123").await;
        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Error);
        assert_eq!(last.message, "Could not fetch playlist info");
    }

    #[tokio::test]
    async fn query_parameters_are_stripped_before_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("", vec![descriptor("Song One")], false);
        let seen = resolver.seen_urls();
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(
            pipeline,
            "https://open.spotify.com/track/abc123?si=share-token",
        )
        .await;

        assert!(events.iter().any(|e| e.status == EventStatus::Completed));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["https://open.spotify.com/track/abc123"]
        );
    }

    #[tokio::test]
    async fn single_track_failure_reports_the_worker_message() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = StubResolver::new("", vec![descriptor("Song Two")], false);
        let pipeline = pipeline_with(resolver, &temp_dir).await;

        let events = collect(pipeline, "https://open.spotify.com/track/abc123").await;

        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Error);
        assert_eq!(last.message, "download failed: no suitable source");
    }

    #[test]
    fn job_status_never_moves_backwards() {
        let mut job = DownloadJob::new(descriptor("Song One"), JobKind::Single);
        assert_eq!(job.status, JobStatus::Pending);

        job.advance(JobStatus::Downloading);
        assert_eq!(job.status, JobStatus::Downloading);

        // Attempts to go backwards are ignored.
        job.advance(JobStatus::Searching);
        assert_eq!(job.status, JobStatus::Downloading);

        job.complete("Song One.mp3".to_string());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn failed_collection_item_names_its_track() {
        let mut job = DownloadJob::new(descriptor("Song One"), JobKind::CollectionItem);
        job.fail("no suitable source");

        let event = job.into_terminal_event();
        assert_eq!(event.status, EventStatus::Error);
        assert_eq!(event.message, "Failed: Song One - no suitable source");
    }

    #[test]
    fn failed_single_job_keeps_the_bare_message() {
        let mut job = DownloadJob::new(descriptor("Song One"), JobKind::Single);
        job.fail("no suitable source");

        let event = job.into_terminal_event();
        assert_eq!(event.status, EventStatus::Error);
        assert_eq!(event.message, "no suitable source");
    }

    #[test]
    fn events_serialize_with_lowercase_status() {
        let event = ProgressEvent::processing("Fetching track info...");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"status":"processing","message":"Fetching track info..."}"#
        );
    }
}
