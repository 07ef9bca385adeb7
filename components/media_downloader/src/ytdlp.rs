// components/media_downloader/src/ytdlp.rs
use crate::types::{DownloadError, DownloadOutcome};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

// 192 kbps trades a little fidelity for materially faster downloads.
const AUDIO_FORMAT: &str = "mp3";
const AUDIO_QUALITY: &str = "192K";
const SOCKET_TIMEOUT_SECS: &str = "30";
const RETRIES: &str = "3";

#[async_trait]
pub trait FetchTool: Send + Sync {
    /// Check that the tool and its dependencies are present.
    async fn check_available(&self) -> Result<(), DownloadError>;

    /// Search the platform for `search_text`, download the best audio hit
    /// into `target_dir`, transcode it, and embed metadata and cover art.
    /// Reports the actual resulting file name and title.
    async fn fetch_audio(
        &self,
        search_text: &str,
        target_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError>;
}

pub struct YtDlp;

#[async_trait]
impl FetchTool for YtDlp {
    async fn check_available(&self) -> Result<(), DownloadError> {
        which::which("yt-dlp")
            .map(|_| ())
            .map_err(|_| DownloadError::ToolNotFound("yt-dlp"))
    }

    async fn fetch_audio(
        &self,
        search_text: &str,
        target_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let template = target_dir.join("%(title)s.%(ext)s");
        let template = template
            .to_str()
            .ok_or_else(|| DownloadError::Failed("invalid output path".to_string()))?;

        info!("starting yt-dlp for: {search_text}");
        // kill_on_drop frees the child process when the caller's future is
        // dropped, e.g. on client disconnect.
        let output = Command::new("yt-dlp")
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(AUDIO_FORMAT)
            .arg("--audio-quality")
            .arg(AUDIO_QUALITY)
            .arg("--embed-metadata")
            .arg("--embed-thumbnail")
            .arg("--no-playlist")
            .arg("--socket-timeout")
            .arg(SOCKET_TIMEOUT_SECS)
            .arg("--retries")
            .arg(RETRIES)
            .arg("--fragment-retries")
            .arg(RETRIES)
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--print")
            .arg("after_move:title")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-simulate")
            .arg("--output")
            .arg(template)
            .arg(format!("ytsearch1:{search_text}"))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::Failed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("yt-dlp reported: {}", stdout.trim());
        parse_print_output(&stdout)
    }
}

/// The two `--print after_move:` flags make yt-dlp report one title line and
/// one filepath line once post-processing has finished.
fn parse_print_output(stdout: &str) -> Result<DownloadOutcome, DownloadError> {
    let mut lines = stdout.lines().filter(|line| !line.trim().is_empty());
    let title = lines
        .next()
        .ok_or_else(|| DownloadError::BadToolOutput("missing title line".to_string()))?;
    let filepath = lines
        .next()
        .ok_or_else(|| DownloadError::BadToolOutput("missing filepath line".to_string()))?;

    let filename = Path::new(filepath.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| DownloadError::BadToolOutput(format!("unusable filepath: {filepath}")))?;

    Ok(DownloadOutcome {
        filename,
        title: title.trim().to_string(),
    })
}
