// components/media_downloader/src/lib.rs
mod types;
mod utils;
mod ytdlp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use types::{DownloadError, DownloadOutcome};
pub use utils::sanitize_folder_name;
pub use ytdlp::{FetchTool, YtDlp};

pub struct MediaDownloader {
    download_root: PathBuf,
    tool: Arc<dyn FetchTool>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader that will store files under the given root
    pub async fn new(download_root: impl AsRef<Path>) -> Result<Self, DownloadError> {
        Self::with_tool(download_root, Arc::new(YtDlp)).await
    }

    /// Create a new MediaDownloader with a specific fetch tool implementation
    pub async fn with_tool(
        download_root: impl AsRef<Path>,
        tool: Arc<dyn FetchTool>,
    ) -> Result<Self, DownloadError> {
        tool.check_available().await?;

        let download_root = download_root.as_ref().to_owned();
        tokio::fs::create_dir_all(&download_root).await?;

        Ok(Self {
            download_root,
            tool,
        })
    }

    pub fn root(&self) -> &Path {
        &self.download_root
    }

    /// Download and transcode the best search hit for `search_text` into a
    /// folder under the library root, creating the folder if absent. The
    /// folder name is sanitized before use; an empty name after sanitization
    /// lands the file at the root itself.
    pub async fn fetch_and_transcode(
        &self,
        search_text: &str,
        target_folder: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        let folder = sanitize_folder_name(target_folder);
        let target_dir = if folder.is_empty() {
            self.download_root.clone()
        } else {
            self.download_root.join(&folder)
        };
        tokio::fs::create_dir_all(&target_dir).await?;

        self.tool.fetch_audio(search_text, &target_dir).await
    }
}
