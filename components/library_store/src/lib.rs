// components/library_store/src/lib.rs
//! On-disk audio library. The directory tree is the sole source of truth:
//! listings are recomputed per request by walking the root and reading
//! embedded tags, never from a separate index.

use chrono::{DateTime, Utc};
use lofty::{Accessor, AudioFile, Probe, TaggedFileExt};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

pub const AUDIO_EXTENSION: &str = "mp3";
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("path escapes the library root: {0}")]
    PathOutsideRoot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One track in the library. `relative_path` always uses forward slashes and
/// is the stable identifier used by playback and cover-art lookups.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryEntry {
    pub filename: String,
    pub relative_path: String,
    pub folder: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: u64,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate every audio file under the root, newest first. A file whose
    /// tags cannot be read still appears with fallback fields; enumeration
    /// never fails on a single bad file.
    pub fn list_entries(&self) -> Vec<LibraryEntry> {
        let mut entries = Vec::new();
        for item in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !item.file_type().is_file() {
                continue;
            }
            let path = item.path();
            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(AUDIO_EXTENSION))
                .unwrap_or(false);
            if !is_audio {
                continue;
            }
            if let Some(entry) = self.entry_for(path) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        entries
    }

    /// Resolve a web-facing relative path to a file inside the root,
    /// rejecting anything that would escape it.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StoreError> {
        let candidate = Path::new(relative_path);
        let escapes = candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes {
            return Err(StoreError::PathOutsideRoot(relative_path.to_string()));
        }
        Ok(self.root.join(candidate))
    }

    /// Embedded front-cover bytes and mime type. `None` when the file is
    /// missing, unreadable, or carries no picture; the web layer substitutes
    /// a placeholder so the lookup never fails observably.
    pub fn read_cover(&self, relative_path: &str) -> Option<(Vec<u8>, String)> {
        let path = self.resolve(relative_path).ok()?;
        if !path.is_file() {
            return None;
        }
        let tagged = Probe::open(&path).ok()?.read().ok()?;
        let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
        let picture = tag.pictures().first()?;
        let mime = picture
            .mime_type()
            .map(|mime| mime.as_str().to_string())
            .unwrap_or_else(|| "image/png".to_string());
        Some((picture.data().to_vec(), mime))
    }

    fn entry_for(&self, path: &Path) -> Option<LibraryEntry> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let filename = path.file_name()?.to_string_lossy().into_owned();
        let folder = relative
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(to_forward_slashes)
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        let metadata = std::fs::metadata(path).ok()?;
        let modified_at = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .into();

        let tags = read_tags(path).unwrap_or_else(|error| {
            warn!("falling back to defaults for {}: {error}", path.display());
            FileTags::default()
        });

        Some(LibraryEntry {
            title: tags.title.unwrap_or_else(|| filename.clone()),
            artist: tags.artist.unwrap_or_else(|| "Unknown Artist".to_string()),
            album: tags.album.unwrap_or_else(|| "Unknown Album".to_string()),
            duration_seconds: tags.duration_seconds,
            size_bytes: metadata.len(),
            relative_path: to_forward_slashes(relative),
            filename,
            folder,
            modified_at,
        })
    }
}

#[derive(Default)]
struct FileTags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration_seconds: u64,
}

fn read_tags(path: &Path) -> Result<FileTags, lofty::LoftyError> {
    let tagged = Probe::open(path)?.read()?;
    let duration_seconds = tagged.properties().duration().as_secs();
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
    Ok(FileTags {
        title: tag.and_then(|t| t.title().map(|value| value.to_string())),
        artist: tag.and_then(|t| t.artist().map(|value| value.to_string())),
        album: tag.and_then(|t| t.album().map(|value| value.to_string())),
        duration_seconds,
    })
}

fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
