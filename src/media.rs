//! Campaign attachments: one slot per media kind, and the payload loader.
//!
//! A slot holds at most one file reference. Replacing or clearing a slot
//! deletes the file it previously referenced so old uploads never pile up.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{FileStore, StoreError};

/// Errors from the media subsystem.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The media kind name is not recognized.
    #[error("invalid media type: {0}")]
    UnknownKind(String),

    /// The referenced file could not be removed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The media file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being loaded.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Kind of attachment a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image, sent with the message as caption.
    Image,
    /// Audio clip, sent as a voice note without caption.
    Audio,
    /// Video clip, sent with the message as caption.
    Video,
}

impl MediaKind {
    /// All media kinds.
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl MediaKind {
    fn upload_subdir(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// `{kind}-{unix millis}-{random}{.ext}`, keeping the source extension.
fn upload_name(kind: MediaKind, source: &Path) -> String {
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    format!(
        "{kind}-{}-{}{ext}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(MediaError::UnknownKind(s.to_owned())),
        }
    }
}

/// What a campaign sends: plain text or one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Message body only.
    #[default]
    Text,
    /// Image with caption.
    Image,
    /// Voice note.
    Audio,
    /// Video with caption.
    Video,
}

impl ContentKind {
    /// The media slot this content needs, if any.
    pub fn media_kind(self) -> Option<MediaKind> {
        match self {
            Self::Text => None,
            Self::Image => Some(MediaKind::Image),
            Self::Audio => Some(MediaKind::Audio),
            Self::Video => Some(MediaKind::Video),
        }
    }

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl From<MediaKind> for ContentKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image,
            MediaKind::Audio => Self::Audio,
            MediaKind::Video => Self::Video,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("text") {
            return Ok(Self::Text);
        }
        s.parse::<MediaKind>().map(Self::from)
    }
}

/// The currently configured attachment per media kind.
pub struct MediaSlotStore {
    store: Arc<dyn FileStore>,
    slots: Mutex<BTreeMap<MediaKind, PathBuf>>,
}

impl MediaSlotStore {
    /// Create a store with every slot empty.
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<MediaKind, PathBuf>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the `kind` slot at `path`, deleting the previously referenced
    /// file. Deletion is best-effort: failures are logged, not returned.
    pub fn set(&self, kind: MediaKind, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        let mut slots = self.lock();

        if let Some(previous) = slots.get(&kind) {
            if *previous != path && self.store.exists(previous) {
                match self.store.delete(previous) {
                    Ok(()) => debug!(%kind, path = %previous.display(), "old media file deleted"),
                    Err(e) => warn!(%kind, error = %e, "could not delete old media file"),
                }
            }
        }

        slots.insert(kind, path.clone());
        info!(
            %kind,
            file = %path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            "media file set"
        );
        path
    }

    /// Copy `source` into `upload_dir` under a fresh name and point the
    /// `kind` slot at the copy. `source` itself is left untouched, so
    /// replacing the slot later only ever deletes files segcast owns.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Store`] if the copy fails; the slot is left
    /// unchanged in that case.
    pub fn import(
        &self,
        kind: MediaKind,
        source: &Path,
        upload_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        let target = upload_dir.join(kind.upload_subdir()).join(upload_name(kind, source));
        self.store.copy(source, &target)?;
        debug!(%kind, from = %source.display(), to = %target.display(), "media imported");
        Ok(self.set(kind, target))
    }

    /// The file currently referenced by `kind`, if any.
    pub fn get(&self, kind: MediaKind) -> Option<PathBuf> {
        self.lock().get(&kind).cloned()
    }

    /// The file referenced by `kind`, only if it still exists on disk.
    pub fn existing(&self, kind: MediaKind) -> Option<PathBuf> {
        self.get(kind).filter(|p| self.store.exists(p))
    }

    /// Delete the file referenced by `kind` and empty the slot.
    ///
    /// Returns the path that was referenced, or `None` for an empty slot.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Store`] if the file exists but could not be
    /// deleted; the slot keeps its reference in that case.
    pub fn clear(&self, kind: MediaKind) -> Result<Option<PathBuf>, MediaError> {
        let mut slots = self.lock();
        let Some(current) = slots.get(&kind) else {
            return Ok(None);
        };
        if self.store.exists(current) {
            self.store.delete(current)?;
        }
        let removed = slots.remove(&kind);
        info!(%kind, "media cleared");
        Ok(removed)
    }

    /// Parse `kind` and clear that slot.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::UnknownKind`] for an unrecognized name, or any
    /// error from [`MediaSlotStore::clear`].
    pub fn clear_named(&self, kind: &str) -> Result<Option<PathBuf>, MediaError> {
        self.clear(kind.parse()?)
    }
}

/// A media file loaded and encoded for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaPayload {
    /// MIME type inferred from the file extension.
    pub mimetype: String,
    /// Base64-encoded file content.
    pub data: String,
    /// Original file name.
    pub filename: String,
}

impl MediaPayload {
    /// Read and encode a media file.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Read`] if the file cannot be read.
    pub async fn from_file(path: &Path) -> Result<Self, MediaError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(file = %filename, bytes = bytes.len(), "media file loaded");
        Ok(Self {
            mimetype: mime_for(path).to_owned(),
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            filename,
        })
    }
}

/// MIME type by file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
