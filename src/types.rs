//! Core types for mediaproc

use serde::{Deserialize, Serialize};

use crate::blob::{BlobHandle, ScopeId};
use crate::error::ErrorDetail;

/// Status of an audio extraction run
///
/// Exactly one status is active at a time. `Completed` and `Error` are
/// terminal: no further automatic transition occurs without an explicit
/// caller action (`reset()`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// No run in flight; the only state that accepts `extract_audio`
    #[default]
    Idle,
    /// Initializing the transcoding engine (no progress fraction reported)
    Loading,
    /// Fetching the remote source bytes
    Downloading,
    /// Handing bytes to the transcoding engine
    Converting,
    /// Run finished; the audio artifact is available
    Completed,
    /// Run failed; the error detail is available
    Error,
}

impl ExtractionStatus {
    /// Returns `true` for `Completed` and `Error`
    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionStatus::Completed | ExtractionStatus::Error)
    }

    /// Returns `true` while a run is in flight (Loading, Downloading, Converting)
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExtractionStatus::Loading | ExtractionStatus::Downloading | ExtractionStatus::Converting
        )
    }
}

/// Byte-level download progress, populated only during `Downloading`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Bytes received so far (monotonically non-decreasing within a run)
    pub loaded_bytes: u64,
    /// Total bytes if the server reported a content length
    pub total_bytes: Option<u64>,
}

/// Observable snapshot of one extraction run
///
/// Delivered latest-state-wins through the extractor's watch channel.
/// Field population follows the status: `progress` only during
/// `Downloading`, `artifact` only in `Completed`, `error` only in `Error`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionState {
    /// Current phase of the run
    pub status: ExtractionStatus,

    /// Progress percentage for the current phase (None = indeterminate)
    ///
    /// Monotonically non-decreasing within a phase; the Converting scale is
    /// independent of the Downloading scale.
    pub percent: Option<u8>,

    /// Byte-level progress, present only while downloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressInfo>,

    /// Structured failure, present only in the Error state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    /// Downloadable output, present only in the Completed state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<AudioArtifact>,

    /// Run generation, used to reject writes from superseded tasks
    #[serde(skip)]
    pub(crate) run: u64,
}

/// The downloadable output of a completed extraction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Handle to the audio bytes in the blob store
    pub handle: BlobHandle,
    /// Suggested download filename (`"<sanitized label>.<format>"`)
    pub filename: String,
    /// Size of the audio payload in bytes
    pub size_bytes: u64,
}

/// One image slot in a batch acquisition
///
/// Invariant: once `loading == false`, exactly one of `failed == true` or
/// `handle.is_some()` holds (never both, never neither).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionItem {
    /// Stable position in the batch (0..N-1)
    pub index: usize,
    /// Fetch still in flight
    pub loading: bool,
    /// Fetch reached a terminal failure
    pub failed: bool,
    /// Blob handle of the fetched bytes on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<BlobHandle>,
}

impl AcquisitionItem {
    /// A fresh, still-loading slot at `index`
    pub(crate) fn pending(index: usize) -> Self {
        Self {
            index,
            loading: true,
            failed: false,
            handle: None,
        }
    }

    /// Returns `true` once the fetch succeeded and a handle is held
    pub fn is_success(&self) -> bool {
        !self.loading && !self.failed && self.handle.is_some()
    }
}

/// Observable snapshot of a batch acquisition
///
/// Ordered by item index. The batch is *settled* once every item is
/// non-loading; callers derive settlement by scanning, there is no
/// aggregate callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// Items indexed by position
    pub items: Vec<AcquisitionItem>,

    /// Batch generation, used to reject writes from superseded fetch tasks
    #[serde(skip)]
    pub(crate) generation: u64,

    /// Revocation scope owning every handle this batch created
    #[serde(skip)]
    pub(crate) scope: Option<ScopeId>,
}

impl BatchSnapshot {
    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` for a batch with no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` once every item has reached a terminal outcome
    pub fn is_settled(&self) -> bool {
        self.items.iter().all(|item| !item.loading)
    }

    /// Number of items that have finished loading (success or failure)
    pub fn loaded_count(&self) -> usize {
        self.items.iter().filter(|item| !item.loading).count()
    }

    /// Number of items holding a fetched handle
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    /// Number of items that failed
    pub fn fail_count(&self) -> usize {
        self.items.iter().filter(|item| item.failed).count()
    }
}

/// Aggregate progress of an archive packaging run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveJob {
    /// Items processed so far (failed items count as processed)
    pub processed: usize,
    /// Total items in the batch
    pub total: usize,
    /// Entries written into the archive
    pub succeeded: usize,
    /// Items skipped or unreadable
    pub failed: usize,
}

impl ArchiveJob {
    /// Packaging progress as a rounded percentage (0 for an empty job)
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.processed as f64 / self.total as f64) * 100.0;
        pct.round().min(100.0) as u8
    }
}

/// The downloadable output of a packaging run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveArtifact {
    /// Handle to the zip bytes in the blob store
    pub handle: BlobHandle,
    /// Suggested download filename (`"<sanitized label>.zip"`)
    pub filename: String,
    /// Size of the archive in bytes
    pub size_bytes: u64,
    /// Number of entries written
    pub entry_count: usize,
}

/// Source platform of a parsed media URL
///
/// Parsed leniently from upstream strings; unrecognized values map to
/// `Unknown` rather than failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// bilibili.com (upstream uses both "bili" and "bilibili")
    Bilibili,
    /// douyin.com
    Douyin,
    /// xiaohongshu.com
    Xiaohongshu,
    /// Anything else
    #[default]
    Unknown,
}

impl Platform {
    /// Lenient parse from an upstream platform string
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bili" | "bilibili" => Platform::Bilibili,
            "douyin" => Platform::Douyin,
            "xiaohongshu" => Platform::Xiaohongshu,
            _ => Platform::Unknown,
        }
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        Platform::parse(value)
    }
}
