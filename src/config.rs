//! Configuration types for mediaproc

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP fetch configuration (timeouts, identity, size guard)
///
/// Groups settings for the shared HTTP client used by both the extraction
/// pipeline and batch image acquisition. Used as a nested sub-config within
/// [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds (default: 300)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds (default: 30)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header for image fetches (some hosts reject referer-less requests)
    #[serde(default)]
    pub image_referer: Option<String>,

    /// Maximum source size in bytes (None = unlimited); exceeding it fails the fetch
    #[serde(default)]
    pub max_source_bytes: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            image_referer: None,
            max_source_bytes: None,
        }
    }
}

/// Transcoding engine configuration (binary paths and output encoding)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable, used for duration probing (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for binaries if explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Output container/extension (default: "mp3")
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Audio codec passed to ffmpeg (default: "libmp3lame")
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate passed to ffmpeg (default: "192k")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
            audio_format: default_audio_format(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// Compression method for packaged archives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    /// Deflate each entry (default)
    #[default]
    Deflated,
    /// Store entries uncompressed (faster for already-compressed images)
    Stored,
}

/// Archive packaging configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Extension for per-image entries (default: "jpg")
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Compression method for archive entries
    #[serde(default)]
    pub compression: ArchiveCompression,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            image_extension: default_image_extension(),
            compression: ArchiveCompression::default(),
        }
    }
}

/// Download history configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum records kept, newest first (default: 50)
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_history_max_entries(),
        }
    }
}

/// Main configuration for [`MediaProcessor`](crate::MediaProcessor)
///
/// All fields default sensibly; a `Config::default()` works out of the box
/// on a host with ffmpeg in PATH.
///
/// # Examples
///
/// ```
/// use mediaproc::Config;
///
/// let config = Config {
///     fetch: mediaproc::config::FetchConfig {
///         image_referer: Some("https://www.xiaohongshu.com/".to_string()),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Transcoding engine settings
    #[serde(default)]
    pub transcode: TranscodeConfig,

    /// Archive packaging settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Download history settings
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key when a timeout is
    /// zero, an encoding field is empty, the image extension is empty, or
    /// the history capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.request_timeout_secs == 0 {
            return Err(Error::config(
                "must be greater than zero",
                "fetch.request_timeout_secs",
            ));
        }
        if self.fetch.connect_timeout_secs == 0 {
            return Err(Error::config(
                "must be greater than zero",
                "fetch.connect_timeout_secs",
            ));
        }
        if self.transcode.audio_format.trim().is_empty() {
            return Err(Error::config("must not be empty", "transcode.audio_format"));
        }
        if self.transcode.audio_codec.trim().is_empty() {
            return Err(Error::config("must not be empty", "transcode.audio_codec"));
        }
        if self.transcode.audio_bitrate.trim().is_empty() {
            return Err(Error::config("must not be empty", "transcode.audio_bitrate"));
        }
        if self.archive.image_extension.trim().is_empty() {
            return Err(Error::config("must not be empty", "archive.image_extension"));
        }
        if self.history.max_entries == 0 {
            return Err(Error::config(
                "must be greater than zero",
                "history.max_entries",
            ));
        }
        Ok(())
    }
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("mediaproc/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_codec() -> String {
    "libmp3lame".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_image_extension() -> String {
    "jpg".to_string()
}

fn default_history_max_entries() -> usize {
    50
}

fn default_true() -> bool {
    true
}
