//! Transcoding engine seam
//!
//! The extraction pipeline treats the engine as an opaque capability:
//! `load()` it once, hand it raw video bytes, receive audio bytes with
//! progress callbacks. Implementations can shell out to an external binary
//! or provide stub functionality for graceful degradation.

mod cli;
mod parser;
mod unavailable;

pub use cli::CliTranscoder;
pub use parser::{parse_duration_output, parse_progress_line, progress_percent, ProgressLine};
pub use unavailable::UnavailableTranscoder;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Callback invoked with a conversion percentage (0..=100)
///
/// Only called when the engine can compute a determinate fraction; an engine
/// without a source duration reports nothing.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Capabilities of a transcoder implementation
#[derive(Debug, Clone, Copy)]
pub struct TranscoderCapabilities {
    /// Can produce an audio artifact from video bytes
    pub can_extract_audio: bool,
    /// Reports determinate conversion progress
    pub reports_progress: bool,
}

/// Trait for audio transcoding engines
///
/// # Examples
///
/// ```no_run
/// use mediaproc::transcode::{CliTranscoder, Transcoder};
/// use mediaproc::config::TranscodeConfig;
/// use bytes::Bytes;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = CliTranscoder::from_path(TranscodeConfig::default())
///     .expect("ffmpeg not found");
///
/// engine.load().await?;
/// let audio = engine
///     .extract_audio(Bytes::from_static(b"..video.."), &|pct| {
///         println!("converting: {pct}%");
///     })
///     .await?;
/// println!("{} audio bytes", audio.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Initialize the engine (verify the binary runs)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transcode`](crate::Error::Transcode) if the engine
    /// cannot be initialized.
    async fn load(&self) -> Result<()>;

    /// Produce an audio artifact from raw video bytes
    ///
    /// `progress` receives a monotonically non-decreasing percentage while
    /// the conversion runs, when the engine can compute one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transcode`](crate::Error::Transcode) if the engine
    /// fails or is unavailable, [`Error::Io`](crate::Error::Io) on
    /// scratch-file problems.
    async fn extract_audio(&self, input: Bytes, progress: ProgressFn<'_>) -> Result<Bytes>;

    /// Query capabilities of this engine
    fn capabilities(&self) -> TranscoderCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
