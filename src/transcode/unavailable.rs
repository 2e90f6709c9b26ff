//! Fallback transcoder for graceful degradation

use async_trait::async_trait;
use bytes::Bytes;

use super::{ProgressFn, Transcoder, TranscoderCapabilities};
use crate::error::{Error, Result};

const UNAVAILABLE_MESSAGE: &str = "no ffmpeg binary was found; \
     install ffmpeg or set transcode.ffmpeg_path in config";

/// Transcoder used when no ffmpeg binary is available
///
/// Lets [`MediaProcessor`](crate::MediaProcessor) construct successfully on
/// hosts without ffmpeg; every engine operation fails with
/// [`Error::Transcode`], which the extraction pipeline surfaces as a normal
/// Error state. Batch acquisition and packaging are unaffected.
///
/// # Examples
///
/// ```
/// use mediaproc::transcode::{Transcoder, UnavailableTranscoder};
///
/// # #[tokio::main]
/// # async fn main() {
/// let engine = UnavailableTranscoder;
/// assert!(engine.load().await.is_err());
/// assert!(!engine.capabilities().can_extract_audio);
/// # }
/// ```
pub struct UnavailableTranscoder;

#[async_trait]
impl Transcoder for UnavailableTranscoder {
    async fn load(&self) -> Result<()> {
        Err(Error::transcode(UNAVAILABLE_MESSAGE))
    }

    async fn extract_audio(&self, _input: Bytes, _progress: ProgressFn<'_>) -> Result<Bytes> {
        Err(Error::transcode(UNAVAILABLE_MESSAGE))
    }

    fn capabilities(&self) -> TranscoderCapabilities {
        TranscoderCapabilities {
            can_extract_audio: false,
            reports_progress: false,
        }
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_fails_with_transcode_kind() {
        let engine = UnavailableTranscoder;
        let err = engine.load().await.unwrap_err();
        assert_eq!(err.kind(), "transcode");
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[tokio::test]
    async fn extract_audio_fails_and_never_reports_progress() {
        let engine = UnavailableTranscoder;
        let called = std::sync::atomic::AtomicBool::new(false);

        let result = engine
            .extract_audio(Bytes::from_static(b"video"), &|_| {
                called.store(true, std::sync::atomic::Ordering::SeqCst);
            })
            .await;

        assert!(result.is_err());
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn capabilities_report_nothing_supported() {
        let caps = UnavailableTranscoder.capabilities();
        assert!(!caps.can_extract_audio);
        assert!(!caps.reports_progress);
        assert_eq!(UnavailableTranscoder.name(), "unavailable");
    }

    #[tokio::test]
    async fn error_message_mentions_configuration() {
        let err = UnavailableTranscoder.load().await.unwrap_err();
        assert!(
            err.to_string().contains("transcode.ffmpeg_path"),
            "error should tell the operator how to fix it"
        );
    }
}
