//! Common test utilities for mediaproc integration tests

// Not every suite uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use mediaproc::config::{FetchConfig, TranscodeConfig};
use mediaproc::transcode::{ProgressFn, Transcoder, TranscoderCapabilities};
use mediaproc::{AudioExtractor, BatchAcquirer, BlobStore, Fetcher};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scriptable engine standing in for ffmpeg
///
/// Phases hold for a short moment so watch observers reliably see each
/// state transition.
pub struct StubTranscoder {
    /// Fail `load()` (exercises the engine-initialization error path)
    pub fail_load: bool,
    /// Fail `extract_audio()` (exercises the conversion error path)
    pub fail_convert: bool,
    /// Percentages reported during a successful conversion
    pub progress_steps: Vec<u8>,
    /// Bytes returned on success
    pub output: Bytes,
}

impl Default for StubTranscoder {
    fn default() -> Self {
        Self {
            fail_load: false,
            fail_convert: false,
            progress_steps: vec![25, 50, 75, 100],
            output: Bytes::from_static(b"converted-audio-bytes"),
        }
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn load(&self) -> mediaproc::Result<()> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail_load {
            return Err(mediaproc::Error::transcode("stub engine failed to load"));
        }
        Ok(())
    }

    async fn extract_audio(
        &self,
        _input: Bytes,
        progress: ProgressFn<'_>,
    ) -> mediaproc::Result<Bytes> {
        if self.fail_convert {
            return Err(mediaproc::Error::transcode("stub conversion failed"));
        }
        for &pct in &self.progress_steps {
            tokio::time::sleep(Duration::from_millis(5)).await;
            progress(pct);
        }
        Ok(self.output.clone())
    }

    fn capabilities(&self) -> TranscoderCapabilities {
        TranscoderCapabilities {
            can_extract_audio: !self.fail_load && !self.fail_convert,
            reports_progress: true,
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A fetcher with default settings
#[allow(clippy::unwrap_used)]
pub fn fetcher() -> Fetcher {
    Fetcher::new(&FetchConfig::default()).unwrap()
}

/// An extractor wired to the stub engine and a fresh blob store
pub fn extractor_with(engine: StubTranscoder, blobs: &BlobStore) -> AudioExtractor {
    AudioExtractor::new(
        fetcher(),
        Arc::new(engine),
        blobs.clone(),
        &TranscodeConfig::default(),
    )
}

/// An acquirer on a fresh blob store
pub fn acquirer_with(blobs: &BlobStore) -> BatchAcquirer {
    BatchAcquirer::new(fetcher(), blobs.clone())
}

/// Mount `body` at `route` on the mock server
pub async fn serve_bytes(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Mount a failing route on the mock server
pub async fn serve_error(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mount `body` at `route` with a response delay, to hold a transfer open
pub async fn serve_slow_bytes(server: &MockServer, route: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}
