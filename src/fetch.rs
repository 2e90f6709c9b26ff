//! HTTP fetching with streaming byte-level progress
//!
//! One shared [`reqwest::Client`] serves both pipelines: the extraction
//! pipeline streams the video source with progress callbacks, batch
//! acquisition fetches images whole (optionally with a Referer header for
//! hosts that reject referer-less requests).

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::REFERER;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{Error, Result};

/// Shared HTTP fetcher
///
/// Cheaply cloneable; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    image_referer: Option<String>,
    max_source_bytes: Option<u64>,
}

impl Fetcher {
    /// Build a fetcher from the fetch configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unknown`] if the TLS backend fails to initialize.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            image_referer: config.image_referer.clone(),
            max_source_bytes: config.max_source_bytes,
        })
    }

    /// Stream `url` into memory, reporting `(loaded, total)` after each chunk
    ///
    /// `total` is the server-reported content length when available. The
    /// loaded count is monotonically non-decreasing across callbacks.
    /// Cancelling `cancel` aborts the transfer with [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NetworkFetch`] for invalid URLs, connection
    /// failures, timeouts, non-success status codes, and responses
    /// exceeding the configured size cap.
    pub async fn fetch_with_progress<F>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<Bytes>
    where
        F: FnMut(u64, Option<u64>),
    {
        // Validate before dispatch so a malformed URL fails fast
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::network(format!("invalid source URL {url}: {e}")))?;

        let response = tokio::select! {
            result = self.client.get(parsed).send() => {
                result.map_err(|e| Error::from_fetch(e, url))?
            }
            () = cancel.cancelled() => return Err(Error::Cancelled),
        };
        let response = response
            .error_for_status()
            .map_err(|e| Error::from_fetch(e, url))?;

        let total = response.content_length();
        if let (Some(total), Some(cap)) = (total, self.max_source_bytes)
            && total > cap
        {
            return Err(Error::network(format!(
                "source is {total} bytes, exceeding the {cap}-byte cap"
            )));
        }

        debug!(url, ?total, "streaming source");
        on_progress(0, total);

        let mut buffer: Vec<u8> = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                () = cancel.cancelled() => return Err(Error::Cancelled),
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| Error::from_fetch(e, url))?;

            let loaded = buffer.len() as u64 + chunk.len() as u64;
            if let Some(cap) = self.max_source_bytes
                && loaded > cap
            {
                return Err(Error::network(format!(
                    "source exceeded the {cap}-byte cap after {loaded} bytes"
                )));
            }
            buffer.extend_from_slice(&chunk);
            on_progress(buffer.len() as u64, total);
        }

        Ok(Bytes::from(buffer))
    }

    /// Fetch an image whole, sending the configured Referer header if any
    ///
    /// Origin-restriction rejections are indistinguishable from network
    /// failures at this layer; both surface as [`Error::NetworkFetch`].
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::network(format!("invalid image URL {url}: {e}")))?;

        let mut request = self.client.get(parsed);
        if let Some(referer) = &self.image_referer {
            request = request.header(REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::from_fetch(e, url))?
            .error_for_status()
            .map_err(|e| Error::from_fetch(e, url))?;

        response
            .bytes()
            .await
            .map_err(|e| Error::from_fetch(e, url))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(config: FetchConfig) -> Fetcher {
        Fetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn fetch_with_progress_reports_monotonic_loaded_bytes() {
        let server = MockServer::start().await;
        let body = vec![0xAB_u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig::default());
        let cancel = CancellationToken::new();
        let mut observed: Vec<(u64, Option<u64>)> = Vec::new();

        let bytes = fetcher
            .fetch_with_progress(&format!("{}/video.mp4", server.uri()), &cancel, |l, t| {
                observed.push((l, t));
            })
            .await
            .unwrap();

        assert_eq!(bytes.len(), body.len());
        assert!(observed.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(observed.last().unwrap().0, body.len() as u64);
        assert_eq!(observed.last().unwrap().1, Some(body.len() as u64));
    }

    #[tokio::test]
    async fn server_error_status_maps_to_network_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig::default());
        let cancel = CancellationToken::new();
        let err = fetcher
            .fetch_with_progress(&format!("{}/gone.mp4", server.uri()), &cancel, |_, _| {})
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "network_fetch");
    }

    #[tokio::test]
    async fn invalid_url_fails_before_dispatch() {
        let fetcher = fetcher(FetchConfig::default());
        let cancel = CancellationToken::new();
        let err = fetcher
            .fetch_with_progress("not a url", &cancel, |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_fetch");
    }

    #[tokio::test]
    async fn oversized_source_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 4096]))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig {
            max_source_bytes: Some(1024),
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        let err = fetcher
            .fetch_with_progress(&format!("{}/big.mp4", server.uri()), &cancel, |_, _| {})
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "network_fetch");
        assert!(err.to_string().contains("cap"));
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 1024]))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch_with_progress(&format!("{}/video.mp4", server.uri()), &cancel, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn fetch_image_sends_configured_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/note.jpg"))
            .and(header("referer", "https://www.xiaohongshu.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpegdata".to_vec()))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig {
            image_referer: Some("https://www.xiaohongshu.com/".to_string()),
            ..Default::default()
        });

        let bytes = fetcher
            .fetch_image(&format!("{}/note.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"jpegdata");
    }

    #[tokio::test]
    async fn fetch_image_failure_is_network_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchConfig::default());
        let err = fetcher
            .fetch_image(&format!("{}/missing.jpg", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_fetch");
    }
}
