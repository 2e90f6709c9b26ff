//! Root facade wiring the shared state together

use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::ArchivePackager;
use crate::batch::BatchAcquirer;
use crate::blob::{BlobHandle, BlobStats, BlobStore};
use crate::config::Config;
use crate::error::Result;
use crate::extractor::AudioExtractor;
use crate::fetch::Fetcher;
use crate::history::DownloadHistory;
use crate::transcode::{CliTranscoder, Transcoder, TranscoderCapabilities, UnavailableTranscoder};

struct ProcessorShared {
    config: Config,
    fetcher: Fetcher,
    blobs: BlobStore,
    engine: Arc<dyn Transcoder>,
    history: DownloadHistory,
}

/// Main processor instance (cloneable - shared state is Arc-wrapped)
///
/// Owns the shared HTTP client, blob store, selected transcoding engine,
/// and download history; constructs pipeline components bound to them.
/// Engine selection prefers an explicitly configured ffmpeg path, then
/// PATH discovery, then degrades to the unavailable engine so construction
/// succeeds on hosts without ffmpeg.
///
/// # Examples
///
/// ```no_run
/// use mediaproc::{Config, MediaProcessor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = MediaProcessor::new(Config::default())?;
/// println!("engine: {}", processor.engine_name());
///
/// let extractor = processor.audio_extractor();
/// let acquirer = processor.batch_acquirer();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MediaProcessor {
    shared: Arc<ProcessorShared>,
}

impl MediaProcessor {
    /// Create a new MediaProcessor instance
    ///
    /// Validates the configuration, builds the shared HTTP client, and
    /// selects the transcoding engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) on invalid
    /// configuration, [`Error::Unknown`](crate::Error::Unknown) if the
    /// HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new(&config.fetch)?;
        let engine = select_engine(&config);
        info!(engine = engine.name(), "media processor initialized");

        let history = DownloadHistory::new(&config.history);
        Ok(Self {
            shared: Arc::new(ProcessorShared {
                fetcher,
                blobs: BlobStore::new(),
                engine,
                history,
                config,
            }),
        })
    }

    /// Build an extraction pipeline bound to the shared state
    ///
    /// Each call returns an independent state machine; callers keep one
    /// per extraction surface.
    pub fn audio_extractor(&self) -> AudioExtractor {
        AudioExtractor::new(
            self.shared.fetcher.clone(),
            self.shared.engine.clone(),
            self.shared.blobs.clone(),
            &self.shared.config.transcode,
        )
    }

    /// Build a batch acquirer bound to the shared state
    pub fn batch_acquirer(&self) -> BatchAcquirer {
        BatchAcquirer::new(self.shared.fetcher.clone(), self.shared.blobs.clone())
    }

    /// Build an archive packager bound to the shared blob store
    pub fn packager(&self) -> ArchivePackager {
        ArchivePackager::new(self.shared.blobs.clone(), self.shared.config.archive.clone())
    }

    /// The shared download history
    pub fn history(&self) -> DownloadHistory {
        self.shared.history.clone()
    }

    /// Bytes held for `handle`, if it is still live
    ///
    /// Artifacts returned by the pipelines reference the shared blob store;
    /// this is how the embedding application reads them out for download.
    pub fn blob_bytes(&self, handle: BlobHandle) -> Option<bytes::Bytes> {
        self.shared.blobs.bytes(handle)
    }

    /// Lifecycle counters of the shared blob store
    pub fn blob_stats(&self) -> BlobStats {
        self.shared.blobs.stats()
    }

    /// Name of the selected transcoding engine
    pub fn engine_name(&self) -> &'static str {
        self.shared.engine.name()
    }

    /// Capabilities of the selected transcoding engine
    pub fn capabilities(&self) -> TranscoderCapabilities {
        self.shared.engine.capabilities()
    }
}

/// Engine selection: configured path → PATH discovery → unavailable
fn select_engine(config: &Config) -> Arc<dyn Transcoder> {
    if let Some(path) = &config.transcode.ffmpeg_path {
        return Arc::new(CliTranscoder::new(path.clone(), config.transcode.clone()));
    }
    if config.transcode.search_path {
        if let Some(engine) = CliTranscoder::from_path(config.transcode.clone()) {
            return Arc::new(engine);
        }
    }
    warn!("ffmpeg not found, audio extraction will be unavailable");
    Arc::new(UnavailableTranscoder)
}
