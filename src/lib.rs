//! # mediaproc
//!
//! In-process media post-processing library: a remote-video-to-local-audio
//! extraction pipeline driven by an external transcoding engine, and a
//! concurrent batch-image acquisition-and-archival pipeline.
//!
//! ## Design Philosophy
//!
//! mediaproc is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Observable** - Consumers subscribe to state snapshots, no polling required
//! - **Failure-isolating** - One failed image never affects its batch siblings
//! - **Leak-free** - Every binary blob is tracked and released exactly once
//!
//! ## Quick Start
//!
//! ```no_run
//! use mediaproc::{Config, MediaProcessor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = MediaProcessor::new(Config::default())?;
//!
//!     // Extract the audio track of a remote video
//!     let extractor = processor.audio_extractor();
//!     let mut states = extractor.subscribe();
//!     extractor.extract_audio("https://example.com/video.mp4", "My Video");
//!
//!     while states.changed().await.is_ok() {
//!         let state = states.borrow().clone();
//!         println!("{:?}: {:?}%", state.status, state.percent);
//!         if state.status.is_terminal() {
//!             break;
//!         }
//!     }
//!
//!     // Acquire a set of images and package them into one zip
//!     let acquirer = processor.batch_acquirer();
//!     acquirer.start(vec![
//!         "https://img.example.com/1.jpg".to_string(),
//!         "https://img.example.com/2.jpg".to_string(),
//!     ]);
//!     let batch = acquirer.settled().await;
//!
//!     if batch.success_count() > 0 {
//!         let artifact = processor.packager().package(&batch, "My Note").await?;
//!         println!("packaged {} entries into {}", artifact.entry_count, artifact.filename);
//!     }
//!
//!     acquirer.dispose();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive packaging
pub mod archive;
/// Batch image acquisition
pub mod batch;
/// Blob handle lifecycle tracking
pub mod blob;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Audio extraction pipeline
pub mod extractor;
/// HTTP fetching with streaming progress
pub mod fetch;
/// In-memory download history
pub mod history;
/// Root facade
pub mod processor;
/// Transcoding engine implementations
pub mod transcode;
/// Core types and state snapshots
pub mod types;
/// Filename sanitization and display formatting
pub mod utils;

// Re-export commonly used types
pub use archive::ArchivePackager;
pub use batch::BatchAcquirer;
pub use blob::{BlobHandle, BlobStats, BlobStore, ScopeId};
pub use config::Config;
pub use error::{Error, ErrorDetail, Result};
pub use extractor::AudioExtractor;
pub use fetch::Fetcher;
pub use history::{DownloadHistory, DownloadRecord};
pub use processor::MediaProcessor;
pub use transcode::{
    CliTranscoder, Transcoder, TranscoderCapabilities, UnavailableTranscoder,
};
pub use types::{
    AcquisitionItem, ArchiveArtifact, ArchiveJob, AudioArtifact, BatchSnapshot, ExtractionState,
    ExtractionStatus, Platform, ProgressInfo,
};
