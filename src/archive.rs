//! Archive packaging for settled image batches
//!
//! Builds one zip in memory from a settled batch's successful items. The
//! insertion loop is strictly sequential in ascending index order: entry
//! names are deterministic (`"<label>-<index+1>.<ext>"`, not completion
//! order) and at most one item's bytes are resident alongside the writer
//! at a time.

use bytes::Bytes;
use std::io::{Cursor, Write};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::blob::BlobStore;
use crate::config::{ArchiveCompression, ArchiveConfig};
use crate::error::{Error, Result};
use crate::types::{ArchiveArtifact, ArchiveJob, BatchSnapshot};
use crate::utils::sanitize_filename;

/// Packages a settled batch's successful items into one downloadable zip
///
/// Cheaply cloneable; clones observe and drive the same job channel.
///
/// # Examples
///
/// ```no_run
/// use mediaproc::{Config, MediaProcessor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = MediaProcessor::new(Config::default())?;
/// let acquirer = processor.batch_acquirer();
/// let packager = processor.packager();
///
/// acquirer.start(vec!["https://img.example.com/1.jpg".to_string()]);
/// let batch = acquirer.settled().await;
///
/// let artifact = packager.package(&batch, "My Note").await?;
/// println!("{} ({} entries)", artifact.filename, artifact.entry_count);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArchivePackager {
    blobs: BlobStore,
    config: ArchiveConfig,
    tx: watch::Sender<ArchiveJob>,
}

impl ArchivePackager {
    /// Create a packager bound to the given blob store
    pub fn new(blobs: BlobStore, config: ArchiveConfig) -> Self {
        let (tx, _) = watch::channel(ArchiveJob::default());
        Self { blobs, config, tx }
    }

    /// Subscribe to aggregate packaging progress
    pub fn subscribe(&self) -> watch::Receiver<ArchiveJob> {
        self.tx.subscribe()
    }

    /// Build the archive for `batch`, named after `label`
    ///
    /// Precondition: the batch is settled and has at least one successful
    /// item; invoking otherwise is a caller error (the UI collaborator is
    /// responsible for disabling the action). Items with no retrievable
    /// bytes are counted as failed and skipped; partial success is not an
    /// error. The finished archive is registered in the batch's scope, so
    /// disposing the batch also revokes an undownloaded archive.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] when the batch has not settled
    /// - [`Error::AllItemsFailed`] when the batch has no successful items,
    ///   or zero entries could be written (no partial archive is emitted)
    /// - [`Error::Unknown`] on a zip writer failure
    pub async fn package(&self, batch: &BatchSnapshot, label: &str) -> Result<ArchiveArtifact> {
        if !batch.is_settled() {
            return Err(Error::invalid_state("package", "batch has not settled"));
        }
        if batch.success_count() == 0 {
            // Every item failed to load; there is nothing to archive
            return Err(Error::AllItemsFailed);
        }

        let base = sanitize_filename(label);
        let extension = &self.config.image_extension;
        let method = match self.config.compression {
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
            ArchiveCompression::Stored => CompressionMethod::Stored,
        };
        let options = FileOptions::default().compression_method(method);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut job = ArchiveJob {
            total: batch.len(),
            ..Default::default()
        };
        self.tx.send_replace(job);
        info!(label = %base, total = job.total, "packaging started");

        // Ascending index order: deterministic naming, bounded memory
        for item in &batch.items {
            let bytes = item.handle.and_then(|handle| self.blobs.bytes(handle));
            match bytes {
                Some(bytes) if !item.failed => {
                    let entry_name = format!("{base}-{}.{extension}", item.index + 1);
                    write_entry(&mut writer, &entry_name, &bytes, options)?;
                    job.succeeded += 1;
                }
                _ => {
                    // Failed at fetch time, or revoked between settlement
                    // and packaging (the degenerate race)
                    if item.handle.is_some() && !item.failed {
                        warn!(index = item.index, "item bytes no longer retrievable");
                    }
                    job.failed += 1;
                }
            }
            job.processed += 1;
            self.tx.send_replace(job);
            debug!(
                processed = job.processed,
                percent = job.percent(),
                "packaging progress"
            );
        }

        if job.succeeded == 0 {
            warn!(label = %base, "packaging aborted: no entries written");
            return Err(Error::AllItemsFailed);
        }

        // A partially written central directory must never be emitted
        let cursor = writer
            .finish()
            .map_err(|e| Error::unknown(format!("failed to finalize archive: {e}")))?;
        let archive_bytes = Bytes::from(cursor.into_inner());
        let size_bytes = archive_bytes.len() as u64;

        let scope = match batch.scope {
            Some(scope) => scope,
            // A settled batch built by BatchAcquirer always carries its
            // scope; snapshots built by hand get their own
            None => self.blobs.scope(),
        };
        let handle = self.blobs.create(scope, archive_bytes);

        let artifact = ArchiveArtifact {
            handle,
            filename: format!("{base}.zip"),
            size_bytes,
            entry_count: job.succeeded,
        };
        info!(
            filename = %artifact.filename,
            entries = artifact.entry_count,
            size_bytes,
            skipped = job.failed,
            "packaging finished"
        );
        Ok(artifact)
    }
}

fn write_entry(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    bytes: &[u8],
    options: FileOptions,
) -> Result<()> {
    writer
        .start_file(name, options)
        .map_err(|e| Error::unknown(format!("failed to start archive entry {name}: {e}")))?;
    writer
        .write_all(bytes)
        .map_err(|e| Error::unknown(format!("failed to write archive entry {name}: {e}")))?;
    Ok(())
}
