//! Batch image archival example
//!
//! Fetches a set of images concurrently, packages the successes into one
//! zip, and writes the archive to the current directory.
//!
//! Usage: cargo run --example batch_archive -- <image-url>...

use mediaproc::utils::format_file_size;
use mediaproc::{Config, MediaProcessor};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        println!("Usage: batch_archive <image-url>...");
        return Ok(());
    }

    let processor = MediaProcessor::new(Config::default())?;
    let acquirer = processor.batch_acquirer();

    println!("Fetching {} images...", urls.len());
    acquirer.start(urls);

    // Progress subscriber: prints each time an item settles
    let mut snapshots = WatchStream::new(acquirer.subscribe());
    let observer = tokio::spawn(async move {
        while let Some(batch) = snapshots.next().await {
            println!(
                "Loaded {}/{} ({} ok, {} failed)",
                batch.loaded_count(),
                batch.len(),
                batch.success_count(),
                batch.fail_count()
            );
            if batch.is_settled() {
                break;
            }
        }
    });
    let batch = acquirer.settled().await;
    let _ = observer.await;

    if batch.success_count() == 0 {
        println!("Every image failed to load; nothing to archive");
        acquirer.dispose();
        return Ok(());
    }

    let packager = processor.packager();
    let artifact = packager.package(&batch, "My Note").await?;
    println!(
        "Packaged {} of {} images into {} ({})",
        artifact.entry_count,
        batch.len(),
        artifact.filename,
        format_file_size(artifact.size_bytes)
    );

    if let Some(bytes) = processor.blob_bytes(artifact.handle) {
        std::fs::write(&artifact.filename, &bytes)?;
        println!("Wrote {}", artifact.filename);
    }

    // Releases every image blob and the archive itself
    acquirer.dispose();
    Ok(())
}
