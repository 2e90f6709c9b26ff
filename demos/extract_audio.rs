//! Audio extraction example
//!
//! Downloads a remote video, extracts its audio track with ffmpeg, and
//! writes the resulting file to the current directory.
//!
//! Usage: cargo run --example extract_audio -- <video-url> [title]

use mediaproc::utils::format_file_size;
use mediaproc::{Config, DownloadRecord, ExtractionStatus, MediaProcessor, Platform};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://example.com/video.mp4".to_string());
    let title = args.next().unwrap_or_else(|| "My Video".to_string());

    let processor = MediaProcessor::new(Config::default())?;
    println!("Engine: {}", processor.engine_name());
    if !processor.capabilities().can_extract_audio {
        println!("No ffmpeg binary found; install ffmpeg or set transcode.ffmpeg_path");
        return Ok(());
    }

    let extractor = processor.audio_extractor();
    let mut states = extractor.subscribe();

    println!("Extracting audio from {url}");
    extractor.extract_audio(&url, &title);

    while states.changed().await.is_ok() {
        let state = states.borrow().clone();
        match state.status {
            ExtractionStatus::Loading => println!("Loading transcoding engine..."),
            ExtractionStatus::Downloading => {
                if let Some(progress) = state.progress {
                    match progress.total_bytes {
                        Some(total) => println!(
                            "Downloading: {} / {}",
                            format_file_size(progress.loaded_bytes),
                            format_file_size(total)
                        ),
                        None => println!(
                            "Downloading: {}",
                            format_file_size(progress.loaded_bytes)
                        ),
                    }
                }
            }
            ExtractionStatus::Converting => {
                match state.percent {
                    Some(pct) => println!("Converting: {pct}%"),
                    None => println!("Converting..."),
                }
            }
            ExtractionStatus::Completed => {
                let artifact = state.artifact.expect("completed state carries an artifact");
                println!(
                    "Done: {} ({})",
                    artifact.filename,
                    format_file_size(artifact.size_bytes)
                );
                if let Some(bytes) = processor.blob_bytes(artifact.handle) {
                    std::fs::write(&artifact.filename, &bytes)?;
                    println!("Wrote {}", artifact.filename);
                }
                processor
                    .history()
                    .add(DownloadRecord::new(&url, &title, Platform::Unknown));
                break;
            }
            ExtractionStatus::Error => {
                let error = state.error.expect("error state carries a detail");
                println!("Failed ({}): {}", error.kind, error.message);
                break;
            }
            ExtractionStatus::Idle => {}
        }
    }

    extractor.dispose();
    println!("History entries: {}", processor.history().len());
    Ok(())
}
