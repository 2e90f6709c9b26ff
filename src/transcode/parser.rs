//! Parsers for ffmpeg/ffprobe output
//!
//! Pure functions so the line protocol can be unit tested without a binary.

use std::time::Duration;

/// One parsed line of `ffmpeg -progress pipe:1` output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLine {
    /// Position in the output stream, in microseconds
    OutTime(u64),
    /// `progress=continue` heartbeat
    Continue,
    /// `progress=end` marker, the conversion finished
    End,
}

/// Parse one line of the `-progress pipe:1` key=value protocol
///
/// Recognizes `out_time_us`, `out_time_ms`, and the `progress` marker;
/// everything else (frame counts, bitrate, speed) returns `None`. ffmpeg
/// quirk: `out_time_ms` is also microseconds, despite the name.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<u64>().ok().map(ProgressLine::OutTime),
        "progress" => match value {
            "end" => Some(ProgressLine::End),
            _ => Some(ProgressLine::Continue),
        },
        _ => None,
    }
}

/// Parse ffprobe's `-show_entries format=duration` output into a duration
///
/// Expects a bare decimal seconds value (e.g. `"123.456000\n"`). Returns
/// `None` for empty, `N/A`, or unparseable output.
pub fn parse_duration_output(output: &str) -> Option<Duration> {
    let seconds: f64 = output.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

/// Convert an output position into a conversion percentage
///
/// Floors the fraction and clamps to 100 (ffmpeg can report positions a
/// little past the probed duration).
pub fn progress_percent(out_time_us: u64, duration: Duration) -> u8 {
    let duration_us = duration.as_micros();
    if duration_us == 0 {
        return 0;
    }
    let pct = (out_time_us as u128 * 100) / duration_us;
    pct.min(100) as u8
}
