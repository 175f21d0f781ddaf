// AI
//! 📊 progress.rs: "Are we there yet?" (every pipeline, every time, forever)
//!
//! 🚀 The stats reporter. Every interval it pulls a snapshot of the six counters,
//! works out how fast records are flowing, logs it, and repaints a spinner whose
//! message is a comfy table. It never touches the counters, it only reads.
//!
//! ⚠️  Warning: Watching this spinner will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::stats::{PipelineStats, StatsSnapshot};

// -- 📏 one mebibyte. not a megabyte, pedants. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

/// 📦 Bytes, but readable. Because "1073741824 bytes" is a war crime in a UI.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom. It's been a while.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 Throughput between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rates {
    pub records_per_sec: f64,
    pub mib_per_sec: f64,
}

pub(crate) fn calculate_rates(previous: &StatsSnapshot, current: &StatsSnapshot, elapsed: Duration) -> Rates {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        // -- 💤 no time has passed. maintain composure.
        return Rates {
            records_per_sec: 0.0,
            mib_per_sec: 0.0,
        };
    }
    let records_delta = current.records_processed.saturating_sub(previous.records_processed);
    let bytes_delta = current.record_bytes.saturating_sub(previous.record_bytes);
    Rates {
        records_per_sec: records_delta as f64 / secs,
        mib_per_sec: (bytes_delta as f64 / secs) / MIB as f64,
    }
}

/// 📡 The external reporter, brought in-house. Pulls, never pushes.
#[derive(Debug)]
pub struct StatsReporter {
    stats: Arc<PipelineStats>,
    interval: Duration,
}

impl StatsReporter {
    pub fn new(stats: Arc<PipelineStats>, interval: Duration) -> Self {
        Self { stats, interval }
    }

    /// 🚀 Report every `interval` until `done` fires, then report one last time.
    pub fn spawn(self, done: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                spinner.set_style(style);
            }

            let start_time = Instant::now();
            let mut the_previous = (Instant::now(), self.stats.snapshot());
            let mut ticker = tokio::time::interval(self.interval);
            // -- 🔄 the first tick fires immediately; nothing interesting has happened yet
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = done.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let the_current = self.stats.snapshot();
                        let rates = calculate_rates(&the_previous.1, &the_current, now.duration_since(the_previous.0));
                        Self::report(&spinner, &the_current, rates, start_time.elapsed());
                        the_previous = (now, the_current);
                    }
                }
            }

            let the_final = self.stats.snapshot();
            info!(
                "🏁 final stats after {}: {}",
                format_duration(start_time.elapsed()),
                serde_json::to_string(&the_final).unwrap_or_default()
            );
            spinner.finish_and_clear();
        })
    }

    fn report(spinner: &ProgressBar, snapshot: &StatsSnapshot, rates: Rates, elapsed: Duration) {
        info!(
            files_processed = snapshot.files_processed,
            file_failures = snapshot.file_failures,
            discarded_bytes = snapshot.discarded_bytes,
            records_processed = snapshot.records_processed,
            record_failures = snapshot.record_failures,
            record_bytes = snapshot.record_bytes,
            "📊 {} records/s, {:.2} MiB/s, {} elapsed",
            format_number(rates.records_per_sec as u64),
            rates.mib_per_sec,
            format_duration(elapsed),
        );
        spinner.set_message(format!(
            "{} records/s  {:.2} MiB/s  {} elapsed\n{}",
            format_number(rates.records_per_sec as u64),
            rates.mib_per_sec,
            format_duration(elapsed),
            snapshot.render_table()
        ));
        spinner.tick();
    }
}
