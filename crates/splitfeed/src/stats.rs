// ai
//! 📊 Stats: six numbers that only ever go up.
//!
//! Every worker bumps these concurrently, nobody locks anything, and the reporter
//! reads them whenever it feels like it. Each counter is its own `AtomicU64`; there
//! is no cross-counter transaction, so a snapshot taken mid-run can be a few
//! increments out of step between fields. It is a dashboard, not a ledger.
//!
//! 🧠 Knowledge graph:
//! - files: processed, failed, discarded bytes (trailing junk at EOF)
//! - records: processed, failed, bytes
//! - Written by: `FetchWorker` (files) and `ObjectFetcher` (records)
//! - Read by: `StatsReporter`, `PipelineHandle::stats()`, the CLI summary

use std::sync::atomic::{AtomicU64, Ordering};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use serde::Serialize;

use crate::progress::{format_bytes, format_number};

/// 🔢 The live counters. Share behind an `Arc`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    files_processed: AtomicU64,
    file_failures: AtomicU64,
    discarded_bytes: AtomicU64,
    records_processed: AtomicU64,
    record_failures: AtomicU64,
    record_bytes: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failure(&self) {
        self.file_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_bytes(&self, bytes: u64) {
        self.discarded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// 🧱 One record made it to the deliverer.
    pub fn record_delivered(&self, bytes: u64) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
        self.record_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.record_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 📸 All six, right now-ish.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            file_failures: self.file_failures.load(Ordering::Relaxed),
            discarded_bytes: self.discarded_bytes.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            record_failures: self.record_failures.load(Ordering::Relaxed),
            record_bytes: self.record_bytes.load(Ordering::Relaxed),
        }
    }
}

/// 📸 A frozen copy of the counters. Counts are counts, bytes are bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub files_processed: u64,
    pub file_failures: u64,
    pub discarded_bytes: u64,
    pub records_processed: u64,
    pub record_failures: u64,
    pub record_bytes: u64,
}

impl StatsSnapshot {
    /// 🍽️ Two columns, no borders, right-aligned numbers.
    pub fn render_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let rows = [
            ("Files processed", format_number(self.files_processed)),
            ("File failures", format_number(self.file_failures)),
            ("Discarded bytes", format_bytes(self.discarded_bytes)),
            ("Records processed", format_number(self.records_processed)),
            ("Record failures", format_number(self.record_failures)),
            ("Record bytes", format_bytes(self.record_bytes)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn the_one_where_every_counter_lands_in_its_own_slot() {
        let the_stats = PipelineStats::new();
        the_stats.record_file_processed();
        the_stats.record_file_processed();
        the_stats.record_file_failure();
        the_stats.record_discarded_bytes(7);
        the_stats.record_delivered(10);
        the_stats.record_delivered(5);
        the_stats.record_failure();

        assert_eq!(
            the_stats.snapshot(),
            StatsSnapshot {
                files_processed: 2,
                file_failures: 1,
                discarded_bytes: 7,
                records_processed: 2,
                record_failures: 1,
                record_bytes: 15,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_eight_tasks_hammer_the_counters_and_nothing_is_lost() {
        let the_stats = Arc::new(PipelineStats::new());
        let mut the_handles = Vec::new();
        for _ in 0..8 {
            let stats = the_stats.clone();
            the_handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    stats.record_delivered(3);
                    stats.record_file_processed();
                }
            }));
        }
        for handle in the_handles {
            handle.await.expect("💀 a counter task panicked");
        }
        let the_snapshot = the_stats.snapshot();
        assert_eq!(the_snapshot.records_processed, 8000);
        assert_eq!(the_snapshot.record_bytes, 24000);
        assert_eq!(the_snapshot.files_processed, 8000);
    }

    #[test]
    fn the_one_where_snapshots_never_go_backwards() {
        let the_stats = PipelineStats::new();
        let mut the_previous = the_stats.snapshot();
        for i in 0..50u64 {
            the_stats.record_delivered(i);
            if i % 7 == 0 {
                the_stats.record_failure();
            }
            let the_current = the_stats.snapshot();
            assert!(the_current.records_processed >= the_previous.records_processed);
            assert!(the_current.record_bytes >= the_previous.record_bytes);
            assert!(the_current.record_failures >= the_previous.record_failures);
            the_previous = the_current;
        }
    }

    #[test]
    fn the_one_where_the_snapshot_serializes_with_plain_field_names() {
        let the_json = serde_json::to_value(StatsSnapshot {
            files_processed: 1,
            ..Default::default()
        })
        .expect("💀 snapshot should serialize");
        assert_eq!(the_json["files_processed"], 1);
        assert_eq!(the_json["record_bytes"], 0);
    }

    #[test]
    fn the_one_where_the_table_mentions_every_counter() {
        let the_rendered = StatsSnapshot {
            records_processed: 1234567,
            ..Default::default()
        }
        .render_table()
        .to_string();
        assert!(the_rendered.contains("Files processed"));
        assert!(the_rendered.contains("Discarded bytes"));
        assert!(the_rendered.contains("1,234,567"));
    }
}
