//! 🪣✂️📬 splitfeed: list a bucket, fetch its split files, cut them into records,
//! hand the records off. Concurrently. Politely. Stoppably.
//!
//! ```text
//! ListerWorker ──▶ bounded queue ──▶ FetchWorker × N ──▶ ObjectFetcher ──▶ Splitter ──▶ Deliverer
//!       ▲                                  ▲
//!       └──────── ShutdownController ──────┘            PipelineStats ◀── everyone
//! ```

pub mod app_config;
pub mod backends;
pub mod common;
pub mod deliverers;
pub mod fetcher;
pub mod filters;
pub mod progress;
pub mod splitters;
pub mod stats;
pub mod supervisors;

use anyhow::Result;

use crate::app_config::AppConfig;
use crate::stats::StatsSnapshot;
use crate::supervisors::Supervisor;

/// 🚀 Start a run and wait for it to finish on its own.
pub async fn run(app_config: AppConfig) -> Result<StatsSnapshot> {
    Supervisor::start(app_config).await?.wait().await
}
