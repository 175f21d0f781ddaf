// human
//! 🎬 *[a queue fills with keys. somewhere, a deliverer waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 📥 The FetchWorker: pulls keys, fetches objects, counts everything.
//!
//! Per key: start the clock, fetch, bump `files_processed`. Trailing bytes are a
//! corruption warning plus `discarded_bytes`. A failed fetch bumps `file_failures`
//! and the worker moves on; whatever that object already delivered stays delivered.
//!
//! 🛑 On stop: drain. Every key still in the queue is received and dropped without a
//! fetch, until the lister closes the queue. Draining (instead of just leaving) is what
//! lets a lister blocked on a full queue finish its last `send` and get to `close`.
//! An in-flight fetch is never interrupted; the stop is only noticed between keys.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Worker;
use crate::common::ObjectId;
use crate::deliverers::{Deliverer, DelivererBackend};
use crate::fetcher::ObjectFetcher;
use crate::splitters::SplitterBackend;
use crate::stats::PipelineStats;

#[derive(Debug)]
pub(crate) struct FetchWorker {
    name: String,
    rx: Receiver<ObjectId>,
    fetcher: ObjectFetcher,
    splitter: SplitterBackend,
    deliverer: DelivererBackend,
    stats: Arc<PipelineStats>,
    stop: CancellationToken,
}

/// What woke the worker up.
enum Wakeup {
    Stop,
    Next(Option<ObjectId>),
}

impl FetchWorker {
    pub(crate) fn new(
        name: String,
        rx: Receiver<ObjectId>,
        fetcher: ObjectFetcher,
        splitter: SplitterBackend,
        deliverer: DelivererBackend,
        stats: Arc<PipelineStats>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            name,
            rx,
            fetcher,
            splitter,
            deliverer,
            stats,
            stop,
        }
    }

    async fn process(&mut self, object: ObjectId) {
        let the_start = Instant::now();
        let the_outcome = self
            .fetcher
            .fetch(&object, &mut self.splitter, &mut self.deliverer, &self.stats)
            .await;
        self.stats.record_file_processed();

        if the_outcome.leftover_bytes > 0 {
            self.stats.record_discarded_bytes(the_outcome.leftover_bytes);
            warn!(
                "⚠️ Trailing data, possible corruption: {} bytes left in stream at EOF: {}",
                the_outcome.leftover_bytes, object.key
            );
        }

        if let Some(e) = the_outcome.error {
            self.stats.record_file_failure();
            error!("💀 {} error reading {}: {:#}", self.name, object.key, e);
            return;
        }

        info!(
            "✅ Successfully fetched {} in {:.2}s ({} records)",
            object.key,
            the_start.elapsed().as_secs_f64(),
            the_outcome.records_delivered
        );
    }

    /// 🚰 Receive and drop until the queue is closed and empty.
    async fn drain(rx: &Receiver<ObjectId>, name: &str) -> u64 {
        let mut the_drained = 0u64;
        while let Ok(object) = rx.recv().await {
            debug!("🚰 {} drained {} without fetching it", name, object.key);
            the_drained += 1;
        }
        the_drained
    }
}

impl Worker for FetchWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 {} started pulling keys", self.name);
            loop {
                let the_wakeup = tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => Wakeup::Stop,
                    next = self.rx.recv() => Wakeup::Next(next.ok()),
                };

                match the_wakeup {
                    Wakeup::Stop => {
                        let the_drained = Self::drain(&self.rx, &self.name).await;
                        info!("🛑 {} stopped; drained {} queued keys unfetched", self.name, the_drained);
                        break;
                    }
                    Wakeup::Next(None) => {
                        debug!("🏁 {}: queue closed and empty. Shutting down.", self.name);
                        break;
                    }
                    Wakeup::Next(Some(object)) => self.process(object).await,
                }
            }
            self.deliverer
                .close()
                .await
                .with_context(|| format!("💀 {} failed to close its deliverer", self.name))
        })
    }
}
