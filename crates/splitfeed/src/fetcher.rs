// ai
//! 📥 The Object Fetcher: one key in, a stream of whole records out.
//!
//! 🎬 *[a worker pulls a key off the queue. somewhere in us-west-2, a disk spins up.]*
//!
//! 🧠 Knowledge graph:
//! - `open(key)` on the content source → chunks → (optional gunzip) → splitter → deliverer.
//! - The splitter is the only thing holding partial-record state. It is reset before
//!   each object, and its `remaining_bytes` after the stream ends (or breaks) is the
//!   object's leftover count.
//! - Every delivered record bumps `records_processed` and `record_bytes` as it goes,
//!   not at the end. A broken stream, broken framing, or failed delivery bumps
//!   `record_failures` once and stops the object. Records delivered before that stay delivered.
//! - Zero-length records are never delivered.
//! - No store configured at all is the no-op mode: log, deliver nothing, report nothing.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::write::MultiGzDecoder;
use futures::StreamExt;
use tracing::{debug, info};

use crate::backends::{ContentSource, StoreBackend};
use crate::common::{FetchOutcome, ObjectId};
use crate::deliverers::Deliverer;
use crate::splitters::Splitter;
use crate::stats::PipelineStats;

/// 🗜️ Turns transport chunks into content chunks. Plain passes through; gzip inflates
/// as it goes (write-side decoder, so one compressed chunk in means whatever inflated out).
/// Concatenated gzip members are one stream.
enum ChunkDecoder {
    Plain,
    Gzip(MultiGzDecoder<Vec<u8>>),
}

impl ChunkDecoder {
    fn for_key(key: &str, decompress_gzip: bool) -> Self {
        if decompress_gzip && key.ends_with(".gz") {
            Self::Gzip(MultiGzDecoder::new(Vec::new()))
        } else {
            Self::Plain
        }
    }

    /// Returns whatever inflated, even when the chunk then turned out to be corrupt.
    /// Those bytes still go to the splitter before the error does.
    fn decode(&mut self, chunk: Vec<u8>) -> (Vec<u8>, Result<()>) {
        match self {
            Self::Plain => (chunk, Ok(())),
            Self::Gzip(decoder) => {
                let the_result = decoder
                    .write_all(&chunk)
                    .context("💀 gzip stream is corrupt");
                (std::mem::take(decoder.get_mut()), the_result)
            }
        }
    }

    fn finish(&mut self) -> (Vec<u8>, Result<()>) {
        match self {
            Self::Plain => (Vec::new(), Ok(())),
            Self::Gzip(decoder) => {
                let the_result = decoder
                    .try_finish()
                    .context("💀 gzip stream ended before its trailer");
                (std::mem::take(decoder.get_mut()), the_result)
            }
        }
    }
}

/// 📥 Opens objects and walks their records. Shared by every worker (it holds no
/// per-object state of its own; that lives in the worker's splitter).
#[derive(Debug, Clone)]
pub struct ObjectFetcher {
    store: Option<StoreBackend>,
    decompress_gzip: bool,
}

impl ObjectFetcher {
    pub fn new(store: Option<StoreBackend>, decompress_gzip: bool) -> Self {
        Self {
            store,
            decompress_gzip,
        }
    }

    /// 🚀 Fetch one object, delivering every whole record it contains.
    ///
    /// Never returns `Err`: failures ride along in `FetchOutcome::error` so the worker
    /// can count them and move on to the next key.
    pub async fn fetch<S, D>(
        &self,
        object: &ObjectId,
        splitter: &mut S,
        deliverer: &mut D,
        stats: &PipelineStats,
    ) -> FetchOutcome
    where
        S: Splitter,
        D: Deliverer,
    {
        debug!("📥 preparing to read {}", object.key);
        let Some(store) = &self.store else {
            info!("🪣 where's my bucket? nothing configured, skipping the read of {}", object.key);
            return FetchOutcome::default();
        };

        splitter.reset();
        let mut the_outcome = FetchOutcome::default();
        if let Err(e) = self
            .stream_records(store, object, splitter, deliverer, stats, &mut the_outcome)
            .await
        {
            debug!("💀 read of {} aborted: {:#}", object.key, e);
            stats.record_failure();
            the_outcome.error = Some(e);
        }
        the_outcome.leftover_bytes = splitter.remaining_bytes() as u64;
        splitter.reset();
        the_outcome
    }

    async fn stream_records<S, D>(
        &self,
        store: &StoreBackend,
        object: &ObjectId,
        splitter: &mut S,
        deliverer: &mut D,
        stats: &PipelineStats,
        outcome: &mut FetchOutcome,
    ) -> Result<()>
    where
        S: Splitter,
        D: Deliverer,
    {
        let mut the_chunks = store.open(&object.key).await?;
        let mut the_decoder = ChunkDecoder::for_key(&object.key, self.decompress_gzip);

        while let Some(chunk) = the_chunks.next().await {
            let (the_bytes, the_result) = the_decoder.decode(chunk?);
            Self::deliver_all(&the_bytes, splitter, deliverer, stats, outcome).await?;
            the_result?;
        }

        let (the_tail, the_result) = the_decoder.finish();
        if !the_tail.is_empty() {
            Self::deliver_all(&the_tail, splitter, deliverer, stats, outcome).await?;
        }
        the_result
    }

    async fn deliver_all<S, D>(
        bytes: &[u8],
        splitter: &mut S,
        deliverer: &mut D,
        stats: &PipelineStats,
        outcome: &mut FetchOutcome,
    ) -> Result<()>
    where
        S: Splitter,
        D: Deliverer,
    {
        for record in splitter.feed(bytes) {
            let record = record?;
            if record.is_empty() {
                continue;
            }
            let the_len = record.len() as u64;
            deliverer
                .deliver(record)
                .await
                .context("💀 deliverer refused a record")?;
            stats.record_delivered(the_len);
            outcome.records_delivered += 1;
            outcome.bytes_delivered += the_len;
        }
        Ok(())
    }
}
