// human
//! 📜 The ListerWorker: walks the listing, lets the right keys through, and closes the
//! queue behind it.
//!
//! 🧠 Knowledge graph:
//! - Listing errors: logged, skipped. They never end the run.
//! - Filter: base name only. `Found:` goes on the queue, `Skipping:` does not, and
//!   neither touches the stats.
//! - A full queue blocks `send`. That is the backpressure. Nothing is ever dropped.
//! - The stop signal is checked before every pull from the listing (biased, so a
//!   pending stop wins over a ready entry). The entry already pulled when stop
//!   lands may still be enqueued; the draining workers make room for it.
//! - The queue is closed exactly once, on the way out, however the loop ended.

use anyhow::Result;
use async_channel::Sender;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Worker;
use crate::backends::{ListingBackend, ListingSource};
use crate::common::ObjectId;
use crate::filters::{NameFilter, accepts};

#[derive(Debug)]
pub(crate) struct ListerWorker {
    listing: ListingBackend,
    prefix: String,
    filter: Option<NameFilter>,
    tx: Sender<ObjectId>,
    stop: CancellationToken,
}

impl ListerWorker {
    pub(crate) fn new(
        listing: ListingBackend,
        prefix: String,
        filter: Option<NameFilter>,
        tx: Sender<ObjectId>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            listing,
            prefix,
            filter,
            tx,
            stop,
        }
    }

    async fn run(&self) -> (u64, u64, u64) {
        let (mut the_found, mut the_skipped, mut the_errors) = (0u64, 0u64, 0u64);
        let mut the_listing = self.listing.list(&self.prefix);
        loop {
            let the_next = tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!("🛑 lister saw the stop signal; no more listing");
                    break;
                }
                next = the_listing.next() => next,
            };

            match the_next {
                None => break,
                Some(Err(e)) => {
                    the_errors += 1;
                    warn!("💀 listing error under '{}': {:#}", self.prefix, e);
                }
                Some(Ok(object)) => {
                    if !accepts(self.filter.as_ref(), &object.key) {
                        the_skipped += 1;
                        debug!("Skipping: {}", object.key);
                        continue;
                    }
                    debug!("Found: {}", object.key);
                    the_found += 1;
                    if self.tx.send(object).await.is_err() {
                        // -- 🚪 only we close the queue, so this means every receiver is gone
                        warn!("💀 dispatch queue has no receivers left; lister gives up");
                        break;
                    }
                }
            }
        }
        (the_found, the_skipped, the_errors)
    }
}

impl Worker for ListerWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            info!(
                "📜 listing under '{}' with filter {}",
                self.prefix,
                self.filter
                    .as_ref()
                    .map(NameFilter::description)
                    .unwrap_or_else(|| "none".to_string())
            );
            let (the_found, the_skipped, the_errors) = self.run().await;
            self.tx.close();
            info!(
                "🏁 all done listing ({the_found} found, {the_skipped} skipped, {the_errors} listing errors). Closing the queue."
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use std::time::Duration;

    fn the_store_with(keys: &[&str]) -> InMemoryStore {
        keys.iter()
            .fold(InMemoryStore::new(), |store, key| store.with_object(key, vec![]))
    }

    #[tokio::test]
    async fn the_one_where_a_full_queue_makes_the_lister_wait() {
        let the_keys: Vec<String> = (0..10).map(|i| format!("k{i}")).collect();
        let the_refs: Vec<&str> = the_keys.iter().map(String::as_str).collect();
        let (the_tx, the_rx) = async_channel::bounded(3);
        let the_handle = ListerWorker::new(
            ListingBackend::InMemory(the_store_with(&the_refs)),
            String::new(),
            None,
            the_tx,
            CancellationToken::new(),
        )
        .start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(the_rx.len(), 3, "💀 the queue holds exactly its capacity, no more");
        assert!(!the_handle.is_finished(), "💀 the lister should be blocked, not done");

        let mut the_received = Vec::new();
        while let Ok(object) = the_rx.recv().await {
            assert!(the_rx.len() <= 3);
            the_received.push(object.key);
        }
        assert_eq!(the_received, the_keys, "💀 nothing dropped, nothing reordered");
        the_handle
            .await
            .expect("💀 lister panicked")
            .expect("💀 lister failed");
    }

    #[tokio::test]
    async fn the_one_where_only_the_gz_gets_in() {
        let (the_tx, the_rx) = async_channel::bounded(10);
        ListerWorker::new(
            ListingBackend::InMemory(the_store_with(&["a.gz", "b.txt", "a.log"])),
            String::new(),
            Some(NameFilter::glob("*.gz").expect("💀 glob")),
            the_tx,
            CancellationToken::new(),
        )
        .start()
        .await
        .expect("💀 lister panicked")
        .expect("💀 lister failed");

        let mut the_received = Vec::new();
        while let Ok(object) = the_rx.recv().await {
            the_received.push(object.key);
        }
        assert_eq!(the_received, vec!["a.gz".to_string()]);
        assert!(the_rx.is_closed());
    }

    #[tokio::test]
    async fn the_one_where_listing_errors_are_stepped_over() {
        let the_store = InMemoryStore::new()
            .with_object("logs/a", vec![])
            .with_listing_error("page 2 fell over")
            .with_object("logs/b", vec![])
            .with_object("elsewhere/c", vec![]);
        let (the_tx, the_rx) = async_channel::bounded(10);
        ListerWorker::new(
            ListingBackend::InMemory(the_store),
            "logs/".to_string(),
            None,
            the_tx,
            CancellationToken::new(),
        )
        .start()
        .await
        .expect("💀 lister panicked")
        .expect("💀 lister failed");

        let mut the_received = Vec::new();
        while let Ok(object) = the_rx.recv().await {
            the_received.push(object.key);
        }
        assert_eq!(the_received, vec!["logs/a".to_string(), "logs/b".to_string()]);
    }

    #[tokio::test]
    async fn the_one_where_a_stopped_lister_closes_the_queue_anyway() {
        let the_stop = CancellationToken::new();
        the_stop.cancel();
        let (the_tx, the_rx) = async_channel::bounded::<ObjectId>(10);
        ListerWorker::new(
            ListingBackend::InMemory(the_store_with(&["a", "b", "c"])),
            String::new(),
            None,
            the_tx,
            the_stop,
        )
        .start()
        .await
        .expect("💀 lister panicked")
        .expect("💀 lister failed");

        assert!(the_rx.is_closed());
        assert!(the_rx.is_empty(), "💀 a pre-stopped lister enqueues nothing");
    }
}
