//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor: wires one lister and N fetch workers to one bounded queue and
//! one stop signal, then hands back a `PipelineHandle`.
//!
//! 🧠 Knowledge graph:
//! - Everything that can fail at startup fails in `start`/`start_with`, before a single
//!   task is spawned: config validation, backends, filter, splitters, deliverers.
//! - Lister → `async_channel::bounded(queue_capacity)` → `S3Reader0..S3Reader{N-1}`.
//! - A supervisor task joins the lister and every worker, flips the state to `Stopped`,
//!   stops the reporter, and yields the final snapshot. That is what `wait` awaits.
//! - Workers are the supervisor's private little minions. They are not `pub`.

mod shutdown;
mod workers;

pub use shutdown::{PipelineState, ShutdownController};
pub use workers::Worker;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::{Backends, ListingBackend, StoreBackend};
use crate::deliverers::DelivererFactory;
use crate::fetcher::ObjectFetcher;
use crate::filters::NameFilter;
use crate::progress::StatsReporter;
use crate::splitters::{SplitterBackend, SplitterConfig};
use crate::stats::{PipelineStats, StatsSnapshot};
use workers::{FetchWorker, ListerWorker, worker_name};

/// 🧩 Every collaborator a run needs, already resolved.
///
/// `Supervisor::start` builds this from config; tests build it by hand with in-memory
/// backends and hand it to `Supervisor::start_with`.
#[derive(Debug)]
pub struct PipelineParts {
    pub listing: ListingBackend,
    pub store: Option<StoreBackend>,
    pub prefix: String,
    pub filter: Option<NameFilter>,
    pub splitter: SplitterConfig,
    pub deliverers: DelivererFactory,
    pub runtime: RuntimeConfig,
    pub decompress_gzip: bool,
}

impl PipelineParts {
    /// 🔧 Resolve every collaborator from config. Any failure here is fatal.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let the_backends = Backends::from_source_config(&config.source)
            .await
            .context("💀 could not set up the listing and content backends")?;
        Ok(Self {
            listing: the_backends.listing,
            store: the_backends.store,
            prefix: config.source.cleaned_prefix(),
            filter: NameFilter::from_source_config(&config.source)?,
            splitter: config.splitter.clone(),
            deliverers: DelivererFactory::from_config(&config.deliverer).await?,
            runtime: config.runtime.clone(),
            decompress_gzip: config.source.decompress_gzip,
        })
    }
}

/// 🎛️ The caller's grip on a running pipeline.
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: ShutdownController,
    stats: Arc<PipelineStats>,
    supervisor: JoinHandle<StatsSnapshot>,
}

impl PipelineHandle {
    /// 🛑 Ask the run to stop. `false` if it was already stopping or stopped.
    pub fn stop(&self) -> bool {
        self.shutdown.stop()
    }

    pub fn state(&self) -> PipelineState {
        self.shutdown.state()
    }

    /// 📸 Live counters, right now.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 🎛️ A clone of the stop switch, for signal handlers and other people's tasks.
    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// ⏳ Resolves once the lister and every worker have exited.
    pub async fn wait(self) -> Result<StatsSnapshot> {
        self.supervisor
            .await
            .context("💀 the supervisor task itself fell over")
    }
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?".
pub struct Supervisor;

impl Supervisor {
    /// 🚀 Validate, resolve, spawn. Config problems come back as `Err` and nothing runs.
    pub async fn start(config: AppConfig) -> Result<PipelineHandle> {
        config.validate()?;
        let the_parts = PipelineParts::from_config(&config).await?;
        Self::start_with(the_parts).await
    }

    /// 🚀 Spawn a run from explicit collaborators.
    pub async fn start_with(parts: PipelineParts) -> Result<PipelineHandle> {
        let PipelineParts {
            listing,
            store,
            prefix,
            filter,
            splitter,
            deliverers,
            runtime,
            decompress_gzip,
        } = parts;

        if runtime.worker_count == 0 {
            bail!("💀 worker_count must be at least 1. Zero workers is a strike, not a pipeline.");
        }
        if runtime.queue_capacity == 0 {
            bail!("💀 queue_capacity must be at least 1");
        }

        // -- 🏗️ build every worker's splitter and deliverer before anything is spawned
        let mut the_kits = Vec::with_capacity(runtime.worker_count);
        for n in 0..runtime.worker_count {
            let the_name = worker_name(n);
            let the_splitter = SplitterBackend::from_config(&splitter)?;
            let the_deliverer = deliverers
                .for_worker(&the_name)
                .await
                .with_context(|| format!("💀 could not build the deliverer for {the_name}"))?;
            the_kits.push((the_name, the_splitter, the_deliverer));
        }

        if store.is_none() {
            warn!("🪣 no bucket configured: every listed object will be a no-op fetch");
        }
        info!(
            "🚀 starting pipeline: {} workers, queue capacity {}, prefix '{}'",
            runtime.worker_count, runtime.queue_capacity, prefix
        );

        let the_shutdown = ShutdownController::new();
        let the_stats = Arc::new(PipelineStats::new());
        let (the_tx, the_rx) = async_channel::bounded(runtime.queue_capacity);
        let the_fetcher = ObjectFetcher::new(store, decompress_gzip);

        let mut the_handles = Vec::with_capacity(runtime.worker_count + 1);
        the_handles.push(
            ListerWorker::new(listing, prefix, filter, the_tx, the_shutdown.token()).start(),
        );
        for (the_name, the_splitter, the_deliverer) in the_kits {
            the_handles.push(
                FetchWorker::new(
                    the_name,
                    the_rx.clone(),
                    the_fetcher.clone(),
                    the_splitter,
                    the_deliverer,
                    the_stats.clone(),
                    the_shutdown.token(),
                )
                .start(),
            );
        }
        // -- 🔒 workers hold their own clones; the lister's send fails only once theirs are all gone
        drop(the_rx);

        let the_reporter = spawn_reporter(&the_stats, runtime.stats_interval_secs);

        let the_supervisor = {
            let the_shutdown = the_shutdown.clone();
            let the_stats = the_stats.clone();
            tokio::spawn(async move {
                for result in join_all(the_handles).await {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("💀 a worker exited with an error: {:#}", e),
                        Err(e) => error!("💀 a worker panicked: {}", e),
                    }
                }
                the_shutdown.mark_stopped();
                if let Some((the_done, reporter)) = the_reporter {
                    the_done.cancel();
                    if let Err(e) = reporter.await {
                        warn!("💀 the stats reporter fell over: {}", e);
                    }
                }
                let the_final = the_stats.snapshot();
                info!(
                    "🏁 pipeline stopped: {} files ({} failed), {} records ({} failed)",
                    the_final.files_processed,
                    the_final.file_failures,
                    the_final.records_processed,
                    the_final.record_failures
                );
                the_final
            })
        };

        Ok(PipelineHandle {
            shutdown: the_shutdown,
            stats: the_stats,
            supervisor: the_supervisor,
        })
    }
}

/// 📡 The reporter gets its own token, cancelled only once every worker has returned.
/// A stop request leaves it ticking while in-flight fetches finish.
fn spawn_reporter(
    stats: &Arc<PipelineStats>,
    interval_secs: u64,
) -> Option<(CancellationToken, JoinHandle<()>)> {
    (interval_secs > 0).then(|| {
        let the_done = CancellationToken::new();
        let the_reporter = StatsReporter::new(stats.clone(), Duration::from_secs(interval_secs))
            .spawn(the_done.clone());
        (the_done, the_reporter)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::deliverers::InMemoryDeliveries;
    use std::collections::HashSet;
    use tokio::sync::Semaphore;

    fn runtime_of(worker_count: usize, queue_capacity: usize) -> RuntimeConfig {
        RuntimeConfig {
            worker_count,
            queue_capacity,
            stats_interval_secs: 0,
        }
    }

    fn build_parts(store: InMemoryStore, runtime: RuntimeConfig) -> (PipelineParts, InMemoryDeliveries) {
        let (the_factory, the_deliveries) = DelivererFactory::in_memory();
        (
            PipelineParts {
                listing: ListingBackend::InMemory(store.clone()),
                store: Some(StoreBackend::InMemory(store)),
                prefix: String::new(),
                filter: None,
                splitter: SplitterConfig::default(),
                deliverers: the_factory,
                runtime,
                decompress_gzip: true,
            },
            the_deliveries,
        )
    }

    async fn finish(handle: PipelineHandle) -> StatsSnapshot {
        tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("💀 the run never terminated. Deadlock. Somewhere, a goroutine weeps.")
            .expect("💀 supervisor failed")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_every_record_arrives_exactly_once() {
        let mut the_store = InMemoryStore::new();
        let mut the_expected = HashSet::new();
        for file in 0..20 {
            let mut the_body = Vec::new();
            for line in 0..25 {
                let the_payload = format!("file{file}-line{line}");
                the_body.extend_from_slice(the_payload.as_bytes());
                the_body.push(b'\n');
                the_expected.insert(the_payload.into_bytes());
            }
            let the_chunks = the_body.chunks(7).map(<[u8]>::to_vec).collect();
            the_store = the_store.with_object(&format!("logs/{file:02}.log"), the_chunks);
        }
        let (the_parts, the_deliveries) = build_parts(the_store, runtime_of(4, 3));

        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        assert_eq!(the_handle.state(), PipelineState::Running);
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_snapshot.files_processed, 20);
        assert_eq!(the_snapshot.file_failures, 0);
        assert_eq!(the_snapshot.records_processed, 500);
        assert_eq!(the_snapshot.discarded_bytes, 0);
        let the_payloads = the_deliveries.payloads();
        assert_eq!(the_payloads.len(), 500, "💀 duplicates or losses");
        let the_unique: HashSet<Vec<u8>> = the_payloads.into_iter().collect();
        assert_eq!(the_unique, the_expected);
    }

    #[tokio::test]
    async fn the_one_where_records_from_one_object_keep_their_order() {
        let the_store = InMemoryStore::new().with_object(
            "only",
            vec![b"1\n2\n".to_vec(), b"3\n4".to_vec(), b"\n5\n".to_vec()],
        );
        let (the_parts, the_deliveries) = build_parts(the_store, runtime_of(3, 10));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        finish(the_handle).await;
        assert_eq!(
            the_deliveries.payloads(),
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec(), b"4".to_vec(), b"5".to_vec()]
        );
    }

    #[tokio::test]
    async fn the_one_where_k_trailing_bytes_become_k_discarded_bytes() {
        let the_store = InMemoryStore::new()
            .with_object("clean", vec![b"ok\n".to_vec()])
            .with_object("ragged", vec![b"ok\nleft".to_vec(), b"over".to_vec()]);
        let (the_parts, _) = build_parts(the_store, runtime_of(2, 10));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_snapshot.discarded_bytes, 8);
        assert_eq!(the_snapshot.records_processed, 2);
        assert_eq!(the_snapshot.file_failures, 0);
        assert_eq!(the_snapshot.record_failures, 0);
    }

    #[tokio::test]
    async fn the_one_where_one_bad_object_does_not_spoil_the_bunch() {
        let the_store = InMemoryStore::new()
            .with_object("a", vec![b"1\n".to_vec()])
            .with_failing_object("b", vec![b"2\n".to_vec(), b"3\n".to_vec()], 1)
            .with_listed_key("ghost")
            .with_object("c", vec![b"4\n".to_vec()]);
        let (the_parts, _) = build_parts(the_store, runtime_of(2, 10));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_snapshot.files_processed, 4);
        assert_eq!(the_snapshot.file_failures, 2);
        assert_eq!(the_snapshot.record_failures, 2);
        assert_eq!(the_snapshot.records_processed, 3);
        assert!(the_snapshot.file_failures <= the_snapshot.files_processed);
    }

    #[tokio::test]
    async fn the_one_where_there_is_no_bucket_and_nobody_minds() {
        let the_listing = InMemoryStore::new()
            .with_object("a", vec![b"never read\n".to_vec()])
            .with_object("b", vec![])
            .with_object("c", vec![]);
        let the_spy = the_listing.clone();
        let (mut the_parts, the_deliveries) = build_parts(the_listing, runtime_of(2, 10));
        the_parts.store = None;

        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_snapshot.files_processed, 3);
        assert_eq!(the_snapshot.file_failures, 0);
        assert_eq!(the_snapshot.records_processed, 0);
        assert_eq!(the_snapshot.record_bytes, 0);
        assert_eq!(the_snapshot.record_failures, 0);
        assert!(the_deliveries.is_empty());
        assert!(the_spy.opened_keys().is_empty());
    }

    #[tokio::test]
    async fn the_one_where_the_filter_keeps_the_riffraff_out() {
        let the_store = InMemoryStore::new()
            .with_object("in/a.gz", vec![])
            .with_object("in/b.txt", vec![b"nope\n".to_vec()])
            .with_object("in/a.log", vec![b"nope\n".to_vec()]);
        let the_spy = the_store.clone();
        let (mut the_parts, _) = build_parts(the_store, runtime_of(1, 10));
        the_parts.filter = Some(NameFilter::glob("*.gz").expect("💀 glob"));
        the_parts.decompress_gzip = false;

        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_spy.opened_keys(), vec!["in/a.gz".to_string()]);
        assert_eq!(the_snapshot.files_processed, 1);
        assert_eq!(the_snapshot.file_failures, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn the_one_where_stop_drains_the_queue_and_lets_the_fetch_finish() {
        let the_gate = Arc::new(Semaphore::new(0));
        let mut the_store = InMemoryStore::new().with_gate(the_gate.clone());
        for i in 0..10 {
            the_store = the_store.with_object(&format!("k{i}"), vec![format!("r{i}\n").into_bytes()]);
        }
        let the_spy = the_store.clone();
        let (the_parts, the_deliveries) = build_parts(the_store, runtime_of(1, 2));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");

        // -- wait until the lone worker is stuck inside the first fetch
        tokio::time::timeout(Duration::from_secs(5), async {
            while the_spy.opened_keys().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("💀 the worker never started fetching");
        // -- let the lister fill the queue and block on it
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(the_handle.stop());
        assert!(!the_handle.stop(), "💀 a second stop is a no-op");
        assert_eq!(the_handle.state(), PipelineState::Stopping);

        // -- the in-flight fetch is allowed to finish
        the_gate.add_permits(1);
        let the_snapshot = finish(the_handle).await;

        assert_eq!(the_spy.opened_keys(), vec!["k0".to_string()]);
        assert_eq!(the_snapshot.files_processed, 1);
        assert_eq!(the_snapshot.file_failures, 0);
        assert_eq!(the_deliveries.payloads(), vec![b"r0".to_vec()]);
    }

    #[tokio::test]
    async fn the_one_where_stop_after_the_end_is_harmless() {
        let the_store = InMemoryStore::new().with_object("a", vec![b"1\n".to_vec()]);
        let (the_parts, _) = build_parts(the_store, runtime_of(1, 1));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        let the_stopper = the_handle.shutdown_controller();
        finish(the_handle).await;

        assert_eq!(the_stopper.state(), PipelineState::Stopped);
        assert!(!the_stopper.stop());
        assert!(!the_stopper.stop());
        assert_eq!(the_stopper.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn the_one_where_zero_workers_never_gets_off_the_ground() {
        let (the_parts, _) = build_parts(InMemoryStore::new(), runtime_of(0, 10));
        assert!(Supervisor::start_with(the_parts).await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_an_empty_listing_finishes_immediately() {
        let (the_parts, _) = build_parts(InMemoryStore::new(), runtime_of(5, 1));
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");
        assert_eq!(finish(the_handle).await, StatsSnapshot::default());
    }

    #[tokio::test]
    async fn the_one_where_stats_only_ever_climb() {
        let mut the_store = InMemoryStore::new();
        for i in 0..50 {
            the_store = the_store.with_object(&format!("k{i}"), vec![b"a\nb\nc".to_vec()]);
        }
        let (mut the_parts, _) = build_parts(the_store, runtime_of(3, 4));
        the_parts.runtime.stats_interval_secs = 1;
        let the_handle = Supervisor::start_with(the_parts).await.expect("💀 start");

        let mut the_previous = the_handle.stats();
        for _ in 0..20 {
            tokio::task::yield_now().await;
            let the_current = the_handle.stats();
            assert!(the_current.files_processed >= the_previous.files_processed);
            assert!(the_current.records_processed >= the_previous.records_processed);
            assert!(the_current.record_bytes >= the_previous.record_bytes);
            assert!(the_current.discarded_bytes >= the_previous.discarded_bytes);
            the_previous = the_current;
        }

        let the_final = finish(the_handle).await;
        assert_eq!(the_final.files_processed, 50);
        assert_eq!(the_final.records_processed, 100);
        assert_eq!(the_final.discarded_bytes, 50);
        assert!(the_final.file_failures <= the_final.files_processed);
    }

    #[tokio::test]
    async fn the_one_where_a_bad_config_never_starts_a_task() {
        let mut the_config = AppConfig::default();
        the_config.source.object_match = Some("[".to_string());
        assert!(Supervisor::start(the_config).await.is_err());

        let mut the_config = AppConfig::default();
        the_config.runtime.worker_count = 0;
        assert!(Supervisor::start(the_config).await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_made_up_region_fails_before_any_listing() {
        let mut the_config = AppConfig::default();
        the_config.source.bucket = Some("split-files".to_string());
        the_config.source.region = "the-moon".to_string();
        let the_err = Supervisor::start(the_config)
            .await
            .expect_err("💀 a bogus region must not start a run");
        assert!(format!("{the_err:#}").contains("the-moon"));
    }

    #[tokio::test]
    async fn the_one_where_the_reporter_keeps_ticking_through_a_stop_request() {
        assert!(spawn_reporter(&Arc::new(PipelineStats::new()), 0).is_none());

        let the_shutdown = ShutdownController::new();
        let (the_done, the_reporter) = spawn_reporter(&Arc::new(PipelineStats::new()), 1)
            .expect("💀 a positive interval spawns a reporter");
        assert!(the_shutdown.stop());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!the_reporter.is_finished());

        the_done.cancel();
        the_reporter.await.expect("💀 reporter join");
    }

    #[tokio::test]
    async fn the_one_where_the_default_config_runs_an_empty_pipeline() {
        let the_handle = Supervisor::start(AppConfig {
            runtime: RuntimeConfig {
                stats_interval_secs: 0,
                ..RuntimeConfig::default()
            },
            ..AppConfig::default()
        })
        .await
        .expect("💀 no bucket, no manifest: still a valid (boring) run");
        assert_eq!(finish(the_handle).await, StatsSnapshot::default());
    }
}
