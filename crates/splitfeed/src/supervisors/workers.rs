//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! - `ListerWorker`: one per run. Lists, filters, enqueues, closes the queue.
//! - `FetchWorker`: N per run. Dequeues, fetches, splits, delivers, counts.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod fetch_worker;
mod lister_worker;

pub(crate) use fetch_worker::FetchWorker;
pub(crate) use lister_worker::ListerWorker;

/// 🏗️ A background worker, that does work. duh.
pub trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 🏷️ Worker `n` is known to logs and deliverers as `S3Reader{n}`.
pub(crate) fn worker_name(n: usize) -> String {
    format!("S3Reader{n}")
}
