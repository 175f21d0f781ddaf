// ai
//! 📬 Deliverers: the end of the line for a record.
//!
//! 🚰 A fetch worker hands every whole record to its own deliverer, one at a time,
//! in stream order. Where the record goes after that is none of the worker's business.
//!
//! # Knowledge Graph 🧠
//! - Pattern: trait → concrete impls (`DiscardDeliverer`, `FileDeliverer`,
//!   `InMemoryDeliverer`) → `DelivererBackend` enum → `DelivererFactory`
//! - One deliverer per worker identity (`S3Reader{n}`), created when the worker starts,
//!   closed when the worker exits. Never shared, so no locks on the hot path
//!   (the in-memory one excepted, and it only exists for tests).
//! - A failed `deliver` aborts the current object exactly like a broken stream does.
//! - Ancient proverb: "He who puts business logic in the Deliverer, debugs in production."

mod discard;
mod file;
mod in_mem;

pub use discard::DiscardDeliverer;
pub use file::{FileDeliverer, FileDelivererConfig};
pub use in_mem::{DeliveredRecord, InMemoryDeliverer, InMemoryDeliveries};

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::common::Record;

/// 🕳️ Accepts one record at a time for one worker.
///
/// # Contract 📜
/// - `deliver` takes ownership of the record. An `Err` aborts the object being fetched.
/// - `close` flushes and releases. Called exactly once, when the worker exits.
#[async_trait]
pub trait Deliverer: std::fmt::Debug + Send {
    /// 📡 Hand one record to the destination.
    async fn deliver(&mut self, record: Record) -> Result<()>;
    /// 🗑️ Flush, finalize, and release.
    async fn close(&mut self) -> Result<()>;
}

// ===== Config =====

/// 🔧 Where records go. Externally tagged, so TOML reads `deliverer = "Discard"` or
/// `[deliverer.File]`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub enum DelivererConfig {
    /// 🗑️ count them and let them go
    #[default]
    Discard,
    File(FileDelivererConfig),
}

impl DelivererConfig {
    /// ✅ Startup check.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Discard => Ok(()),
            Self::File(cfg) => {
                if cfg.directory.as_os_str().is_empty() {
                    bail!("💀 deliverer.File.directory is empty. Records need somewhere to live.");
                }
                Ok(())
            }
        }
    }
}

// ===== Dispatcher Enum =====

/// 🎭 The many faces of a Deliverer.
#[derive(Debug)]
pub enum DelivererBackend {
    Discard(DiscardDeliverer),
    File(FileDeliverer),
    InMemory(InMemoryDeliverer),
}

#[async_trait]
impl Deliverer for DelivererBackend {
    async fn deliver(&mut self, record: Record) -> Result<()> {
        match self {
            Self::Discard(d) => d.deliver(record).await,
            Self::File(d) => d.deliver(record).await,
            Self::InMemory(d) => d.deliver(record).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Discard(d) => d.close().await,
            Self::File(d) => d.close().await,
            Self::InMemory(d) => d.close().await,
        }
    }
}

// ===== Factory =====

#[derive(Debug, Clone)]
enum FactoryKind {
    Discard,
    File(PathBuf),
    InMemory(InMemoryDeliveries),
}

/// 🏭 Mints one deliverer per worker identity.
///
/// Cheap to clone; every worker gets a copy and calls `for_worker` with its own name.
#[derive(Debug, Clone)]
pub struct DelivererFactory {
    kind: FactoryKind,
}

impl DelivererFactory {
    /// 🔧 Resolve a factory from config. The output directory is created here, at startup,
    /// so a read-only disk is a startup failure and not ten worker failures.
    pub async fn from_config(config: &DelivererConfig) -> Result<Self> {
        config.validate()?;
        let kind = match config {
            DelivererConfig::Discard => FactoryKind::Discard,
            DelivererConfig::File(cfg) => {
                tokio::fs::create_dir_all(&cfg.directory)
                    .await
                    .with_context(|| {
                        format!(
                            "💀 deliverer directory '{}' could not be created",
                            cfg.directory.display()
                        )
                    })?;
                FactoryKind::File(cfg.directory.clone())
            }
        };
        Ok(Self { kind })
    }

    pub fn discard() -> Self {
        Self {
            kind: FactoryKind::Discard,
        }
    }

    /// 🧪 Every worker's records land in the returned shared log.
    pub fn in_memory() -> (Self, InMemoryDeliveries) {
        let the_deliveries = InMemoryDeliveries::default();
        (
            Self {
                kind: FactoryKind::InMemory(the_deliveries.clone()),
            },
            the_deliveries,
        )
    }

    /// 🚀 A fresh deliverer for `worker_name`.
    pub async fn for_worker(&self, worker_name: &str) -> Result<DelivererBackend> {
        debug!("📬 building deliverer for {worker_name}");
        Ok(match &self.kind {
            FactoryKind::Discard => DelivererBackend::Discard(DiscardDeliverer::new(worker_name)),
            FactoryKind::File(directory) => {
                let the_deliverer = FileDeliverer::new(directory, worker_name).await?;
                debug!("📝 {worker_name} writes to {}", the_deliverer.path().display());
                DelivererBackend::File(the_deliverer)
            }
            FactoryKind::InMemory(deliveries) => {
                DelivererBackend::InMemory(InMemoryDeliverer::new(worker_name, deliveries.clone()))
            }
        })
    }
}
