//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Listing sources say which objects exist. Content sources hand over their bytes.
//! The pipeline core never learns whether those bytes came from S3, a manifest on
//! local disk, or a `HashMap` a test made up thirty milliseconds ago.
//!
//! 🧠 Knowledge graph:
//! - `ListingSource::list(prefix)` → lazy, single-pass stream of `ListEntry`
//! - `ContentSource::open(key)` → lazy stream of byte chunks, or an error up front
//!   (a missing object is an error from `open`, never a half-delivered stream)
//! - Impls: `S3Store` (both), `ManifestListing` (listing), `InMemoryStore` (both)
//! - Enums: `ListingBackend`, `StoreBackend`, same dispatch-by-match pattern as everywhere else
//! - `Backends::from_source_config` resolves both from `SourceConfig`; no bucket means
//!   no content source at all, which is the fetcher's no-op mode
//!
//! 🦆 The duck is a backend now. It lists nothing and returns nothing. It is very reliable.

mod in_mem;
mod manifest;
mod s3;

pub use in_mem::{InMemoryObject, InMemoryStore};
pub use manifest::ManifestListing;
pub use s3::S3Store;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tracing::{info, warn};

use crate::app_config::SourceConfig;
use crate::common::ListEntry;

/// 🌊 One object's bytes, chunk by chunk, as the transport delivered them.
pub type ByteChunks = BoxStream<'static, Result<Vec<u8>>>;

// ===== Traits =====

/// 📜 Enumerates object keys under a prefix.
///
/// # Contract
/// - Lazy and single-pass. Calling `list` again starts a brand new listing.
/// - Per-entry errors are `Err` items; the stream keeps going when it can.
/// - No deduplication promised.
pub trait ListingSource: std::fmt::Debug + Send + Sync {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, ListEntry>;
}

/// 📥 Opens one object as a stream of byte chunks.
///
/// # Contract
/// - Not found is an `Err` from `open`, not an empty or partial stream.
/// - The stream ends when the object ends. Mid-stream `Err` means the read broke.
/// - Timeouts and retries belong to the implementation's transport, not to the caller.
#[async_trait]
pub trait ContentSource: std::fmt::Debug + Send + Sync {
    async fn open(&self, key: &str) -> Result<ByteChunks>;
}

// ===== Dispatcher Enums =====

/// 🎭 The many faces of a listing.
#[derive(Debug, Clone)]
pub enum ListingBackend {
    S3(S3Store),
    Manifest(ManifestListing),
    InMemory(InMemoryStore),
    /// 🕳️ nothing configured to list from; the run starts and ends immediately
    Empty,
}

impl ListingSource for ListingBackend {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, ListEntry> {
        match self {
            Self::S3(s) => s.list(prefix),
            Self::Manifest(m) => m.list(prefix),
            Self::InMemory(i) => i.list(prefix),
            Self::Empty => Box::pin(stream::empty()),
        }
    }
}

/// 🎭 The many faces of a content source.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    S3(S3Store),
    InMemory(InMemoryStore),
}

#[async_trait]
impl ContentSource for StoreBackend {
    async fn open(&self, key: &str) -> Result<ByteChunks> {
        match self {
            Self::S3(s) => s.open(key).await,
            Self::InMemory(i) => i.open(key).await,
        }
    }
}

/// 📦 The listing and the (optional) content source, resolved together.
#[derive(Debug, Clone)]
pub struct Backends {
    pub listing: ListingBackend,
    pub store: Option<StoreBackend>,
}

impl Backends {
    /// 🔧 Resolve backends from config.
    ///
    /// | bucket | manifest_file | listing  | store |
    /// |--------|---------------|----------|-------|
    /// | yes    | no            | S3       | S3    |
    /// | yes    | yes           | Manifest | S3    |
    /// | no     | yes           | Manifest | none  |
    /// | no     | no            | Empty    | none  |
    ///
    /// 💀 Fails if the manifest is missing or the S3 client cannot be configured.
    pub async fn from_source_config(config: &SourceConfig) -> Result<Self> {
        let the_s3 = match &config.bucket {
            Some(_) => Some(S3Store::new(config).await?),
            None => None,
        };

        let listing = match (&config.manifest_file, &the_s3) {
            (Some(path), _) => ListingBackend::Manifest(ManifestListing::new(path).await?),
            (None, Some(s3)) => ListingBackend::S3(s3.clone()),
            (None, None) => {
                warn!("🕳️ no bucket and no manifest_file configured; nothing will be listed");
                ListingBackend::Empty
            }
        };

        if the_s3.is_none() {
            info!("🪣 no bucket configured; fetches will be no-ops");
        }

        Ok(Self {
            listing,
            store: the_s3.map(StoreBackend::S3),
        })
    }
}
