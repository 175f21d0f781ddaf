// ai
//! # Previously, on Splitfeed...
//!
//! 🎬 The bucket was unreachable. The credentials had expired. The CI runner had
//! no network. And yet the tests had to run. Someone had to write a store so
//! simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! `InMemoryStore` is a listing source and a content source in one. Objects are
//! lists of chunks (so tests decide exactly where the chunk boundaries fall),
//! listing errors can be sprinkled in, objects can be told to break after N chunks,
//! and an optional gate holds every `open` until a permit is released. It also
//! remembers every key it was asked to open, which is how the shutdown tests
//! prove drained keys were never fetched.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also
//! deploy a therapist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tokio::sync::Semaphore;

use super::{ByteChunks, ContentSource, ListingSource};
use crate::common::{ListEntry, ObjectId};

/// 📦 One fake object: its chunks, and optionally the chunk after which the read breaks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObject {
    pub chunks: Vec<Vec<u8>>,
    pub fail_after: Option<usize>,
}

#[derive(Debug, Clone)]
enum Listed {
    Key(String),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    listing: Vec<Listed>,
    objects: HashMap<String, InMemoryObject>,
    gate: Option<Arc<Semaphore>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ➕ A listed object whose bytes arrive as the given chunks.
    pub fn with_object(mut self, key: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.listing.push(Listed::Key(key.to_string()));
        self.objects.insert(
            key.to_string(),
            InMemoryObject {
                chunks,
                fail_after: None,
            },
        );
        self
    }

    /// 💥 A listed object that breaks after `fail_after` chunks.
    pub fn with_failing_object(mut self, key: &str, chunks: Vec<Vec<u8>>, fail_after: usize) -> Self {
        self.listing.push(Listed::Key(key.to_string()));
        self.objects.insert(
            key.to_string(),
            InMemoryObject {
                chunks,
                fail_after: Some(fail_after),
            },
        );
        self
    }

    /// 👻 Listed, but `open` will say it doesn't exist.
    pub fn with_listed_key(mut self, key: &str) -> Self {
        self.listing.push(Listed::Key(key.to_string()));
        self
    }

    /// 💀 A listing entry that is an error.
    pub fn with_listing_error(mut self, message: &str) -> Self {
        self.listing.push(Listed::Error(message.to_string()));
        self
    }

    /// 🚧 Every `open` waits for (and consumes) one permit from this semaphore.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 📒 Every key `open` has been called with, in call order.
    pub fn opened_keys(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

impl ListingSource for InMemoryStore {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, ListEntry> {
        Box::pin(stream::iter(self.listing.iter().filter_map(
            move |listed| match listed {
                Listed::Key(key) if key.starts_with(prefix) => Some(Ok(ObjectId::new(key.clone()))),
                Listed::Key(_) => None,
                Listed::Error(message) => Some(Err(anyhow!("{message}"))),
            },
        )))
    }
}

#[async_trait]
impl ContentSource for InMemoryStore {
    async fn open(&self, key: &str) -> Result<ByteChunks> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(key.to_string());
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .context("💀 the in-memory gate was closed")?
                .forget();
        }

        let Some(object) = self.objects.get(key) else {
            bail!("💀 in-memory object '{key}' does not exist");
        };

        let mut the_items: Vec<Result<Vec<u8>>> = Vec::new();
        for (i, chunk) in object.chunks.iter().enumerate() {
            if object.fail_after == Some(i) {
                break;
            }
            the_items.push(Ok(chunk.clone()));
        }
        if let Some(n) = object.fail_after {
            the_items.push(Err(anyhow!(
                "💀 simulated read failure for '{key}' after {n} chunks"
            )));
        }
        Ok(Box::pin(stream::iter(the_items)))
    }
}
