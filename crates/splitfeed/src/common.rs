// ai
//! 📦 Common data structures: the things that ride the conveyor belt.
//!
//! 🎬 COLD OPEN. INT. BUCKET. 3:47 AM.
//! A million split files sit in a prefix. Nobody remembers who wrote them.
//! Each one is a stack of records glued end to end, waiting for someone to
//! find the seams. This module names the passengers: the key that points at a
//! file, the entry the lister hands over, the record the splitter carves out,
//! and the outcome a fetch reports when it is done.
//!
//! 🦆 The duck is a passenger too. It did not buy a ticket.

use std::fmt;

/// 🗝️ One object in the store. The key is opaque; the size is whatever the
/// listing happened to know (manifests and S3 do, tests might not).
///
/// Immutable once produced. Two identical keys can show up in one run and
/// nobody downstream is obliged to care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId {
    pub key: String,
    pub size: Option<u64>,
}

impl ObjectId {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
        }
    }

    pub fn with_size(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size: Some(size),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// 📜 What a listing source yields per step: an object, or the reason it couldn't produce one.
/// Errors here are reported and skipped, never enqueued.
pub type ListEntry = anyhow::Result<ObjectId>;

/// 🧱 One whole, fully delimited record. The splitter makes it, the caller owns it,
/// the deliverer gets it, and then it is gone. No partial frame ever gets this far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    payload: Vec<u8>,
}

impl Record {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Vec<u8>> for Record {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&[u8]> for Record {
    fn from(payload: &[u8]) -> Self {
        Self::new(payload.to_vec())
    }
}

/// 📊 The per-object report card.
///
/// `leftover_bytes > 0` means the stream ended inside a frame: truncated upload,
/// corrupt tail, or a splitter that disagrees with the writer. Reported, never retried.
/// `error` is set when the fetch aborted; whatever was delivered before that stays delivered.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records_delivered: u64,
    pub bytes_delivered: u64,
    pub leftover_bytes: u64,
    pub error: Option<anyhow::Error>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
