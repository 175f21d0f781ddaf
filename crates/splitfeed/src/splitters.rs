// ai
//! ✂️ Splitters: finding the seams in a byte stream.
//!
//! 🎬 *[a chunk arrives. it ends halfway through a record. the splitter sighs and keeps the half.]*
//!
//! A split file is a pile of records glued end to end. The object store hands
//! us that pile in arbitrary chunks, and chunk boundaries have never once in
//! history lined up with record boundaries. The splitter is the only thing in
//! the pipeline allowed to hold a partial record between reads. Everything
//! downstream of it only ever sees whole records.
//!
//! 🧠 Knowledge graph:
//! - **Delimited** (`DelimitedSplitter`): one delimiter byte ends a record. Newline by default.
//! - **LengthPrefixed** (`LengthPrefixedSplitter`): 4-byte big-endian length, then payload.
//! - Resolution: `SplitterBackend::from_config`, same trait → impls → enum → resolver
//!   pattern as the backends and deliverers.
//! - `remaining_bytes()` after end-of-stream is the corruption signal. Nonzero means the
//!   object ended mid-frame.
//!
//! ```text
//! FetchWorker:
//!   chunk → splitter.feed(chunk) → Record, Record, ... → deliverer
//!   EOF   → splitter.remaining_bytes() → discarded bytes (if any)
//! ```
//!
//! 🦆 (the duck has been split before. it does not want to talk about it.)

mod delimited;
mod length_prefixed;

pub use delimited::DelimitedSplitter;
pub use length_prefixed::LengthPrefixedSplitter;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::common::Record;

// ===== Trait =====

/// ✂️ Turns a byte stream into whole records, one chunk at a time.
///
/// # Contract 📜
/// - `buffer` appends a chunk. It never fails and never emits.
/// - `next_record` pops the next whole record, `Ok(None)` when only a partial frame is left.
/// - `Err` means the framing itself is broken (oversized frame, etc). The fetch for that
///   object stops there.
/// - `remaining_bytes` is whatever is buffered but not yet a record.
/// - `reset` forgets everything. Called between objects.
pub trait Splitter: std::fmt::Debug + Send {
    /// 📥 Append a chunk to the internal buffer.
    fn buffer(&mut self, chunk: &[u8]);

    /// 🧱 Pop the next whole record, if the buffer holds one.
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// 🧮 Bytes buffered that have not (yet) become a record.
    fn remaining_bytes(&self) -> usize;

    /// 🧹 Drop all buffered state.
    fn reset(&mut self);

    /// 🔄 Feed a chunk and lazily walk every record it completes.
    fn feed(&mut self, chunk: &[u8]) -> Records<'_, Self>
    where
        Self: Sized,
    {
        self.buffer(chunk);
        self.records()
    }

    /// 🔄 Lazily walk every whole record currently buffered.
    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records {
            splitter: self,
            failed: false,
        }
    }
}

/// 🚶 The lazy walk over a splitter's buffered records. Fuses after the first error.
#[derive(Debug)]
pub struct Records<'a, S: Splitter> {
    splitter: &'a mut S,
    failed: bool,
}

impl<S: Splitter> Iterator for Records<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.splitter.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ===== Config =====

/// 🔧 Which framing the objects use. Externally tagged, so TOML reads
/// `[splitter.Delimited]` or `[splitter.LengthPrefixed]`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum SplitterConfig {
    Delimited(DelimitedSplitterConfig),
    LengthPrefixed(LengthPrefixedSplitterConfig),
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self::Delimited(DelimitedSplitterConfig::default())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DelimitedSplitterConfig {
    /// 🔚 Exactly one byte. `"\n"` unless told otherwise.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_max_record_size")]
    pub max_record_size: usize,
}

impl Default for DelimitedSplitterConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            max_record_size: default_max_record_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LengthPrefixedSplitterConfig {
    #[serde(default = "default_max_record_size")]
    pub max_record_size: usize,
}

impl Default for LengthPrefixedSplitterConfig {
    fn default() -> Self {
        Self {
            max_record_size: default_max_record_size(),
        }
    }
}

fn default_delimiter() -> String {
    "\n".to_string()
}

// 📏 64 MiB. If a single record is bigger than this, it is not a record, it is a cry for help.
fn default_max_record_size() -> usize {
    64 * 1024 * 1024
}

impl SplitterConfig {
    /// ✅ Startup check. A bad splitter config never gets near a worker.
    pub fn validate(&self) -> Result<()> {
        let max_record_size = match self {
            Self::Delimited(cfg) => {
                if cfg.delimiter.len() != 1 {
                    bail!(
                        "💀 splitter delimiter must be exactly one byte, got {:?} ({} bytes)",
                        cfg.delimiter,
                        cfg.delimiter.len()
                    );
                }
                cfg.max_record_size
            }
            Self::LengthPrefixed(cfg) => cfg.max_record_size,
        };
        if max_record_size == 0 {
            bail!("💀 splitter max_record_size must be greater than zero");
        }
        Ok(())
    }
}

// ===== Dispatcher Enum =====

/// 🎭 The polymorphic splitter. One per worker, reset between objects.
#[derive(Debug, Clone)]
pub enum SplitterBackend {
    Delimited(DelimitedSplitter),
    LengthPrefixed(LengthPrefixedSplitter),
}

impl SplitterBackend {
    /// 🔧 Resolve a fresh splitter from config.
    pub fn from_config(config: &SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config {
            SplitterConfig::Delimited(cfg) => Self::Delimited(DelimitedSplitter::new(
                cfg.delimiter.as_bytes()[0],
                cfg.max_record_size,
            )),
            SplitterConfig::LengthPrefixed(cfg) => {
                Self::LengthPrefixed(LengthPrefixedSplitter::new(cfg.max_record_size))
            }
        })
    }
}

impl Splitter for SplitterBackend {
    #[inline]
    fn buffer(&mut self, chunk: &[u8]) {
        match self {
            Self::Delimited(s) => s.buffer(chunk),
            Self::LengthPrefixed(s) => s.buffer(chunk),
        }
    }

    #[inline]
    fn next_record(&mut self) -> Result<Option<Record>> {
        match self {
            Self::Delimited(s) => s.next_record(),
            Self::LengthPrefixed(s) => s.next_record(),
        }
    }

    #[inline]
    fn remaining_bytes(&self) -> usize {
        match self {
            Self::Delimited(s) => s.remaining_bytes(),
            Self::LengthPrefixed(s) => s.remaining_bytes(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Delimited(s) => s.reset(),
            Self::LengthPrefixed(s) => s.reset(),
        }
    }
}
