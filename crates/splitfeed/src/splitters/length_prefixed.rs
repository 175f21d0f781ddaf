// ai
//! 📏 `LengthPrefixedSplitter`: every record announces its own size up front.
//!
//! ```text
//! ┌──────────────┬───────────────────────┐
//! │ u32 BE len N │ N bytes of payload    │  ...repeat until EOF
//! └──────────────┴───────────────────────┘
//! ```
//!
//! A header claiming more than `max_record_size` is treated as corruption, not as an
//! invitation to allocate four gigabytes. A stream that ends inside a header or inside a
//! payload leaves those bytes in `remaining_bytes()` for the corruption report.

use anyhow::{Result, bail};

use super::Splitter;
use crate::common::Record;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct LengthPrefixedSplitter {
    max_record_size: usize,
    buf: Vec<u8>,
    pos: usize,
}

impl LengthPrefixedSplitter {
    pub fn new(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// 🧰 Frame a payload the way this splitter expects to read it. Handy for writers and tests.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
        framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        framed.extend_from_slice(payload);
        framed
    }
}

impl Splitter for LengthPrefixedSplitter {
    fn buffer(&mut self, chunk: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let pending = &self.buf[self.pos..];
        if pending.len() < HEADER_LEN {
            return Ok(None);
        }
        let the_len = u32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]) as usize;
        if the_len > self.max_record_size {
            bail!(
                "💀 frame header announces {} bytes, exceeds max_record_size {}",
                the_len,
                self.max_record_size
            );
        }
        if pending.len() < HEADER_LEN + the_len {
            return Ok(None);
        }
        let the_record = Record::from(&pending[HEADER_LEN..HEADER_LEN + the_len]);
        self.pos += HEADER_LEN + the_len;
        Ok(Some(the_record))
    }

    fn remaining_bytes(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }
}
