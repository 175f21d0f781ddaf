// ai
//! 🔚 `DelimitedSplitter`: one byte says "this record is over".
//!
//! 🧠 Knowledge graph:
//! - **Used by**: newline-delimited logs, NDJSON exports, anything a human once called "lines"
//! - **Format**: payload bytes, then the delimiter. The delimiter is stripped.
//! - **Empty records**: consecutive delimiters yield empty records; the fetcher skips them.
//! - **Bounded**: a pending record longer than `max_record_size` is a framing error, so one
//!   missing newline cannot eat the heap.
//!
//! What's the DEAL with trailing newlines? Half the world writes them, half doesn't, and the
//! half that doesn't is why `remaining_bytes()` exists.

use anyhow::{Result, bail};
use memchr::memchr;

use super::Splitter;
use crate::common::Record;

#[derive(Debug, Clone)]
pub struct DelimitedSplitter {
    delimiter: u8,
    max_record_size: usize,
    buf: Vec<u8>,
    // 📍 start of the first unconsumed byte
    pos: usize,
    // 🔍 everything in buf[pos..scan] is known to contain no delimiter
    scan: usize,
}

impl DelimitedSplitter {
    pub fn new(delimiter: u8, max_record_size: usize) -> Self {
        Self {
            delimiter,
            max_record_size,
            buf: Vec::new(),
            pos: 0,
            scan: 0,
        }
    }

    /// 🧹 Slide the unconsumed tail to the front so the buffer doesn't grow forever.
    fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.buf.drain(..self.pos);
        self.scan -= self.pos;
        self.pos = 0;
    }
}

impl Splitter for DelimitedSplitter {
    fn buffer(&mut self, chunk: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(chunk);
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        match memchr(self.delimiter, &self.buf[self.scan..]) {
            Some(offset) => {
                let end = self.scan + offset;
                let the_len = end - self.pos;
                if the_len > self.max_record_size {
                    bail!(
                        "💀 record of {} bytes exceeds max_record_size {}",
                        the_len,
                        self.max_record_size
                    );
                }
                let the_record = Record::from(&self.buf[self.pos..end]);
                self.pos = end + 1;
                self.scan = self.pos;
                Ok(Some(the_record))
            }
            None => {
                self.scan = self.buf.len();
                let the_pending = self.buf.len() - self.pos;
                if the_pending > self.max_record_size {
                    bail!(
                        "💀 {} bytes buffered without a delimiter, exceeds max_record_size {}",
                        the_pending,
                        self.max_record_size
                    );
                }
                Ok(None)
            }
        }
    }

    fn remaining_bytes(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.scan = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(splitter: &mut DelimitedSplitter, chunk: &[u8]) -> Vec<Vec<u8>> {
        splitter
            .feed(chunk)
            .map(|r| r.expect("💀 unexpected framing error").into_payload())
            .collect()
    }

    #[test]
    fn the_one_where_a_record_spans_three_reads() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        assert!(drain(&mut the_splitter, b"hel").is_empty());
        assert!(drain(&mut the_splitter, b"lo wor").is_empty());
        assert_eq!(drain(&mut the_splitter, b"ld\nnext"), vec![b"hello world".to_vec()]);
        assert_eq!(the_splitter.remaining_bytes(), 4);
    }

    #[test]
    fn the_one_where_many_records_arrive_in_one_chunk() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        let the_records = drain(&mut the_splitter, b"a\nbb\nccc\n");
        assert_eq!(the_records, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
        assert_eq!(the_splitter.remaining_bytes(), 0);
    }

    #[test]
    fn the_one_where_consecutive_delimiters_make_empty_records() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        let the_records = drain(&mut the_splitter, b"a\n\nb\n");
        assert_eq!(the_records, vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]);
    }

    #[test]
    fn the_one_where_the_stream_ends_mid_record() {
        // 🧪 K = 7 trailing bytes, zero records for them
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        let the_records = drain(&mut the_splitter, b"whole\npartial");
        assert_eq!(the_records, vec![b"whole".to_vec()]);
        assert_eq!(the_splitter.remaining_bytes(), 7);
    }

    #[test]
    fn the_one_where_a_custom_delimiter_is_respected() {
        let mut the_splitter = DelimitedSplitter::new(0x1e, 1024);
        let the_records = drain(&mut the_splitter, b"x\x1ey\ny\x1e");
        assert_eq!(the_records, vec![b"x".to_vec(), b"y\ny".to_vec()]);
    }

    #[test]
    fn the_one_where_reset_forgets_the_partial_record() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        assert!(drain(&mut the_splitter, b"half a rec").is_empty());
        the_splitter.reset();
        assert_eq!(the_splitter.remaining_bytes(), 0);
        assert_eq!(drain(&mut the_splitter, b"fresh\n"), vec![b"fresh".to_vec()]);
    }

    #[test]
    fn the_one_where_a_runaway_record_trips_the_limit() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 8);
        assert!(drain(&mut the_splitter, b"12345").is_empty());
        let the_error = the_splitter
            .feed(b"6789")
            .next()
            .expect("💀 expected an item")
            .expect_err("💀 expected a framing error");
        assert!(the_error.to_string().contains("max_record_size"));
    }

    #[test]
    fn the_one_where_compaction_keeps_the_tail_intact() {
        let mut the_splitter = DelimitedSplitter::new(b'\n', 1024);
        for _ in 0..100 {
            assert_eq!(drain(&mut the_splitter, b"abc\nde"), vec![b"abc".to_vec()]);
            assert_eq!(drain(&mut the_splitter, b"f\n"), vec![b"def".to_vec()]);
        }
        assert_eq!(the_splitter.remaining_bytes(), 0);
    }
}
