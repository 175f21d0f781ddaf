// ai
//! 🧪 How fast can we cut bytes into records? Criterion knows. Criterion always knows.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use splitfeed::splitters::{DelimitedSplitter, LengthPrefixedSplitter, Splitter};

const RECORDS: usize = 10_000;

fn make_payload(i: usize, len: usize) -> Vec<u8> {
    (0..len).map(|j| b'a' + ((i + j) % 26) as u8).collect()
}

fn delimited_body(record_len: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(RECORDS * (record_len + 1));
    for i in 0..RECORDS {
        body.extend_from_slice(&make_payload(i, record_len));
        body.push(b'\n');
    }
    body
}

fn length_prefixed_body(record_len: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(RECORDS * (record_len + 4));
    for i in 0..RECORDS {
        body.extend_from_slice(&LengthPrefixedSplitter::encode(&make_payload(i, record_len)));
    }
    body
}

/// 🔪 Feed `body` in `chunk_size` pieces and count what comes out.
fn split_all<S: Splitter>(splitter: &mut S, body: &[u8], chunk_size: usize) -> usize {
    splitter.reset();
    let mut the_count = 0;
    for chunk in body.chunks(chunk_size) {
        for record in splitter.feed(chunk) {
            if record.is_ok() {
                the_count += 1;
            }
        }
    }
    the_count
}

// ============================================================================
// Delimited: record size × transport chunk size
// ============================================================================

fn bench_delimited(c: &mut Criterion) {
    let mut group = c.benchmark_group("splitter/delimited");
    for record_len in [64usize, 1024] {
        let body = delimited_body(record_len);
        group.throughput(Throughput::Bytes(body.len() as u64));
        for chunk_size in [512usize, 64 * 1024] {
            group.bench_with_input(
                BenchmarkId::new(format!("record_{record_len}"), chunk_size),
                &chunk_size,
                |b, &chunk_size| {
                    let mut splitter = DelimitedSplitter::new(b'\n', 1 << 20);
                    b.iter(|| black_box(split_all(&mut splitter, black_box(&body), chunk_size)))
                },
            );
        }
    }
    group.finish();
}

// ============================================================================
// Length-prefixed: same grid, different framing
// ============================================================================

fn bench_length_prefixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("splitter/length_prefixed");
    for record_len in [64usize, 1024] {
        let body = length_prefixed_body(record_len);
        group.throughput(Throughput::Bytes(body.len() as u64));
        for chunk_size in [512usize, 64 * 1024] {
            group.bench_with_input(
                BenchmarkId::new(format!("record_{record_len}"), chunk_size),
                &chunk_size,
                |b, &chunk_size| {
                    let mut splitter = LengthPrefixedSplitter::new(1 << 20);
                    b.iter(|| black_box(split_all(&mut splitter, black_box(&body), chunk_size)))
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_delimited, bench_length_prefixed);
criterion_main!(benches);
