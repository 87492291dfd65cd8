//! Benchmarks for the streaming zip writer and row encoding.

use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use artifact_collector::config::RowFormat;
use artifact_collector::models::Record;
use artifact_collector::utils::rows::RowEncoder;
use artifact_collector::utils::streaming_zip::{CompressionMethod, FileOptions, StreamingZipWriter};
use tokio::runtime::Runtime;

fn rows(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new()
                .set("Pid", i as i64)
                .set("Name", format!("process-{}", i))
                .set("CommandLine", "/usr/bin/example --flag value")
        })
        .collect()
}

async fn write_archive(records: &[Record], method: CompressionMethod) -> Vec<u8> {
    let modified = DateTime::from_timestamp(1602103388, 0).unwrap_or_default();
    let mut zip = StreamingZipWriter::new(Vec::new());
    zip.start_file("Bench/Rows.json", FileOptions::new(method, modified))
        .await
        .unwrap();
    let mut encoder = RowEncoder::new(RowFormat::JsonLines);
    for record in records {
        let bytes = encoder.encode(record).unwrap();
        zip.write_data(&bytes).await.unwrap();
    }
    zip.finish_file().await.unwrap();
    zip.finish().await.unwrap()
}

/// Benchmark writing row entries with each compression method
fn bench_row_entries(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("row_entries");

    for count in [100usize, 1000, 10_000] {
        let records = rows(count);
        group.throughput(Throughput::Elements(count as u64));
        for (label, method) in [
            ("stored", CompressionMethod::Stored),
            ("deflated", CompressionMethod::Deflated),
        ] {
            group.bench_with_input(BenchmarkId::new(label, count), &records, |b, records| {
                b.iter(|| runtime.block_on(write_archive(black_box(records), method)))
            });
        }
    }

    group.finish();
}

/// Benchmark row serialization on its own
fn bench_row_encoding(c: &mut Criterion) {
    let records = rows(1000);
    let mut group = c.benchmark_group("row_encoding");
    group.throughput(Throughput::Elements(records.len() as u64));

    for (label, format) in [("json_lines", RowFormat::JsonLines), ("json_array", RowFormat::JsonArray)] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut encoder = RowEncoder::new(format);
                let mut size = encoder.begin().len();
                for record in &records {
                    size += encoder.encode(black_box(record)).unwrap().len();
                }
                size + encoder.end().len()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_row_entries, bench_row_encoding);
criterion_main!(benches);
