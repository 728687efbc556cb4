//! Performance benchmarks for archive streaming.
//!
//! These benchmarks measure the batch download hot paths:
//! - Many small files (per-entry overhead)
//! - One large file (copy and compression throughput)

use std::fs;
use std::io;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use server::files::{ArchiveStreamer, SharedRoot};
use tempfile::TempDir;

fn setup_share(files: usize, file_size: usize) -> (TempDir, ArchiveStreamer) {
    let temp_dir = TempDir::new().unwrap();
    let share = temp_dir.path().join("share");
    let data = share.join("data");
    fs::create_dir_all(&data).unwrap();

    let contents = vec![b'x'; file_size];
    for i in 0..files {
        fs::write(data.join(format!("file_{i:05}.txt")), &contents).unwrap();
    }

    let root = Arc::new(SharedRoot::open(&share).unwrap());
    (temp_dir, ArchiveStreamer::new(root))
}

/// Benchmark archiving a directory of many small files.
fn bench_many_small_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_small_files");
    let paths = vec!["data".to_string()];

    for count in [100usize, 1000] {
        let (_temp_dir, streamer) = setup_share(count, 128);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("{count}_files"), |b| {
            b.iter(|| {
                let summary = streamer
                    .write_archive(black_box(&paths), io::sink())
                    .unwrap();
                assert_eq!(summary.added, count);
            });
        });
    }

    group.finish();
}

/// Benchmark archiving a single large file.
fn bench_large_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_large_file");
    let size = 8 * 1024 * 1024;
    let (_temp_dir, streamer) = setup_share(1, size);
    let paths = vec!["data/file_00000.txt".to_string()];

    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("8MB", |b| {
        b.iter(|| {
            streamer
                .write_archive(black_box(&paths), io::sink())
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_many_small_files, bench_large_file);
criterion_main!(benches);
