use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dlqueue::downloader::{filename_from_str, DownloadProgress};
use dlqueue::queue::{Completion, PendingQueue, QueueItem};
use std::path::PathBuf;
use url::Url;

fn item(i: usize) -> QueueItem {
    let url = Url::parse(&format!("https://mirror.example/files/file-{}.bin", i % 64)).unwrap();
    QueueItem {
        filename: format!("file-{}.bin", i % 64),
        url,
        folder: PathBuf::from("/tmp/downloads"),
        completion: Completion::callback(|_, _| {}),
        on_progress: None,
    }
}

fn benchmark_pending_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pending Queue");

    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("enqueue_pop", size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = PendingQueue::new();
                let ids: Vec<_> = (0..size).map(|i| queue.enqueue(item(i))).collect();
                for id in ids.into_iter().rev() {
                    black_box(queue.pop(id));
                }
            })
        });

        group.bench_with_input(
            BenchmarkId::new("pop_by_filename", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    let mut queue = PendingQueue::new();
                    for i in 0..size {
                        queue.enqueue(item(i));
                    }
                    for i in 0..size {
                        black_box(queue.pop_by_filename(&format!("file-{}.bin", i % 64)));
                    }
                })
            },
        );
    }

    group.finish();
}

fn benchmark_hot_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hot Paths");

    group.bench_function("progress", |b| {
        b.iter(|| DownloadProgress::new(black_box(123_456), black_box(1_000_000)))
    });
    group.bench_function("filename_from_str", |b| {
        b.iter(|| filename_from_str(black_box("https://x/a%20b/c%C3%A9.tar.gz?sig=1")))
    });

    group.finish();
}

criterion_group!(benches, benchmark_pending_queue, benchmark_hot_paths);
criterion_main!(benches);
