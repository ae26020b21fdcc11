// packages/engine/benches/buffer_bench.rs
//! Event buffer throughput

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use session_replay_engine::recording::buffer::{CompressionWorkerEventBuffer, EventBuffer, InMemoryEventBuffer};
use session_replay_engine::recording::{CompressionLevel, EventType, RecordingEvent};
use session_replay_engine::worker::WorkerBridge;
use std::time::Duration;
use tokio::runtime::Runtime;

fn sample_event(n: u64) -> RecordingEvent {
    RecordingEvent::new(
        EventType::IncrementalSnapshot,
        1_700_000_000_000 + n,
        serde_json::json!({
            "source": 2,
            "type": 1,
            "id": n,
            "x": n % 1280,
            "y": n % 720,
        }),
    )
}

async fn fill_and_finish(buffer: &mut dyn EventBuffer, events: u64) {
    for n in 0..events {
        buffer.add_event(sample_event(n), n == 0).await.unwrap();
    }
    buffer.finish().await.unwrap();
}

fn bench_in_memory(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("in_memory_buffer");

    for events in [100u64, 1_000] {
        group.throughput(Throughput::Elements(events));
        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, &events| {
            b.to_async(&rt).iter(|| async move {
                let mut buffer = InMemoryEventBuffer::new();
                fill_and_finish(&mut buffer, events).await;
            });
        });
    }

    group.finish();
}

fn bench_compression_worker(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("compression_worker_buffer");

    for events in [100u64, 1_000] {
        group.throughput(Throughput::Elements(events));
        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, &events| {
            b.to_async(&rt).iter(|| async move {
                let bridge = WorkerBridge::spawn(CompressionLevel::Balanced, Duration::from_secs(10)).unwrap();
                let mut buffer = CompressionWorkerEventBuffer::new(bridge);
                buffer.ensure_ready().await.unwrap();
                fill_and_finish(&mut buffer, events).await;
                buffer.destroy();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_in_memory, bench_compression_worker);
criterion_main!(benches);
