//! Criterion benchmarks for cloudwatch_appender

use chrono::{TimeZone, Utc};
use cloudwatch_appender::core::RecordBuffer;
use cloudwatch_appender::prelude::*;
use cloudwatch_appender::shipping::{Shipper, StreamNamer};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_utc(
        Utc.with_ymd_and_hms(2017, 9, 1, 0, 0, 0).unwrap(),
    ))
}

// ============================================================================
// Append Benchmarks
// ============================================================================

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));

    let service = Arc::new(InMemoryLogService::new());
    let appender = CloudWatchAppender::builder()
        .log_group_name("bench")
        .queue_length(1 << 16)
        .poll_interval(Duration::from_millis(20))
        .clock(clock())
        .service(service)
        .build()
        .expect("Failed to build appender");
    appender.start().expect("Failed to start appender");

    group.bench_function("info", |b| {
        b.iter(|| appender.append(black_box(LogEntry::new(LogLevel::Info, "request handled"))));
    });

    group.finish();
    appender.stop(Duration::from_secs(10));
}

// ============================================================================
// Layout Benchmarks
// ============================================================================

fn bench_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    group.throughput(Throughput::Elements(1));

    let entry = LogEntry::new(LogLevel::Warn, "cache miss")
        .with_logger("cache")
        .with_field("key", "user:42");
    let pattern = PatternLayout::simple();
    let json = JsonLayout::new();

    group.bench_function("pattern_simple", |b| {
        b.iter(|| black_box(pattern.render(black_box(&entry))));
    });

    group.bench_function("json", |b| {
        b.iter(|| black_box(json.render(black_box(&entry))));
    });

    group.finish();
}

// ============================================================================
// Shipping Benchmarks
// ============================================================================

fn bench_drain_and_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_and_send");

    for batch in [16usize, 128, 1024] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(format!("batch_{}", batch), |b| {
            let metrics = Arc::new(ShipperMetrics::new());
            let shipper = Shipper::new(
                "bench",
                StreamNamer::new(None, clock()),
                Arc::new(InMemoryLogService::new()),
                Arc::new(PatternLayout::default()),
                Arc::clone(&metrics),
            );

            b.iter_batched(
                || {
                    let buffer = RecordBuffer::new(batch, Arc::clone(&metrics));
                    for i in 0..batch {
                        buffer.offer(LogEntry::new(LogLevel::Info, format!("record {}", i)));
                    }
                    buffer
                },
                |buffer| black_box(shipper.drain_and_send(&buffer, batch)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_append, bench_layouts, bench_drain_and_send);

criterion_main!(benches);
