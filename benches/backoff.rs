/// Classification and backoff schedule benchmarks
///
/// Both run on every failed attempt, so they should stay well below the cost
/// of the request they wrap.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use talking_head_resilience::adapters::Capability;
use talking_head_resilience::error::{ErrorClassifier, ErrorKind, Failure, RetryConfig};

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let classifier = ErrorClassifier::new();

    let bodies = [
        ("empty_body", 503, String::new()),
        (
            "detail_message",
            401,
            r#"{"detail":{"status":"invalid_api_key","message":"Invalid API key"}}"#.to_string(),
        ),
        ("plain_text", 502, "upstream connect error ".repeat(20)),
    ];

    for (name, status, body) in bodies.iter() {
        group.bench_with_input(BenchmarkId::new("status", name), body, |b, body| {
            b.iter(|| {
                classifier.classify(Failure::status_with_fallback(
                    black_box(*status),
                    body.clone(),
                    ErrorKind::ApiError,
                ))
            })
        });
    }

    group.bench_function("io_connection_refused", |b| {
        b.iter(|| {
            classifier.classify(std::io::Error::new(
                black_box(std::io::ErrorKind::ConnectionRefused),
                "refused",
            ))
        })
    });

    group.bench_function("parse_code", |b| {
        b.iter(|| black_box("VIDEO_GENERATION_FAILED").parse::<ErrorKind>())
    });

    group.finish();
}

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule");

    for attempts in [3u32, 10, 50] {
        let config = RetryConfig::builder()
            .max_attempts(attempts)
            .max_delay(Duration::from_secs(60))
            .build()
            .unwrap();
        group.bench_with_input(BenchmarkId::new("schedule", attempts), &config, |b, config| {
            b.iter(|| black_box(config).schedule())
        });
    }

    let jittered = Capability::SpeechSynthesis.retry_config().with_jitter(0.25);
    group.bench_function("next_delay", |b| {
        b.iter(|| jittered.next_delay(black_box(Duration::from_millis(1500))))
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_schedule);
criterion_main!(benches);
