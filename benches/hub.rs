//! Hub benchmark suite.
//!
//! Benchmarks registry operations at different sizes:
//! - Session counts: 100, 1000, 10000
//! - Operations: add, point lookup, group lookup, remove
//! - Session open and close over an in-memory connection
//!
//! Run with: cargo bench --bench hub
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tether::{Hub, MemoryConnection, Session};
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SESSION_COUNTS: &[usize] = &[100, 1_000, 10_000];

/// Tags per identifier.
const TAGS: usize = 4;

// ============================================================================
// Fixtures
// ============================================================================

/// Opens `count` sessions spread over `count / TAGS` identifiers.
///
/// The peer ends are returned so the sessions stay open.
fn open_sessions(rt: &Runtime, count: usize) -> (Vec<Session>, Vec<MemoryConnection>) {
    rt.block_on(async {
        let mut sessions = Vec::with_capacity(count);
        let mut peers = Vec::with_capacity(count);
        for i in 0..count {
            let (connection, peer) = MemoryConnection::pair();
            let session = Session::builder()
                .connection(connection)
                .identifier(format!("user-{}", i / TAGS))
                .tag(format!("tag-{}", i % TAGS))
                .open()
                .await
                .expect("session should open");
            sessions.push(session);
            peers.push(peer);
        }
        (sessions, peers)
    })
}

// ============================================================================
// Benchmark: Add / Remove
// ============================================================================

fn bench_add_remove(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hub_add_remove");

    for &count in SESSION_COUNTS {
        let (sessions, _peers) = open_sessions(&rt, count);

        group.bench_with_input(BenchmarkId::new("fill_drain", count), &sessions, |b, sessions| {
            b.iter(|| {
                let hub = Hub::new();
                for session in sessions {
                    hub.add(session);
                }
                for session in sessions {
                    black_box(hub.remove(session));
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Lookup
// ============================================================================

fn bench_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hub_lookup");

    for &count in SESSION_COUNTS {
        let (sessions, _peers) = open_sessions(&rt, count);
        let hub = Hub::new();
        for session in &sessions {
            hub.add(session);
        }
        let identifier = format!("user-{}", count / TAGS / 2);

        group.bench_with_input(BenchmarkId::new("get", count), &hub, |b, hub| {
            b.iter(|| black_box(hub.get(black_box(&identifier), "tag-1")));
        });

        group.bench_with_input(BenchmarkId::new("get_group", count), &hub, |b, hub| {
            b.iter(|| black_box(hub.get_group(black_box(&identifier))));
        });

        group.bench_with_input(BenchmarkId::new("get_all", count), &hub, |b, hub| {
            b.iter(|| black_box(hub.get_all()));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Session Lifecycle
// ============================================================================

fn bench_open_close(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("session_open_close", |b| {
        b.to_async(&rt).iter(|| async {
            let (connection, _peer) = MemoryConnection::pair();
            let session = Session::builder()
                .connection(connection)
                .open()
                .await
                .expect("session should open");
            black_box(session.close()).ok();
        });
    });
}

criterion_group!(benches, bench_add_remove, bench_lookup, bench_open_close);
criterion_main!(benches);
