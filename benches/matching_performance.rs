//! Performance benchmarks for the match pass and relay path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use stranger_room::config::{MatchPolicyKind, MatchmakingSettings, RelaySettings};
use stranger_room::metrics::MetricsCollector;
use stranger_room::types::{
    ClientEvent, MessagePayload, ProfilePayload, ServerEvent, TransportEvent,
};
use stranger_room::{EventRouter, EventSink, Matchmaker};

// Sink that discards everything
struct BenchEventSink;

impl EventSink for BenchEventSink {
    fn send(&self, _connection_id: &str, _event: ServerEvent) -> bool {
        true
    }

    fn broadcast(&self, _event: ServerEvent) -> usize {
        0
    }
}

const TAGS: [&str; 8] = [
    "music", "movies", "chess", "travel", "gaming", "books", "art", "sports",
];

fn create_bench_router(policy: MatchPolicyKind) -> EventRouter {
    let settings = MatchmakingSettings {
        match_policy: policy,
        ..Default::default()
    };
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let matchmaker = Matchmaker::with_metrics(settings, Arc::new(BenchEventSink), metrics.clone());
    EventRouter::new(matchmaker, RelaySettings::default(), metrics)
}

fn event(connection_id: &str, event: ClientEvent) -> TransportEvent {
    TransportEvent::Event {
        connection_id: connection_id.to_string(),
        event,
    }
}

/// Connect `count` clients with rotating interests and let them all search
fn fill(router: &mut EventRouter, count: usize) {
    for i in 0..count {
        let id = format!("conn_{}", i);
        router
            .handle(TransportEvent::Connected(id.clone()))
            .unwrap();
        let interests = vec![
            TAGS[i % TAGS.len()].to_string(),
            TAGS[(i / 3) % TAGS.len()].to_string(),
        ];
        router
            .handle(event(
                &id,
                ClientEvent::Profile(ProfilePayload {
                    name: Some(format!("user{}", i)),
                    gender: None,
                    interests,
                }),
            ))
            .unwrap();
        router.handle(event(&id, ClientEvent::Find)).unwrap();
    }
}

fn bench_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairing");

    for policy in [MatchPolicyKind::Fifo, MatchPolicyKind::Interest] {
        for count in [100usize, 1000] {
            group.bench_with_input(
                BenchmarkId::new(policy.to_string(), count),
                &count,
                |b, &count| {
                    b.iter(|| {
                        let mut router = create_bench_router(policy);
                        fill(&mut router, count);
                        black_box(router.matchmaker().sessions().len())
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_skip_churn(c: &mut Criterion) {
    let mut router = create_bench_router(MatchPolicyKind::Interest);
    fill(&mut router, 200);

    let mut i = 0usize;
    c.bench_function("skip_churn_200", |b| {
        b.iter(|| {
            let id = format!("conn_{}", i % 200);
            i += 1;
            black_box(router.handle(event(&id, ClientEvent::Skip)))
        })
    });
}

fn bench_message_relay(c: &mut Criterion) {
    let mut router = create_bench_router(MatchPolicyKind::Fifo);
    fill(&mut router, 2);
    let text = "hello stranger ".repeat(40);

    c.bench_function("message_relay", |b| {
        b.iter(|| {
            let message = ClientEvent::Message(MessagePayload {
                text: Some(text.clone()),
                ..Default::default()
            });
            black_box(router.handle(event("conn_0", message)))
        })
    });
}

criterion_group!(
    benches,
    bench_pairing,
    bench_skip_churn,
    bench_message_relay
);
criterion_main!(benches);
