//! Benchmarks for queue operations and party formation

use criterion::{criterion_group, criterion_main, Criterion};
use party_finder::amqp::publisher::MockNotificationSink;
use party_finder::config::RoleSlotSet;
use party_finder::queue::engine::{EngineSettings, MatchmakingEngine};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_party_formation_cycle(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");

    c.bench_function("create_fill_and_form_party", |b| {
        b.iter(|| {
            rt.block_on(async {
                let sink = Arc::new(MockNotificationSink::new());
                let engine = MatchmakingEngine::new(
                    RoleSlotSet::default(),
                    EngineSettings::default(),
                    sink,
                );

                engine.create_queue("bench").await.unwrap();
                engine.join("bench", "t1", "tank").await.unwrap();
                engine.join("bench", "h1", "healer").await.unwrap();
                for i in 1..=4 {
                    engine
                        .join("bench", &format!("d{}", i), "dps")
                        .await
                        .unwrap();
                }
                engine.shutdown().await.unwrap();
            })
        })
    });
}

fn bench_list_queues(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");

    let sink = Arc::new(MockNotificationSink::new());
    let engine = rt.block_on(async {
        let engine =
            MatchmakingEngine::new(RoleSlotSet::default(), EngineSettings::default(), sink);
        for i in 0..100 {
            engine.create_queue(&format!("bench-{}", i)).await.unwrap();
            engine
                .join(&format!("bench-{}", i), "t1", "tank")
                .await
                .unwrap();
        }
        engine
    });

    c.bench_function("list_100_queues", |b| {
        b.iter(|| {
            rt.block_on(async {
                let snapshots = engine.list_queues().await.unwrap();
                assert_eq!(snapshots.len(), 100);
            })
        })
    });
}

criterion_group!(benches, bench_party_formation_cycle, bench_list_queues);
criterion_main!(benches);
