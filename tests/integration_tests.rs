//! Integration tests for the party-finder matchmaking service
//!
//! These tests validate the entire system working together, including:
//! - Complete queue lifecycle workflows
//! - Party formation and occupant reset
//! - Expiration and deletion racing with joins
//! - Concurrent join handling
//! - Event publishing order

// Modules for organizing tests
mod fixtures;

use party_finder::config::RoleSlotSet;
use party_finder::error::PartyFinderError;
use party_finder::queue::engine::{EngineSettings, MatchmakingEngine};
use party_finder::types::QueueEvent;
use std::sync::Arc;
use std::time::Duration;

use fixtures::RecordingSink;

/// Integration test setup that creates a complete system
fn create_test_system(settings: EngineSettings) -> (MatchmakingEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let engine = MatchmakingEngine::new(RoleSlotSet::default(), settings, sink.clone());
    (engine, sink)
}

/// Let the dispatcher drain queued events on a paused current-thread runtime
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Let the dispatcher drain queued events under a multi-threaded runtime
async fn drain() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

fn is_error<F>(err: &anyhow::Error, predicate: F) -> bool
where
    F: FnOnce(&PartyFinderError) -> bool,
{
    err.downcast_ref::<PartyFinderError>()
        .map(predicate)
        .unwrap_or(false)
}

#[tokio::test]
async fn test_fifth_dps_is_rejected() {
    let (engine, _sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();

    for i in 1..=4 {
        let ack = engine
            .join("ancient-forest", &format!("hunter{}", i), "dps")
            .await
            .unwrap();
        assert_eq!(ack.position, i);
    }

    let err = engine
        .join("ancient-forest", "hunter5", "dps")
        .await
        .unwrap_err();
    assert!(is_error(&err, |e| matches!(
        e,
        PartyFinderError::RoleFull { role, .. } if role == "dps"
    )));
}

#[tokio::test]
async fn test_final_join_forms_party_and_resets_queue() {
    let (engine, sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();

    engine.join("ancient-forest", "tove", "tank").await.unwrap();
    engine
        .join("ancient-forest", "hanna", "healer")
        .await
        .unwrap();
    for i in 1..=3 {
        let ack = engine
            .join("ancient-forest", &format!("hunter{}", i), "dps")
            .await
            .unwrap();
        assert!(!ack.party_formed);
    }

    let ack = engine
        .join("ancient-forest", "hunter4", "dps")
        .await
        .unwrap();
    assert!(ack.party_formed);

    drain().await;

    assert_eq!(sink.count_events_of_type("PartyFormed"), 1);
    let party = sink.last_party().unwrap();
    assert_eq!(party.size(), 6);
    assert_eq!(party.members("tank").unwrap(), ["tove"]);
    assert_eq!(party.members("healer").unwrap(), ["hanna"]);
    assert_eq!(
        party.members("dps").unwrap(),
        ["hunter1", "hunter2", "hunter3", "hunter4"]
    );

    // Occupants are empty immediately after formation
    let snapshots = engine.list_queues().await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].waiting(), 0);

    // The queue stays live and can be rejoined
    engine.join("ancient-forest", "tove", "tank").await.unwrap();
}

#[tokio::test]
async fn test_joining_second_role_in_same_queue_is_rejected() {
    let (engine, _sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();

    engine
        .join("ancient-forest", "hanna", "healer")
        .await
        .unwrap();
    let err = engine
        .join("ancient-forest", "hanna", "dps")
        .await
        .unwrap_err();
    assert!(is_error(&err, |e| matches!(
        e,
        PartyFinderError::AlreadyQueued { .. }
    )));
}

#[tokio::test]
async fn test_cross_queue_membership_is_allowed() {
    let (engine, _sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();
    engine.create_queue("elder-recess").await.unwrap();

    // Only in-queue membership is checked; a participant may wait in two
    // different queues at once.
    engine
        .join("ancient-forest", "hanna", "healer")
        .await
        .unwrap();
    engine.join("elder-recess", "hanna", "dps").await.unwrap();

    // Leave without a name removes the first match only
    let ack = engine.leave("hanna", None).await.unwrap();
    let remaining = engine.leave("hanna", None).await.unwrap();
    assert_ne!(ack.queue, remaining.queue);
    assert!(engine.leave("hanna", None).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_queue_expires_and_name_becomes_available() {
    let (engine, sink) = create_test_system(EngineSettings {
        expiry: Duration::from_secs(3600),
        post_completion_grace: Duration::ZERO,
    });

    engine.create_queue("ancient-forest").await.unwrap();
    engine.join("ancient-forest", "tove", "tank").await.unwrap();

    tokio::time::sleep(Duration::from_secs(3601)).await;
    settle().await;

    assert_eq!(sink.count_events_of_type("QueueExpired"), 1);
    assert!(engine.list_queues().await.unwrap().is_empty());

    // Joining the expired queue reports it as gone
    let err = engine
        .join("ancient-forest", "hanna", "healer")
        .await
        .unwrap_err();
    assert!(is_error(&err, |e| matches!(
        e,
        PartyFinderError::QueueNotFound { .. }
    )));

    // The name is free for a new queue
    engine.create_queue("ancient-forest").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timer_firing_after_delete_has_no_effect() {
    let (engine, sink) = create_test_system(EngineSettings {
        expiry: Duration::from_secs(60),
        post_completion_grace: Duration::ZERO,
    });

    engine.create_queue("ancient-forest").await.unwrap();
    engine.delete_queue("ancient-forest").await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;

    assert_eq!(sink.count_events_of_type("QueueExpired"), 0);
    assert_eq!(sink.count_events_of_type("QueueDeleted"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_for_last_slot_admit_exactly_one() {
    let (engine, _sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .join("ancient-forest", &format!("hunter{}", i), "tank")
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    let mut admitted = 0;
    let mut rejected = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => admitted += 1,
            Err(err) => {
                assert!(is_error(&err, |e| matches!(
                    e,
                    PartyFinderError::RoleFull { .. }
                )));
                rejected += 1;
            }
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(rejected, 7);

    let snapshots = engine.list_queues().await.unwrap();
    let tank = snapshots[0]
        .roles
        .iter()
        .find(|r| r.role == "tank")
        .unwrap();
    assert_eq!(tank.participants.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_racing_join_resolves_cleanly() {
    let (engine, _sink) = create_test_system(EngineSettings::default());

    for round in 0..20 {
        let name = format!("raid-{}", round);
        engine.create_queue(&name).await.unwrap();

        let join_task = {
            let engine = engine.clone();
            let name = name.clone();
            tokio::spawn(async move { engine.join(&name, "tove", "tank").await })
        };
        let delete_task = {
            let engine = engine.clone();
            let name = name.clone();
            tokio::spawn(async move { engine.delete_queue(&name).await })
        };

        let join_result = join_task.await.unwrap();
        let delete_result = delete_task.await.unwrap();

        // The delete always wins eventually; the join either slipped in
        // before it or observes the queue as gone.
        assert!(delete_result.is_ok());
        if let Err(err) = join_result {
            assert!(is_error(&err, |e| matches!(
                e,
                PartyFinderError::QueueNotFound { .. }
            )));
        }

        assert!(engine
            .list_queues()
            .await
            .unwrap()
            .iter()
            .all(|s| s.name != name));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_queues_progress_concurrently() {
    let (engine, sink) = create_test_system(EngineSettings::default());

    for i in 0..4 {
        engine.create_queue(&format!("hunt-{}", i)).await.unwrap();
    }

    let tasks: Vec<_> = (0..4)
        .flat_map(|q| {
            let engine = engine.clone();
            let name = format!("hunt-{}", q);
            [
                ("tank", "t1"),
                ("healer", "h1"),
                ("dps", "d1"),
                ("dps", "d2"),
                ("dps", "d3"),
                ("dps", "d4"),
            ]
            .into_iter()
            .map(move |(role, who)| {
                let engine = engine.clone();
                let name = name.clone();
                let who = format!("{}-{}", name, who);
                let role = role.to_string();
                tokio::spawn(async move { engine.join(&name, &who, &role).await })
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    drain().await;
    assert_eq!(sink.count_events_of_type("PartyFormed"), 4);
}

#[tokio::test]
async fn test_events_for_one_queue_arrive_in_submission_order() {
    let (engine, sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();

    engine.join("ancient-forest", "tove", "tank").await.unwrap();
    engine.leave("tove", Some("ancient-forest")).await.unwrap();
    engine.delete_queue("ancient-forest").await.unwrap();

    drain().await;

    let kinds: Vec<&'static str> = sink
        .events_for_queue("ancient-forest")
        .iter()
        .map(|event| match event {
            QueueEvent::QueueCreated(_) => "created",
            QueueEvent::QueueStateChanged(_) => "changed",
            QueueEvent::PartyFormed(_) => "formed",
            QueueEvent::QueueExpired(_) => "expired",
            QueueEvent::QueueDeleted(_) => "deleted",
        })
        .collect();

    assert_eq!(kinds, vec!["created", "changed", "changed", "deleted"]);
}

#[tokio::test]
async fn test_snapshots_track_remaining_slots() {
    let (engine, _sink) = create_test_system(EngineSettings::default());
    engine.create_queue("ancient-forest").await.unwrap();
    engine.join("ancient-forest", "tove", "tank").await.unwrap();
    engine
        .join("ancient-forest", "hunter1", "dps")
        .await
        .unwrap();

    let snapshots = engine.list_queues().await.unwrap();
    let snapshot = &snapshots[0];
    assert!(!snapshot.is_complete());

    let tank = snapshot.roles.iter().find(|r| r.role == "tank").unwrap();
    assert_eq!(tank.remaining(), 0);
    let healer = snapshot.roles.iter().find(|r| r.role == "healer").unwrap();
    assert_eq!(healer.remaining(), 1);
    let dps = snapshot.roles.iter().find(|r| r.role == "dps").unwrap();
    assert_eq!(dps.remaining(), 3);
}
