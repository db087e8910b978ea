//! End-to-end scenarios for the lifecycle service.
//!
//! Each test builds a service over an in-memory store with a scripted
//! authoritative reputation system, then drives decay sweeps and recovery
//! passes with explicit timestamps.

use std::sync::Arc;

use chrono::Duration;
use repute_core::error::{ReputeError, ValidationError};
use repute_core::store::ProcessStore;
use repute_core::types::{RecoveryConfig, RecoveryMethod, RecoveryStatus, ReputationEventType};
use repute_node_lib::{ServiceConfig, SweepScheduler};
use repute_tests::helpers::*;

#[tokio::test]
async fn ten_idle_days_at_one_hundred_loses_five() {
    let (store, reputation, svc) = memory_service(ServiceConfig::default());
    let d = idle_track(&*store, "v", "arasaka", 100.0, Duration::days(10));

    let report = svc.process_reputation_decay(t0()).await.unwrap();
    assert_eq!(report.processed, 1);

    let stored = store.get_decay(&d.id).unwrap().unwrap();
    assert!((stored.current_value - 95.0).abs() < 1e-9);
    assert_eq!(stored.last_decay_time, t0());
    assert_eq!(stored.next_decay_time, t0() + Duration::hours(1));
    assert_eq!(reputation.value("v", "arasaka"), Some(95.0));

    let event = &store.events_for_character("v").unwrap()[0];
    assert_eq!(event.event_type, ReputationEventType::Decay);
    assert!((event.delta - -5.0).abs() < 1e-9);
    assert_eq!(event.old_value, 100.0);
}

#[tokio::test]
async fn failed_push_keeps_local_decay_and_schedule() {
    let (store, reputation, svc) = memory_service(ServiceConfig::default());
    reputation.fail_pushes(true);
    let d = idle_track(&*store, "v", "f", 100.0, Duration::days(10));

    svc.process_reputation_decay(t0()).await.unwrap();
    let stored = store.get_decay(&d.id).unwrap().unwrap();
    assert!((stored.current_value - 95.0).abs() < 1e-9);
    assert_eq!(stored.next_decay_time, t0() + Duration::hours(1));
    assert_eq!(reputation.pushes().len(), 1);
    assert_eq!(reputation.value("v", "f"), None);

    // The next application carries on from the local value.
    reputation.fail_pushes(false);
    let next = t0() + Duration::hours(1) + Duration::seconds(1);
    svc.process_reputation_decay(next).await.unwrap();
    let after = store.get_decay(&d.id).unwrap().unwrap();
    assert!(after.current_value < 95.0);
    assert_eq!(reputation.value("v", "f"), Some(after.current_value));
}

#[tokio::test]
async fn failing_record_is_retried_after_its_lease() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());
    let bad = idle_track(&*store, "bad", "f", 100.0, Duration::days(10));
    for i in 0..4 {
        idle_track(&*store, &format!("ok{i}"), "f", 100.0, Duration::days(10));
    }
    store.poison(&bad.id);

    let first = svc.process_reputation_decay(t0()).await.unwrap();
    assert_eq!((first.processed, first.failed), (4, 1));

    // Still leased: nothing to claim a minute later.
    let soon = svc
        .process_reputation_decay(t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(soon.claimed, 0);

    // Once the lease runs out the failing record comes back on its own.
    let later = svc
        .process_reputation_decay(t0() + Duration::minutes(61))
        .await
        .unwrap();
    assert!(later.claimed >= 1);
    assert!(later.failed >= 1);
    assert_eq!(store.get_decay(&bad.id).unwrap().unwrap().current_value, 100.0);
}

#[tokio::test]
async fn decay_never_crosses_the_floor_over_many_sweeps() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());
    let d = idle_track(&*store, "v", "f", -480.0, Duration::days(60));

    let mut last = -480.0;
    let mut now = t0();
    for _ in 0..200 {
        svc.process_reputation_decay(now).await.unwrap();
        let current = store.get_decay(&d.id).unwrap().unwrap();
        assert!(current.current_value <= last);
        assert!(current.current_value >= -500.0);
        last = current.current_value;
        if !current.is_active {
            break;
        }
        now = current.next_decay_time;
    }
}

#[tokio::test]
async fn recovery_reaches_half_at_half_time() {
    let (store, reputation, svc) = memory_service(ServiceConfig::default());
    svc.set_recovery_config(&RecoveryConfig {
        time_multiplier: 10.0,
        ..RecoveryConfig::defaults_for(RecoveryMethod::TimeBased)
    })
    .unwrap();

    let r = svc
        .start_reputation_recovery("v", "f", RecoveryMethod::TimeBased, 100.0, t0())
        .await
        .unwrap();
    assert_eq!(r.window(), Duration::hours(10));

    svc.process_reputation_recovery("v", t0() + Duration::hours(5))
        .await
        .unwrap();
    let mid = store.get_recovery(&r.id).unwrap().unwrap();
    assert!((mid.current_value - 50.0).abs() < 1e-9);
    assert_eq!(reputation.value("v", "f"), Some(mid.current_value));
}

#[tokio::test]
async fn completed_recovery_is_never_touched_again() {
    let (store, reputation, svc) = memory_service(ServiceConfig::default());
    let r = svc
        .start_reputation_recovery("v", "f", RecoveryMethod::QuestBased, 40.0, t0())
        .await
        .unwrap();

    let end = r.estimated_end + Duration::seconds(1);
    let report = svc.process_reputation_recovery("v", end).await.unwrap();
    assert_eq!(report.completed, 1);
    let snapshot = store.get_recovery(&r.id).unwrap().unwrap();
    let pushes = reputation.pushes().len();
    let events = store.event_count();

    for h in 1..=5 {
        svc.process_reputation_recovery("v", end + Duration::hours(h))
            .await
            .unwrap();
    }
    assert_eq!(store.get_recovery(&r.id).unwrap().unwrap(), snapshot);
    assert_eq!(reputation.pushes().len(), pushes);
    assert_eq!(store.event_count(), events);
    assert_eq!(snapshot.status, RecoveryStatus::Completed);
    assert_eq!(snapshot.current_value, 40.0);
}

#[tokio::test]
async fn recovered_standing_is_what_decay_erodes_next() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());
    let d = idle_track(&*store, "v", "f", 0.0, Duration::days(10));
    let r = svc
        .start_reputation_recovery("v", "f", RecoveryMethod::TimeBased, 100.0, t0())
        .await
        .unwrap();
    svc.process_reputation_recovery("v", r.estimated_end).await.unwrap();
    assert_eq!(store.get_decay(&d.id).unwrap().unwrap().current_value, 100.0);

    // Inactivity is unchanged, so the next sweep erodes the recovered value.
    svc.process_reputation_decay(r.estimated_end).await.unwrap();
    let after = store.get_decay(&d.id).unwrap().unwrap().current_value;
    assert!(after < 100.0 && after > 94.99, "after = {after}");
}

#[tokio::test]
async fn unreadable_standing_opens_nothing() {
    let (store, reputation, svc) = memory_service(ServiceConfig::default());
    reputation.fail_reads(true);
    let err = svc
        .start_reputation_recovery("v", "f", RecoveryMethod::Hybrid, 10.0, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, ReputeError::ExternalPush(_)));
    assert!(store.recoveries_for_character("v").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_open_exactly_one_recovery() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                svc.start_reputation_recovery("v", "f", RecoveryMethod::TimeBased, 10.0 + i as f64, t0())
                    .await
            })
        })
        .collect();

    let mut opened = 0;
    let mut rejected = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => opened += 1,
            Err(ReputeError::Validation(ValidationError::RecoveryInProgress(_))) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(rejected, 15);
    assert_eq!(store.active_recoveries("v").unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn activity_during_sweeps_is_not_lost() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());
    for i in 0..20 {
        idle_track(&*store, &format!("c{i}"), "f", 100.0, Duration::days(10));
    }

    let sweeper = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.process_reputation_decay(t0()).await.unwrap() })
    };
    let touched = t0() + Duration::seconds(5);
    let toucher = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            for i in 0..20 {
                svc.record_faction_activity(&format!("c{i}"), "f", touched)
                    .await
                    .unwrap();
            }
        })
    };
    sweeper.await.unwrap();
    toucher.await.unwrap();

    for i in 0..20 {
        let track = store.find_decay(&format!("c{i}"), "f").unwrap().unwrap();
        assert_eq!(track.last_activity, touched);
    }
}

#[tokio::test]
async fn scheduler_tick_drives_both_lifecycles() {
    let (store, _reputation, svc) = memory_service(ServiceConfig::default());
    idle_track(&*store, "v", "f", 100.0, Duration::days(10));
    svc.start_reputation_recovery("judy", "g", RecoveryMethod::ActionBased, 20.0, t0())
        .await
        .unwrap();

    let scheduler = SweepScheduler::new(Arc::clone(&svc), &ServiceConfig::default());
    let report = scheduler.run_at(t0() + Duration::hours(2)).await;
    assert_eq!(report.sweep.processed, 1);
    assert_eq!(report.recovery.completed, 1);

    let health = svc.get_system_health(t0() + Duration::hours(2)).unwrap();
    assert_eq!(health.active_recovery_processes, 0);
    assert_eq!(health.failed_ops, 0);
}

#[tokio::test]
async fn scheduler_reaches_characters_beyond_one_batch() {
    let config = ServiceConfig {
        recovery_batch_size: 2,
        ..ServiceConfig::default()
    };
    let (store, reputation, svc) = memory_service(config.clone());
    for c in ["a", "b"] {
        svc.start_reputation_recovery(c, "f", RecoveryMethod::TimeBased, 100_000.0, t0())
            .await
            .unwrap();
    }
    let short = svc
        .start_reputation_recovery("c", "f", RecoveryMethod::TimeBased, 100.0, t0())
        .await
        .unwrap();
    assert!(short.estimated_end < t0() + Duration::hours(20));

    let scheduler = SweepScheduler::new(Arc::clone(&svc), &config);
    for h in 1..=20 {
        scheduler.run_at(t0() + Duration::hours(h)).await;
    }

    let done = store.get_recovery(&short.id).unwrap().unwrap();
    assert_eq!(done.status, RecoveryStatus::Completed);
    assert_eq!(reputation.value("c", "f"), Some(100.0));
    for c in ["a", "b"] {
        let r = &store.active_recoveries(c).unwrap()[0];
        assert!(r.progress > 0.0, "{c} never advanced");
    }
}
