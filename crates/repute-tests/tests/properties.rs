//! Property tests over whole sweeps and recovery runs.

use chrono::Duration;
use proptest::prelude::*;
use repute_core::store::ProcessStore;
use repute_core::types::{RecoveryMethod, RecoveryStatus, ReputationEventType};
use repute_node_lib::ServiceConfig;
use repute_tests::helpers::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn method() -> impl Strategy<Value = RecoveryMethod> {
    prop::sample::select(RecoveryMethod::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_sweep_only_lowers_and_logs_what_it_applied(
        value in -499.0f64..2_000.0,
        idle_hours in 0i64..(90 * 24),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (store, _rep, svc) = memory_service(ServiceConfig::default());
            let d = idle_track(&*store, "v", "f", value, Duration::hours(idle_hours));
            svc.process_reputation_decay(t0()).await.unwrap();

            let after = store.get_decay(&d.id).unwrap().unwrap().current_value;
            prop_assert!(after <= value);
            prop_assert!(after >= -500.0);

            let events = store.events_for_character("v").unwrap();
            if after < value {
                prop_assert_eq!(events.len(), 1);
                prop_assert_eq!(events[0].event_type, ReputationEventType::Decay);
                prop_assert!((events[0].new_value - after).abs() < 1e-9);
            } else {
                prop_assert!(events.is_empty());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn recovery_climbs_monotonically_to_target(
        m in method(),
        start in -400.0f64..100.0,
        gain in 1.0f64..300.0,
        steps in prop::collection::vec(1i64..7_200, 1..12),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (store, rep, svc) = memory_service(ServiceConfig::default());
            rep.set("v", "f", start);
            let target = start + gain;
            let r = svc
                .start_reputation_recovery("v", "f", m, target, t0())
                .await
                .unwrap();

            let mut now = t0();
            let mut last = start;
            for secs in steps {
                now += Duration::seconds(secs);
                svc.process_reputation_recovery("v", now).await.unwrap();
                let current = store.get_recovery(&r.id).unwrap().unwrap();
                prop_assert!(current.current_value >= last - 1e-9);
                prop_assert!(current.current_value >= start - 1e-9);
                prop_assert!(current.current_value <= target + 1e-9);
                last = current.current_value;
            }

            svc.process_reputation_recovery("v", r.estimated_end).await.unwrap();
            let done = store.get_recovery(&r.id).unwrap().unwrap();
            prop_assert_eq!(done.status, RecoveryStatus::Completed);
            prop_assert_eq!(done.current_value, target);
            prop_assert_eq!(done.progress, 1.0);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
