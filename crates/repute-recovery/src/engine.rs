//! Recovery engine implementing the [`RecoveryCalculator`] trait.
//!
//! Progress is time-driven for every method: the fraction of the window
//! `[start_time, estimated_end]` that has elapsed. The method only decides
//! how that progress turns into standing (see [`crate::curve`]).

use chrono::{DateTime, Duration, Utc};

use repute_core::constants::COST_PER_POINT;
use repute_core::error::ValidationError;
use repute_core::traits::RecoveryCalculator;
use repute_core::types::{RecoveryConfig, RecoveryCost, RecoveryStatus, ReputationRecovery};

use crate::curve::earned_fraction;

/// Percent-of-delta unit the duration estimate is scaled by.
const DURATION_SCALE: f64 = 100.0;

/// The production recovery calculator. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RecoveryCalculator for RecoveryEngine {
    fn calculate_recovery_progress(&self, record: &ReputationRecovery, now: DateTime<Utc>) -> f64 {
        let stored = if record.progress.is_finite() {
            record.progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if record.status != RecoveryStatus::Active {
            return stored;
        }

        let window_ms = record.window().num_milliseconds();
        if window_ms <= 0 {
            return 1.0;
        }
        let elapsed_ms = (now - record.start_time).num_milliseconds();
        let p = (elapsed_ms as f64 / window_ms as f64).clamp(0.0, 1.0);

        // Progress never moves backwards, even if the clock does.
        p.max(stored)
    }

    fn calculate_recovery_value(&self, record: &ReputationRecovery, progress: f64) -> f64 {
        record.start_value + record.delta() * earned_fraction(record.method, progress)
    }

    fn estimate_recovery_duration(&self, start: f64, target: f64, config: &RecoveryConfig) -> Duration {
        let min = config.min_duration_secs.max(0);
        let max = config.max_duration_secs.max(min);
        let raw = min as f64 * (target - start).abs() / DURATION_SCALE * config.time_multiplier;
        let secs = if raw.is_finite() {
            (raw.round() as i64).clamp(min, max)
        } else {
            max
        };
        Duration::seconds(secs)
    }

    fn calculate_recovery_cost(&self, start: f64, target: f64, config: &RecoveryConfig) -> RecoveryCost {
        RecoveryCost {
            currency_type: config.currency_type.clone(),
            amount: (target - start).abs() * COST_PER_POINT * config.cost_multiplier,
            item_id: config.required_item.clone(),
        }
    }

    fn validate_recovery_request(
        &self,
        record: &ReputationRecovery,
        config: &RecoveryConfig,
    ) -> Result<(), ValidationError> {
        if !record.start_value.is_finite() {
            return Err(ValidationError::NonFinite("start_value"));
        }
        if !record.target_value.is_finite() {
            return Err(ValidationError::NonFinite("target_value"));
        }
        if record.target_value <= record.start_value {
            return Err(ValidationError::TargetNotAboveStart {
                start: record.start_value,
                target: record.target_value,
            });
        }
        if record.method != config.method {
            return Err(ValidationError::MethodMismatch {
                requested: record.method,
                config: config.method,
            });
        }

        let window = record.window();
        if window < config.min_duration() || window > config.max_duration() {
            return Err(ValidationError::DurationOutOfRange {
                hours: window.num_seconds() as f64 / 3600.0,
                min_hours: config.min_duration_secs as f64 / 3600.0,
                max_hours: config.max_duration_secs as f64 / 3600.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use repute_core::types::RecoveryMethod;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn cost() -> RecoveryCost {
        RecoveryCost {
            currency_type: "eddies".into(),
            amount: 0.0,
            item_id: None,
        }
    }

    fn active(method: RecoveryMethod, start: f64, target: f64, window: Duration) -> ReputationRecovery {
        let mut r = ReputationRecovery::pending("c", "f", method, start, target, window, cost(), t0());
        r.transition(RecoveryStatus::Active, t0()).unwrap();
        r
    }

    // --- progress / value ---

    #[test]
    fn halfway_through_linear_window_is_fifty() {
        let e = RecoveryEngine::new();
        let r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
        let p = e.calculate_recovery_progress(&r, t0() + Duration::hours(5));
        assert!((p - 0.5).abs() < 1e-12);
        assert!((e.calculate_recovery_value(&r, p) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn progress_clamps_past_end_and_before_start() {
        let e = RecoveryEngine::new();
        let r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
        assert_eq!(e.calculate_recovery_progress(&r, t0() + Duration::days(3)), 1.0);
        assert_eq!(e.calculate_recovery_progress(&r, t0() - Duration::hours(1)), 0.0);
    }

    #[test]
    fn progress_never_regresses() {
        let e = RecoveryEngine::new();
        let mut r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
        r.progress = 0.6;
        assert_eq!(e.calculate_recovery_progress(&r, t0() + Duration::hours(1)), 0.6);
    }

    #[test]
    fn zero_window_is_complete() {
        let e = RecoveryEngine::new();
        let r = active(RecoveryMethod::Hybrid, 0.0, 10.0, Duration::zero());
        assert_eq!(e.calculate_recovery_progress(&r, t0()), 1.0);
    }

    #[test]
    fn inactive_records_keep_stored_progress() {
        let e = RecoveryEngine::new();
        let mut r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
        r.progress = 0.3;
        r.transition(RecoveryStatus::Paused, t0()).unwrap();
        assert_eq!(e.calculate_recovery_progress(&r, t0() + Duration::hours(9)), 0.3);

        let pending = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10), cost(), t0(),
        );
        assert_eq!(e.calculate_recovery_progress(&pending, t0() + Duration::hours(9)), 0.0);
    }

    #[test]
    fn every_method_lands_on_target() {
        let e = RecoveryEngine::new();
        for m in RecoveryMethod::ALL {
            let r = active(m, -120.0, 35.0, Duration::hours(4));
            assert!((e.calculate_recovery_value(&r, 0.0) - -120.0).abs() < 1e-9, "{m}");
            assert!((e.calculate_recovery_value(&r, 1.0) - 35.0).abs() < 1e-9, "{m}");
        }
    }

    #[test]
    fn quest_value_steps() {
        let e = RecoveryEngine::new();
        let r = active(RecoveryMethod::QuestBased, 0.0, 100.0, Duration::hours(4));
        assert_eq!(e.calculate_recovery_value(&r, 0.2), 0.0);
        assert_eq!(e.calculate_recovery_value(&r, 0.6), 50.0);
    }

    // --- duration / cost ---

    #[test]
    fn duration_scales_with_delta_and_is_clamped() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::TimeBased);
        // 1h * 500 / 100 = 5h
        assert_eq!(e.estimate_recovery_duration(0.0, 500.0, &cfg), Duration::hours(5));
        // Tiny delta clamps to the minimum.
        assert_eq!(e.estimate_recovery_duration(0.0, 1.0, &cfg), cfg.min_duration());
        // Huge delta clamps to the maximum.
        assert_eq!(e.estimate_recovery_duration(0.0, 1.0e9, &cfg), cfg.max_duration());
    }

    #[test]
    fn time_multiplier_stretches_duration() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig {
            time_multiplier: 2.0,
            ..RecoveryConfig::defaults_for(RecoveryMethod::Hybrid)
        };
        assert_eq!(e.estimate_recovery_duration(0.0, 500.0, &cfg), Duration::hours(10));
    }

    #[test]
    fn cost_is_ten_per_point_times_multiplier() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig {
            cost_multiplier: 1.5,
            required_item: Some("clean-record-shard".into()),
            ..RecoveryConfig::defaults_for(RecoveryMethod::PaymentBased)
        };
        let c = e.calculate_recovery_cost(20.0, 60.0, &cfg);
        assert_eq!(c.amount, 600.0);
        assert_eq!(c.currency_type, "eddies");
        assert_eq!(c.item_id.as_deref(), Some("clean-record-shard"));
    }

    // --- validation ---

    #[test]
    fn target_below_start_is_rejected() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::TimeBased);
        let r = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 50.0, 40.0, Duration::hours(2), cost(), t0(),
        );
        assert!(matches!(
            e.validate_recovery_request(&r, &cfg),
            Err(ValidationError::TargetNotAboveStart { .. })
        ));
    }

    #[test]
    fn equal_target_is_rejected() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::TimeBased);
        let r = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 50.0, 50.0, Duration::hours(2), cost(), t0(),
        );
        assert!(e.validate_recovery_request(&r, &cfg).is_err());
    }

    #[test]
    fn window_outside_bounds_is_rejected() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::TimeBased);
        let short = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 0.0, 10.0, Duration::minutes(5), cost(), t0(),
        );
        assert!(matches!(
            e.validate_recovery_request(&short, &cfg),
            Err(ValidationError::DurationOutOfRange { .. })
        ));
        let long = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 0.0, 10.0, Duration::days(31), cost(), t0(),
        );
        assert!(e.validate_recovery_request(&long, &cfg).is_err());
    }

    #[test]
    fn config_for_other_method_is_rejected() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::PaymentBased);
        let r = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, 0.0, 10.0, Duration::hours(2), cost(), t0(),
        );
        assert!(matches!(
            e.validate_recovery_request(&r, &cfg),
            Err(ValidationError::MethodMismatch { .. })
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let e = RecoveryEngine::new();
        let cfg = RecoveryConfig::defaults_for(RecoveryMethod::TimeBased);
        let r = ReputationRecovery::pending(
            "c", "f", RecoveryMethod::TimeBased, f64::NAN, 10.0, Duration::hours(2), cost(), t0(),
        );
        assert_eq!(
            e.validate_recovery_request(&r, &cfg),
            Err(ValidationError::NonFinite("start_value"))
        );
    }

    #[test]
    fn estimated_request_always_validates() {
        let e = RecoveryEngine::new();
        for m in RecoveryMethod::ALL {
            let cfg = RecoveryConfig::defaults_for(m);
            let d = e.estimate_recovery_duration(-40.0, 75.0, &cfg);
            let r = ReputationRecovery::pending("c", "f", m, -40.0, 75.0, d, cost(), t0());
            assert!(e.validate_recovery_request(&r, &cfg).is_ok(), "{m}");
        }
    }

    #[test]
    fn engine_is_object_safe() {
        let e = RecoveryEngine::new();
        let dyn_e: &dyn RecoveryCalculator = &e;
        let r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
        assert_eq!(dyn_e.calculate_recovery_value(&r, 1.0), 100.0);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn value_stays_between_start_and_target(
            start in -500.0f64..500.0,
            span in 0.1f64..1_000.0,
            p in 0.0f64..=1.0,
            m in 0usize..5,
        ) {
            let e = RecoveryEngine::new();
            let r = active(RecoveryMethod::ALL[m], start, start + span, Duration::hours(10));
            let v = e.calculate_recovery_value(&r, p);
            prop_assert!(v >= start - 1e-9 && v <= start + span + 1e-9);
        }

        #[test]
        fn progress_monotonic_in_time(
            a in 0i64..(20 * 3600),
            b in 0i64..(20 * 3600),
        ) {
            let e = RecoveryEngine::new();
            let r = active(RecoveryMethod::TimeBased, 0.0, 100.0, Duration::hours(10));
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = e.calculate_recovery_progress(&r, t0() + Duration::seconds(lo));
            let p_hi = e.calculate_recovery_progress(&r, t0() + Duration::seconds(hi));
            prop_assert!(p_lo <= p_hi);
            prop_assert!((0.0..=1.0).contains(&p_hi));
        }

        #[test]
        fn duration_within_config_bounds(
            start in -1_000.0f64..1_000.0,
            target in -1_000.0f64..1_000.0,
            mult in 0.0f64..10.0,
        ) {
            let e = RecoveryEngine::new();
            let cfg = RecoveryConfig {
                time_multiplier: mult,
                ..RecoveryConfig::defaults_for(RecoveryMethod::TimeBased)
            };
            let d = e.estimate_recovery_duration(start, target, &cfg);
            prop_assert!(d >= cfg.min_duration() && d <= cfg.max_duration());
        }
    }
}
