//! Progress curves, one per recovery method.
//!
//! Every curve maps progress `p ∈ [0, 1]` to the fraction of the recovery
//! delta earned so far, also in `[0, 1]`. Curves are non-decreasing and reach
//! `1.0` at `p = 1.0`, so a completed window always lands on the target.

use repute_core::constants::{HYBRID_TIME_WEIGHT, PAYMENT_CURVE_RATE, QUEST_MILESTONES};
use repute_core::types::RecoveryMethod;

/// Predictable, even pace.
pub fn linear(p: f64) -> f64 {
    p
}

/// Front-loaded: `(1 - e^(-3p)) / (1 - e^(-3))`.
///
/// Normalised so the curve ends at exactly 1.0 instead of ~0.95.
pub fn exponential(p: f64) -> f64 {
    let full = 1.0 - (-PAYMENT_CURVE_RATE).exp();
    (1.0 - (-PAYMENT_CURVE_RATE * p).exp()) / full
}

/// Largest milestone reached, or 0 before the first one.
pub fn stepped(p: f64) -> f64 {
    QUEST_MILESTONES
        .iter()
        .rev()
        .copied()
        .find(|m| p >= *m)
        .unwrap_or(0.0)
}

/// Fast early gains: `log10(1 + 9p)`.
pub fn logarithmic(p: f64) -> f64 {
    (1.0 + 9.0 * p).log10()
}

/// Linear and logarithmic blended in progress space, 70/30.
pub fn hybrid(p: f64) -> f64 {
    HYBRID_TIME_WEIGHT * linear(p) + (1.0 - HYBRID_TIME_WEIGHT) * logarithmic(p)
}

/// Fraction of the delta earned by `method` at `progress` (clamped to `[0, 1]`).
pub fn earned_fraction(method: RecoveryMethod, progress: f64) -> f64 {
    let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let f = match method {
        RecoveryMethod::TimeBased => linear(p),
        RecoveryMethod::PaymentBased => exponential(p),
        RecoveryMethod::QuestBased => stepped(p),
        RecoveryMethod::ActionBased => logarithmic(p),
        RecoveryMethod::Hybrid => hybrid(p),
    };
    f.clamp(0.0, 1.0)
}
