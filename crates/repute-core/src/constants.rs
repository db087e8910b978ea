//! Engine constants and tunable defaults.
//!
//! Rates are percentages (`1.0` means 1%). Durations are expressed in
//! seconds so they can be handed to both `chrono` and `std::time`.

/// Config key used when a faction has no decay config of its own.
pub const WILDCARD_FACTION: &str = "*";

/// Fixed interval between two decay applications for one record.
pub const DECAY_CADENCE_SECS: i64 = 60 * 60;

/// Interval between two decay sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Maximum number of decay records claimed per sweep.
pub const DECAY_BATCH_SIZE: usize = 100;

/// Maximum number of characters driven per recovery pass.
pub const RECOVERY_BATCH_SIZE: usize = 100;

/// How long a sweep's claim on a decay record stays valid.
pub const CLAIM_LEASE_SECS: i64 = DECAY_CADENCE_SECS;

/// Wall-clock budget for one sweep before remaining claims are released.
/// Push time is not counted against it.
pub const SWEEP_BUDGET_MS: u64 = 5_000;

/// Upper bound on a single push to the authoritative reputation store.
/// Must stay below [`SWEEP_BUDGET_MS`].
pub const PUSH_TIMEOUT_MS: u64 = 2_000;

// --- Decay defaults ---

/// Base decay, percent of current standing per day of inactivity.
pub const DEFAULT_BASE_DECAY_RATE: f64 = 1.0;

/// Inactivity shorter than this suppresses decay entirely.
pub const DEFAULT_TIME_THRESHOLD_SECS: i64 = 7 * 24 * 60 * 60;

/// Floor below which decay never pushes a standing.
pub const DEFAULT_MIN_REPUTATION: f64 = -500.0;

/// Cap on a single application, percent of current standing.
pub const DEFAULT_MAX_DECAY_RATE: f64 = 5.0;

/// Carried for the activity-weighted tuning knob; not used by the curve.
pub const DEFAULT_ACTIVITY_BOOST: f64 = 0.5;

/// Lower bound of the nonlinear (already-disliked) factor.
pub const NONLINEAR_FACTOR_FLOOR: f64 = 0.1;

/// Scale of the exponential in the nonlinear factor.
pub const NONLINEAR_SCALE: f64 = 100.0;

/// Per-day slope of the hyperbolic activity factor.
pub const ACTIVITY_SLOPE: f64 = 0.1;

/// Lower bound of the activity factor.
pub const ACTIVITY_FACTOR_FLOOR: f64 = 0.01;

// --- Recovery defaults ---

pub const DEFAULT_BASE_RECOVERY_RATE: f64 = 1.0;
pub const DEFAULT_TIME_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_COST_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_MIN_DURATION_SECS: i64 = 60 * 60;
pub const DEFAULT_MAX_DURATION_SECS: i64 = 30 * 24 * 60 * 60;

/// Currency units charged per reputation point recovered, before the multiplier.
pub const COST_PER_POINT: f64 = 10.0;

/// Currency charged for recoveries when the config does not name one.
pub const DEFAULT_CURRENCY: &str = "eddies";

/// Rate constant of the payment-based exponential curve.
pub const PAYMENT_CURVE_RATE: f64 = 3.0;

/// Quest milestones, as progress fractions.
pub const QUEST_MILESTONES: [f64; 4] = [0.25, 0.50, 0.75, 1.0];

/// Share of the linear curve in the hybrid blend; the remainder is logarithmic.
pub const HYBRID_TIME_WEIGHT: f64 = 0.7;
