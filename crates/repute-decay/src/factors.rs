//! Multiplicative dampeners applied on top of the base decay.
//!
//! Both factors lie in `(0, 1]` and only ever shrink the base decay:
//! - [`nonlinear_factor`] slows erosion once a standing is already negative,
//!   bottoming out at [`NONLINEAR_FACTOR_FLOOR`].
//! - [`activity_factor`] falls hyperbolically with days of inactivity,
//!   bottoming out at [`ACTIVITY_FACTOR_FLOOR`], so long-abandoned standings
//!   erode slower per elapsed day than recent lapses.

use repute_core::constants::{
    ACTIVITY_FACTOR_FLOOR, ACTIVITY_SLOPE, NONLINEAR_FACTOR_FLOOR, NONLINEAR_SCALE,
};

/// `1.0` for non-negative standings, else `max(e^(-|v|/100), 0.1)`.
pub fn nonlinear_factor(current_value: f64) -> f64 {
    if current_value >= 0.0 {
        return 1.0;
    }
    (-current_value.abs() / NONLINEAR_SCALE)
        .exp()
        .max(NONLINEAR_FACTOR_FLOOR)
}

/// `max(1 / (1 + 0.1 * days), 0.01)`.
pub fn activity_factor(days_since_activity: f64) -> f64 {
    let days = days_since_activity.max(0.0);
    (1.0 / (1.0 + days * ACTIVITY_SLOPE)).max(ACTIVITY_FACTOR_FLOOR)
}
