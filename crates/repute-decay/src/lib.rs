//! # repute-decay: Inactivity-driven reputation decay.
//!
//! - **Threshold suppression**: inactivity shorter than the faction's
//!   threshold produces no decay at all.
//! - **Dampened base decay**: a per-day percentage of the current standing,
//!   multiplied by a nonlinear factor (slower once already disliked) and a
//!   hyperbolic activity factor (slower for long-abandoned standings).
//! - **Cap and floor**: one application never removes more than the
//!   configured maximum percentage, and never crosses `min_reputation`.

pub mod engine;
pub mod factors;

pub use engine::DecayEngine;
pub use factors::{activity_factor, nonlinear_factor};
