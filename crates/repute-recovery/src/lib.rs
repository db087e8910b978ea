//! # repute-recovery
//! Recovery curves and the [`RecoveryEngine`] implementing
//! [`repute_core::traits::RecoveryCalculator`].

pub mod curve;
pub mod engine;

pub use engine::RecoveryEngine;
