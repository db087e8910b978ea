//! # repute-core
//! Foundation types, errors, and traits for the Repute engine.

pub mod constants;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{ConfigurationError, ExternalPushError, PersistenceError, ReputeError, ValidationError};
pub use store::{MemoryStore, ProcessStore};
pub use traits::{DecayCalculator, RecoveryCalculator, ReputationSystem};
