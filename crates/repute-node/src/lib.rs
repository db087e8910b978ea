//! # repute-node: Lifecycle service, RocksDB storage, scheduling.
//!
//! Composes the Repute subsystems into a running service:
//! - [`service::LifecycleService`]: decay sweeps, recovery attempts, health
//! - [`storage::RocksStore`]: persistent process store backed by RocksDB
//! - [`scheduler::SweepScheduler`]: periodic sweep and recovery driver
//! - [`external`]: clients for the authoritative reputation store
//! - [`config::ServiceConfig`]: layered service configuration

pub mod config;
pub mod external;
pub mod locks;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use config::ServiceConfig;
pub use external::{DetachedReputation, HttpReputationClient};
pub use logging::init_logging;
pub use scheduler::{CycleReport, SchedulerHandle, SweepScheduler};
pub use service::{LifecycleService, RecoveryReport, SweepReport};
pub use storage::RocksStore;
