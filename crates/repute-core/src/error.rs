//! Error types for the Repute engine.
use thiserror::Error;

use crate::types::{RecoveryMethod, RecoveryStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("no decay config for faction {0} and no wildcard default")] MissingDecayConfig(String),
    #[error("no recovery config for method {0}")] MissingRecoveryConfig(RecoveryMethod),
    #[error("invalid config: {0}")] Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("target {target} must exceed start {start}")] TargetNotAboveStart { start: f64, target: f64 },
    #[error("recovery method is empty")] EmptyMethod,
    #[error("unknown recovery method: {0}")] UnknownMethod(String),
    #[error("unknown recovery status: {0}")] UnknownStatus(String),
    #[error("estimated duration {hours:.2}h outside [{min_hours:.2}h, {max_hours:.2}h]")] DurationOutOfRange { hours: f64, min_hours: f64, max_hours: f64 },
    #[error("config is for method {config}, request uses {requested}")] MethodMismatch { requested: RecoveryMethod, config: RecoveryMethod },
    #[error("recovery {0} already in progress for this faction")] RecoveryInProgress(String),
    #[error("recovery not found: {0}")] RecoveryNotFound(String),
    #[error("illegal transition {from} -> {to}")] IllegalTransition { from: RecoveryStatus, to: RecoveryStatus },
    #[error("non-finite value: {0}")] NonFinite(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("backend: {0}")] Backend(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("record not found: {0}")] NotFound(String),
    #[error("duplicate record: {0}")] Duplicate(String),
    #[error("version conflict on {id}: expected {expected}, found {found}")] VersionConflict { id: String, expected: u64, found: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalPushError {
    #[error("timed out after {0}ms")] Timeout(u64),
    #[error("rejected with status {status}: {body}")] Rejected { status: u16, body: String },
    #[error("transport: {0}")] Transport(String),
    #[error("malformed response: {0}")] Malformed(String),
}

#[derive(Error, Debug)]
pub enum ReputeError {
    #[error(transparent)] Configuration(#[from] ConfigurationError),
    #[error(transparent)] Validation(#[from] ValidationError),
    #[error(transparent)] Persistence(#[from] PersistenceError),
    #[error(transparent)] ExternalPush(#[from] ExternalPushError),
}

impl ReputeError {
    /// Whether the caller supplied a bad request (as opposed to an engine fault).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
