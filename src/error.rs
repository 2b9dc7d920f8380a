//! Error types for the PGAS communication core.

use std::collections::TryReserveError;
use thiserror::Error;

/// Failures reported by the transport layer.
///
/// Once the transport is initialized these are not expected in steady state;
/// callers above this crate normally treat them as fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Worker creation failed: {0}")]
    WorkerCreate(String),

    #[error("Worker release failed: {0}")]
    WorkerRelease(String),

    #[error("Worker address unavailable: {0}")]
    Address(String),

    #[error("Put to rank {rank} failed: {reason}")]
    Put { rank: usize, reason: String },

    #[error("Quiet failed: {0}")]
    Quiet(String),

    #[error("Symmetric registration failed: {0}")]
    Registration(String),

    #[error("Unknown rank {rank} (group size {nranks})")]
    UnknownRank { rank: usize, nranks: usize },

    #[error("Unknown symmetric address {0:#x}")]
    UnknownAddress(usize),
}

/// Context lifecycle errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Out of memory growing context registry: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Default context address unavailable: {0}")]
    AddressUnavailable(TransportError),

    #[error("Default context already created (id {0})")]
    DefaultAlreadyCreated(usize),

    #[error("Default context must be created first ({live} contexts already live)")]
    DefaultNotFirst { live: usize },
}

/// Global exit coordinator errors
#[derive(Debug, Error)]
pub enum GlobalExitError {
    #[error("Failed to spawn monitor thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Monitor thread panicked")]
    ThreadJoin,

    #[error("Monitor thread already started")]
    AlreadyStarted,

    #[error("Monitor thread not started")]
    NotStarted,

    #[error("Global exit already finalized on this rank")]
    AlreadyFinalized,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
