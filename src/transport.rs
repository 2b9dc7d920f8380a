//! Transport Interface
//!
//! The communication domain that sits below this crate. It owns workers (the
//! per-context network endpoints), registers symmetric memory with the PGAS
//! layer, and carries the one-sided data path. Only the operations the
//! context, wait and global-exit layers need are expressed here.

use crate::error::TransportError;
use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

pub mod loopback;

pub use loopback::{
    worker_id_from_address, JournalEntry, LoopbackFabric, LoopbackTransport, WorkerOp,
};

/// Threading mode a worker is created with.
///
/// Fixed at creation time and never re-checked at call sites; using a worker
/// outside its mode is a caller contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// Only the creating thread may touch the worker.
    Single,
    /// Any thread may use the worker, but callers serialize access.
    Serialized,
    /// Fully concurrent access.
    Multi,
}

/// Address of an object in the symmetric segment.
///
/// Symmetric objects are registered in the same order on every rank, so the
/// same address names the corresponding object on each peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymmetricAddr(usize);

impl SymmetricAddr {
    pub fn new(offset: usize) -> Self {
        SymmetricAddr(offset)
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Opaque network address of a worker, exchanged during bootstrap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WorkerAddress(Vec<u8>);

impl WorkerAddress {
    pub fn new(bytes: Vec<u8>) -> Self {
        WorkerAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WorkerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerAddress({})", hex::encode(&self.0))
    }
}

/// A per-context network endpoint.
pub trait Worker: Send + Sync + fmt::Debug {
    fn thread_mode(&self) -> ThreadMode;

    /// Advance pending network completions. Returns the number of events
    /// processed.
    fn progress(&self) -> usize;

    /// Block until the memory at `addr` may have changed.
    ///
    /// Only a hint: it can return spuriously or because of unrelated writes,
    /// so callers always re-check their predicate. The pointer is never
    /// dereferenced by the caller's contract.
    fn wait_mem(&self, addr: *const u8);

    /// Complete every one-sided operation issued through this worker.
    fn quiet(&self) -> Result<(), TransportError>;

    /// Network address peers use to reach this worker.
    fn address(&self) -> Result<WorkerAddress, TransportError>;

    /// One-sided write of a 64-bit word into `dest` on `rank`.
    fn put_i64(&self, dest: SymmetricAddr, value: i64, rank: usize)
        -> Result<(), TransportError>;

    /// Release the underlying network resources.
    fn release(&self) -> Result<(), TransportError>;
}

/// The communication domain of one rank.
pub trait Transport: Send + Sync + fmt::Debug {
    fn rank(&self) -> usize;

    fn nranks(&self) -> usize;

    fn create_worker(&self, mode: ThreadMode) -> Result<Box<dyn Worker>, TransportError>;

    /// Register a word with the symmetric segment so peers can write it.
    fn register_symmetric(&self, cell: Arc<AtomicI64>) -> Result<SymmetricAddr, TransportError>;
}
