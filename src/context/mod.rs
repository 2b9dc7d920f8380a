//! Communication Contexts
//!
//! A context is an independent communication endpoint: it owns one transport
//! worker whose threading mode is fixed by the options the context was
//! created with. Contexts are created and destroyed through the
//! [`ContextRegistry`], which hands out stable integer ids.

use crate::error::TransportError;
use crate::transport::{SymmetricAddr, ThreadMode, Worker, WorkerAddress};
use std::fmt;
use std::ops::BitOr;

pub mod address;
pub mod registry;

pub use address::AddressTable;
pub use registry::{ContextRegistry, CONTEXT_BLOCK};

/// Context creation options (bitmask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextOptions(u64);

impl ContextOptions {
    /// Callers guarantee mutually exclusive access.
    pub const SERIALIZED: ContextOptions = ContextOptions(1 << 0);
    /// Only one thread ever uses the context.
    pub const PRIVATE: ContextOptions = ContextOptions(1 << 1);
    /// Store-ordering hint, opaque at this layer.
    pub const NOSTORE: ContextOptions = ContextOptions(1 << 2);

    const ALL: u64 = (1 << 0) | (1 << 1) | (1 << 2);

    pub const fn empty() -> Self {
        ContextOptions(0)
    }

    /// Build from a raw bitmask. Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u64) -> Self {
        ContextOptions(bits & Self::ALL)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: ContextOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ContextOptions {
    type Output = ContextOptions;

    fn bitor(self, rhs: ContextOptions) -> ContextOptions {
        ContextOptions(self.0 | rhs.0)
    }
}

/// Flags a context was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextFlags {
    pub serialized: bool,
    pub private: bool,
    pub nostore: bool,
}

impl ContextFlags {
    pub fn from_options(options: ContextOptions) -> Self {
        Self {
            serialized: options.contains(ContextOptions::SERIALIZED),
            private: options.contains(ContextOptions::PRIVATE),
            nostore: options.contains(ContextOptions::NOSTORE),
        }
    }

    /// Worker threading mode; `serialized` wins over `private`.
    pub fn thread_mode(&self) -> ThreadMode {
        if self.serialized {
            ThreadMode::Serialized
        } else if self.private {
            ThreadMode::Single
        } else {
            ThreadMode::Multi
        }
    }
}

/// A communication endpoint owning one transport worker.
pub struct Context {
    id: usize,
    flags: ContextFlags,
    worker: Box<dyn Worker>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("worker", &self.worker)
            .finish()
    }
}

impl Context {
    pub(crate) fn new(id: usize, flags: ContextFlags, worker: Box<dyn Worker>) -> Self {
        Self { id, flags, worker }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    /// Mode the underlying worker was actually created in.
    pub fn thread_mode(&self) -> ThreadMode {
        self.worker.thread_mode()
    }

    /// Drive the worker's progress engine.
    pub fn progress(&self) -> usize {
        self.worker.progress()
    }

    /// Block until every one-sided operation issued here has completed.
    pub fn quiet(&self) -> Result<(), TransportError> {
        self.worker.quiet()
    }

    /// One-sided write of a 64-bit word into `dest` on `rank`.
    pub fn put_i64(
        &self,
        dest: SymmetricAddr,
        value: i64,
        rank: usize,
    ) -> Result<(), TransportError> {
        self.worker.put_i64(dest, value, rank)
    }

    pub fn address(&self) -> Result<WorkerAddress, TransportError> {
        self.worker.address()
    }

    pub(crate) fn wait_mem(&self, addr: *const u8) {
        self.worker.wait_mem(addr)
    }

    pub(crate) fn release(&self) -> Result<(), TransportError> {
        self.worker.release()
    }
}
