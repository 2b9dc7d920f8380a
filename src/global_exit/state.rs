//! Shared global-exit state: the sentinel and the exit status.
//!
//! Both words live in the symmetric segment so peers can write them with
//! one-sided puts. They are handed around as `Arc`s rather than globals so
//! the monitor thread, application threads, and the memory layer all hold
//! the same words explicitly.

use crate::error::TransportError;
use crate::transport::{SymmetricAddr, Transport};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Sentinel values. Transitions only ever leave `Armed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum Sentinel {
    Armed = 0,
    Done = 1,
    Zapped = 2,
}

impl Sentinel {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Sentinel::Armed),
            1 => Some(Sentinel::Done),
            2 => Some(Sentinel::Zapped),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i64 {
        self as i64
    }
}

#[derive(Debug)]
pub struct GlobalExitState {
    sentinel: Arc<AtomicI64>,
    status: Arc<AtomicI64>,
    sentinel_addr: SymmetricAddr,
    status_addr: SymmetricAddr,
}

impl GlobalExitState {
    /// Allocate the words and register them with the symmetric segment.
    ///
    /// Every rank must register in the same order so that the addresses line
    /// up across the group.
    pub fn register(transport: &dyn Transport) -> Result<Self, TransportError> {
        let sentinel = Arc::new(AtomicI64::new(Sentinel::Armed.as_raw()));
        let status = Arc::new(AtomicI64::new(0));
        let sentinel_addr = transport.register_symmetric(Arc::clone(&sentinel))?;
        let status_addr = transport.register_symmetric(Arc::clone(&status))?;
        Ok(Self {
            sentinel,
            status,
            sentinel_addr,
            status_addr,
        })
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        Sentinel::from_raw(self.sentinel.load(Ordering::Acquire))
    }

    /// The sentinel word itself, for the wait engine.
    pub fn sentinel_word(&self) -> &AtomicI64 {
        &self.sentinel
    }

    pub fn sentinel_addr(&self) -> SymmetricAddr {
        self.sentinel_addr
    }

    pub fn status_addr(&self) -> SymmetricAddr {
        self.status_addr
    }

    pub fn exit_status(&self) -> i32 {
        self.status.load(Ordering::Acquire) as i32
    }

    pub fn set_exit_status(&self, status: i32) {
        self.status.store(i64::from(status), Ordering::Release);
    }

    /// `Armed -> Done`. Returns false if the sentinel already left `Armed`,
    /// in which case it is left untouched.
    pub fn mark_done(&self) -> bool {
        self.sentinel
            .compare_exchange(
                Sentinel::Armed.as_raw(),
                Sentinel::Done.as_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Armed -> Zapped`. Returns false if the sentinel already left
    /// `Armed`, in which case it is left untouched.
    pub fn mark_zapped(&self) -> bool {
        self.sentinel
            .compare_exchange(
                Sentinel::Armed.as_raw(),
                Sentinel::Zapped.as_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
