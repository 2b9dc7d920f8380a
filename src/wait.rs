//! Wait Engine
//!
//! Blocking "wait until a remote-visible word satisfies a predicate"
//! primitives. One generic operation covers every word width and
//! comparator. Each round pumps the context's progress engine (remote writes
//! only surface while someone drives progress), yields the thread, then asks
//! the transport to park until the word may have changed. The transport hint
//! can wake spuriously, so the predicate is re-evaluated after every round.
//!
//! There is no timeout and no cancellation: a waiter returns only when the
//! observed memory changes, or the process ends.

use crate::context::Context;
use std::fmt;
use std::sync::atomic::{AtomicI16, AtomicI32, AtomicI64, Ordering};

/// Comparison applied as `comparator(*location, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Comparator::Eq,
        Comparator::Ne,
        Comparator::Gt,
        Comparator::Lt,
        Comparator::Ge,
        Comparator::Le,
    ];

    pub fn compare<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Ne => lhs != rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Le => lhs <= rhs,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Lt => "lt",
            Comparator::Ge => "ge",
            Comparator::Le => "le",
        };
        f.write_str(name)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for std::sync::atomic::AtomicI16 {}
    impl Sealed for std::sync::atomic::AtomicI32 {}
    impl Sealed for std::sync::atomic::AtomicI64 {}
}

/// A shared word the wait engine can observe.
pub trait WaitWord: sealed::Sealed + Sync {
    type Value: Copy + PartialOrd + fmt::Debug;

    /// Acquire load, so writes made before a remote or cross-thread store
    /// are visible once the new value is.
    fn load_acquire(&self) -> Self::Value;

    fn as_mem_ptr(&self) -> *const u8;
}

macro_rules! impl_wait_word {
    ($atomic:ty, $value:ty) => {
        impl WaitWord for $atomic {
            type Value = $value;

            fn load_acquire(&self) -> $value {
                self.load(Ordering::Acquire)
            }

            fn as_mem_ptr(&self) -> *const u8 {
                self.as_ptr() as *const u8
            }
        }
    };
}

impl_wait_word!(AtomicI16, i16);
impl_wait_word!(AtomicI32, i32);
impl_wait_word!(AtomicI64, i64);

/// Evaluate the predicate once, without blocking.
pub fn test<W: WaitWord>(location: &W, comparator: Comparator, value: W::Value) -> bool {
    comparator.compare(location.load_acquire(), value)
}

/// Block until `comparator(*location, value)` holds.
pub fn wait_until<W: WaitWord>(
    context: &Context,
    location: &W,
    comparator: Comparator,
    value: W::Value,
) {
    loop {
        context.progress();
        std::thread::yield_now();
        context.wait_mem(location.as_mem_ptr());
        if test(location, comparator, value) {
            return;
        }
    }
}
