//! PGAS Comms: Contexts, Waits and Global Exit
//!
//! The context-and-synchronization core of a partitioned-global-address-space
//! communication runtime. It manages communication contexts over a one-sided
//! transport, provides the blocking wait-until primitives the memory model is
//! built on, and coordinates all-ranks termination.

pub mod config;
pub mod context;
pub mod error;
pub mod global_exit;
pub mod logging;
pub mod transport;
pub mod wait;
