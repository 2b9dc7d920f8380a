//! Global Exit
//!
//! Turns one rank's decision to abort into the termination of every rank in
//! the group. Each rank runs a monitor thread that waits for its sentinel to
//! leave `Armed`. `trigger` writes `Zapped` into every rank's sentinel with
//! one-sided puts, its own included; each monitor that sees `Zapped` ends its
//! own process.
//!
//! Only the sentinel marker travels by default, so a remote rank exits with
//! whatever status it already held locally. Setting
//! [`GlobalExitConfig::propagate_status`] also ships the triggering rank's
//! status ahead of the marker.

use crate::config::GlobalExitConfig;
use crate::context::{Context, ContextOptions, ContextRegistry};
use crate::error::GlobalExitError;
use crate::wait::{wait_until, Comparator};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

pub mod state;

pub use state::{GlobalExitState, Sentinel};

/// What "terminate the process" means for a monitor that observed `Zapped`.
pub trait ExitHandler: Send + Sync {
    fn exit(&self, status: i32);
}

/// Ends the process with the given status.
///
/// Uses [`std::process::exit`], which still runs atexit handlers and flushes
/// stdio, unlike a raw `_exit`. Other threads are not unwound.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self, status: i32) {
        std::process::exit(status);
    }
}

/// How a monitor thread finished, when its exit handler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Done,
    Zapped(i32),
}

/// Global exit coordinator for one rank.
pub struct GlobalExit {
    rank: usize,
    nranks: usize,
    config: GlobalExitConfig,
    registry: ContextRegistry,
    context: Arc<Context>,
    state: Arc<GlobalExitState>,
    handler: Arc<dyn ExitHandler>,
    monitor: Mutex<Option<JoinHandle<MonitorOutcome>>>,
}

impl fmt::Debug for GlobalExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalExit")
            .field("rank", &self.rank)
            .field("nranks", &self.nranks)
            .field("context_id", &self.context.id())
            .field("sentinel", &self.state.sentinel())
            .finish()
    }
}

impl GlobalExit {
    /// Set up the coordinator: a dedicated context for the monitor and the
    /// fan-out, and the symmetric sentinel/status words.
    pub fn new(registry: &ContextRegistry, config: GlobalExitConfig) -> Result<Self, GlobalExitError> {
        let transport = registry.transport();
        let state = GlobalExitState::register(transport.as_ref())?;
        let context = registry.create(ContextOptions::empty())?;
        Ok(Self {
            rank: transport.rank(),
            nranks: transport.nranks(),
            config,
            registry: registry.clone(),
            context,
            state: Arc::new(state),
            handler: Arc::new(ProcessExit),
            monitor: Mutex::new(None),
        })
    }

    /// Replace the process-exit behaviour.
    pub fn with_exit_handler(mut self, handler: Arc<dyn ExitHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn state(&self) -> &Arc<GlobalExitState> {
        &self.state
    }

    /// The dedicated context. It is destroyed once the monitor is joined.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn is_running(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Start the monitor thread.
    pub fn init(&self) -> Result<(), GlobalExitError> {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Err(GlobalExitError::AlreadyStarted);
        }

        let context = Arc::clone(&self.context);
        let state = Arc::clone(&self.state);
        let handler = Arc::clone(&self.handler);
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_monitor(&context, &state, handler.as_ref()))
            .map_err(GlobalExitError::ThreadSpawn)?;
        *monitor = Some(handle);

        info!(rank = self.rank, "Created global exit monitor thread");
        Ok(())
    }

    /// Clean shutdown: mark `Done` and join the monitor.
    ///
    /// If a peer already zapped this rank the sentinel is left as is and the
    /// monitor's outcome reflects that.
    pub fn finalize(&self) -> Result<MonitorOutcome, GlobalExitError> {
        if !self.is_running() {
            return Err(GlobalExitError::NotStarted);
        }
        if !self.state.mark_done() {
            warn!(
                rank = self.rank,
                sentinel = ?self.state.sentinel(),
                "Sentinel already left armed state at finalize"
            );
        }
        let outcome = self.join()?;
        info!(rank = self.rank, ?outcome, "Terminated global exit monitor thread");
        Ok(outcome)
    }

    /// Abort every rank of the group.
    ///
    /// The fan-out is one point-to-point put per peer, quieted before the
    /// local sentinel is zapped. The local monitor therefore cannot end the
    /// process while a peer is still unreached.
    ///
    /// Under the default exit handler this does not return: the local
    /// monitor observes `Zapped` and ends the process while we join it.
    /// A rank that already finalized is rejected with
    /// [`GlobalExitError::AlreadyFinalized`].
    pub fn trigger(&self, status: i32) -> Result<MonitorOutcome, GlobalExitError> {
        if self.state.sentinel() == Some(Sentinel::Done) {
            return Err(GlobalExitError::AlreadyFinalized);
        }
        self.state.set_exit_status(status);
        warn!(rank = self.rank, status, "Global exit triggered");

        if self.config.propagate_status {
            for rank in self.peers() {
                self.context
                    .put_i64(self.state.status_addr(), i64::from(status), rank)?;
            }
            // status must land before the marker
            self.context.quiet()?;
        }

        for rank in self.peers() {
            self.context
                .put_i64(self.state.sentinel_addr(), Sentinel::Zapped.as_raw(), rank)?;
        }
        self.context.quiet()?;

        if !self.state.mark_zapped() {
            warn!(
                rank = self.rank,
                sentinel = ?self.state.sentinel(),
                "Sentinel already left armed state at trigger"
            );
        }

        self.join()
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nranks).filter(move |&rank| rank != self.rank)
    }

    /// Wait for the monitor thread to finish without touching the sentinel,
    /// then destroy the dedicated context.
    ///
    /// Used by ranks that expect to be zapped by a peer.
    pub fn join(&self) -> Result<MonitorOutcome, GlobalExitError> {
        let handle = self
            .monitor
            .lock()
            .take()
            .ok_or(GlobalExitError::NotStarted)?;
        let outcome = handle.join().map_err(|_| GlobalExitError::ThreadJoin)?;
        self.registry.destroy(Some(Arc::clone(&self.context)))?;
        Ok(outcome)
    }
}

impl Drop for GlobalExit {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            self.state.mark_done();
            if handle.join().is_err() {
                warn!(rank = self.rank, "Global exit monitor panicked during drop");
            }
        }
        if let Err(e) = self.registry.destroy(Some(Arc::clone(&self.context))) {
            warn!(rank = self.rank, error = %e, "Failed to destroy global exit context");
        }
    }
}

fn run_monitor(
    context: &Context,
    state: &GlobalExitState,
    handler: &dyn ExitHandler,
) -> MonitorOutcome {
    wait_until(
        context,
        state.sentinel_word(),
        Comparator::Ne,
        Sentinel::Armed.as_raw(),
    );

    match state.sentinel() {
        Some(Sentinel::Zapped) => {
            let status = state.exit_status();
            handler.exit(status);
            MonitorOutcome::Zapped(status)
        }
        _ => MonitorOutcome::Done,
    }
}
