//! Loopback Transport
//!
//! In-process fabric that simulates a group of ranks inside one process. Each
//! rank has its own symmetric segment; puts are queued on the issuing worker
//! and delivered when that worker is progressed or quieted, the way a real
//! non-blocking RDMA put only becomes visible after completion.

use crate::error::TransportError;
use crate::transport::{SymmetricAddr, ThreadMode, Transport, Worker, WorkerAddress};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Upper bound on a single `wait_mem` park. Local stores do not go through
/// the fabric, so waiters must come back on their own.
const WAIT_MEM_TIMEOUT: Duration = Duration::from_millis(1);

/// Operation recorded in the fabric journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOp {
    Create(ThreadMode),
    Put {
        dest: SymmetricAddr,
        value: i64,
        target: usize,
    },
    Deliver {
        dest: SymmetricAddr,
        target: usize,
    },
    Quiet,
    Release,
}

/// Journal entry: which worker on which rank did what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntry {
    pub rank: usize,
    pub worker: u64,
    pub op: WorkerOp,
}

struct FabricInner {
    nranks: usize,
    segments: Vec<RwLock<Vec<Arc<AtomicI64>>>>,
    changed: Mutex<u64>,
    changed_cv: Condvar,
    journal: Mutex<Vec<JournalEntry>>,
    next_worker: AtomicU64,
    fail_worker_create: AtomicBool,
    fail_address: AtomicBool,
}

impl FabricInner {
    fn record(&self, rank: usize, worker: u64, op: WorkerOp) {
        self.journal.lock().push(JournalEntry { rank, worker, op });
    }

    fn cell(&self, rank: usize, addr: SymmetricAddr) -> Result<Arc<AtomicI64>, TransportError> {
        let segment = self.segments.get(rank).ok_or(TransportError::UnknownRank {
            rank,
            nranks: self.nranks,
        })?;
        segment
            .read()
            .get(addr.as_usize())
            .cloned()
            .ok_or(TransportError::UnknownAddress(addr.as_usize()))
    }

    fn store(&self, rank: usize, addr: SymmetricAddr, value: i64) -> Result<(), TransportError> {
        self.cell(rank, addr)?.store(value, Ordering::Release);
        *self.changed.lock() += 1;
        self.changed_cv.notify_all();
        Ok(())
    }
}

/// Shared in-process fabric connecting `nranks` simulated ranks.
#[derive(Clone)]
pub struct LoopbackFabric {
    inner: Arc<FabricInner>,
}

impl fmt::Debug for LoopbackFabric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackFabric")
            .field("nranks", &self.inner.nranks)
            .finish()
    }
}

impl LoopbackFabric {
    pub fn new(nranks: usize) -> Self {
        let segments = (0..nranks).map(|_| RwLock::new(Vec::new())).collect();
        Self {
            inner: Arc::new(FabricInner {
                nranks,
                segments,
                changed: Mutex::new(0),
                changed_cv: Condvar::new(),
                journal: Mutex::new(Vec::new()),
                next_worker: AtomicU64::new(1),
                fail_worker_create: AtomicBool::new(false),
                fail_address: AtomicBool::new(false),
            }),
        }
    }

    pub fn nranks(&self) -> usize {
        self.inner.nranks
    }

    /// Transport handle for one rank of the fabric.
    pub fn endpoint(&self, rank: usize) -> Result<LoopbackTransport, TransportError> {
        if rank >= self.inner.nranks {
            return Err(TransportError::UnknownRank {
                rank,
                nranks: self.inner.nranks,
            });
        }
        Ok(LoopbackTransport {
            rank,
            fabric: Arc::clone(&self.inner),
        })
    }

    /// Current value of a registered word, bypassing the data path.
    pub fn peek(&self, rank: usize, addr: SymmetricAddr) -> Option<i64> {
        self.inner
            .cell(rank, addr)
            .ok()
            .map(|cell| cell.load(Ordering::Acquire))
    }

    /// Snapshot of every recorded operation, in order.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.journal.lock().clone()
    }

    /// Operations of one worker, in order.
    pub fn worker_journal(&self, worker: u64) -> Vec<WorkerOp> {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|e| e.worker == worker)
            .map(|e| e.op)
            .collect()
    }

    /// Make subsequent worker creation fail.
    pub fn fail_worker_create(&self, fail: bool) {
        self.inner.fail_worker_create.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent worker address queries fail.
    pub fn fail_address(&self, fail: bool) {
        self.inner.fail_address.store(fail, Ordering::SeqCst);
    }
}

/// One rank's view of a [`LoopbackFabric`].
#[derive(Clone)]
pub struct LoopbackTransport {
    rank: usize,
    fabric: Arc<FabricInner>,
}

impl fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("rank", &self.rank)
            .field("nranks", &self.fabric.nranks)
            .finish()
    }
}

impl Transport for LoopbackTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn nranks(&self) -> usize {
        self.fabric.nranks
    }

    fn create_worker(&self, mode: ThreadMode) -> Result<Box<dyn Worker>, TransportError> {
        if self.fabric.fail_worker_create.load(Ordering::SeqCst) {
            return Err(TransportError::WorkerCreate(format!(
                "injected failure on rank {}",
                self.rank
            )));
        }
        let id = self.fabric.next_worker.fetch_add(1, Ordering::Relaxed);
        self.fabric.record(self.rank, id, WorkerOp::Create(mode));
        Ok(Box::new(LoopbackWorker {
            id,
            rank: self.rank,
            mode,
            fabric: Arc::clone(&self.fabric),
            pending: Mutex::new(VecDeque::new()),
            released: AtomicBool::new(false),
        }))
    }

    fn register_symmetric(&self, cell: Arc<AtomicI64>) -> Result<SymmetricAddr, TransportError> {
        let mut segment = self.fabric.segments[self.rank].write();
        segment.push(cell);
        Ok(SymmetricAddr::new(segment.len() - 1))
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingPut {
    dest: SymmetricAddr,
    value: i64,
    target: usize,
}

/// Worker of the loopback fabric.
pub struct LoopbackWorker {
    id: u64,
    rank: usize,
    mode: ThreadMode,
    fabric: Arc<FabricInner>,
    pending: Mutex<VecDeque<PendingPut>>,
    released: AtomicBool,
}

impl fmt::Debug for LoopbackWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackWorker")
            .field("id", &self.id)
            .field("rank", &self.rank)
            .field("mode", &self.mode)
            .finish()
    }
}

impl LoopbackWorker {
    /// Deliver every queued put.
    ///
    /// The queue stays locked until the last store has landed. A concurrent
    /// `progress` on a shared worker otherwise empties the queue first and
    /// `quiet` returns with those puts still in flight.
    fn drain(&self) -> Result<usize, TransportError> {
        let mut pending = self.pending.lock();
        let mut delivered = 0;
        while let Some(put) = pending.pop_front() {
            self.fabric.store(put.target, put.dest, put.value)?;
            self.fabric.record(
                self.rank,
                self.id,
                WorkerOp::Deliver {
                    dest: put.dest,
                    target: put.target,
                },
            );
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl Worker for LoopbackWorker {
    fn thread_mode(&self) -> ThreadMode {
        self.mode
    }

    fn progress(&self) -> usize {
        // Delivery errors were already rejected at put time.
        self.drain().unwrap_or(0)
    }

    fn wait_mem(&self, _addr: *const u8) {
        let mut generation = self.fabric.changed.lock();
        self.fabric
            .changed_cv
            .wait_for(&mut generation, WAIT_MEM_TIMEOUT);
    }

    fn quiet(&self) -> Result<(), TransportError> {
        let delivered = self.drain()?;
        trace!(rank = self.rank, worker = self.id, delivered, "quiet");
        self.fabric.record(self.rank, self.id, WorkerOp::Quiet);
        Ok(())
    }

    fn address(&self) -> Result<WorkerAddress, TransportError> {
        if self.fabric.fail_address.load(Ordering::SeqCst) {
            return Err(TransportError::Address(format!(
                "injected failure for worker {}",
                self.id
            )));
        }
        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&(self.rank as u64).to_be_bytes());
        bytes.extend_from_slice(&self.id.to_be_bytes());
        Ok(WorkerAddress::new(bytes))
    }

    fn put_i64(
        &self,
        dest: SymmetricAddr,
        value: i64,
        rank: usize,
    ) -> Result<(), TransportError> {
        // Validate the target eagerly so delivery cannot fail later.
        self.fabric.cell(rank, dest).map_err(|e| TransportError::Put {
            rank,
            reason: e.to_string(),
        })?;
        self.pending.lock().push_back(PendingPut {
            dest,
            value,
            target: rank,
        });
        self.fabric.record(
            self.rank,
            self.id,
            WorkerOp::Put {
                dest,
                value,
                target: rank,
            },
        );
        Ok(())
    }

    fn release(&self) -> Result<(), TransportError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Err(TransportError::WorkerRelease(format!(
                "worker {} already released",
                self.id
            )));
        }
        self.fabric.record(self.rank, self.id, WorkerOp::Release);
        Ok(())
    }
}

/// Worker id encoded in a loopback worker address.
pub fn worker_id_from_address(addr: &WorkerAddress) -> Option<u64> {
    let bytes: [u8; 8] = addr.as_bytes().get(8..16)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
