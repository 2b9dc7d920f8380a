//! Rank-indexed table of worker addresses, filled by default-context creation
//! and read by bootstrap to connect peers.

use crate::error::TransportError;
use crate::transport::WorkerAddress;
use parking_lot::RwLock;

#[derive(Debug)]
pub struct AddressTable {
    entries: RwLock<Vec<Option<WorkerAddress>>>,
}

impl AddressTable {
    pub fn new(nranks: usize) -> Self {
        Self {
            entries: RwLock::new(vec![None; nranks]),
        }
    }

    pub fn publish(&self, rank: usize, address: WorkerAddress) -> Result<(), TransportError> {
        let mut entries = self.entries.write();
        let nranks = entries.len();
        let slot = entries
            .get_mut(rank)
            .ok_or(TransportError::UnknownRank { rank, nranks })?;
        *slot = Some(address);
        Ok(())
    }

    pub fn get(&self, rank: usize) -> Option<WorkerAddress> {
        self.entries.read().get(rank).cloned().flatten()
    }

    /// Number of ranks whose address is known.
    pub fn published(&self) -> usize {
        self.entries.read().iter().filter(|e| e.is_some()).count()
    }
}
