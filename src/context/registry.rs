//! Context registry: owns every live context of the process and assigns ids.
//!
//! Slots are never compacted. A destroyed context leaves a `None` behind and
//! its id is retired, so ids stay valid external handles for the lifetime of
//! the registry.

use crate::context::{AddressTable, Context, ContextFlags, ContextOptions};
use crate::error::ContextError;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of slots the registry grows by when full.
pub const CONTEXT_BLOCK: usize = 8;

#[derive(Debug, Default)]
struct Slots {
    slots: Vec<Option<Arc<Context>>>,
    default_id: Option<usize>,
}

impl Slots {
    fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Registry of communication contexts for one rank.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone)]
pub struct ContextRegistry {
    transport: Arc<dyn Transport>,
    addresses: Arc<AddressTable>,
    inner: Arc<Mutex<Slots>>,
}

impl ContextRegistry {
    /// Create an empty registry with a fresh address table.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let addresses = Arc::new(AddressTable::new(transport.nranks()));
        Self::with_address_table(transport, addresses)
    }

    /// Create an empty registry publishing into an existing address table.
    pub fn with_address_table(transport: Arc<dyn Transport>, addresses: Arc<AddressTable>) -> Self {
        Self {
            transport,
            addresses,
            inner: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn addresses(&self) -> &Arc<AddressTable> {
        &self.addresses
    }

    /// Create a context.
    ///
    /// Transport failure is returned as [`ContextError::Transport`]; this
    /// layer trusts an initialized transport, so callers treat it as fatal.
    /// Running out of memory while growing the registry is the recoverable
    /// case and is reported as [`ContextError::Allocation`].
    pub fn create(&self, options: ContextOptions) -> Result<Arc<Context>, ContextError> {
        let mut inner = self.inner.lock();
        self.create_in(&mut inner, options)
    }

    fn create_in(&self, inner: &mut Slots, options: ContextOptions) -> Result<Arc<Context>, ContextError> {
        let flags = ContextFlags::from_options(options);
        let mode = flags.thread_mode();

        if inner.slots.len() == inner.slots.capacity() {
            inner.slots.try_reserve_exact(CONTEXT_BLOCK)?;
        }

        let worker = self.transport.create_worker(mode)?;
        let id = inner.slots.len();
        let context = Arc::new(Context::new(id, flags, worker));
        inner.slots.push(Some(Arc::clone(&context)));

        debug!(
            rank = self.transport.rank(),
            context_id = id,
            ?mode,
            nostore = flags.nostore,
            "Created context"
        );
        Ok(context)
    }

    /// Destroy a context. `None` is a no-op.
    ///
    /// Outstanding one-sided operations are completed (quiet) before the
    /// worker is released. The slot is cleared but storage never shrinks.
    pub fn destroy(&self, context: Option<Arc<Context>>) -> Result<(), ContextError> {
        let Some(context) = context else {
            return Ok(());
        };

        let mut inner = self.inner.lock();
        let id = context.id();
        let owned = matches!(
            inner.slots.get(id),
            Some(Some(slot)) if Arc::ptr_eq(slot, &context)
        );
        if !owned {
            debug!(context_id = id, "Context not live in this registry, ignoring destroy");
            return Ok(());
        }

        context.quiet()?;
        context.release()?;
        inner.slots[id] = None;

        debug!(rank = self.transport.rank(), context_id = id, "Destroyed context");
        Ok(())
    }

    /// Create the default context and publish its worker address.
    ///
    /// The default must be the first context of the process, so this fails
    /// with [`ContextError::DefaultNotFirst`] while any other context is
    /// live. Its id is 0 unless an earlier attempt failed and retired that id.
    ///
    /// Without a published address no peer can reach this rank, so callers
    /// treat any error here as fatal to start-up. On address failure the
    /// freshly created context is destroyed again.
    pub fn create_default(&self) -> Result<Arc<Context>, ContextError> {
        let context = {
            let mut inner = self.inner.lock();
            if let Some(id) = inner.default_id {
                return Err(ContextError::DefaultAlreadyCreated(id));
            }
            let live = inner.live();
            if live > 0 {
                return Err(ContextError::DefaultNotFirst { live });
            }
            let context = self.create_in(&mut inner, ContextOptions::empty())?;
            inner.default_id = Some(context.id());
            context
        };

        let address = match context.address() {
            Ok(address) => address,
            Err(e) => {
                self.abandon_default(context);
                return Err(ContextError::AddressUnavailable(e));
            }
        };

        let rank = self.transport.rank();
        let len = address.len();
        if let Err(e) = self.addresses.publish(rank, address) {
            self.abandon_default(context);
            return Err(e.into());
        }

        info!(
            rank,
            context_id = context.id(),
            address_len = len,
            "Published default context address"
        );
        Ok(context)
    }

    fn abandon_default(&self, context: Arc<Context>) {
        self.inner.lock().default_id = None;
        if let Err(e) = self.destroy(Some(context)) {
            warn!(error = %e, "Failed to destroy default context after start-up error");
        }
    }

    /// The default context, if created and still live.
    pub fn default_context(&self) -> Option<Arc<Context>> {
        let inner = self.inner.lock();
        inner
            .default_id
            .and_then(|id| inner.slots.get(id).cloned().flatten())
    }

    /// Live context by id.
    pub fn get(&self, id: usize) -> Option<Arc<Context>> {
        self.inner.lock().slots.get(id).cloned().flatten()
    }

    /// Number of live contexts.
    pub fn live(&self) -> usize {
        self.inner.lock().live()
    }

    /// Number of ids handed out so far (live or retired).
    pub fn high_water(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.capacity()
    }
}
