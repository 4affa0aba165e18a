/*!
 * Scope Containers
 * Container contracts for run, luminosity block, and event scopes
 *
 * Containers are owned and defined externally; the adaptor only ever borrows
 * them and mutates them through the commit path. The in-memory containers
 * here back stand-alone use and tests.
 */

mod commit;

pub use commit::CommitGateway;

use crate::core::errors::LifecycleViolation;
use crate::core::types::{
    ContainerId, LuminosityBlockIndex, ProductHandle, ProductId, RunIndex,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Type-erased produced item, owned by its scope container after commit
pub type ProductData = Box<dyn Any + Send>;

// Container identities are process-unique so the commit ledger can tell
// scope instances apart without caring who allocated them.
static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

fn next_container_id() -> ContainerId {
    NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Run scope container: finalized with only summary data already written
pub trait RunContainer: Send {
    fn container_id(&self) -> ContainerId;

    /// Fetch an upstream item by its resolved handle
    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData>;

    /// Write a summary item before the container is marked complete
    fn put_summary(&mut self, id: ProductId, data: ProductData);

    /// Make the scope's contents visible to downstream consumers
    fn mark_complete(&mut self);
}

/// Luminosity block scope container, same finalization contract as runs
pub trait LumiContainer: Send {
    fn container_id(&self) -> ContainerId;
    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData>;
    fn put_summary(&mut self, id: ProductId, data: ProductData);
    fn mark_complete(&mut self);
}

/// Event scope container with item fetch by resolved handle
pub trait EventContainer: Send {
    fn container_id(&self) -> ContainerId;

    /// Fetch a previously committed item by its resolved handle
    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData>;

    /// Take ownership of all produced items for this event in one step
    fn absorb(&mut self, items: Vec<(ProductId, ProductData)>);
}

/// Staging view of one event handed to a unit's produce hook
///
/// Inputs are fetched through the cached handle lists; outputs are staged by
/// declaration slot and committed by the gateway after the hook returns.
pub struct EventContext<'a> {
    container: &'a dyn EventContainer,
    to_get: &'a [ProductHandle],
    may_get: &'a [ProductHandle],
    produced_ids: &'a [ProductId],
    staged: Vec<Option<ProductData>>,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(
        container: &'a dyn EventContainer,
        to_get: &'a [ProductHandle],
        may_get: &'a [ProductHandle],
        produced_ids: &'a [ProductId],
    ) -> Self {
        Self {
            container,
            to_get,
            may_get,
            produced_ids,
            staged: (0..produced_ids.len()).map(|_| None).collect(),
        }
    }

    /// Cached handles for this module's must-consume event products
    pub fn items_to_get(&self) -> &[ProductHandle] {
        self.to_get
    }

    /// Cached handles for this module's may-consume event products
    pub fn items_may_get(&self) -> &[ProductHandle] {
        self.may_get
    }

    /// Fetch an input item; the absent sentinel always yields `None`
    pub fn get(&self, handle: ProductHandle) -> Option<&ProductData> {
        if handle.is_absent() {
            return None;
        }
        self.container.fetch(handle)
    }

    /// Stage a produced item under its declaration slot
    ///
    /// Slots follow the order of the module's event-scope produced
    /// declarations. Each slot may be staged at most once per event.
    pub fn put<D: Any + Send>(&mut self, slot: usize, data: D) -> Result<(), LifecycleViolation> {
        if slot >= self.staged.len() {
            return Err(LifecycleViolation::ProductSlotOutOfRange {
                slot,
                declared: self.staged.len(),
            });
        }
        if self.staged[slot].is_some() {
            return Err(LifecycleViolation::ProductAlreadyStaged { slot });
        }
        self.staged[slot] = Some(Box::new(data));
        Ok(())
    }

    /// Number of slots staged so far
    pub fn staged_len(&self) -> usize {
        self.staged.iter().filter(|s| s.is_some()).count()
    }

    /// Drain staged items paired with their committed identifiers
    pub(crate) fn take_staged(&mut self) -> Vec<(ProductId, ProductData)> {
        self.staged
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, item)| item.take().map(|data| (self.produced_ids[slot], data)))
            .collect()
    }
}

/// In-memory run container
#[derive(Debug)]
pub struct MemRun {
    id: ContainerId,
    run: RunIndex,
    items: HashMap<ProductId, ProductData>,
    complete: bool,
}

impl MemRun {
    pub fn new(run: RunIndex) -> Self {
        Self {
            id: next_container_id(),
            run,
            items: HashMap::new(),
            complete: false,
        }
    }

    /// Preload an upstream input, as an earlier module's commit would
    pub fn insert_input<D: Any + Send>(&mut self, handle: ProductHandle, data: D) {
        self.items.insert(handle.raw(), Box::new(data));
    }

    pub fn run(&self) -> RunIndex {
        self.run
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl RunContainer for MemRun {
    fn container_id(&self) -> ContainerId {
        self.id
    }

    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData> {
        self.items.get(&handle.raw())
    }

    fn put_summary(&mut self, id: ProductId, data: ProductData) {
        self.items.insert(id, data);
    }

    fn mark_complete(&mut self) {
        self.complete = true;
    }
}

/// In-memory luminosity block container
#[derive(Debug)]
pub struct MemLumi {
    id: ContainerId,
    lumi: LuminosityBlockIndex,
    items: HashMap<ProductId, ProductData>,
    complete: bool,
}

impl MemLumi {
    pub fn new(lumi: LuminosityBlockIndex) -> Self {
        Self {
            id: next_container_id(),
            lumi,
            items: HashMap::new(),
            complete: false,
        }
    }

    /// Preload an upstream input, as an earlier module's commit would
    pub fn insert_input<D: Any + Send>(&mut self, handle: ProductHandle, data: D) {
        self.items.insert(handle.raw(), Box::new(data));
    }

    pub fn lumi(&self) -> LuminosityBlockIndex {
        self.lumi
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl LumiContainer for MemLumi {
    fn container_id(&self) -> ContainerId {
        self.id
    }

    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData> {
        self.items.get(&handle.raw())
    }

    fn put_summary(&mut self, id: ProductId, data: ProductData) {
        self.items.insert(id, data);
    }

    fn mark_complete(&mut self) {
        self.complete = true;
    }
}

/// In-memory event container keyed by product identifier
///
/// The in-memory registry resolves handles to the registered product id, so
/// items absorbed under an id are fetchable by the matching handle.
#[derive(Debug)]
pub struct MemEvent {
    id: ContainerId,
    items: HashMap<u32, ProductData>,
}

impl MemEvent {
    pub fn new() -> Self {
        Self {
            id: next_container_id(),
            items: HashMap::new(),
        }
    }

    /// Preload an upstream input, as an earlier module's commit would
    pub fn insert_input<D: Any + Send>(&mut self, handle: ProductHandle, data: D) {
        self.items.insert(handle.raw(), Box::new(data));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.items.contains_key(&id)
    }
}

impl EventContainer for MemEvent {
    fn container_id(&self) -> ContainerId {
        self.id
    }

    fn fetch(&self, handle: ProductHandle) -> Option<&ProductData> {
        self.items.get(&handle.raw())
    }

    fn absorb(&mut self, items: Vec<(ProductId, ProductData)>) {
        for (id, data) in items {
            self.items.insert(id, data);
        }
    }
}

impl Default for MemEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MemRun {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Default for MemLumi {
    fn default() -> Self {
        Self::new(0)
    }
}
