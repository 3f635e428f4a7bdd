use crate::{ListenableStore, Store};
use std::{cell::Cell, fmt};

/// Identifies a store instance created by a [Registry].
///
/// Identifiers are allocated in strictly increasing order and are
/// never handed out twice by the same [Registry].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    /// The raw sequence number of this id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A factory for isolated [Store]s and [ListenableStore]s.
///
/// Every instance gets its own backing cell, and is tagged with an
/// [InstanceId] from this registry's counter. The counter belongs to
/// the registry, so independent registries may hand out equal ids;
/// ids are only meaningful within the registry that allocated them.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: Cell<u64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next [InstanceId].
    pub fn allocate(&self) -> InstanceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        InstanceId(id)
    }

    /// The number of ids this registry has allocated so far.
    pub fn allocated(&self) -> u64 {
        self.next_id.get()
    }

    /// Create a new, empty [Store].
    pub fn store<T: Clone + 'static>(&self) -> Store<T> {
        let id = self.allocate();
        log::trace!("registry allocated store {}", id);
        Store::new().with_id(id)
    }

    /// Create a new, empty [ListenableStore].
    pub fn listenable<T: Clone + 'static>(&self) -> ListenableStore<T> {
        let id = self.allocate();
        log::trace!("registry allocated listenable store {}", id);
        ListenableStore::from_store(Store::new().with_id(id))
    }
}
