//! Watch deduplication.
//!
//! A process-scoped registry recording which dependent types already have a
//! watch registered, so concurrent reconciles discovering the same type
//! register it exactly once. Mutation is exclusive (coarse mutex around the
//! check-then-set); the set is read-mostly after initial discovery.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::TypeIdentifier;

/// Thread-safe set of already-watched resource types, shared across all
/// reconciles in the process. Created at process start with explicit
/// lifecycle rather than as ad hoc package-level state.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    watched: Mutex<HashSet<TypeIdentifier>>,
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the type as watched. Returns whether it was newly
    /// registered; only a `true` return should be followed by an actual
    /// watch registration on the cluster.
    pub fn register_if_absent(&self, type_id: &TypeIdentifier) -> bool {
        self.lock().insert(type_id.clone())
    }

    /// Forgets the type, making it registrable again. Rolls back a claim
    /// whose cluster-side registration failed.
    pub fn unregister(&self, type_id: &TypeIdentifier) {
        self.lock().remove(type_id);
    }

    /// Whether the type already has a watch registered.
    pub fn is_watched(&self, type_id: &TypeIdentifier) -> bool {
        self.lock().contains(type_id)
    }

    // A poisoned lock only means a holder panicked mid-insert; the set
    // stays usable, so recover the guard instead of propagating the panic.
    fn lock(&self) -> MutexGuard<'_, HashSet<TypeIdentifier>> {
        self.watched.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
