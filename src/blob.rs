//! Blob lifecycle management
//!
//! Every binary object the library creates (a fetched image, a transcoded
//! audio track, a finished archive) is registered here and must be released
//! exactly once. Handles are grouped into *scopes* so an owner (one batch
//! generation, one extraction run) can release everything it created in a
//! single call when it is replaced or torn down.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Opaque reference to a binary object held in the [`BlobStore`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(u64);

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob#{}", self.0)
    }
}

/// Revocation group tying handles to their owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(u64);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Counters for asserting the create/revoke pairing invariant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStats {
    /// Handles currently registered
    pub active_handles: usize,
    /// Total payload bytes currently held
    pub active_bytes: u64,
    /// Handles created over the store's lifetime
    pub created_total: u64,
    /// Handles revoked over the store's lifetime
    pub revoked_total: u64,
}

struct Entry {
    bytes: Bytes,
    scope: ScopeId,
}

#[derive(Default)]
struct Table {
    entries: HashMap<BlobHandle, Entry>,
    next_handle: u64,
    next_scope: u64,
    created_total: u64,
    revoked_total: u64,
}

impl Table {
    /// Handle ids are allocated monotonically, so any id at or below the
    /// high-water mark was issued at some point; absent from `entries`, it
    /// must already have been revoked
    fn was_issued(&self, handle: BlobHandle) -> bool {
        handle.0 > 0 && handle.0 <= self.next_handle
    }
}

/// Tracks every locally created binary handle and guarantees each is
/// released exactly once
///
/// Cheaply cloneable; all clones share one table. The table is the only
/// state mutated from multiple concurrent completion callbacks; each
/// mutation touches a disjoint key, serialized by a short-lived mutex.
///
/// # Examples
///
/// ```
/// use mediaproc::blob::BlobStore;
/// use bytes::Bytes;
///
/// let store = BlobStore::new();
/// let scope = store.scope();
/// let handle = store.create(scope, Bytes::from_static(b"jpeg bytes"));
///
/// assert!(store.bytes(handle).is_some());
/// assert!(store.revoke(handle));
/// assert!(store.bytes(handle).is_none());
///
/// // Double revoke is detected and ignored, never a crash
/// assert!(!store.revoke(handle));
/// ```
#[derive(Clone, Default)]
pub struct BlobStore {
    table: Arc<Mutex<Table>>,
}

impl BlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // The table is never left inconsistent mid-mutation, so a poisoned
        // lock is still safe to reuse
        self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Allocate a revocation scope for a new owner
    pub fn scope(&self) -> ScopeId {
        let mut table = self.lock();
        table.next_scope += 1;
        ScopeId(table.next_scope)
    }

    /// Register `bytes` under `scope` and return its tracking handle
    pub fn create(&self, scope: ScopeId, bytes: Bytes) -> BlobHandle {
        let mut table = self.lock();
        table.next_handle += 1;
        table.created_total += 1;
        let handle = BlobHandle(table.next_handle);
        debug!(%handle, %scope, size = bytes.len(), "registered blob");
        table.entries.insert(handle, Entry { bytes, scope });
        handle
    }

    /// Retrieve the payload for `handle`, or `None` once revoked
    pub fn bytes(&self, handle: BlobHandle) -> Option<Bytes> {
        self.lock().entries.get(&handle).map(|entry| entry.bytes.clone())
    }

    /// Release `handle`, returning `true` if it was live
    ///
    /// Idempotent per handle: revoking an already-revoked handle is a logic
    /// error in the caller; it is logged and ignored, returning `false`.
    pub fn revoke(&self, handle: BlobHandle) -> bool {
        let mut table = self.lock();
        if table.entries.remove(&handle).is_some() {
            table.revoked_total += 1;
            debug!(%handle, "revoked blob");
            true
        } else {
            if table.was_issued(handle) {
                warn!(%handle, "double revoke ignored");
            } else {
                warn!(%handle, "revoke of unknown handle ignored");
            }
            false
        }
    }

    /// Release every handle belonging to `scope`, returning how many were live
    pub fn revoke_all(&self, scope: ScopeId) -> usize {
        let mut table = self.lock();
        let handles: Vec<BlobHandle> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.scope == scope)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in &handles {
            table.entries.remove(handle);
            table.revoked_total += 1;
        }
        if !handles.is_empty() {
            debug!(%scope, count = handles.len(), "revoked scope");
        }
        handles.len()
    }

    /// Current lifecycle counters
    pub fn stats(&self) -> BlobStats {
        let table = self.lock();
        BlobStats {
            active_handles: table.entries.len(),
            active_bytes: table.entries.values().map(|e| e.bytes.len() as u64).sum(),
            created_total: table.created_total,
            revoked_total: table.revoked_total,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[test]
    fn create_then_bytes_returns_payload() {
        let store = BlobStore::new();
        let scope = store.scope();
        let handle = store.create(scope, payload("hello"));

        assert_eq!(store.bytes(handle).unwrap().as_ref(), b"hello");
    }

    #[test]
    fn revoke_removes_payload_exactly_once() {
        let store = BlobStore::new();
        let scope = store.scope();
        let handle = store.create(scope, payload("data"));

        assert!(store.revoke(handle));
        assert!(store.bytes(handle).is_none());

        // Second revoke is ignored and does not inflate the counter
        assert!(!store.revoke(handle));
        let stats = store.stats();
        assert_eq!(stats.created_total, 1);
        assert_eq!(stats.revoked_total, 1);
    }

    #[test]
    fn revoke_all_releases_only_the_given_scope() {
        let store = BlobStore::new();
        let batch_scope = store.scope();
        let run_scope = store.scope();

        let a = store.create(batch_scope, payload("a"));
        let b = store.create(batch_scope, payload("b"));
        let c = store.create(run_scope, payload("c"));

        assert_eq!(store.revoke_all(batch_scope), 2);
        assert!(store.bytes(a).is_none());
        assert!(store.bytes(b).is_none());
        assert!(store.bytes(c).is_some());

        // Revoking the scope again finds nothing
        assert_eq!(store.revoke_all(batch_scope), 0);

        // A handle swept by the scope counts as already revoked, not unknown
        assert!(!store.revoke(a));
        let stats = store.stats();
        assert_eq!(stats.created_total, 3);
        assert_eq!(stats.revoked_total, 2);
    }

    #[test]
    fn never_issued_handle_is_ignored() {
        let store = BlobStore::new();
        let scope = store.scope();
        store.create(scope, payload("only"));

        // An id past the allocator's high-water mark was never issued
        assert!(!store.revoke(BlobHandle(999)));
        let stats = store.stats();
        assert_eq!(stats.created_total, 1);
        assert_eq!(stats.revoked_total, 0);
    }

    #[test]
    fn stats_track_active_and_lifetime_counts() {
        let store = BlobStore::new();
        let scope = store.scope();
        let h1 = store.create(scope, payload("1234"));
        let _h2 = store.create(scope, payload("56"));

        let stats = store.stats();
        assert_eq!(stats.active_handles, 2);
        assert_eq!(stats.active_bytes, 6);
        assert_eq!(stats.created_total, 2);
        assert_eq!(stats.revoked_total, 0);

        store.revoke(h1);
        let stats = store.stats();
        assert_eq!(stats.active_handles, 1);
        assert_eq!(stats.active_bytes, 2);
        assert_eq!(stats.revoked_total, 1);
    }

    #[test]
    fn clones_share_one_table() {
        let store = BlobStore::new();
        let clone = store.clone();
        let scope = store.scope();
        let handle = store.create(scope, payload("shared"));

        assert!(clone.bytes(handle).is_some());
        assert!(clone.revoke(handle));
        assert!(store.bytes(handle).is_none());
    }

    #[test]
    fn concurrent_creates_touch_disjoint_keys() {
        let store = BlobStore::new();
        let scope = store.scope();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.create(scope, payload(&i.to_string())))
            })
            .map(|t| t.join().unwrap())
            .collect();

        // Every thread got a distinct handle
        let unique: std::collections::HashSet<_> = handles.iter().copied().collect();
        assert_eq!(unique.len(), 32);
        assert_eq!(store.stats().created_total, 32);
        assert_eq!(store.revoke_all(scope), 32);
    }
}
