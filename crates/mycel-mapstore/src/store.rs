// SPDX-License-Identifier: PMPL-1.0-or-later
//
// The map store contract.
//
// Every adapter variant the factory can produce satisfies this trait, so
// callers and decorators never depend on a concrete adapter type. The
// operations deliberately do not return errors: mapping and transient
// backing-store failures are logged at the adapter boundary and degrade to
// absent/skip, so that a bulk load over many keys returns whatever
// succeeded.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::Unsupported;

/// The three-state result of a single-key lookup.
///
/// `Failed` covers mapping failures and retry exhaustion; `Absent` is a
/// genuine miss. Callers that can tolerate the richer contract should
/// prefer [`MapStore::load_outcome`] over the collapsed [`MapStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<V> {
    Found(V),
    Absent,
    Failed,
}

impl<V> LoadOutcome<V> {
    /// Collapse to the legacy two-state view, conflating `Absent` and
    /// `Failed`.
    pub fn into_option(self) -> Option<V> {
        match self {
            LoadOutcome::Found(value) => Some(value),
            LoadOutcome::Absent | LoadOutcome::Failed => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LoadOutcome::Found(_))
    }
}

/// A read/write-through bridge between typed map entries and the backing
/// store.
///
/// Implementations are safe for concurrent use from many tasks sharing one
/// client pool. There is no cancellation primitive: once an operation's
/// retry loop starts it runs to completion or exhaustion, so callers
/// needing timeouts must wrap the whole call externally.
#[async_trait]
pub trait MapStore<K, V>: Send + Sync
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Send + Sync,
{
    /// Look up one key with the full three-state result.
    async fn load_outcome(&self, key: &K) -> LoadOutcome<V>;

    /// Look up one key, collapsed to the legacy two-state view.
    ///
    /// A `None` here is ambiguous between "no record" and "failed after
    /// retries"; that ambiguity is part of the contract at this boundary.
    async fn load(&self, key: &K) -> Option<V> {
        self.load_outcome(key).await.into_option()
    }

    /// Look up many keys, returning exactly the successfully resolved
    /// entries. Keys that fail to map or to load are logged and skipped;
    /// the batch as a whole never fails.
    async fn load_all(&self, keys: &[K]) -> HashMap<K, V>;

    /// Persist one entry. A mapping failure is logged and the entry is
    /// simply not persisted; callers must not assume an error surfaces.
    async fn store(&self, key: &K, value: &V);

    /// Persist many entries, one at a time. No cross-entry atomicity.
    async fn store_all(&self, entries: &HashMap<K, V>) {
        for (key, value) in entries {
            self.store(key, value).await;
        }
    }

    /// Remove one entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &K);

    /// Remove many entries, one at a time.
    async fn delete_all(&self, keys: &[K]) {
        for key in keys {
            self.delete(key).await;
        }
    }

    /// The namespace (remote collection name) this store targets. Fixed at
    /// construction.
    fn space(&self) -> &str;
}

/// Optional capability for producing representative test entries.
///
/// Adapters that were not configured with generators return
/// [`Unsupported`] rather than panicking; harnesses probe for support at
/// runtime.
pub trait TestDataSupport<K, V> {
    fn generate_test_key(&self) -> Result<K, Unsupported>;
    fn generate_test_value(&self) -> Result<V, Unsupported>;
}
