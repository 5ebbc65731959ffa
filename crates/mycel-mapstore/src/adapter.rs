// SPDX-License-Identifier: PMPL-1.0-or-later
//
// The generic read/write-through adapter.
//
// `KvMapStore` bridges one typed map to one namespace of the backing
// store: it serializes keys and values through its mappers and runs every
// remote call through the pool inside a bounded retry loop. It is
// stateless aside from its pool, mapper, and namespace references, so one
// instance serves any number of concurrent callers.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use mycel_pool::{ClientPool, Connect, KvClient};

use crate::error::Unsupported;
use crate::mapper::{KeyMapper, ValueMapper};
use crate::retry::RetryPolicy;
use crate::store::{LoadOutcome, MapStore, TestDataSupport};

/// Hint for how the owning in-memory map should hold entries loaded
/// through this adapter. Purely advisory; the adapter itself always moves
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageFormat {
    /// Keep entries in their serialized form (the default).
    Binary,
    /// Keep entries as live objects.
    Object,
}

pub type TestKeyFn<K> = Arc<dyn Fn() -> K + Send + Sync>;
pub type TestValueFn<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// One backing-store operation, named for log context.
enum KvOp<'a> {
    Get(&'a [u8]),
    Put(&'a [u8], &'a [u8]),
    Delete(&'a [u8]),
}

impl KvOp<'_> {
    fn name(&self) -> &'static str {
        match self {
            KvOp::Get(_) => "get",
            KvOp::Put(..) => "put",
            KvOp::Delete(_) => "delete",
        }
    }
}

enum KvReply {
    Value(Option<Vec<u8>>),
    Stored,
    Deleted(bool),
}

/// The generic map store adapter over a pooled key-value client.
pub struct KvMapStore<K, V, C: Connect> {
    pool: Arc<ClientPool<C>>,
    space: String,
    key_mapper: Arc<dyn KeyMapper<K>>,
    value_mapper: Arc<dyn ValueMapper<V>>,
    retry: RetryPolicy,
    format: StorageFormat,
    test_keys: Option<TestKeyFn<K>>,
    test_values: Option<TestValueFn<V>>,
}

impl<K, V, C: Connect> KvMapStore<K, V, C> {
    /// Build an adapter with default retry policy and storage format. The
    /// factory layers overrides on top of this via its builder.
    pub fn new(
        pool: Arc<ClientPool<C>>,
        space: &str,
        key_mapper: Arc<dyn KeyMapper<K>>,
        value_mapper: Arc<dyn ValueMapper<V>>,
    ) -> Self {
        Self {
            pool,
            space: space.to_string(),
            key_mapper,
            value_mapper,
            retry: RetryPolicy::default(),
            format: StorageFormat::Binary,
            test_keys: None,
            test_values: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        pool: Arc<ClientPool<C>>,
        space: String,
        key_mapper: Arc<dyn KeyMapper<K>>,
        value_mapper: Arc<dyn ValueMapper<V>>,
        retry: RetryPolicy,
        format: StorageFormat,
        test_keys: Option<TestKeyFn<K>>,
        test_values: Option<TestValueFn<V>>,
    ) -> Self {
        Self {
            pool,
            space,
            key_mapper,
            value_mapper,
            retry,
            format,
            test_keys,
            test_values,
        }
    }

    pub fn key_mapper(&self) -> &Arc<dyn KeyMapper<K>> {
        &self.key_mapper
    }

    pub fn value_mapper(&self) -> &Arc<dyn ValueMapper<V>> {
        &self.value_mapper
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    /// Run one operation through the pool inside the bounded retry loop.
    ///
    /// Transient client failures release the handle and retry after the
    /// configured backoff; other client failures discard the handle (it is
    /// presumed broken) and retry on a fresh one. Pool exhaustion is fatal
    /// to the calling operation. Exhausting the attempt budget returns
    /// `None`, which the operations above translate into their documented
    /// default results.
    async fn run_with_retry(&self, op: KvOp<'_>) -> Option<KvReply> {
        let mut attempt = 0usize;
        while attempt < self.retry.max_attempts {
            attempt += 1;

            let lease = match self.pool.acquire().await {
                Ok(lease) => lease,
                Err(err) => {
                    error!(
                        space = %self.space,
                        op = op.name(),
                        error = %err,
                        "could not obtain a pooled connection"
                    );
                    return None;
                }
            };

            let result = {
                let client = lease.client();
                match &op {
                    KvOp::Get(key) => client.get(&self.space, key).await.map(KvReply::Value),
                    KvOp::Put(key, value) => client
                        .put(&self.space, key, value)
                        .await
                        .map(|()| KvReply::Stored),
                    KvOp::Delete(key) => {
                        client.delete(&self.space, key).await.map(KvReply::Deleted)
                    }
                }
            };

            match result {
                Ok(reply) => {
                    self.pool.release(lease).await;
                    return Some(reply);
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        space = %self.space,
                        op = op.name(),
                        attempt,
                        error = %err,
                        "transient backing store failure, retrying"
                    );
                    self.pool.release(lease).await;
                }
                Err(err) => {
                    warn!(
                        space = %self.space,
                        op = op.name(),
                        attempt,
                        error = %err,
                        "backing store client failed, discarding its connection"
                    );
                    self.pool.discard(lease).await;
                }
            }

            if let Some(delay) = self.retry.backoff.delay(attempt) {
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            space = %self.space,
            op = op.name(),
            attempts = self.retry.max_attempts,
            "retry budget exhausted, returning default result"
        );
        None
    }
}

#[async_trait]
impl<K, V, C> MapStore<K, V> for KvMapStore<K, V, C>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Send + Sync,
    C: Connect,
{
    async fn load_outcome(&self, key: &K) -> LoadOutcome<V> {
        let wire_key = match self.key_mapper.to_wire(key) {
            Ok(wire_key) => wire_key,
            Err(err) => {
                error!(space = %self.space, error = %err, "unable to map key for load");
                return LoadOutcome::Failed;
            }
        };

        match self.run_with_retry(KvOp::Get(&wire_key)).await {
            Some(KvReply::Value(Some(bytes))) => match self.value_mapper.from_wire(&bytes) {
                Ok(value) => LoadOutcome::Found(value),
                Err(err) => {
                    error!(space = %self.space, error = %err, "unable to unmap loaded value");
                    LoadOutcome::Failed
                }
            },
            Some(KvReply::Value(None)) => LoadOutcome::Absent,
            Some(_) => LoadOutcome::Failed, // unreachable reply shape
            None => LoadOutcome::Failed,
        }
    }

    async fn load_all(&self, keys: &[K]) -> HashMap<K, V> {
        // One outstanding request per key; collection blocks once, giving
        // request-level pipelining without extra tasks.
        let lookups = keys.iter().map(|key| async move {
            let outcome = self.load_outcome(key).await;
            (key, outcome)
        });

        let mut values = HashMap::with_capacity(keys.len());
        for (key, outcome) in future::join_all(lookups).await {
            if let LoadOutcome::Found(value) = outcome {
                values.insert(key.clone(), value);
            }
        }
        values
    }

    async fn store(&self, key: &K, value: &V) {
        let wire_key = match self.key_mapper.to_wire(key) {
            Ok(wire_key) => wire_key,
            Err(err) => {
                error!(space = %self.space, error = %err, "unable to map key for store, entry skipped");
                return;
            }
        };
        let wire_value = match self.value_mapper.to_wire(value) {
            Ok(wire_value) => wire_value,
            Err(err) => {
                error!(space = %self.space, error = %err, "unable to map value for store, entry skipped");
                return;
            }
        };

        self.run_with_retry(KvOp::Put(&wire_key, &wire_value)).await;
    }

    async fn delete(&self, key: &K) {
        let wire_key = match self.key_mapper.to_wire(key) {
            Ok(wire_key) => wire_key,
            Err(err) => {
                error!(space = %self.space, error = %err, "unable to map key for delete");
                return;
            }
        };

        if let Some(KvReply::Deleted(existed)) = self.run_with_retry(KvOp::Delete(&wire_key)).await
        {
            debug!(space = %self.space, existed, "delete completed");
        }
    }

    fn space(&self) -> &str {
        &self.space
    }
}

impl<K, V, C: Connect> TestDataSupport<K, V> for KvMapStore<K, V, C> {
    fn generate_test_key(&self) -> Result<K, Unsupported> {
        match &self.test_keys {
            Some(generate) => Ok(generate()),
            None => Err(Unsupported("no test key generator configured")),
        }
    }

    fn generate_test_value(&self) -> Result<V, Unsupported> {
        match &self.test_values {
            Some(generate) => Ok(generate()),
            None => Err(Unsupported("no test value generator configured")),
        }
    }
}
