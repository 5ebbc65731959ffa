// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Adapter factory and builder.
//
// The factory resolves mappers from the registry (fail fast when a type
// was never registered) and yields a builder that layers per-adapter
// overrides -- retry policy, in-memory format hint, test-data generators --
// onto the one generic adapter, so variants never multiply into
// subclasses.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use mycel_pool::{ClientPool, Connect};

use crate::adapter::{KvMapStore, StorageFormat, TestKeyFn, TestValueFn};
use crate::error::FactoryError;
use crate::mapper::{KeyMapper, ValueMapper};
use crate::registry::MapperRegistry;
use crate::retry::RetryPolicy;

/// Builds configured map store adapters for arbitrary key and value types.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mycel_mapstore::{JsonKeyMapper, JsonValueMapper, MapperRegistry, MapStore, MapStoreFactory};
/// use mycel_pool::{ClientPool, MemoryConnector, PoolConfig};
///
/// # tokio_test::block_on(async {
/// let registry = Arc::new(MapperRegistry::new());
/// registry.register_key_mapper::<String>(Arc::new(JsonKeyMapper::new()));
/// registry.register_value_mapper::<u64>(Arc::new(JsonValueMapper::new()));
///
/// let pool = Arc::new(ClientPool::new(MemoryConnector::new(), PoolConfig::default()));
/// let factory = MapStoreFactory::new(pool, registry);
///
/// let counters = factory.builder::<String, u64>("counters").unwrap().build();
/// counters.store(&"visits".to_string(), &1).await;
/// assert_eq!(counters.load(&"visits".to_string()).await, Some(1));
/// # });
/// ```
pub struct MapStoreFactory<C: Connect> {
    pool: Arc<ClientPool<C>>,
    registry: Arc<MapperRegistry>,
}

impl<C: Connect> MapStoreFactory<C> {
    pub fn new(pool: Arc<ClientPool<C>>, registry: Arc<MapperRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Start building an adapter for `(K, V)` targeting `space`.
    ///
    /// Resolves both mappers immediately; an unregistered type is a
    /// configuration error and fails here, before any adapter exists.
    pub fn builder<K, V>(&self, space: &str) -> Result<MapStoreBuilder<K, V, C>, FactoryError>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let key_mapper = self.registry.key_mapper::<K>()?;
        let value_mapper = self.registry.value_mapper::<V>()?;

        Ok(MapStoreBuilder {
            pool: self.pool.clone(),
            space: space.to_string(),
            key_mapper,
            value_mapper,
            retry: RetryPolicy::default(),
            format: StorageFormat::Binary,
            test_keys: None,
            test_values: None,
        })
    }
}

/// Per-adapter configuration layered on the generic base adapter.
pub struct MapStoreBuilder<K, V, C: Connect> {
    pool: Arc<ClientPool<C>>,
    space: String,
    key_mapper: Arc<dyn KeyMapper<K>>,
    value_mapper: Arc<dyn ValueMapper<V>>,
    retry: RetryPolicy,
    format: StorageFormat,
    test_keys: Option<TestKeyFn<K>>,
    test_values: Option<TestValueFn<V>>,
}

// Manual impl: mappers and generators are erased trait objects.
impl<K, V, C: Connect> fmt::Debug for MapStoreBuilder<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStoreBuilder")
            .field("space", &self.space)
            .field("retry", &self.retry)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<K, V, C> MapStoreBuilder<K, V, C>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Send + Sync,
    C: Connect,
{
    /// Override the retry policy for this adapter.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Hint that the owning map should keep entries as live objects.
    pub fn object_format(mut self) -> Self {
        self.format = StorageFormat::Object;
        self
    }

    /// Supply test-data generators, enabling the adapter's
    /// [`crate::TestDataSupport`] capability.
    pub fn test_data(
        mut self,
        keys: impl Fn() -> K + Send + Sync + 'static,
        values: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        self.test_keys = Some(Arc::new(keys));
        self.test_values = Some(Arc::new(values));
        self
    }

    /// Assemble the adapter.
    pub fn build(self) -> KvMapStore<K, V, C> {
        KvMapStore::from_parts(
            self.pool,
            self.space,
            self.key_mapper,
            self.value_mapper,
            self.retry,
            self.format,
            self.test_keys,
            self.test_values,
        )
    }
}
