// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Mapper registry.
//
// A process-wide mapping from key/value type to the mapper instance that
// handles it, keyed by `TypeId` so lookups stay compile-time checked at
// the call site (`registry.key_mapper::<UserId>()`). Registration happens
// once at startup, before any adapter is built; a missing mapper is a
// configuration error that fails loudly.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::error::FactoryError;
use crate::mapper::{KeyMapper, ValueMapper};

/// Registry of key and value mappers, at most one per type.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mycel_mapstore::{JsonKeyMapper, JsonValueMapper, MapperRegistry};
///
/// let registry = MapperRegistry::new();
/// registry.register_key_mapper::<String>(Arc::new(JsonKeyMapper::new()));
/// registry.register_value_mapper::<u64>(Arc::new(JsonValueMapper::new()));
///
/// assert!(registry.key_mapper::<String>().is_ok());
/// assert!(registry.key_mapper::<u32>().is_err());
/// ```
pub struct MapperRegistry {
    key_mappers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    value_mappers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self {
            key_mappers: RwLock::new(HashMap::new()),
            value_mappers: RwLock::new(HashMap::new()),
        }
    }

    /// Register the key mapper for `K`. Replacing an existing registration
    /// is allowed but logged, since it usually means two subsystems fight
    /// over the same type.
    pub fn register_key_mapper<K: 'static>(&self, mapper: Arc<dyn KeyMapper<K>>) {
        let previous = self
            .key_mappers
            .write()
            .unwrap()
            .insert(TypeId::of::<K>(), Box::new(mapper));
        if previous.is_some() {
            warn!(key_type = type_name::<K>(), "replacing registered key mapper");
        }
    }

    /// Register the value mapper for `V`.
    pub fn register_value_mapper<V: 'static>(&self, mapper: Arc<dyn ValueMapper<V>>) {
        let previous = self
            .value_mappers
            .write()
            .unwrap()
            .insert(TypeId::of::<V>(), Box::new(mapper));
        if previous.is_some() {
            warn!(
                value_type = type_name::<V>(),
                "replacing registered value mapper"
            );
        }
    }

    /// Resolve the key mapper for `K`, failing loudly when unregistered.
    pub fn key_mapper<K: 'static>(&self) -> Result<Arc<dyn KeyMapper<K>>, FactoryError> {
        self.key_mappers
            .read()
            .unwrap()
            .get(&TypeId::of::<K>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<dyn KeyMapper<K>>>())
            .cloned()
            .ok_or(FactoryError::KeyMapperNotRegistered {
                type_name: type_name::<K>(),
            })
    }

    /// Resolve the value mapper for `V`, failing loudly when unregistered.
    pub fn value_mapper<V: 'static>(&self) -> Result<Arc<dyn ValueMapper<V>>, FactoryError> {
        self.value_mappers
            .read()
            .unwrap()
            .get(&TypeId::of::<V>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<dyn ValueMapper<V>>>())
            .cloned()
            .ok_or(FactoryError::ValueMapperNotRegistered {
                type_name: type_name::<V>(),
            })
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}
