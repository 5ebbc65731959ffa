// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Key and value marshalling.
//
// Mappers convert between the caller's typed domain and the opaque byte
// representation the backing store accepts. The JSON implementations cover
// any serde type; bespoke wire formats plug in by implementing the traits.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::MappingError;

/// Converts typed keys to their wire representation.
///
/// Keys only travel one way: the backing store never hands keys back, so
/// there is no `from_wire` on this trait.
pub trait KeyMapper<K>: Send + Sync {
    fn to_wire(&self, key: &K) -> Result<Vec<u8>, MappingError>;
}

/// Converts typed values to and from their wire representation.
pub trait ValueMapper<V>: Send + Sync {
    fn to_wire(&self, value: &V) -> Result<Vec<u8>, MappingError>;
    fn from_wire(&self, bytes: &[u8]) -> Result<V, MappingError>;
}

/// JSON key mapper over any `Serialize` key type.
pub struct JsonKeyMapper<K> {
    _marker: PhantomData<fn(K)>,
}

impl<K> JsonKeyMapper<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for JsonKeyMapper<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Serialize> KeyMapper<K> for JsonKeyMapper<K> {
    fn to_wire(&self, key: &K) -> Result<Vec<u8>, MappingError> {
        serde_json::to_vec(key).map_err(|err| MappingError::Key(err.to_string()))
    }
}

/// JSON value mapper over any serde round-trippable value type.
pub struct JsonValueMapper<V> {
    _marker: PhantomData<fn(V)>,
}

impl<V> JsonValueMapper<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for JsonValueMapper<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize + DeserializeOwned> ValueMapper<V> for JsonValueMapper<V> {
    fn to_wire(&self, value: &V) -> Result<Vec<u8>, MappingError> {
        serde_json::to_vec(value).map_err(|err| MappingError::Value(err.to_string()))
    }

    fn from_wire(&self, bytes: &[u8]) -> Result<V, MappingError> {
        serde_json::from_slice(bytes).map_err(|err| MappingError::Unmap(err.to_string()))
    }
}
