// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Map store error types.
//
// Mapping failures are swallowed at the adapter boundary (logged, operation
// degrades to absent/skip); factory failures are configuration errors and
// surface immediately.

use thiserror::Error;

/// A key or value could not cross the wire-representation boundary.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The key could not be serialized to its wire form.
    #[error("unable to map key: {0}")]
    Key(String),

    /// The value could not be serialized to its wire form.
    #[error("unable to map value: {0}")]
    Value(String),

    /// Bytes returned by the backing store could not be deserialized.
    #[error("unable to unmap value: {0}")]
    Unmap(String),
}

/// Adapter construction failed. Always a configuration error, never
/// transient; callers must not retry.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No key mapper is registered for the requested key type.
    #[error("no key mapper registered for type {type_name}")]
    KeyMapperNotRegistered { type_name: &'static str },

    /// No value mapper is registered for the requested value type.
    #[error("no value mapper registered for type {type_name}")]
    ValueMapperNotRegistered { type_name: &'static str },
}

/// Returned by capability methods an adapter does not support.
#[derive(Debug, Error)]
#[error("unsupported map store operation: {0}")]
pub struct Unsupported(pub &'static str);
