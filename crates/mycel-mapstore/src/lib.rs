// SPDX-License-Identifier: PMPL-1.0-or-later
//
// mycel map store crate
//
// Generic read/write-through adapters that let an in-memory distributed
// map transparently persist entries to the remote backing store through
// the `mycel-pool` client pool. A pluggable marshalling layer converts
// typed keys and values to the wire representation, and a factory/registry
// assembles configured adapters for arbitrary key and value types.
//
// Mapping and transient failures degrade to absent/skip at this boundary
// (they are logged, never thrown), so a loaded `None` is ambiguous between
// a true miss and an exhausted retry budget. Callers that need to tell the
// two apart use `load_outcome`.
//
// # Modules
//
// - [`mapper`] -- `KeyMapper`/`ValueMapper` traits and JSON implementations.
// - [`retry`] -- Bounded retry policy with explicit backoff.
// - [`store`] -- The `MapStore` contract, `LoadOutcome`, test-data capability.
// - [`adapter`] -- `KvMapStore`, the generic adapter over the pool.
// - [`registry`] -- Type-keyed mapper registry.
// - [`factory`] -- `MapStoreFactory` and the per-adapter builder.
// - [`error`] -- `MappingError`, `FactoryError`, `Unsupported`.

pub mod adapter;
pub mod error;
pub mod factory;
pub mod mapper;
pub mod registry;
pub mod retry;
pub mod store;

pub use adapter::{KvMapStore, StorageFormat};
pub use error::{FactoryError, MappingError, Unsupported};
pub use factory::{MapStoreBuilder, MapStoreFactory};
pub use mapper::{JsonKeyMapper, JsonValueMapper, KeyMapper, ValueMapper};
pub use registry::MapperRegistry;
pub use retry::{Backoff, RetryPolicy};
pub use store::{LoadOutcome, MapStore, TestDataSupport};
