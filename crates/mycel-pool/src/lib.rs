// SPDX-License-Identifier: PMPL-1.0-or-later
//
// mycel connection pooling crate
//
// Manages a bounded, resizable set of live connections to the remote
// key-value service that backs the in-memory distributed maps. Callers
// check handles out with `acquire()`, run their operation while holding the
// handle exclusively, and return it with `release()` (or `discard()` when
// the handle is broken). Pool bookkeeping is mutex-guarded; the network
// calls themselves always happen outside any pool lock.
//
// # Modules
//
// - [`client`] -- The `KvClient` and `Connect` traits plus `ClientError`.
// - [`config`] -- `PoolConfig` (candidate endpoints, port, capacity, wait).
// - [`pool`] -- `ClientPool`, `ClientLease`, and `PoolError`.
// - [`memory`] -- An in-process key-value service with fault injection,
//   for testing and ephemeral workloads.
//
// # Example
//
// ```rust
// use mycel_pool::{ClientPool, KvClient, MemoryConnector, PoolConfig};
//
// # tokio_test::block_on(async {
// let pool = ClientPool::new(MemoryConnector::new(), PoolConfig::default());
//
// let lease = pool.acquire().await.unwrap();
// lease.client().put("users", b"u1", b"{}").await.unwrap();
// pool.release(lease).await;
// # });
// ```

pub mod client;
pub mod config;
pub mod memory;
pub mod pool;

pub use client::{ClientError, Connect, KvClient};
pub use config::PoolConfig;
pub use memory::{MemoryConnector, MemoryKvClient};
pub use pool::{ClientLease, ClientPool, PoolError};
