// SPDX-License-Identifier: PMPL-1.0-or-later
//
// The resizable client pool.
//
// Idle handles live in a FIFO queue; leased handles are tracked by id only,
// since the handle itself travels with the caller inside a `ClientLease`.
// All bookkeeping happens under one async mutex, but connection
// establishment and the remote calls themselves run outside the lock.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::client::{ClientError, Connect};
use crate::config::PoolConfig;

/// Errors surfaced by [`ClientPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// No handle became available within the configured wait and the pool
    /// was not allowed to grow. Fatal to the calling operation; the map
    /// store layer does not retry past this.
    #[error("pool exhausted: no connection available within {waited_ms} ms ({leased} leased, capacity {capacity})")]
    Exhausted {
        waited_ms: u64,
        leased: usize,
        capacity: usize,
    },

    /// Every candidate endpoint failed to connect.
    #[error("unable to reach any of {attempted} configured endpoint(s)")]
    Unreachable {
        attempted: usize,
        #[source]
        last: ClientError,
    },
}

/// A connection handle checked out of the pool.
///
/// The lease owns its client exclusively until it is handed back via
/// [`ClientPool::release`] or [`ClientPool::discard`]. Dropping a lease
/// without returning it leaks pool capacity permanently; a warning is
/// logged when that happens.
pub struct ClientLease<Cl> {
    id: u64,
    client: Option<Cl>,
}

impl<Cl> ClientLease<Cl> {
    fn new(id: u64, client: Cl) -> Self {
        Self {
            id,
            client: Some(client),
        }
    }

    /// Access the leased client.
    ///
    /// # Panics
    ///
    /// Never panics in practice: the client is only taken out when the lease
    /// is consumed by `release`/`discard`, after which the lease is gone.
    pub fn client(&self) -> &Cl {
        self.client
            .as_ref()
            .expect("lease accessed after being returned")
    }

    /// The pool-internal id of this handle, exposed for diagnostics.
    pub fn id(&self) -> u64 {
        self.id
    }
}

// Manual impl: the client type itself need not be `Debug`.
impl<Cl> fmt::Debug for ClientLease<Cl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientLease")
            .field("id", &self.id)
            .field("returned", &self.client.is_none())
            .finish()
    }
}

impl<Cl> Drop for ClientLease<Cl> {
    fn drop(&mut self) {
        if self.client.is_some() {
            warn!(
                handle = self.id,
                "connection lease dropped without release; pool capacity leaked"
            );
        }
    }
}

struct PooledConn<Cl> {
    id: u64,
    client: Cl,
}

struct PoolState<Cl> {
    idle: VecDeque<PooledConn<Cl>>,
    leased: HashSet<u64>,
    /// Total live handles, idle + leased + slots reserved for in-flight
    /// connection establishment.
    total: usize,
    max: usize,
}

/// A bounded, resizable pool of connections to the remote key-value service.
///
/// `acquire` prefers an idle handle, grows the pool while under capacity,
/// and otherwise waits up to the configured timeout. `resize` may shrink
/// capacity at any time; shrinking destroys idle handles only and never
/// recalls a leased handle out from under its caller.
pub struct ClientPool<C: Connect> {
    connector: C,
    config: PoolConfig,
    state: Mutex<PoolState<C::Client>>,
    available: Notify,
    next_id: AtomicU64,
}

enum AcquirePlan<Cl> {
    Lease(PooledConn<Cl>),
    Grow,
    Wait,
}

impl<C: Connect> ClientPool<C> {
    /// Create a pool. Handles are established lazily on first demand.
    pub fn new(connector: C, config: PoolConfig) -> Self {
        let max = config.max_connections;
        Self {
            connector,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                leased: HashSet::new(),
                total: 0,
                max,
            }),
            available: Notify::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Check a connection handle out of the pool.
    ///
    /// Blocks until a handle is idle or capacity frees up, failing with
    /// [`PoolError::Exhausted`] once the configured wait elapses. When the
    /// pool grows, each candidate endpoint is tried in order and the first
    /// one that responds is used.
    pub async fn acquire(&self) -> Result<ClientLease<C::Client>, PoolError> {
        let started = Instant::now();
        let timeout = self.config.acquire_timeout();

        loop {
            let mut notified = std::pin::pin!(self.available.notified());
            let plan = {
                let mut state = self.state.lock().await;
                if let Some(conn) = state.idle.pop_front() {
                    state.leased.insert(conn.id);
                    AcquirePlan::Lease(conn)
                } else if state.total < state.max {
                    // Reserve the slot now; connect without holding the lock.
                    state.total += 1;
                    AcquirePlan::Grow
                } else {
                    // Register for a wakeup before the lock drops so a
                    // release or resize in the gap cannot be missed.
                    notified.as_mut().enable();
                    AcquirePlan::Wait
                }
            };

            match plan {
                AcquirePlan::Lease(conn) => {
                    return Ok(ClientLease::new(conn.id, conn.client));
                }
                AcquirePlan::Grow => match self.connect_any().await {
                    Ok(client) => {
                        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                        let mut state = self.state.lock().await;
                        state.leased.insert(id);
                        debug!(handle = id, "established new pooled connection");
                        return Ok(ClientLease::new(id, client));
                    }
                    Err(err) => {
                        let mut state = self.state.lock().await;
                        state.total -= 1;
                        drop(state);
                        self.available.notify_one();
                        return Err(err);
                    }
                },
                AcquirePlan::Wait => {
                    let waited = started.elapsed();
                    let Some(remaining) = timeout.checked_sub(waited) else {
                        return self.exhausted(waited.as_millis() as u64).await;
                    };
                    if tokio::time::timeout(remaining, notified).await.is_err() {
                        return self.exhausted(started.elapsed().as_millis() as u64).await;
                    }
                }
            }
        }
    }

    async fn exhausted(&self, waited_ms: u64) -> Result<ClientLease<C::Client>, PoolError> {
        let state = self.state.lock().await;
        Err(PoolError::Exhausted {
            waited_ms,
            leased: state.leased.len(),
            capacity: state.max,
        })
    }

    /// Return a handle to the idle set.
    ///
    /// Releasing a handle the pool does not consider leased (for example a
    /// lease from a different pool) is a logged anomaly, never fatal. When
    /// the pool shrank while the handle was out, the handle is destroyed
    /// instead of idled.
    pub async fn release(&self, mut lease: ClientLease<C::Client>) {
        let Some(client) = lease.client.take() else {
            return;
        };

        let mut state = self.state.lock().await;
        if !state.leased.remove(&lease.id) {
            warn!(
                handle = lease.id,
                "release of a connection this pool does not consider leased; dropping it"
            );
            return;
        }

        if state.total > state.max {
            // Capacity was reduced while this handle was leased.
            state.total -= 1;
            debug!(handle = lease.id, "destroying handle returned past reduced capacity");
            let grew_free_slot = state.total < state.max;
            drop(state);
            if grew_free_slot {
                self.available.notify_one();
            }
        } else {
            state.idle.push_back(PooledConn {
                id: lease.id,
                client,
            });
            drop(state);
            self.available.notify_one();
        }
    }

    /// Drop a broken handle instead of returning it, freeing its capacity
    /// slot so a replacement can be established.
    pub async fn discard(&self, mut lease: ClientLease<C::Client>) {
        let Some(client) = lease.client.take() else {
            return;
        };
        drop(client);

        let mut state = self.state.lock().await;
        if !state.leased.remove(&lease.id) {
            warn!(
                handle = lease.id,
                "discard of a connection this pool does not consider leased"
            );
            return;
        }
        state.total -= 1;
        drop(state);
        self.available.notify_one();
    }

    /// Adjust the pool's maximum capacity.
    ///
    /// Shrinking destroys idle handles immediately; leased handles are never
    /// recalled and are destroyed as they come back, until the live count
    /// fits the new maximum. Growing wakes a waiter so it can establish a
    /// connection into the fresh headroom.
    pub async fn resize(&self, new_max: usize) {
        let mut state = self.state.lock().await;
        let old_max = state.max;
        state.max = new_max;

        while state.total > state.max {
            match state.idle.pop_front() {
                Some(conn) => {
                    state.total -= 1;
                    debug!(handle = conn.id, "destroying idle handle during shrink");
                    drop(conn);
                }
                None => break, // only leased handles remain; destroyed on release
            }
        }

        let grew = new_max > old_max && state.total < state.max;
        drop(state);
        if grew {
            // Headroom may cover several parked waiters; wake them all and
            // let each re-check state, growing or re-parking as needed.
            self.available.notify_waiters();
        }
    }

    /// Number of handles currently checked out.
    pub async fn leased(&self) -> usize {
        self.state.lock().await.leased.len()
    }

    /// Number of idle handles ready for acquisition.
    pub async fn idle(&self) -> usize {
        self.state.lock().await.idle.len()
    }

    /// Current maximum capacity.
    pub async fn capacity(&self) -> usize {
        self.state.lock().await.max
    }

    /// Walk the candidate endpoints in order, taking the first that
    /// connects. Endpoints that fail are logged and skipped.
    async fn connect_any(&self) -> Result<C::Client, PoolError> {
        let mut last: Option<ClientError> = None;
        for endpoint in &self.config.endpoints {
            match self.connector.connect(endpoint, self.config.port).await {
                Ok(client) => {
                    debug!(endpoint = %endpoint, "connected to backing store endpoint");
                    return Ok(client);
                }
                Err(err) => {
                    warn!(endpoint = %endpoint, error = %err, "endpoint did not respond, trying next");
                    last = Some(err);
                }
            }
        }
        Err(PoolError::Unreachable {
            attempted: self.config.endpoints.len(),
            last: last.unwrap_or_else(|| {
                ClientError::Unavailable("no endpoints configured".to_string())
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::KvClient;
    use crate::memory::{MemoryConnector, MemoryKvClient};

    fn config(max: usize, timeout_ms: u64) -> PoolConfig {
        PoolConfig {
            endpoints: vec!["primary".to_string()],
            port: 1982,
            max_connections: max,
            acquire_timeout_ms: timeout_ms,
        }
    }

    #[tokio::test]
    async fn acquire_reuses_released_handle() {
        let pool = ClientPool::new(MemoryConnector::new(), config(4, 100));

        let lease = pool.acquire().await.unwrap();
        let first_id = lease.id();
        pool.release(lease).await;
        assert_eq!(pool.idle().await, 1);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(lease.id(), first_id);
        assert_eq!(pool.idle().await, 0);
        assert_eq!(pool.leased().await, 1);
        pool.release(lease).await;
    }

    #[tokio::test]
    async fn exhausted_after_bounded_wait() {
        let pool = ClientPool::new(MemoryConnector::new(), config(1, 20));

        let held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            PoolError::Exhausted {
                leased: 1,
                capacity: 1,
                ..
            }
        ));
        pool.release(held).await;
    }

    #[tokio::test]
    async fn waiter_wakes_on_release() {
        let pool = std::sync::Arc::new(ClientPool::new(MemoryConnector::new(), config(1, 500)));

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let lease = pool.acquire().await.unwrap();
                pool.release(lease).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        pool.release(held).await;
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn connects_via_first_responding_endpoint() {
        let client = MemoryKvClient::new();
        let connector = MemoryConnector::with_client(client)
            .refuse("dead-1")
            .refuse("dead-2");
        let pool = ClientPool::new(
            connector,
            PoolConfig {
                endpoints: vec![
                    "dead-1".to_string(),
                    "dead-2".to_string(),
                    "alive".to_string(),
                ],
                ..config(2, 100)
            },
        );

        let lease = pool.acquire().await.unwrap();
        assert_eq!(lease.client().name(), "memory");
        pool.release(lease).await;
    }

    #[tokio::test]
    async fn unreachable_when_all_endpoints_refuse() {
        let connector = MemoryConnector::new().refuse("primary");
        let pool = ClientPool::new(connector, config(2, 100));

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Unreachable { attempted: 1, .. }));
        // The reserved slot was returned; a later acquire may try again.
        assert_eq!(pool.leased().await, 0);
        assert_eq!(pool.idle().await, 0);
    }

    #[tokio::test]
    async fn release_from_foreign_pool_is_anomaly_not_corruption() {
        let shared = MemoryKvClient::new();
        let pool_a = ClientPool::new(MemoryConnector::with_client(shared.clone()), config(2, 100));
        let pool_b = ClientPool::new(MemoryConnector::with_client(shared), config(2, 100));

        let foreign = pool_a.acquire().await.unwrap();
        pool_b.release(foreign).await;

        assert_eq!(pool_b.idle().await, 0);
        assert_eq!(pool_b.leased().await, 0);
        // pool_a still believes the handle is leased; its capacity is leaked,
        // which is the documented consequence of misuse.
        assert_eq!(pool_a.leased().await, 1);
    }

    #[tokio::test]
    async fn shrink_destroys_idle_then_returning_handles() {
        let pool = ClientPool::new(MemoryConnector::new(), config(3, 100));

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        pool.release(c).await;
        assert_eq!(pool.idle().await, 1);

        pool.resize(1).await;
        // The idle handle was destroyed immediately; leased ones survive.
        assert_eq!(pool.idle().await, 0);
        assert_eq!(pool.leased().await, 2);

        pool.release(a).await;
        // Still over capacity, so the returning handle is destroyed.
        assert_eq!(pool.idle().await, 0);

        pool.release(b).await;
        // Now within capacity, so this one idles.
        assert_eq!(pool.idle().await, 1);
    }

    #[tokio::test]
    async fn grow_admits_new_connections() {
        let pool = ClientPool::new(MemoryConnector::new(), config(1, 50));

        let held = pool.acquire().await.unwrap();
        assert!(pool.acquire().await.is_err());

        pool.resize(2).await;
        let second = pool.acquire().await.unwrap();
        pool.release(held).await;
        pool.release(second).await;
        assert_eq!(pool.idle().await, 2);
    }

    #[tokio::test]
    async fn grow_wakes_every_parked_waiter() {
        let pool = std::sync::Arc::new(ClientPool::new(MemoryConnector::new(), config(1, 500)));
        let held = pool.acquire().await.unwrap();

        // Two callers park on the full pool; the resize headroom must
        // reach both, not just the first.
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.acquire().await })
            })
            .collect();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        pool.resize(3).await;
        for waiter in waiters {
            let lease = waiter.await.unwrap().unwrap();
            pool.release(lease).await;
        }
        pool.release(held).await;
        assert_eq!(pool.leased().await, 0);
    }

    #[tokio::test]
    async fn dropped_lease_leaks_capacity() {
        let pool = ClientPool::new(MemoryConnector::new(), config(1, 20));

        let lease = pool.acquire().await.unwrap();
        drop(lease);

        // The pool still counts the handle as leased.
        assert!(matches!(
            pool.acquire().await,
            Err(PoolError::Exhausted { .. })
        ));
    }

    #[tokio::test]
    async fn lease_debug_omits_the_client() {
        let pool = ClientPool::new(MemoryConnector::new(), config(1, 50));
        let lease = pool.acquire().await.unwrap();

        let rendered = format!("{lease:?}");
        assert!(rendered.contains("ClientLease"));
        assert!(rendered.contains("returned: false"));
        pool.release(lease).await;
    }

    #[tokio::test]
    async fn discard_frees_capacity() {
        let pool = ClientPool::new(MemoryConnector::new(), config(1, 50));

        let lease = pool.acquire().await.unwrap();
        pool.discard(lease).await;
        assert_eq!(pool.leased().await, 0);

        // Capacity is free again; a fresh handle can be established.
        let lease = pool.acquire().await.unwrap();
        pool.release(lease).await;
    }
}
