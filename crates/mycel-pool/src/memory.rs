// SPDX-License-Identifier: PMPL-1.0-or-later
//
// In-process key-value service.
//
// A `BTreeMap`-per-space store behind a tokio `RwLock`, shared by every
// clone of the client. Intended for tests, development, and ephemeral
// workloads. Fault injection makes the retry behavior of the layers above
// observable without a real network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::{ClientError, Connect, KvClient};

type SpaceMap = HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>;

/// An in-memory [`KvClient`]. Clones share state, so one logical service
/// can back many pooled "connections".
///
/// # Example
///
/// ```rust
/// use mycel_pool::{KvClient, MemoryKvClient};
///
/// # tokio_test::block_on(async {
/// let client = MemoryKvClient::new();
/// client.put("users", b"u1", b"{\"name\":\"Ada\"}").await.unwrap();
/// assert!(client.get("users", b"u1").await.unwrap().is_some());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryKvClient {
    spaces: Arc<RwLock<SpaceMap>>,
    /// Remaining operations that should fail with a transient error.
    fail_remaining: Arc<AtomicUsize>,
    /// Total operations attempted, including injected failures.
    ops: Arc<AtomicUsize>,
}

impl MemoryKvClient {
    pub fn new() -> Self {
        Self {
            spaces: Arc::new(RwLock::new(HashMap::new())),
            fail_remaining: Arc::new(AtomicUsize::new(0)),
            ops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `n` operations fail with `ClientError::Transient`.
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Total operations attempted so far, injected failures included.
    pub fn ops(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    /// Number of records in `space`.
    pub async fn len(&self, space: &str) -> usize {
        self.spaces
            .read()
            .await
            .get(space)
            .map_or(0, BTreeMap::len)
    }

    fn take_fault(&self, op: &str) -> Result<(), ClientError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(ClientError::Transient(format!("injected fault during {op}")))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryKvClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvClient for MemoryKvClient {
    async fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, ClientError> {
        self.take_fault("get")?;
        let spaces = self.spaces.read().await;
        Ok(spaces.get(space).and_then(|map| map.get(key).cloned()))
    }

    async fn put(&self, space: &str, key: &[u8], value: &[u8]) -> Result<(), ClientError> {
        self.take_fault("put")?;
        let mut spaces = self.spaces.write().await;
        spaces
            .entry(space.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, space: &str, key: &[u8]) -> Result<bool, ClientError> {
        self.take_fault("delete")?;
        let mut spaces = self.spaces.write().await;
        Ok(spaces
            .get_mut(space)
            .is_some_and(|map| map.remove(key).is_some()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A [`Connect`] implementation over [`MemoryKvClient`].
///
/// Every successful `connect` yields a clone sharing the same store.
/// Endpoints added via [`refuse`](MemoryConnector::refuse) simulate
/// coordinators that are down, exercising the pool's candidate walk.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    client: MemoryKvClient,
    refused: HashSet<String>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::with_client(MemoryKvClient::new())
    }

    /// Build a connector serving clones of an existing client, so tests can
    /// seed or inspect the store directly.
    pub fn with_client(client: MemoryKvClient) -> Self {
        Self {
            client,
            refused: HashSet::new(),
        }
    }

    /// Mark an endpoint as refusing connections.
    pub fn refuse(mut self, endpoint: &str) -> Self {
        self.refused.insert(endpoint.to_string());
        self
    }

    /// The shared client behind this connector.
    pub fn client(&self) -> &MemoryKvClient {
        &self.client
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connect for MemoryConnector {
    type Client = MemoryKvClient;

    async fn connect(&self, endpoint: &str, _port: u16) -> Result<Self::Client, ClientError> {
        if self.refused.contains(endpoint) {
            return Err(ClientError::Connect {
                endpoint: endpoint.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.client.clone())
    }
}
