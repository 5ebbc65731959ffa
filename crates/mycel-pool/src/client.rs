// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Remote key-value client contract.
//
// Defines the `KvClient` trait implemented by concrete backing-store
// clients and the `Connect` trait the pool uses to establish new handles.
// The wire format of the remote service is out of scope; keys and values
// cross this boundary as opaque byte slices.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a backing-store client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A transient failure (timeout, dropped packet, leader churn). The map
    /// store adapter retries these up to its configured attempt bound.
    #[error("transient client error: {0}")]
    Transient(String),

    /// A connection to `endpoint` could not be established.
    #[error("unable to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// The client is permanently unusable, e.g. the remote service shut the
    /// connection down. The holding caller should discard the handle.
    #[error("client unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether the failed operation may succeed if simply retried on a
    /// healthy connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// A live connection to the remote key-value service.
///
/// All keys and values are opaque byte slices; typed access lives in the
/// map store layer. A client is held exclusively by one caller between
/// `acquire` and `release`, but handles are not thread-affine: releasing
/// from a different task than the acquirer is fine.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Fetch the value stored under `key` in the given `space`.
    ///
    /// Returns `Ok(None)` when the key has no record, which is not an error.
    async fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, ClientError>;

    /// Store `value` under `key` in `space`, replacing any previous value.
    async fn put(&self, space: &str, key: &[u8], value: &[u8]) -> Result<(), ClientError>;

    /// Remove the record under `key`, returning whether one existed.
    /// Deleting a missing key is not an error.
    async fn delete(&self, space: &str, key: &[u8]) -> Result<bool, ClientError>;

    /// A short human-readable name for this client, used in log context.
    fn name(&self) -> &str;
}

/// Establishes new client connections for the pool.
///
/// The pool walks its configured candidate endpoints in order and hands each
/// one to `connect`, taking the first that responds.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Client: KvClient + 'static;

    async fn connect(&self, endpoint: &str, port: u16) -> Result<Self::Client, ClientError>;
}
