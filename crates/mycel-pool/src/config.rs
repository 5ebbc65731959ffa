// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Pool configuration.
//
// A plain value object, deserialized from whatever configuration source the
// embedding application uses. The pool itself never reads files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`crate::ClientPool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Candidate coordinator endpoints, tried in declaration order when a
    /// new connection must be established. The first one that responds wins;
    /// the rest are only consulted when earlier ones fail to connect.
    pub endpoints: Vec<String>,

    /// TCP port shared by all candidate endpoints.
    /// Default: 1982.
    pub port: u16,

    /// Maximum number of live connections (idle + leased).
    /// Default: 8.
    pub max_connections: usize,

    /// How long `acquire` waits for a handle before giving up with
    /// `PoolError::Exhausted`, in milliseconds.
    /// Default: 5000.
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    /// The acquire timeout as a `Duration`.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1".to_string()],
            port: 1982,
            max_connections: 8,
            acquire_timeout_ms: 5000,
        }
    }
}
