// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Retry policy for backing-store operations.
//
// Every adapter operation that touches the pool runs inside a loop bounded
// by `max_attempts`. The backoff between attempts is explicit and
// configurable; the default keeps the legacy immediate-retry behavior,
// which deployments facing genuinely slow dependencies should override.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay strategy applied between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backoff {
    /// Retry immediately. Cheap when failures are rare blips, but a tight
    /// loop against a genuinely down dependency.
    None,

    /// Sleep a fixed interval between attempts.
    Fixed { delay_ms: u64 },

    /// Double the delay after each attempt, starting at `base_ms` and
    /// never exceeding `cap_ms`.
    Exponential { base_ms: u64, cap_ms: u64 },
}

impl Backoff {
    /// The delay to apply after the `attempt`-th failure (1-based).
    /// `None` means retry immediately.
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        match self {
            Backoff::None => None,
            Backoff::Fixed { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            Backoff::Exponential { base_ms, cap_ms } => {
                let exp = attempt.saturating_sub(1).min(63) as u32;
                let delay = base_ms.saturating_mul(1u64 << exp).min(*cap_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// Bounded retry policy for one adapter operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts before the operation gives up and
    /// returns its documented default result.
    /// Default: 200.
    pub max_attempts: usize,

    /// Delay strategy between attempts.
    /// Default: `Backoff::None`.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 200,
            backoff: Backoff::None,
        }
    }
}
