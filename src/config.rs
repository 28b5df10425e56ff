//! Engine configuration
//!
//! Tunables for the ledger engine and its in-memory store. Invalid values fall
//! back to the defaults with a warning rather than failing startup.

use std::time::Duration;
use tracing::warn;

/// Default bound on how long a scope waits for one account lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of fresh-reference retries after a reference collision
pub const DEFAULT_DUPLICATE_REFERENCE_RETRIES: u8 = 1;

/// Configuration for the ledger engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest wait for a single per-account lock before the scope fails
    pub lock_timeout: Duration,

    /// How many times an operation is re-run under a fresh reference when the
    /// generated one collides
    pub duplicate_reference_retries: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            duplicate_reference_retries: DEFAULT_DUPLICATE_REFERENCE_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfig with custom values
    pub fn new(lock_timeout: Duration, duplicate_reference_retries: u8) -> Self {
        let default = Self::default();

        let lock_timeout = if lock_timeout.is_zero() {
            warn!(
                ?lock_timeout,
                fallback = ?default.lock_timeout,
                "invalid lock_timeout, using default"
            );
            default.lock_timeout
        } else {
            lock_timeout
        };

        Self {
            lock_timeout,
            duplicate_reference_retries,
        }
    }

    /// Build from a millisecond lock timeout, as given on the command line
    pub fn from_millis(lock_timeout_ms: Option<u64>) -> Self {
        match lock_timeout_ms {
            Some(ms) => Self::new(
                Duration::from_millis(ms),
                DEFAULT_DUPLICATE_REFERENCE_RETRIES,
            ),
            None => Self::default(),
        }
    }
}
