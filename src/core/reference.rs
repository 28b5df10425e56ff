//! Transaction reference generation
//!
//! A reference is a 128-bit value rendered as 22 base62 characters:
//!
//! ```text
//!  127            80 79                         0
//! ┌────────────────┬────────────────────────────┐
//! │ unix millis(48)│   OS CSPRNG bytes (80)     │
//! └────────────────┴────────────────────────────┘
//! ```
//!
//! Two references collide only if they share a millisecond and all 80 random
//! bits. For `n` references minted within one millisecond the collision
//! probability is about `n² / 2⁸¹`, around 4e-13 for a million of them.
//! Nothing about the operation (accounts, amounts) enters the value.
//!
//! The encoding is fixed-width and most-significant-digit first, so references
//! sort by the millisecond they were minted in.

use super::traits::ReferenceSource;
use crate::types::{LedgerError, Reference};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

/// Length of every generated reference
pub const REFERENCE_LEN: usize = 22;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const RANDOM_BYTES: usize = 10;
const RANDOM_BITS: u32 = (RANDOM_BYTES as u32) * 8;
const TIMESTAMP_MASK: u64 = (1 << 48) - 1;

/// Encode `value` as exactly [`REFERENCE_LEN`] base62 digits
pub fn encode_base62(mut value: u128) -> String {
    let mut digits = [b'0'; REFERENCE_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = BASE62_ALPHABET[(value % 62) as usize];
        value /= 62;
    }
    // Every byte comes from the ASCII alphabet above
    digits.iter().map(|&b| b as char).collect()
}

fn system_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Reference generator backed by the wall clock and the OS random source
///
/// Holds no mutable state, so one instance can be shared freely between
/// threads and no process-wide counter exists.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceGenerator {
    clock: fn() -> u64,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        ReferenceGenerator {
            clock: system_millis,
        }
    }

    /// Use a custom millisecond clock instead of the system clock
    pub fn with_clock(clock: fn() -> u64) -> Self {
        ReferenceGenerator { clock }
    }

    fn compose(millis: u64, random: [u8; RANDOM_BYTES]) -> u128 {
        let mut value = u128::from(millis & TIMESTAMP_MASK) << RANDOM_BITS;
        for (i, byte) in random.iter().enumerate() {
            value |= u128::from(*byte) << (8 * (RANDOM_BYTES - 1 - i));
        }
        value
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSource for ReferenceGenerator {
    fn new_reference(&self) -> Result<Reference, LedgerError> {
        let mut random = [0u8; RANDOM_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| LedgerError::entropy_unavailable(e.to_string()))?;
        let value = Self::compose((self.clock)(), random);
        Ok(Reference::from_generated(encode_base62(value)))
    }
}
