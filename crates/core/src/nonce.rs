//! Per-operation uniqueness tokens.
//!
//! Every transformation draws its randomised parameters from a generator
//! seeded by its own [`ProcessingNonce`]. No generator is shared between
//! operations, so concurrent jobs never observe correlated sequences.

use chrono::Utc;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

const RANDOM_BYTES: usize = 16;

/// A unique token created once per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingNonce {
    /// Creation instant in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// 16 random bytes, hex-encoded.
    pub random: String,
    /// `"{timestamp}_{random}"`.
    pub nonce: String,
}

impl ProcessingNonce {
    fn new(timestamp: i64, bytes: &[u8; RANDOM_BYTES]) -> Self {
        let random = hex::encode(bytes);
        let nonce = format!("{}_{}", timestamp, random);
        Self {
            timestamp,
            random,
            nonce,
        }
    }

    /// Deterministic 64-bit seed: the nonce string folded with a base-31
    /// polynomial hash, XORed into the timestamp.
    pub fn seed(&self) -> i64 {
        let hash = self
            .nonce
            .bytes()
            .fold(0i64, |h, b| h.wrapping_mul(31).wrapping_add(i64::from(b)));
        self.timestamp ^ hash
    }

    /// A fresh local generator seeded from this nonce.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed() as u64)
    }
}

impl std::fmt::Display for ProcessingNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.nonce)
    }
}

/// Mints [`ProcessingNonce`]s.
#[derive(Debug, Default)]
pub struct NonceEngine {
    fallback_counter: AtomicU64,
}

impl NonceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a new nonce. Never fails: if the OS random source is
    /// unavailable a time-and-counter seeded generator is used instead.
    pub fn generate(&self) -> ProcessingNonce {
        self.generate_with(|buf| OsRng.try_fill_bytes(buf))
    }

    fn generate_with<F>(&self, fill: F) -> ProcessingNonce
    where
        F: FnOnce(&mut [u8]) -> Result<(), rand::Error>,
    {
        let timestamp = now_nanos();
        let mut bytes = [0u8; RANDOM_BYTES];

        if let Err(e) = fill(&mut bytes) {
            warn!(error = %e, "Secure random source unavailable, using fallback generator");
            let n = self.fallback_counter.fetch_add(1, Ordering::Relaxed);
            let seed = (timestamp as u64) ^ n.wrapping_mul(0x9E37_79B9_7F4A_7C15);
            StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
        }

        ProcessingNonce::new(timestamp, &bytes)
    }
}

fn now_nanos() -> i64 {
    let now = Utc::now();
    // Out of range only after the year 2262.
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
