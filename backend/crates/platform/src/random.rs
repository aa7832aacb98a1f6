//! Secure Random Source
//!
//! Every secret the engine mints (token nonces, confirmation codes, ids)
//! is drawn through [`SecureRandom`] so tests can pin the sequence.

use std::sync::{Mutex, PoisonError};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Cryptographically secure byte source
pub trait SecureRandom: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Deterministic generator for tests
///
/// Two instances built from the same seed produce the same stream.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl SecureRandom for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(dest);
    }
}
