//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each `(scope, index)`
//! pair. Sub-seeds are derived via BLAKE3 hashing, so the buffer, the
//! adaptation loop and each replayed symbol get independent streams whose
//! values do not depend on the order in which they were created.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic RNG hierarchy.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Derive a deterministic sub-seed for a `(scope, index)` pair.
    ///
    /// Scopes are free-form labels such as `"buffer"` or a symbol name.
    pub fn sub_seed(&self, scope: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, scope: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, index))
    }
}
