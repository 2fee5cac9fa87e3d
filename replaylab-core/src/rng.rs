//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each `(component, instance)`
//! pair. Sub-seeds are derived via BLAKE3 hashing, independently of construction
//! order, so adding or reordering components never shifts another component's stream.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic RNG hierarchy.
///
/// There is no process-global random state: every consumer of randomness
/// asks the hierarchy for its own `StdRng`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a specific (component, instance).
    pub fn sub_seed(&self, component: &str, instance: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(component.as_bytes());
        hasher.update(&instance.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, component: &str, instance: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(component, instance))
    }
}
