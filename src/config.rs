//! Tunable knobs for the paging/caching layer (C3) and for the
//! pseudorandom source used by `sample` and the resampling variety
//! estimators (C6/C7). Kept separate from the algorithms themselves so a
//! host can retune them without touching the core.

/// Number of segments held in one page of a [`crate::segmentation::Segmentation`]
/// before it is sealed.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Number of sealed pages kept resident across all segmentations before
/// the least-recently-used one is spilled to a temporary file.
pub const DEFAULT_CACHE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct PagingConfig {
    pub chunk_size: usize,
    pub cache_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Seed configuration for the `rand_chacha` source backing `sample` and
/// the Monte-Carlo variety estimators. `None` seeds from entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RngConfig {
    pub seed: Option<u64>,
}

impl RngConfig {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn build_rng(&self) -> rand_chacha::ChaCha8Rng {
        use rand::SeedableRng;

        match self.seed {
            Some(seed) => rand_chacha::ChaCha8Rng::seed_from_u64(seed),
            None => rand_chacha::ChaCha8Rng::from_os_rng(),
        }
    }
}
