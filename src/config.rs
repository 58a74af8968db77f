//! Runtime configuration for the cache-aware strategies.
//!
//! The block size is a tuning parameter, not a correctness parameter: every
//! positive value yields the same result. It defaults to the value derived
//! from the executing machine's cache and can be pinned for tests.

use crate::cache::{block_size_from_capacity, hardware_block_size};
use crate::{Result, TransposeError};

/// Environment variable overriding the block size.
pub const BLOCK_SIZE_ENV: &str = "TRANSPOSE_BLOCK_SIZE";

/// Environment variable selecting the number of worker threads.
pub const NUM_THREADS_ENV: &str = "TRANSPOSE_NUM_THREADS";

/// How the block / base-case size `K` is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockSize {
    /// Derive from the L1 instruction cache of the executing machine.
    #[default]
    Hardware,
    /// Use this exact size. Must be at least 1.
    Fixed(usize),
    /// Derive from the given cache capacity in bytes, as if the hardware
    /// had reported it.
    FromCache(i64),
}

/// Configuration shared by [`transpose_blocked_with`](crate::transpose_blocked_with)
/// and [`transpose_recursive_with`](crate::transpose_recursive_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransposeConfig {
    pub block_size: BlockSize,
    /// Worker count for a shared pool of that size; `None` runs on the global rayon pool.
    pub num_threads: Option<usize>,
}

impl TransposeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, block_size: BlockSize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Read overrides from [`BLOCK_SIZE_ENV`] and [`NUM_THREADS_ENV`].
    ///
    /// Unset variables keep the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(BLOCK_SIZE_ENV) {
            let k = parse_positive(BLOCK_SIZE_ENV, &value)?;
            config.block_size = BlockSize::Fixed(k);
        }
        if let Some(value) = lookup(NUM_THREADS_ENV) {
            config.num_threads = Some(parse_positive(NUM_THREADS_ENV, &value)?);
        }
        Ok(config)
    }

    /// The block size `K` this configuration selects. Always at least 1.
    ///
    /// # Errors
    /// [`TransposeError::InvalidBlockSize`] for `BlockSize::Fixed(0)`.
    pub fn resolve_block_size(&self) -> Result<usize> {
        match self.block_size {
            BlockSize::Hardware => Ok(hardware_block_size()),
            BlockSize::Fixed(0) => Err(TransposeError::InvalidBlockSize),
            BlockSize::Fixed(k) => Ok(k),
            BlockSize::FromCache(z) => Ok(block_size_from_capacity(z)),
        }
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(TransposeError::Config {
            key,
            value: value.to_string(),
        }),
    }
}
