//! Cache-aware transposition of dense `f64` matrices.
//!
//! Three strategies compute the same result, `dst[j][i] = src[i][j]`, with
//! different memory-access patterns:
//!
//! - [`transpose_naive`]: plain double loop, the reference implementation
//! - [`transpose_blocked`]: `K×K` tiling, with `K` derived from the L1 cache
//! - [`transpose_recursive`]: cache-oblivious halving of the larger extent,
//!   forking one half of every split onto the rayon pool
//!
//! # Core Types
//!
//! - [`MatrixView`] / [`MatrixViewMut`]: Zero-copy strided views over
//!   externally owned data. The engine never allocates matrices.
//! - [`TransposeConfig`]: Block size and worker count, injectable for tests
//!   and tuning.
//! - [`CacheQuery`]: Source of the cache capacity the block size is derived from.
//!
//! # Example
//!
//! ```rust
//! use strided_transpose::{transpose_recursive, MatrixView, MatrixViewMut};
//!
//! let src_data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let mut dst_data = vec![0.0; 6];
//!
//! let src = MatrixView::row_major(&src_data, 2, 3).unwrap();
//! let mut dst = MatrixViewMut::row_major(&mut dst_data, 3, 2).unwrap();
//! transpose_recursive(&src, &mut dst).unwrap();
//!
//! assert_eq!(dst_data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
//! ```
//!
//! # Cache Optimization
//!
//! The block size `K = floor(sqrt(Z / 2))` is computed from the L1
//! instruction-cache capacity `Z` reported by the hardware, clamped to at
//! least [`DEFAULT_BLOCK_SIZE`]. Pass [`BlockSize::Fixed`] to override it.

mod blocked;
pub mod cache;
pub mod config;
mod kernel;
mod naive;
mod recursive;
mod strategy;
pub mod view;

// ============================================================================
// Transposition strategies
// ============================================================================
pub use blocked::{transpose_blocked, transpose_blocked_with};
pub use naive::transpose_naive;
pub use recursive::{
    transpose_recursive, transpose_recursive_observed, transpose_recursive_with, NoopObserver,
    RegionPair, TaskObserver,
};
pub use strategy::{transpose, Strategy};

// ============================================================================
// Configuration and cache parameters
// ============================================================================
pub use cache::{
    block_size_from_capacity, hardware_block_size, resolve_block_size, CacheQuery, FixedCache,
    HardwareCache,
};
pub use config::{BlockSize, TransposeConfig};

// ============================================================================
// View types
// ============================================================================
pub use view::{MatrixView, MatrixViewMut};

// ============================================================================
// Constants
// ============================================================================

/// Block size used when the cache capacity cannot be read.
///
/// Any positive value keeps the recursion terminating; 1 is always correct.
pub const DEFAULT_BLOCK_SIZE: usize = 1;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during matrix transposition.
#[derive(Debug, thiserror::Error)]
pub enum TransposeError {
    /// Destination shape is not the transpose of the source shape.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// View strides or offset reach outside the backing slice.
    #[error("view out of bounds: needs {required} elements, slice has {len}")]
    OutOfBounds { len: usize, required: usize },

    /// Destination strides must be strictly positive.
    #[error("invalid destination stride {stride} for dim {dim}")]
    InvalidStride { dim: usize, stride: isize },

    /// Two destination indices address the same element.
    #[error("destination layout overlaps itself")]
    OverlappingLayout,

    /// A fixed block size of zero was requested.
    #[error("block size must be at least 1")]
    InvalidBlockSize,

    /// Unknown strategy name.
    #[error("unknown transpose strategy: {0}")]
    InvalidStrategy(String),

    /// Configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },

    /// Failed to build a worker pool.
    #[cfg(feature = "parallel")]
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for transposition operations.
pub type Result<T> = std::result::Result<T, TransposeError>;
