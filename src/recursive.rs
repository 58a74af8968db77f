//! Cache-oblivious recursive transposition with fork-join parallelism.
//!
//! A [`RegionPair`] describes a source sub-matrix and the destination
//! sub-matrix that receives its transpose. The larger source extent is halved
//! until both extents are at most `K`; one half of every split is offered to
//! the rayon pool and the other runs on the current thread. `rayon::join`
//! does not return before both halves finish, so the top-level call returns
//! only once the whole task tree has joined.
//!
//! Sibling regions never share a destination element, which is why the
//! destination can be written through a shared raw pointer without locks.

use std::ops::Range;
#[cfg(feature = "parallel")]
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use log::debug;

use crate::config::TransposeConfig;
use crate::kernel::{copy_region, ensure_transposed_shape, RawDest, RawSource};
use crate::view::{MatrixView, MatrixViewMut};
use crate::Result;

/// Source region `src_rows × src_cols` and the destination region
/// `dst_rows × dst_cols` that receives its transpose.
///
/// In the usual descriptor notation the source is `(mAb, mAe, nAb, nAe)` and
/// the destination `(mBb, mBe, nBb, nBe)`. Every region produced by the
/// recursion satisfies `src_rows.len() == dst_cols.len()` and
/// `src_cols.len() == dst_rows.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionPair {
    pub src_rows: Range<usize>,
    pub src_cols: Range<usize>,
    pub dst_rows: Range<usize>,
    pub dst_cols: Range<usize>,
}

impl RegionPair {
    /// The whole `m × n` source paired with the whole `n × m` destination.
    pub fn full(m: usize, n: usize) -> Self {
        Self {
            src_rows: 0..m,
            src_cols: 0..n,
            dst_rows: 0..n,
            dst_cols: 0..m,
        }
    }

    /// Whether the destination region has the transposed shape of the source region.
    pub fn is_consistent(&self) -> bool {
        self.src_rows.len() == self.dst_cols.len() && self.src_cols.len() == self.dst_rows.len()
    }

    /// Split along the larger source extent, or `None` if both extents are
    /// at most `k` (base case).
    ///
    /// Ties split the source rows. Halving source rows halves destination
    /// columns and halving source columns halves destination rows; the other
    /// axis passes through unchanged. The first half gets `extent / 2`.
    pub fn split(&self, k: usize) -> Option<(RegionPair, RegionPair)> {
        let rows = self.src_rows.len();
        let cols = self.src_cols.len();
        if rows <= k && cols <= k {
            return None;
        }

        if rows >= cols {
            let mid = rows / 2;
            let (a_lo, a_hi) = split_range(&self.src_rows, mid);
            let (b_lo, b_hi) = split_range(&self.dst_cols, mid);
            Some((
                RegionPair {
                    src_rows: a_lo,
                    src_cols: self.src_cols.clone(),
                    dst_rows: self.dst_rows.clone(),
                    dst_cols: b_lo,
                },
                RegionPair {
                    src_rows: a_hi,
                    src_cols: self.src_cols.clone(),
                    dst_rows: self.dst_rows.clone(),
                    dst_cols: b_hi,
                },
            ))
        } else {
            let mid = cols / 2;
            let (a_lo, a_hi) = split_range(&self.src_cols, mid);
            let (b_lo, b_hi) = split_range(&self.dst_rows, mid);
            Some((
                RegionPair {
                    src_rows: self.src_rows.clone(),
                    src_cols: a_lo,
                    dst_rows: b_lo,
                    dst_cols: self.dst_cols.clone(),
                },
                RegionPair {
                    src_rows: self.src_rows.clone(),
                    src_cols: a_hi,
                    dst_rows: b_hi,
                    dst_cols: self.dst_cols.clone(),
                },
            ))
        }
    }
}

fn split_range(r: &Range<usize>, mid: usize) -> (Range<usize>, Range<usize>) {
    let at = r.start + mid;
    (r.start..at, at..r.end)
}

/// Hook invoked for every base-case region before it is copied.
///
/// Calls may arrive concurrently from different worker threads.
pub trait TaskObserver: Sync {
    fn on_leaf(&self, region: &RegionPair);
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TaskObserver for NoopObserver {
    #[inline(always)]
    fn on_leaf(&self, _region: &RegionPair) {}
}

/// Recursive transpose with the block size derived from the hardware cache,
/// on the global rayon pool.
///
/// Produces the same result as [`transpose_naive`](crate::transpose_naive).
pub fn transpose_recursive(src: &MatrixView<'_>, dst: &mut MatrixViewMut<'_>) -> Result<()> {
    transpose_recursive_with(src, dst, &TransposeConfig::default())
}

/// Recursive transpose with an explicit configuration.
///
/// `config.block_size` is the base-case threshold; `config.num_threads`, if
/// set, runs the task tree on a pool of that size. One pool is built per
/// distinct thread count and reused by later calls.
pub fn transpose_recursive_with(
    src: &MatrixView<'_>,
    dst: &mut MatrixViewMut<'_>,
    config: &TransposeConfig,
) -> Result<()> {
    transpose_recursive_observed(src, dst, config, &NoopObserver)
}

/// Recursive transpose reporting every base-case region to `observer`.
pub fn transpose_recursive_observed<O: TaskObserver>(
    src: &MatrixView<'_>,
    dst: &mut MatrixViewMut<'_>,
    config: &TransposeConfig,
    observer: &O,
) -> Result<()> {
    ensure_transposed_shape(src, dst)?;
    let k = config.resolve_block_size()?;
    let [m, n] = *src.size();
    debug!("transpose_recursive: {m}x{n}, K = {k}");
    if src.is_empty() {
        return Ok(());
    }

    let raw_src = RawSource::new(src);
    let raw_dst = RawDest::new(dst);
    let region = RegionPair::full(m, n);
    run_in_pool(config, || {
        transpose_region(&raw_src, &raw_dst, region, k, observer);
    })
}

fn transpose_region<O: TaskObserver>(
    src: &RawSource,
    dst: &RawDest,
    region: RegionPair,
    k: usize,
    observer: &O,
) {
    debug_assert!(region.is_consistent(), "inconsistent region {region:?}");
    match region.split(k) {
        None => {
            observer.on_leaf(&region);
            // SAFETY: regions stay inside the checked shapes, and this leaf's
            // destination region is disjoint from every other leaf's.
            unsafe {
                copy_region(
                    src,
                    dst,
                    region.src_rows,
                    region.src_cols,
                    region.dst_rows.start,
                    region.dst_cols.start,
                )
            };
        }
        Some((first, second)) => join(
            || transpose_region(src, dst, first, k, observer),
            || transpose_region(src, dst, second, k, observer),
        ),
    }
}

/// Run `a` on the current thread and offer `b` to the pool; return when both finish.
#[cfg(feature = "parallel")]
#[inline]
fn join<A, B>(a: A, b: B)
where
    A: FnOnce() + Send,
    B: FnOnce() + Send,
{
    rayon::join(a, b);
}

#[cfg(not(feature = "parallel"))]
#[inline]
fn join<A, B>(a: A, b: B)
where
    A: FnOnce(),
    B: FnOnce(),
{
    a();
    b();
}

#[cfg(feature = "parallel")]
fn run_in_pool<F: FnOnce() + Send>(config: &TransposeConfig, f: F) -> Result<()> {
    match config.num_threads {
        Some(num_threads) => pool_for(num_threads)?.install(f),
        None => f(),
    }
    Ok(())
}

/// Pools built for explicit thread counts, kept for the life of the process.
#[cfg(feature = "parallel")]
static POOLS: OnceLock<Mutex<HashMap<usize, Arc<rayon::ThreadPool>>>> = OnceLock::new();

/// Shared pool with `num_threads` workers, built on first use.
#[cfg(feature = "parallel")]
pub(crate) fn pool_for(num_threads: usize) -> Result<Arc<rayon::ThreadPool>> {
    let mut pools = POOLS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(&num_threads) {
        return Ok(Arc::clone(pool));
    }
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(move |i| format!("transpose-{num_threads}-{i}"))
            .build()?,
    );
    debug!("built transpose pool with {num_threads} threads");
    pools.insert(num_threads, Arc::clone(&pool));
    Ok(pool)
}

#[cfg(not(feature = "parallel"))]
fn run_in_pool<F: FnOnce()>(config: &TransposeConfig, f: F) -> Result<()> {
    if let Some(num_threads) = config.num_threads {
        debug!("parallel feature disabled, ignoring num_threads = {num_threads}");
    }
    f();
    Ok(())
}
