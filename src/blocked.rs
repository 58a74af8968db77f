//! Cache-blocked transposition.
//!
//! The `m × n` index space is cut into `K × K` tiles. One tile at a time keeps
//! both the read window and the write window inside the cache, instead of
//! striding through the whole destination for every source row.

use log::{debug, trace};

use crate::config::TransposeConfig;
use crate::kernel::{copy_region, ensure_transposed_shape, RawDest, RawSource};
use crate::view::{MatrixView, MatrixViewMut};
use crate::Result;

/// Blocked transpose with the block size derived from the hardware cache.
///
/// Produces the same result as [`transpose_naive`](crate::transpose_naive).
pub fn transpose_blocked(src: &MatrixView<'_>, dst: &mut MatrixViewMut<'_>) -> Result<()> {
    transpose_blocked_with(src, dst, &TransposeConfig::default())
}

/// Blocked transpose with an explicit configuration.
///
/// Only `config.block_size` is used; this strategy is sequential.
pub fn transpose_blocked_with(
    src: &MatrixView<'_>,
    dst: &mut MatrixViewMut<'_>,
    config: &TransposeConfig,
) -> Result<()> {
    ensure_transposed_shape(src, dst)?;
    let k = config.resolve_block_size()?;
    let [m, n] = *src.size();
    debug!("transpose_blocked: {m}x{n}, K = {k}");
    if src.is_empty() {
        return Ok(());
    }

    let raw_src = RawSource::new(src);
    let raw_dst = RawDest::new(dst);
    for (rows, cols) in tiles(m, n, k) {
        trace!("tile rows {rows:?} cols {cols:?}");
        let (dst_row, dst_col) = (cols.start, rows.start);
        // SAFETY: tiles stay inside [0, m) x [0, n); shapes are checked and
        // `dst` is exclusively borrowed.
        unsafe { copy_region(&raw_src, &raw_dst, rows, cols, dst_row, dst_col) };
    }
    Ok(())
}

/// Tile ranges `(rows, cols)` covering `[0, m) × [0, n)` in row-major tile
/// order, with ragged tiles clamped at the bottom and right edges.
fn tiles(
    m: usize,
    n: usize,
    k: usize,
) -> impl Iterator<Item = (std::ops::Range<usize>, std::ops::Range<usize>)> {
    debug_assert!(k >= 1);
    (0..m).step_by(k).flat_map(move |i0| {
        let i1 = m.min(i0 + k);
        (0..n)
            .step_by(k)
            .map(move |j0| (i0..i1, j0..n.min(j0 + k)))
    })
}
