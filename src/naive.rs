//! Reference transposition: one pass over the source, rows outer.

use log::trace;

use crate::kernel::{copy_region, ensure_transposed_shape, RawDest, RawSource};
use crate::view::{MatrixView, MatrixViewMut};
use crate::Result;

/// Transpose `src` (`m × n`) into `dst` (`n × m`): `dst[j][i] = src[i][j]`.
///
/// # Errors
/// [`TransposeError::ShapeMismatch`](crate::TransposeError::ShapeMismatch)
/// if `dst` is not `n × m`. Nothing is written in that case.
pub fn transpose_naive(src: &MatrixView<'_>, dst: &mut MatrixViewMut<'_>) -> Result<()> {
    ensure_transposed_shape(src, dst)?;
    let [m, n] = *src.size();
    trace!("transpose_naive: {m}x{n}");
    if src.is_empty() {
        return Ok(());
    }

    let raw_src = RawSource::new(src);
    let raw_dst = RawDest::new(dst);
    // SAFETY: shapes were checked and both views are bounds-validated;
    // `dst` is exclusively borrowed for the whole call.
    unsafe { copy_region(&raw_src, &raw_dst, 0..m, 0..n, 0, 0) };
    Ok(())
}
