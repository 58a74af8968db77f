//! Element-copy kernel shared by every transposition strategy.
//!
//! The kernel works on raw pointers so the recursive strategy can hand
//! disjoint destination regions to different rayon tasks.

use std::ops::Range;

use crate::view::{MatrixView, MatrixViewMut};
use crate::{Result, TransposeError};

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that no data races occur
/// (e.g., different threads write to disjoint regions).
#[derive(Debug)]
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

/// Source matrix as seen by the kernel: base pointer plus element strides.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawSource {
    ptr: SendPtr<f64>,
    strides: [isize; 2],
}

/// Destination matrix as seen by the kernel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawDest {
    ptr: SendPtr<f64>,
    strides: [isize; 2],
}

impl RawSource {
    pub(crate) fn new(src: &MatrixView<'_>) -> Self {
        Self {
            ptr: SendPtr(src.as_ptr() as *mut f64),
            strides: *src.strides(),
        }
    }

    #[inline(always)]
    unsafe fn read(&self, i: usize, j: usize) -> f64 {
        *self
            .ptr
            .0
            .offset(i as isize * self.strides[0] + j as isize * self.strides[1])
    }
}

impl RawDest {
    pub(crate) fn new(dst: &mut MatrixViewMut<'_>) -> Self {
        Self {
            ptr: SendPtr(dst.as_mut_ptr()),
            strides: *dst.strides(),
        }
    }

    #[inline(always)]
    unsafe fn write(&self, i: usize, j: usize, value: f64) {
        *self
            .ptr
            .0
            .offset(i as isize * self.strides[0] + j as isize * self.strides[1]) = value;
    }
}

/// Reject a destination whose shape is not the transpose of the source shape.
///
/// Runs before any write, so a mis-shaped destination is left untouched.
pub(crate) fn ensure_transposed_shape(
    src: &MatrixView<'_>,
    dst: &MatrixViewMut<'_>,
) -> Result<()> {
    let expected = [src.ncols(), src.nrows()];
    if *dst.size() != expected {
        return Err(TransposeError::ShapeMismatch(
            dst.size().to_vec(),
            expected.to_vec(),
        ));
    }
    Ok(())
}

/// Copy the source region `rows × cols` into the destination region starting
/// at `(dst_row, dst_col)`, walking both in lock-step.
///
/// Each source row step advances one destination column, each source column
/// step advances one destination row: `dst[dst_row + (j - cols.start)][dst_col + (i - rows.start)] = src[i][j]`.
///
/// # Safety
/// Every touched index must lie inside both matrices, and no other thread may
/// concurrently access the destination region
/// `[dst_row, dst_row + cols.len()) × [dst_col, dst_col + rows.len())`.
#[inline]
pub(crate) unsafe fn copy_region(
    src: &RawSource,
    dst: &RawDest,
    rows: Range<usize>,
    cols: Range<usize>,
    dst_row: usize,
    dst_col: usize,
) {
    let mut j_b = dst_col;
    for i_a in rows {
        let mut i_b = dst_row;
        for j_a in cols.clone() {
            dst.write(i_b, j_b, src.read(i_a, j_a));
            i_b += 1;
        }
        j_b += 1;
    }
}
