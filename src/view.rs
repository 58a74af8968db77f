//! Strided matrix views over externally owned `f64` data.
//!
//! This module provides `MatrixView` and `MatrixViewMut`, the two borrowed
//! matrix types every transposition strategy works on.
//!
//! Key features:
//! - Zero-copy views over caller-owned slices (the engine never allocates)
//! - Arbitrary element strides, so a view may address a sub-block of a larger
//!   buffer or a column-major layout
//! - Destination views are checked to be free of self-overlap, so disjoint
//!   index regions are always disjoint memory

use crate::{Result, TransposeError};

/// An immutable strided view over a dense `f64` matrix.
///
/// Element `(i, j)` lives at `data[offset + i * strides[0] + j * strides[1]]`.
/// Strides may be zero or negative; the view is read-only so aliasing is harmless.
///
/// # Example
/// ```
/// use strided_transpose::MatrixView;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let view = MatrixView::new(&data, [2, 3], [3, 1], 0).unwrap();
/// assert_eq!(view.get([1, 2]), 6.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [f64],
    size: [usize; 2],
    strides: [isize; 2],
    offset: usize,
}

/// A mutable strided view used as a transposition destination.
///
/// Strides must be strictly positive and the layout must not map two indices
/// to the same element.
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    data: &'a mut [f64],
    size: [usize; 2],
    strides: [isize; 2],
    offset: usize,
}

impl<'a> MatrixView<'a> {
    /// Create a new strided view.
    ///
    /// # Arguments
    /// - `data`: The underlying contiguous data
    /// - `size`: `[rows, cols]`
    /// - `strides`: Stride for each dimension (in elements, can be negative)
    /// - `offset`: Starting offset into the data
    ///
    /// # Errors
    /// Returns an error if the view would access out-of-bounds memory.
    pub fn new(
        data: &'a [f64],
        size: [usize; 2],
        strides: [isize; 2],
        offset: usize,
    ) -> Result<Self> {
        validate_bounds(data.len(), &size, &strides, offset)?;
        Ok(Self {
            data,
            size,
            strides,
            offset,
        })
    }

    /// Row-major `rows × cols` view starting at the beginning of `data`.
    pub fn row_major(data: &'a [f64], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, [rows, cols], [cols as isize, 1], 0)
    }

    #[inline]
    pub fn size(&self) -> &[usize; 2] {
        &self.size
    }

    #[inline]
    pub fn strides(&self) -> &[isize; 2] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.size[0]
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.size[1]
    }

    /// Returns the total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.size[0] * self.size[1]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.contains(&0)
    }

    /// Returns a raw pointer to element `(0, 0)`.
    #[inline]
    pub(crate) fn as_ptr(&self) -> *const f64 {
        // Empty views are never dereferenced, so the offset may point anywhere.
        self.data.as_ptr().wrapping_add(self.offset)
    }

    /// Get element `(i, j)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn get(&self, index: [usize; 2]) -> f64 {
        assert!(
            index[0] < self.size[0] && index[1] < self.size[1],
            "index out of bounds"
        );
        self.data[linear_index(self.offset, &self.strides, index)]
    }

    /// Transposed view (swap dimensions).
    ///
    /// This is a zero-copy operation that just swaps size and strides.
    #[inline]
    pub fn t(self) -> MatrixView<'a> {
        MatrixView {
            data: self.data,
            size: [self.size[1], self.size[0]],
            strides: [self.strides[1], self.strides[0]],
            offset: self.offset,
        }
    }
}

impl<'a> MatrixViewMut<'a> {
    /// Create a new mutable strided view.
    ///
    /// # Errors
    /// - [`TransposeError::OutOfBounds`] if an index falls outside `data`
    /// - [`TransposeError::InvalidStride`] if a stride is zero or negative
    /// - [`TransposeError::OverlappingLayout`] if two indices share an element
    pub fn new(
        data: &'a mut [f64],
        size: [usize; 2],
        strides: [isize; 2],
        offset: usize,
    ) -> Result<Self> {
        validate_bounds(data.len(), &size, &strides, offset)?;
        validate_disjoint_layout(&size, &strides)?;
        Ok(Self {
            data,
            size,
            strides,
            offset,
        })
    }

    /// Row-major `rows × cols` view starting at the beginning of `data`.
    pub fn row_major(data: &'a mut [f64], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, [rows, cols], [cols.max(1) as isize, 1], 0)
    }

    #[inline]
    pub fn size(&self) -> &[usize; 2] {
        &self.size
    }

    #[inline]
    pub fn strides(&self) -> &[isize; 2] {
        &self.strides
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.size[0]
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.size[1]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.contains(&0)
    }

    /// Returns a mutable raw pointer to element `(0, 0)`.
    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut f64 {
        self.data.as_mut_ptr().wrapping_add(self.offset)
    }

    /// Get element `(i, j)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn get(&self, index: [usize; 2]) -> f64 {
        assert!(
            index[0] < self.size[0] && index[1] < self.size[1],
            "index out of bounds"
        );
        self.data[linear_index(self.offset, &self.strides, index)]
    }

    /// Set element `(i, j)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn set(&mut self, index: [usize; 2], value: f64) {
        assert!(
            index[0] < self.size[0] && index[1] < self.size[1],
            "index out of bounds"
        );
        self.data[linear_index(self.offset, &self.strides, index)] = value;
    }

    /// Reborrow as an immutable view.
    #[inline]
    pub fn as_view(&self) -> MatrixView<'_> {
        MatrixView {
            data: self.data,
            size: self.size,
            strides: self.strides,
            offset: self.offset,
        }
    }
}

#[inline]
fn linear_index(offset: usize, strides: &[isize; 2], index: [usize; 2]) -> usize {
    (offset as isize + index[0] as isize * strides[0] + index[1] as isize * strides[1]) as usize
}

fn validate_bounds(
    data_len: usize,
    size: &[usize; 2],
    strides: &[isize; 2],
    offset: usize,
) -> Result<()> {
    if size.contains(&0) {
        // Empty matrix, no bounds to check
        return Ok(());
    }

    let overflow = || TransposeError::OutOfBounds {
        len: data_len,
        required: usize::MAX,
    };
    let base = isize::try_from(offset).map_err(|_| overflow())?;
    let mut min_offset = base;
    let mut max_offset = base;

    for (&d, &stride) in size.iter().zip(strides.iter()) {
        if d > 1 {
            let last_idx = isize::try_from(d - 1).map_err(|_| overflow())?;
            let end = stride
                .checked_mul(last_idx)
                .ok_or_else(overflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or_else(overflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or_else(overflow)?;
            }
        }
    }

    if min_offset < 0 || max_offset as usize >= data_len {
        return Err(TransposeError::OutOfBounds {
            len: data_len,
            required: (max_offset.max(0) as usize).saturating_add(1),
        });
    }

    Ok(())
}

/// Check that distinct indices of a destination view address distinct elements.
fn validate_disjoint_layout(size: &[usize; 2], strides: &[isize; 2]) -> Result<()> {
    for (dim, &stride) in strides.iter().enumerate() {
        if size[dim] > 1 && stride <= 0 {
            return Err(TransposeError::InvalidStride { dim, stride });
        }
    }
    if size[0] <= 1 || size[1] <= 1 {
        return Ok(());
    }

    // The outer dimension has to step over the whole inner extent.
    let (inner, outer) = if strides[0] <= strides[1] { (0, 1) } else { (1, 0) };
    let inner_extent = isize::try_from(size[inner])
        .ok()
        .and_then(|len| strides[inner].checked_mul(len))
        .ok_or(TransposeError::OverlappingLayout)?;
    if strides[outer] < inner_extent {
        return Err(TransposeError::OverlappingLayout);
    }
    Ok(())
}
