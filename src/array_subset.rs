//! Array subsets.
//!
//! An [`ArraySubset`] represents a rectangular region of an array, defined by a
//! start coordinate and a shape. Subarray requests, chunk extents, and the
//! per-chunk overlap computations of the subarray engine are all expressed as
//! array subsets.
//!
//! This module also provides the region copy helpers used to move data between
//! a contiguous C-order buffer and a region of another contiguous C-order
//! buffer.

pub mod iterators;

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

pub use iterators::{ChunksIterator, IndicesIterator};

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// A rectangular subset of an array.
#[derive(Clone, Eq, PartialEq, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

impl ArraySubset {
    /// Create a new array subset at the origin with `shape`.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset with `start` and `shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                start.len(),
                shape.len(),
            ))
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the exclusive end of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the number of elements of the array subset as a [`usize`].
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        usize::try_from(self.num_elements()).unwrap_or(usize::MAX)
    }

    /// Return true if the array subset has any zero-sized axis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&size| size == 0)
    }

    /// Return true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(&self.start, &self.shape, array_shape)
                .all(|(start, size, array_size)| start + size <= *array_size)
    }

    /// Return the intersection of this array subset with `other`, clamped to the overlapping region.
    ///
    /// The returned subset is empty if the subsets do not overlap.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `other` does not match.
    pub fn overlap(&self, other: &ArraySubset) -> Result<ArraySubset, IncompatibleDimensionalityError> {
        if other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let mut start = ArrayIndices::with_capacity(self.dimensionality());
        let mut shape = ArrayShape::with_capacity(self.dimensionality());
        for (a_start, a_size, b_start, b_size) in
            izip!(&self.start, &self.shape, &other.start, &other.shape)
        {
            let begin = std::cmp::max(*a_start, *b_start);
            let end = std::cmp::min(a_start + a_size, b_start + b_size);
            start.push(begin);
            shape.push(end.saturating_sub(begin));
        }
        Ok(ArraySubset { start, shape })
    }

    /// Return an iterator over the coordinates of the array subset, in C order.
    #[must_use]
    pub fn indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }

    /// Return this array subset shifted to be relative to `start`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` does not match.
    pub fn relative_to(&self, start: &[u64]) -> Result<ArraySubset, IncompatibleDimensionalityError> {
        if start.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                start.len(),
                self.dimensionality(),
            ));
        }
        Ok(ArraySubset {
            start: std::iter::zip(&self.start, start)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
            shape: self.shape.clone(),
        })
    }
}

/// Return the C-order element strides of `shape`.
pub(crate) fn c_order_strides(shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Return the linear element index of `indices` offset by `offset` in an array of `strides`.
fn linear_index(offset: &[u64], indices: &[u64], strides: &[u64]) -> usize {
    usize::try_from(
        izip!(offset, indices, strides)
            .map(|(offset, index, stride)| (offset + index) * stride)
            .sum::<u64>(),
    )
    .unwrap_or(usize::MAX)
}

/// Copy a region between two contiguous C-order byte buffers.
///
/// Copies `region_shape` elements of `element_size` bytes from `src` (shaped
/// `src_shape`, region origin `src_start`) into `dst` (shaped `dst_shape`,
/// region origin `dst_start`). The innermost axis is contiguous in both
/// buffers, so the copy proceeds row by row.
pub(crate) fn copy_region(
    src: &[u8],
    src_shape: &[u64],
    src_start: &[u64],
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_start: &[u64],
    region_shape: &[u64],
    element_size: usize,
) {
    debug_assert_eq!(src_shape.len(), region_shape.len());
    debug_assert_eq!(dst_shape.len(), region_shape.len());
    let ndim = region_shape.len();
    if region_shape.iter().any(|&size| size == 0) {
        return;
    }
    let src_strides = c_order_strides(src_shape);
    let dst_strides = c_order_strides(dst_shape);
    let row_len = usize::try_from(region_shape[ndim - 1]).unwrap() * element_size;
    let num_rows: u64 = region_shape[..ndim - 1].iter().product();
    let mut indices = vec![0u64; ndim];
    for _ in 0..num_rows {
        let src_offset = linear_index(src_start, &indices, &src_strides) * element_size;
        let dst_offset = linear_index(dst_start, &indices, &dst_strides) * element_size;
        dst[dst_offset..dst_offset + row_len]
            .copy_from_slice(&src[src_offset..src_offset + row_len]);
        // advance the odometer over the outer axes
        for d in (0..ndim - 1).rev() {
            indices[d] += 1;
            if indices[d] < region_shape[d] {
                break;
            }
            indices[d] = 0;
        }
    }
}

/// Fill a region of a contiguous C-order byte buffer with a repeated element.
pub(crate) fn fill_region(
    dst: &mut [u8],
    dst_shape: &[u64],
    region: &ArraySubset,
    element: &[u8],
) {
    debug_assert_eq!(dst_shape.len(), region.dimensionality());
    let ndim = region.dimensionality();
    if region.is_empty() {
        return;
    }
    let element_size = element.len();
    let dst_strides = c_order_strides(dst_shape);
    let region_shape = region.shape();
    let row_elements = usize::try_from(region_shape[ndim - 1]).unwrap();
    let num_rows: u64 = region_shape[..ndim - 1].iter().product();
    let row: Vec<u8> = element.repeat(row_elements);
    let mut indices = vec![0u64; ndim];
    for _ in 0..num_rows {
        let dst_offset = linear_index(region.start(), &indices, &dst_strides) * element_size;
        dst[dst_offset..dst_offset + row.len()].copy_from_slice(&row);
        for d in (0..ndim - 1).rev() {
            indices[d] += 1;
            if indices[d] < region_shape[d] {
                break;
            }
            indices[d] = 0;
        }
    }
}
