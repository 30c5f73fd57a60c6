//! The regular chunk grid.
//!
//! A [`ChunkGrid`] subdivides an array of a given shape into a regular grid of
//! rectangular chunks. It maps between linear chunk indices and grid
//! coordinates, locates the chunks overlapping a region of interest, and
//! computes the bounded (edge-clipped) shape of chunks at the array boundary.

use itertools::izip;

use crate::array_subset::{ArraySubset, ChunksIterator};

use super::{ArrayIndices, ArrayShape};

/// A regular chunk grid over an array.
#[derive(Clone, Debug)]
pub struct ChunkGrid {
    array_shape: ArrayShape,
    chunk_shape: ArrayShape,
    grid_shape: ArrayShape,
    grid_strides: Vec<u64>,
    num_chunks: u64,
}

/// The overlap of one chunk with a region of interest.
#[derive(Clone, Debug)]
pub struct ChunkOverlap {
    /// The overlapping region, relative to the start of the request.
    pub subset_in_request: ArraySubset,
    /// The overlapping region, relative to the origin of the chunk.
    pub subset_in_chunk: ArraySubset,
    /// True if the overlap covers the full default chunk shape.
    pub complete: bool,
}

impl ChunkGrid {
    /// Create a new chunk grid.
    ///
    /// `array_shape` and `chunk_shape` must have the same dimensionality and
    /// every chunk shape component must be non-zero and no larger than the
    /// array shape component (guaranteed by metadata validation).
    #[must_use]
    pub fn new(array_shape: ArrayShape, chunk_shape: ArrayShape) -> Self {
        debug_assert_eq!(array_shape.len(), chunk_shape.len());
        let grid_shape: ArrayShape = std::iter::zip(&array_shape, &chunk_shape)
            .map(|(array_size, chunk_size)| array_size.div_ceil(*chunk_size))
            .collect();
        let num_chunks = grid_shape.iter().product();
        let grid_strides = crate::array_subset::c_order_strides(&grid_shape);
        Self {
            array_shape,
            chunk_shape,
            grid_shape,
            grid_strides,
            num_chunks,
        }
    }

    /// Return the array shape.
    #[must_use]
    pub fn array_shape(&self) -> &[u64] {
        &self.array_shape
    }

    /// Return the default chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the number of chunks per dimension.
    #[must_use]
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    /// Return the total number of chunks.
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.array_shape.len()
    }

    /// Return true if `chunk_indices` addresses a chunk within the grid.
    #[must_use]
    pub fn in_bounds(&self, chunk_indices: &[u64]) -> bool {
        chunk_indices.len() == self.dimensionality()
            && std::iter::zip(chunk_indices, &self.grid_shape)
                .all(|(index, grid_size)| index < grid_size)
    }

    /// Decode a linear chunk index into grid coordinates (row-major).
    #[must_use]
    pub fn chunk_index_to_indices(&self, chunk_index: u64) -> ArrayIndices {
        let mut remainder = chunk_index;
        self.grid_strides
            .iter()
            .map(|stride| {
                let index = remainder / stride;
                remainder -= index * stride;
                index
            })
            .collect()
    }

    /// Encode grid coordinates into a linear chunk index (row-major).
    #[must_use]
    pub fn chunk_indices_to_index(&self, chunk_indices: &[u64]) -> u64 {
        std::iter::zip(chunk_indices, &self.grid_strides)
            .map(|(index, stride)| index * stride)
            .sum()
    }

    /// Return the origin of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_origin(&self, chunk_indices: &[u64]) -> ArrayIndices {
        std::iter::zip(chunk_indices, &self.chunk_shape)
            .map(|(index, chunk_size)| index * chunk_size)
            .collect()
    }

    /// Return the bounded shape of the chunk at `chunk_indices`, clipped to the array boundary.
    #[must_use]
    pub fn chunk_shape_bounded(&self, chunk_indices: &[u64]) -> ArrayShape {
        izip!(chunk_indices, &self.chunk_shape, &self.array_shape)
            .map(|(index, chunk_size, array_size)| {
                std::cmp::min(*chunk_size, array_size - index * chunk_size)
            })
            .collect()
    }

    /// Return the extent of the chunk at `chunk_indices` as an array subset (origin, bounded shape).
    #[must_use]
    pub fn chunk_subset_bounded(&self, chunk_indices: &[u64]) -> ArraySubset {
        ArraySubset::new_with_start_shape(
            self.chunk_origin(chunk_indices),
            self.chunk_shape_bounded(chunk_indices),
        )
        .expect("origin and bounded shape have the grid dimensionality")
    }

    /// Return an iterator over the grid coordinates of the chunks overlapping
    /// `subset`, in C order.
    ///
    /// `subset` must be within the array bounds.
    #[must_use]
    pub fn chunks_in_subset(&self, subset: &ArraySubset) -> ChunksIterator {
        debug_assert_eq!(subset.dimensionality(), self.dimensionality());
        ChunksIterator::new(subset, &self.chunk_shape)
    }

    /// Compute the overlap of the chunk at `chunk_indices` with the request `subset`.
    ///
    /// `complete` is true iff the overlap covers the full default chunk shape,
    /// which can only hold for chunks that are not clipped by the array
    /// boundary.
    #[must_use]
    pub fn overlap(&self, chunk_indices: &[u64], subset: &ArraySubset) -> ChunkOverlap {
        let chunk_extent = self.chunk_subset_bounded(chunk_indices);
        let overlap = subset
            .overlap(&chunk_extent)
            .expect("chunk extent has the grid dimensionality");
        let complete = overlap.shape() == self.chunk_shape.as_slice();
        let subset_in_request = overlap
            .relative_to(subset.start())
            .expect("overlap has the grid dimensionality");
        let subset_in_chunk = overlap
            .relative_to(chunk_extent.start())
            .expect("overlap has the grid dimensionality");
        ChunkOverlap {
            subset_in_request,
            subset_in_chunk,
            complete,
        }
    }
}
