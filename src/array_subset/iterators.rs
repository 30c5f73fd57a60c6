//! Iterators over array subsets.
//!
//! [`IndicesIterator`] yields the coordinates of every element of a subset in
//! C order. [`ChunksIterator`] yields the grid coordinates of every chunk of a
//! regular chunking that overlaps a subset, also in C order.

use crate::array::ArrayIndices;

use super::ArraySubset;

/// An iterator over the coordinates of an array subset, fastest-varying axis
/// last.
pub struct IndicesIterator {
    subset: ArraySubset,
    next: Option<ArrayIndices>,
}

impl IndicesIterator {
    pub(crate) fn new(subset: ArraySubset) -> Self {
        let next = (!subset.is_empty()).then(|| subset.start().to_vec());
        Self { subset, next }
    }
}

impl Iterator for IndicesIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut next = current.clone();
        let mut carry = true;
        for d in (0..next.len()).rev() {
            next[d] += 1;
            if next[d] < self.subset.start()[d] + self.subset.shape()[d] {
                carry = false;
                break;
            }
            next[d] = self.subset.start()[d];
        }
        if !carry {
            self.next = Some(next);
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.next {
            Some(_) => {
                // remaining count is not tracked, only an upper bound
                let upper = self.subset.num_elements_usize();
                (1, Some(upper))
            }
            None => (0, Some(0)),
        }
    }
}

/// An iterator over the grid coordinates of the chunks overlapping an array
/// subset.
pub struct ChunksIterator {
    inner: IndicesIterator,
}

impl ChunksIterator {
    pub(crate) fn new(subset: &ArraySubset, chunk_shape: &[u64]) -> Self {
        debug_assert_eq!(subset.dimensionality(), chunk_shape.len());
        let grid_subset = if subset.is_empty() {
            ArraySubset::new_with_shape(vec![0; subset.dimensionality()])
        } else {
            let first: ArrayIndices = std::iter::zip(subset.start(), chunk_shape)
                .map(|(start, chunk_size)| start / chunk_size)
                .collect();
            let shape: Vec<u64> =
                itertools::izip!(subset.start(), subset.shape(), chunk_shape, &first)
                    .map(|(start, size, chunk_size, first)| {
                        (start + size - 1) / chunk_size - first + 1
                    })
                    .collect();
            ArraySubset::new_with_start_shape(first, shape)
                .expect("first and shape have the subset dimensionality")
        };
        Self {
            inner: IndicesIterator::new(grid_subset),
        }
    }
}

impl Iterator for ChunksIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
