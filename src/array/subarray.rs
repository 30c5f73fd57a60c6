//! The subarray engine.
//!
//! Subarray reads and writes decompose a region of interest into the chunks
//! it overlaps and process each chunk independently, on the caller's thread or
//! on a worker pool. Each worker owns one reusable chunk buffer; chunks are
//! never shared between workers, so no locking is required. There are no
//! ordering guarantees between chunks, and concurrent subarray calls must
//! target chunk-disjoint regions.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    array_subset::{copy_region, fill_region, ArraySubset},
    metadata::DataFormat,
};

use super::{ArrayError, ArrayIndices, ArrayShape, ChunkOverlap, Dataset, Element};

/// Overwrite `bytes` with repetitions of `element`.
fn fill_with_element(bytes: &mut [u8], element: &[u8]) {
    for target in bytes.chunks_exact_mut(element.len()) {
        target.copy_from_slice(element);
    }
}

/// The caller's request buffer, shared across chunk workers during a read.
///
/// The chunk decomposition assigns every chunk a disjoint region of the
/// request, so workers can land their regions through a shared pointer
/// without locking.
struct RequestBuffer<'a> {
    bytes: *mut u8,
    len: usize,
    shape: &'a [u64],
    element_size: usize,
}

// writers target disjoint regions of the request (see `new`)
unsafe impl Send for RequestBuffer<'_> {}
unsafe impl Sync for RequestBuffer<'_> {}

impl<'a> RequestBuffer<'a> {
    /// Wrap the output buffer of a request shaped `shape`.
    fn new(out: &'a mut [u8], shape: &'a [u64], element_size: usize) -> Self {
        debug_assert_eq!(
            out.len() as u64,
            shape.iter().product::<u64>() * element_size as u64
        );
        Self {
            bytes: out.as_mut_ptr(),
            len: out.len(),
            shape,
            element_size,
        }
    }

    /// Land the overlapping region of a decoded chunk in the request.
    ///
    /// # Safety
    /// Concurrent callers must hold overlaps of distinct chunks, so that the
    /// written regions are disjoint.
    unsafe fn land_chunk(&self, chunk: &[u8], chunk_shape: &[u64], overlap: &ChunkOverlap) {
        let out = std::slice::from_raw_parts_mut(self.bytes, self.len);
        copy_region(
            chunk,
            chunk_shape,
            overlap.subset_in_chunk.start(),
            out,
            self.shape,
            overlap.subset_in_request.start(),
            overlap.subset_in_request.shape(),
            self.element_size,
        );
    }

    /// Fill the region of an absent chunk with the fill value.
    ///
    /// # Safety
    /// As for [`land_chunk`](Self::land_chunk).
    unsafe fn land_fill(&self, region: &ArraySubset, fill_value: &[u8]) {
        let out = std::slice::from_raw_parts_mut(self.bytes, self.len);
        fill_region(out, self.shape, region, fill_value);
    }
}

impl Dataset {
    fn check_subset(&self, subset: &ArraySubset) -> Result<(), ArrayError> {
        if !subset.inbounds(self.shape()) {
            return Err(ArrayError::InvalidSubset(
                subset.clone(),
                self.shape().to_vec(),
            ));
        }
        if subset.is_empty() {
            return Err(ArrayError::EmptySubset(subset.clone()));
        }
        Ok(())
    }

    fn check_subset_buffer(&self, len: usize, subset: &ArraySubset) -> Result<(), ArrayError> {
        let element_size = self.data_type().size() as u64;
        if len as u64 != subset.num_elements() * element_size {
            return Err(ArrayError::InvalidBufferLength(
                len as u64 / element_size,
                subset.num_elements(),
            ));
        }
        Ok(())
    }

    /// The in-memory shape of a chunk buffer: Zarr chunks always materialise
    /// at the default chunk shape, N5 chunks at the bounded shape.
    fn chunk_buffer_shape(&self, chunk_indices: &[u64]) -> ArrayShape {
        match self.format() {
            DataFormat::Zarr => self.chunk_shape().to_vec(),
            DataFormat::N5 => self.chunk_grid().chunk_shape_bounded(chunk_indices),
        }
    }

    /// Run `process` over `chunks`, sequentially or on a pool of `threads`
    /// workers with one reusable buffer per worker.
    fn for_each_chunk_buffered<F>(
        &self,
        chunks: Vec<ArrayIndices>,
        threads: usize,
        process: F,
    ) -> Result<(), ArrayError>
    where
        F: Fn(&mut Vec<u8>, &[u64]) -> Result<(), ArrayError> + Send + Sync,
    {
        if threads <= 1 {
            let mut buffer = Vec::new();
            for chunk_indices in &chunks {
                process(&mut buffer, chunk_indices)?;
            }
            Ok(())
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|err| ArrayError::ThreadPool(err.to_string()))?;
            pool.install(|| {
                chunks
                    .into_par_iter()
                    .try_for_each_init(Vec::new, |buffer, chunk_indices| {
                        process(buffer, &chunk_indices)
                    })
            })
        }
    }

    /// Read the subset `subset` of the dataset into `out`.
    ///
    /// `out` is a contiguous C-order buffer shaped like the subset. Chunks
    /// absent from storage contribute the fill value.
    ///
    /// # Errors
    /// Returns [`ArrayError`] on a type, shape, codec, or storage failure. A
    /// failing chunk fails the whole call.
    pub fn retrieve_array_subset<T: Element>(
        &self,
        out: &mut [T],
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<(), ArrayError> {
        self.check_data_type::<T>()?;
        self.retrieve_array_subset_bytes(bytemuck::cast_slice_mut(out), subset, threads)
    }

    /// Read the subset `subset` into a native-endian byte buffer.
    ///
    /// # Errors
    /// See [`retrieve_array_subset`](Self::retrieve_array_subset).
    pub fn retrieve_array_subset_bytes(
        &self,
        out: &mut [u8],
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<(), ArrayError> {
        self.check_subset(subset)?;
        self.check_subset_buffer(out.len(), subset)?;
        let element_size = self.data_type().size();
        let chunks: Vec<ArrayIndices> = self.chunk_grid().chunks_in_subset(subset).collect();
        let request = RequestBuffer::new(out, subset.shape(), element_size);
        self.for_each_chunk_buffered(chunks, threads, |buffer, chunk_indices| {
            let overlap = self.chunk_grid().overlap(chunk_indices, subset);
            let buffer_shape = self.chunk_buffer_shape(chunk_indices);
            let num_bytes =
                usize::try_from(buffer_shape.iter().product::<u64>()).unwrap() * element_size;
            buffer.clear();
            buffer.resize(num_bytes, 0);
            let found = self.retrieve_chunk_bytes_into(chunk_indices, buffer)?;
            // each chunk lands in its own region of the request
            if found {
                unsafe { request.land_chunk(buffer, &buffer_shape, &overlap) };
            } else {
                unsafe {
                    request.land_fill(&overlap.subset_in_request, self.fill_value().as_ne_bytes());
                }
            }
            Ok(())
        })
    }

    /// Read the subset `subset` of the dataset into a new buffer.
    ///
    /// # Errors
    /// See [`retrieve_array_subset`](Self::retrieve_array_subset).
    pub fn retrieve_array_subset_vec<T: Element>(
        &self,
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<Vec<T>, ArrayError> {
        self.check_data_type::<T>()?;
        self.check_subset(subset)?;
        let mut out = vec![self.fill_value().to_element::<T>(); subset.num_elements_usize()];
        self.retrieve_array_subset(&mut out, subset, threads)?;
        Ok(out)
    }

    /// Write `data` into the subset `subset` of the dataset.
    ///
    /// `data` is a contiguous C-order buffer shaped like the subset. Chunks
    /// that are only partially covered are read, modified, and written back;
    /// missing chunks are initialised with the fill value first. Chunks that
    /// become entirely fill are deleted from storage.
    ///
    /// # Errors
    /// Returns [`ArrayError`] on a type, shape, codec, or storage failure.
    /// Chunks written before a failure remain written.
    pub fn store_array_subset<T: Element>(
        &self,
        data: &[T],
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<(), ArrayError> {
        self.check_data_type::<T>()?;
        self.store_array_subset_bytes(bytemuck::cast_slice(data), subset, threads)
    }

    /// Write a native-endian byte buffer into the subset `subset`.
    ///
    /// # Errors
    /// See [`store_array_subset`](Self::store_array_subset).
    pub fn store_array_subset_bytes(
        &self,
        data: &[u8],
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<(), ArrayError> {
        self.check_subset(subset)?;
        self.check_subset_buffer(data.len(), subset)?;
        let element_size = self.data_type().size();
        let chunks: Vec<ArrayIndices> = self.chunk_grid().chunks_in_subset(subset).collect();
        self.for_each_chunk_buffered(chunks, threads, |buffer, chunk_indices| {
            let overlap = self.chunk_grid().overlap(chunk_indices, subset);
            let buffer_shape = self.chunk_buffer_shape(chunk_indices);
            let num_bytes =
                usize::try_from(buffer_shape.iter().product::<u64>()).unwrap() * element_size;
            buffer.clear();
            buffer.resize(num_bytes, 0);
            // a write covers a whole stored chunk only if the overlap spans the
            // default chunk shape; Zarr edge chunks are stored at the default
            // shape, so they always take the read-modify-write path
            let whole = overlap.complete
                && self.chunk_stored_num_elements(chunk_indices) == self.max_chunk_num_elements();
            if !whole {
                let found = self.retrieve_chunk_bytes_into(chunk_indices, buffer)?;
                if !found {
                    fill_with_element(buffer, self.fill_value().as_ne_bytes());
                }
            }
            copy_region(
                data,
                subset.shape(),
                overlap.subset_in_request.start(),
                buffer,
                &buffer_shape,
                overlap.subset_in_chunk.start(),
                overlap.subset_in_request.shape(),
                element_size,
            );
            self.store_chunk_bytes(chunk_indices, buffer)
        })
    }

    /// Broadcast a scalar into the subset `subset` of the dataset.
    ///
    /// Equivalent to writing a buffer filled with `value`, without
    /// materialising it.
    ///
    /// # Errors
    /// See [`store_array_subset`](Self::store_array_subset).
    pub fn store_array_subset_scalar<T: Element>(
        &self,
        value: T,
        subset: &ArraySubset,
        threads: usize,
    ) -> Result<(), ArrayError> {
        self.check_data_type::<T>()?;
        self.check_subset(subset)?;
        let element_size = self.data_type().size();
        let value_bytes = bytemuck::bytes_of(&value).to_vec();
        let chunks: Vec<ArrayIndices> = self.chunk_grid().chunks_in_subset(subset).collect();
        self.for_each_chunk_buffered(chunks, threads, |buffer, chunk_indices| {
            let overlap = self.chunk_grid().overlap(chunk_indices, subset);
            let buffer_shape = self.chunk_buffer_shape(chunk_indices);
            let num_bytes =
                usize::try_from(buffer_shape.iter().product::<u64>()).unwrap() * element_size;
            buffer.clear();
            buffer.resize(num_bytes, 0);
            let whole = overlap.complete
                && self.chunk_stored_num_elements(chunk_indices) == self.max_chunk_num_elements();
            if whole {
                fill_with_element(buffer, &value_bytes);
            } else {
                let found = self.retrieve_chunk_bytes_into(chunk_indices, buffer)?;
                if !found {
                    fill_with_element(buffer, self.fill_value().as_ne_bytes());
                }
                fill_region(buffer, &buffer_shape, &overlap.subset_in_chunk, &value_bytes);
            }
            self.store_chunk_bytes(chunk_indices, buffer)
        })
    }
}
