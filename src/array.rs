//! Datasets.
//!
//! A dataset is an N-dimensional array persisted as a directory of chunk
//! blobs plus a metadata document. The [`Dataset`] object is dtype-erased; the
//! typed API dispatches on the runtime data type tag. All coordinates and
//! shapes are in C order (fastest-varying axis last) regardless of the format
//! dialect; the metadata codec and the chunk blob framing perform the axis
//! reversal required by N5.
//!
//! A new dataset is created with a [`DatasetBuilder`]; an existing dataset is
//! opened with [`Dataset::open`]. Chunks are written on the first non-fill
//! write and deleted again when a write makes them all-fill.

pub mod chunk_grid;
pub mod codec;
pub mod data_type;

mod chunk_io;
mod element;
mod endianness;
mod fill_value;
mod subarray;

use std::borrow::Cow;

use thiserror::Error;

pub use self::{
    chunk_grid::{ChunkGrid, ChunkOverlap},
    codec::{BloscCompressor, BloscShuffleMode, CodecError, Compression},
    data_type::{DataType, IncompatibleFillValueError, UnsupportedDataTypeError},
    element::Element,
    endianness::{Endianness, NATIVE_ENDIAN},
    fill_value::FillValue,
};

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    hierarchy::Group,
    metadata::{DataFormat, DatasetMetadata, FillValueMetadata, MetadataError},
    storage::{DatasetHandle, StorageError},
};

use chunk_io::{decode_header, encode_header};
use endianness::reverse_endianness;

/// An N-dimensional index of an element or chunk.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// A dataset error.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// A metadata error.
    #[error(transparent)]
    MetadataError(#[from] MetadataError),
    /// Chunk indices outside the chunk grid.
    #[error("chunk indices {0:?} are out of range for grid shape {1:?}")]
    InvalidChunkIndices(ArrayIndices, ArrayShape),
    /// A request that is incompatible with the array shape.
    #[error("subset {0} is not compatible with an array of shape {1:?}")]
    InvalidSubset(ArraySubset, ArrayShape),
    /// A request with a zero-sized axis.
    #[error("subset {0} has a zero-sized axis")]
    EmptySubset(ArraySubset),
    /// An incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// The element type of the caller does not match the dataset.
    #[error("element type {0} does not match the dataset data type {1}")]
    IncompatibleDataType(DataType, DataType),
    /// A caller buffer with the wrong number of elements.
    #[error("buffer holds {0} elements, expected {1}")]
    InvalidBufferLength(u64, u64),
    /// Varlength chunks in a Zarr dataset.
    #[error("varlength chunks are not supported in the zarr format")]
    VarlenUnsupported,
    /// A varlength chunk read through the typed interface.
    #[error("chunk {0:?} is a varlength chunk and cannot be read as a typed array")]
    VarlenChunk(ArrayIndices),
    /// A malformed chunk blob header.
    #[error("invalid chunk header: {0}")]
    InvalidChunkHeader(String),
    /// A chunk blob whose stored size disagrees with the request.
    #[error("chunk blob holds {0} elements, expected {1}")]
    UnexpectedChunkSize(u64, u64),
    /// The worker pool could not be constructed.
    #[error("failed to build the worker pool: {0}")]
    ThreadPool(String),
}

/// A chunked, compressed, N-dimensional dataset.
#[derive(Debug)]
pub struct Dataset {
    handle: DatasetHandle,
    metadata: DatasetMetadata,
    fill_value: FillValue,
    chunk_grid: ChunkGrid,
}

impl Dataset {
    fn from_parts(handle: DatasetHandle, metadata: DatasetMetadata) -> Result<Self, ArrayError> {
        let fill_value = metadata
            .data_type
            .fill_value_from_metadata(&metadata.fill_value)
            .map_err(MetadataError::from)?;
        let chunk_grid = ChunkGrid::new(metadata.shape.clone(), metadata.chunk_shape.clone());
        Ok(Self {
            handle,
            metadata,
            fill_value,
            chunk_grid,
        })
    }

    /// Open the existing dataset `key` under `parent`.
    ///
    /// The format dialect is inferred from the metadata document present in
    /// the dataset directory.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if the dataset does not exist or its metadata is
    /// malformed.
    pub fn open(parent: &Group, key: &str) -> Result<Self, ArrayError> {
        Self::open_at(parent.handle().child_dataset(key))
    }

    /// Open the existing dataset at `handle`.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if the dataset does not exist or its metadata is
    /// malformed.
    pub fn open_at(handle: DatasetHandle) -> Result<Self, ArrayError> {
        let format = handle.format().map_err(ArrayError::StorageError)?;
        let document = std::fs::read_to_string(handle.metadata_path(format))
            .map_err(StorageError::from)?;
        let value: serde_json::Value =
            serde_json::from_str(&document).map_err(MetadataError::from)?;
        let metadata = DatasetMetadata::from_json(&value, format)?;
        Self::from_parts(handle, metadata)
    }

    /// Create a new dataset at `handle` with `metadata`.
    ///
    /// # Errors
    /// - [`StorageError::PermissionDenied`] if the access mode forbids creation.
    /// - [`StorageError::AlreadyExists`] if the dataset directory exists.
    pub(crate) fn create_at(
        handle: DatasetHandle,
        metadata: DatasetMetadata,
    ) -> Result<Self, ArrayError> {
        if !handle.mode().can_create() {
            return Err(StorageError::PermissionDenied(handle.mode(), "create").into());
        }
        if handle.exists() {
            return Err(StorageError::AlreadyExists(handle.path().to_path_buf()).into());
        }
        handle.create_dir()?;
        let document = serde_json::to_string_pretty(&metadata.to_json())
            .map_err(MetadataError::from)?;
        std::fs::write(handle.metadata_path(metadata.format), document)
            .map_err(StorageError::from)?;
        Self::from_parts(handle, metadata)
    }

    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    /// Return the default chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.metadata.chunk_shape
    }

    /// Return the dimensionality of the dataset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.metadata.shape.len()
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.metadata.data_type
    }

    /// Return the format dialect.
    #[must_use]
    pub fn format(&self) -> DataFormat {
        self.metadata.format
    }

    /// Return the compression configuration.
    #[must_use]
    pub fn compression(&self) -> &Compression {
        &self.metadata.compression
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Return the chunk grid.
    #[must_use]
    pub fn chunk_grid(&self) -> &ChunkGrid {
        &self.chunk_grid
    }

    /// Return the metadata.
    #[must_use]
    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Return the dataset handle.
    #[must_use]
    pub fn handle(&self) -> &DatasetHandle {
        &self.handle
    }

    /// Return the number of elements of the default chunk shape.
    #[must_use]
    pub fn max_chunk_num_elements(&self) -> u64 {
        self.metadata.chunk_shape.iter().product()
    }

    /// Return the number of elements stored for the chunk at `chunk_indices`.
    ///
    /// Zarr chunks are always stored at the default chunk shape, padded with
    /// the fill value at the array boundary; N5 edge chunks are clipped.
    #[must_use]
    pub fn chunk_stored_num_elements(&self, chunk_indices: &[u64]) -> u64 {
        match self.metadata.format {
            DataFormat::Zarr => self.max_chunk_num_elements(),
            DataFormat::N5 => self.chunk_grid.chunk_shape_bounded(chunk_indices).iter().product(),
        }
    }

    /// Return the endianness of stored multi-byte elements.
    #[must_use]
    pub fn stored_endianness(&self) -> Endianness {
        match self.metadata.format {
            DataFormat::Zarr => Endianness::Little,
            DataFormat::N5 => Endianness::Big,
        }
    }

    fn check_chunk_indices(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        if self.chunk_grid.in_bounds(chunk_indices) {
            Ok(())
        } else {
            Err(ArrayError::InvalidChunkIndices(
                chunk_indices.to_vec(),
                self.chunk_grid.grid_shape().to_vec(),
            ))
        }
    }

    pub(crate) fn check_data_type<T: Element>(&self) -> Result<(), ArrayError> {
        if T::DATA_TYPE == self.metadata.data_type {
            Ok(())
        } else {
            Err(ArrayError::IncompatibleDataType(
                T::DATA_TYPE,
                self.metadata.data_type,
            ))
        }
    }

    fn check_writable(&self) -> Result<(), ArrayError> {
        if self.handle.mode().can_write() {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied(self.handle.mode(), "write").into())
        }
    }

    fn chunk_handle(&self, chunk_indices: &[u64]) -> crate::storage::ChunkHandle {
        self.handle.chunk(chunk_indices, self.metadata.format)
    }

    /// Return true if the chunk at `chunk_indices` exists on disk.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkIndices`] if the indices are out of range.
    pub fn chunk_exists(&self, chunk_indices: &[u64]) -> Result<bool, ArrayError> {
        self.check_chunk_indices(chunk_indices)?;
        Ok(self.chunk_handle(chunk_indices).exists())
    }

    /// Compress native-endian chunk bytes into the stored payload.
    fn compress_payload<'a>(
        &self,
        bytes: &'a [u8],
        element_size: usize,
    ) -> Result<Cow<'a, [u8]>, ArrayError> {
        let swapped: Cow<[u8]> =
            if element_size > 1 && !self.stored_endianness().is_native() {
                let mut bytes = bytes.to_vec();
                reverse_endianness(&mut bytes, element_size);
                Cow::Owned(bytes)
            } else {
                Cow::Borrowed(bytes)
            };
        if self.metadata.compression.is_raw() {
            Ok(swapped)
        } else {
            Ok(Cow::Owned(
                self.metadata.compression.encode(&swapped, element_size)?,
            ))
        }
    }

    /// Encode a typed chunk into the exact on-disk blob representation,
    /// without writing it.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if the element type, the chunk indices, or the
    /// buffer length do not match the dataset.
    pub fn chunk_to_blob<T: Element>(
        &self,
        chunk_indices: &[u64],
        data: &[T],
    ) -> Result<Vec<u8>, ArrayError> {
        self.check_data_type::<T>()?;
        self.check_chunk_indices(chunk_indices)?;
        let expected = self.chunk_stored_num_elements(chunk_indices);
        if data.len() as u64 != expected {
            return Err(ArrayError::InvalidBufferLength(data.len() as u64, expected));
        }
        let element_size = self.metadata.data_type.size();
        let payload = self.compress_payload(bytemuck::cast_slice(data), element_size)?;
        let mut blob = match self.metadata.format {
            DataFormat::Zarr => Vec::with_capacity(payload.len()),
            DataFormat::N5 => {
                encode_header(&self.chunk_grid.chunk_shape_bounded(chunk_indices), None)
            }
        };
        blob.extend_from_slice(&payload);
        Ok(blob)
    }

    /// Store a typed chunk.
    ///
    /// `data` must hold exactly [`chunk_stored_num_elements`](Self::chunk_stored_num_elements)
    /// elements. A chunk that is entirely the fill value is elided: any
    /// existing blob is deleted and nothing is written.
    ///
    /// # Errors
    /// Returns [`ArrayError`] on a type, shape, codec, or storage failure.
    pub fn store_chunk<T: Element>(
        &self,
        chunk_indices: &[u64],
        data: &[T],
    ) -> Result<(), ArrayError> {
        self.check_data_type::<T>()?;
        self.store_chunk_bytes(chunk_indices, bytemuck::cast_slice(data))
    }

    /// Store a chunk from its native-endian byte representation.
    ///
    /// # Errors
    /// Returns [`ArrayError`] on a shape, codec, or storage failure.
    pub fn store_chunk_bytes(
        &self,
        chunk_indices: &[u64],
        bytes: &[u8],
    ) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.check_chunk_indices(chunk_indices)?;
        let element_size = self.metadata.data_type.size();
        let expected = self.chunk_stored_num_elements(chunk_indices);
        if bytes.len() as u64 != expected * element_size as u64 {
            return Err(ArrayError::InvalidBufferLength(
                bytes.len() as u64 / element_size as u64,
                expected,
            ));
        }

        // an all-fill chunk is not materialised
        if self.fill_value.equals_all(bytes) {
            self.chunk_handle(chunk_indices).remove()?;
            return Ok(());
        }

        let payload = self.compress_payload(bytes, element_size)?;
        let handle = self.chunk_handle(chunk_indices);
        match self.metadata.format {
            DataFormat::Zarr => handle.write(&payload)?,
            DataFormat::N5 => {
                let mut blob =
                    encode_header(&self.chunk_grid.chunk_shape_bounded(chunk_indices), None);
                blob.extend_from_slice(&payload);
                handle.write(&blob)?;
            }
        }
        Ok(())
    }

    /// Store a varlength chunk (N5 only).
    ///
    /// The payload must hold `num_elements` elements of the dataset data type;
    /// it is treated as an opaque sequence and is not checked against the fill
    /// value.
    ///
    /// # Errors
    /// Returns [`ArrayError::VarlenUnsupported`] for Zarr datasets.
    pub fn store_chunk_varlen(
        &self,
        chunk_indices: &[u64],
        bytes: &[u8],
        num_elements: u64,
    ) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.check_chunk_indices(chunk_indices)?;
        if self.metadata.format.is_zarr() {
            return Err(ArrayError::VarlenUnsupported);
        }
        let element_size = self.metadata.data_type.size();
        if bytes.len() as u64 != num_elements * element_size as u64 {
            return Err(ArrayError::InvalidBufferLength(
                bytes.len() as u64 / element_size as u64,
                num_elements,
            ));
        }
        let payload = self.compress_payload(bytes, element_size)?;
        let mut blob = encode_header(
            &self.chunk_grid.chunk_shape_bounded(chunk_indices),
            Some(num_elements),
        );
        blob.extend_from_slice(&payload);
        self.chunk_handle(chunk_indices).write(&blob)?;
        Ok(())
    }

    /// Read a typed chunk into `out`.
    ///
    /// Returns false and leaves `out` untouched if the chunk does not exist;
    /// the caller substitutes the fill value. `out` must hold exactly
    /// [`chunk_stored_num_elements`](Self::chunk_stored_num_elements) elements.
    ///
    /// # Errors
    /// Returns [`ArrayError`] on a type, shape, codec, or storage failure, and
    /// [`ArrayError::VarlenChunk`] if the stored chunk is varlength.
    pub fn retrieve_chunk_into<T: Element>(
        &self,
        chunk_indices: &[u64],
        out: &mut [T],
    ) -> Result<bool, ArrayError> {
        self.check_data_type::<T>()?;
        self.retrieve_chunk_bytes_into(chunk_indices, bytemuck::cast_slice_mut(out))
    }

    /// Read a chunk into a native-endian byte buffer.
    ///
    /// # Errors
    /// See [`retrieve_chunk_into`](Self::retrieve_chunk_into).
    pub fn retrieve_chunk_bytes_into(
        &self,
        chunk_indices: &[u64],
        out: &mut [u8],
    ) -> Result<bool, ArrayError> {
        self.check_chunk_indices(chunk_indices)?;
        let Some(blob) = self.chunk_handle(chunk_indices).read()? else {
            return Ok(false);
        };
        let element_size = self.metadata.data_type.size();
        let (payload, stored_elements) = match self.metadata.format {
            DataFormat::Zarr => (blob.as_slice(), self.max_chunk_num_elements()),
            DataFormat::N5 => {
                let (header, offset) = decode_header(&blob)?;
                if header.num_elements.is_some() {
                    return Err(ArrayError::VarlenChunk(chunk_indices.to_vec()));
                }
                (&blob[offset..], header.payload_elements())
            }
        };
        if out.len() as u64 != stored_elements * element_size as u64 {
            return Err(ArrayError::UnexpectedChunkSize(
                stored_elements,
                out.len() as u64 / element_size as u64,
            ));
        }
        self.metadata.compression.decode(payload, out)?;
        if element_size > 1 && !self.stored_endianness().is_native() {
            reverse_endianness(out, element_size);
        }
        Ok(true)
    }

    /// Read a typed chunk, substituting the fill value if it does not exist.
    ///
    /// # Errors
    /// See [`retrieve_chunk_into`](Self::retrieve_chunk_into).
    pub fn retrieve_chunk<T: Element>(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Vec<T>, ArrayError> {
        self.check_data_type::<T>()?;
        self.check_chunk_indices(chunk_indices)?;
        let num_elements = usize::try_from(self.chunk_stored_num_elements(chunk_indices))
            .expect("chunk size fits usize");
        let mut out = vec![self.fill_value.to_element::<T>(); num_elements];
        self.retrieve_chunk_into(chunk_indices, &mut out)?;
        Ok(out)
    }

    /// Read a typed chunk, or [`None`] if it does not exist.
    ///
    /// # Errors
    /// See [`retrieve_chunk_into`](Self::retrieve_chunk_into).
    pub fn retrieve_chunk_if_exists<T: Element>(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<Vec<T>>, ArrayError> {
        self.check_data_type::<T>()?;
        self.check_chunk_indices(chunk_indices)?;
        let num_elements = usize::try_from(self.chunk_stored_num_elements(chunk_indices))
            .expect("chunk size fits usize");
        let mut out = vec![self.fill_value.to_element::<T>(); num_elements];
        Ok(self
            .retrieve_chunk_into(chunk_indices, &mut out)?
            .then_some(out))
    }

    /// Read a varlength chunk as an opaque byte payload and its element count.
    ///
    /// Returns [`None`] if the chunk does not exist. Default-mode chunks read
    /// back with their stored element count.
    ///
    /// # Errors
    /// Returns [`ArrayError::VarlenUnsupported`] for Zarr datasets.
    pub fn retrieve_chunk_varlen(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<(Vec<u8>, u64)>, ArrayError> {
        self.check_chunk_indices(chunk_indices)?;
        if self.metadata.format.is_zarr() {
            return Err(ArrayError::VarlenUnsupported);
        }
        let Some(blob) = self.chunk_handle(chunk_indices).read()? else {
            return Ok(None);
        };
        let (header, offset) = decode_header(&blob)?;
        let element_size = self.metadata.data_type.size();
        let num_elements = header.payload_elements();
        let num_bytes = usize::try_from(num_elements * element_size as u64)
            .expect("payload size fits usize");
        let mut out = vec![0u8; num_bytes];
        self.metadata.compression.decode(&blob[offset..], &mut out)?;
        if element_size > 1 && !self.stored_endianness().is_native() {
            reverse_endianness(&mut out, element_size);
        }
        Ok(Some((out, num_elements)))
    }

    /// Delete the chunk blob at `chunk_indices` if it exists.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if the indices are out of range or the mode
    /// forbids writing.
    pub fn remove_chunk(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.check_chunk_indices(chunk_indices)?;
        self.chunk_handle(chunk_indices).remove()?;
        Ok(())
    }
}

/// A [`Dataset`] builder.
///
/// The builder is initialised from an array shape, data type, and chunk shape.
/// Compression defaults to raw and the fill value to zero; change them with
/// the builder methods, then create the dataset under a group with
/// [`build`](DatasetBuilder::build).
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use zarrn5::array::{codec::Compression, DataType, DatasetBuilder};
/// use zarrn5::hierarchy::File;
/// use zarrn5::metadata::DataFormat;
///
/// let file = File::create("data.zarr", DataFormat::Zarr, "a".parse()?)?;
/// let dataset = DatasetBuilder::new(vec![100, 100], DataType::Float32, vec![10, 10])
///     .compression(Compression::Zlib { level: 5, zlib_framing: true })
///     .fill_value(42.0)
///     .build(&file, "temperatures")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DatasetBuilder {
    shape: ArrayShape,
    data_type: DataType,
    chunk_shape: ArrayShape,
    compression: Compression,
    fill_value: FillValueMetadata,
}

impl DatasetBuilder {
    /// Create a new dataset builder.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType, chunk_shape: ArrayShape) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape,
            compression: Compression::Raw,
            fill_value: FillValueMetadata::Null,
        }
    }

    /// Set the compression configuration.
    pub fn compression(&mut self, compression: Compression) -> &mut Self {
        self.compression = compression;
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: impl Into<FillValueMetadata>) -> &mut Self {
        self.fill_value = fill_value.into();
        self
    }

    /// Create the dataset `key` under `parent`, in the format of `parent`.
    ///
    /// # Errors
    /// Returns [`ArrayError`] if the dataset already exists, the access mode
    /// forbids creation, or the configuration is invalid for the format.
    pub fn build(&self, parent: &Group, key: &str) -> Result<Dataset, ArrayError> {
        self.build_at(parent.handle().child_dataset(key), parent.format())
    }

    /// Create the dataset at `handle` with format `format`.
    ///
    /// # Errors
    /// See [`build`](DatasetBuilder::build).
    pub fn build_at(
        &self,
        handle: DatasetHandle,
        format: DataFormat,
    ) -> Result<Dataset, ArrayError> {
        let metadata = DatasetMetadata::new(
            self.data_type,
            self.shape.clone(),
            self.chunk_shape.clone(),
            format,
            self.compression.clone(),
            self.fill_value.clone(),
        )?;
        Dataset::create_at(handle, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::File;
    use crate::storage::AccessMode;

    fn make_file(dir: &std::path::Path, format: DataFormat) -> File {
        File::create(dir.join("data"), format, AccessMode::Append).unwrap()
    }

    #[test]
    fn chunk_round_trip_zarr() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::Zarr);
        let dataset = DatasetBuilder::new(vec![8, 8], DataType::Int32, vec![4, 4])
            .fill_value(0i64)
            .build(&file, "ints")?;

        let data: Vec<i32> = (0..16).collect();
        dataset.store_chunk(&[1, 1], &data)?;
        assert!(dataset.chunk_exists(&[1, 1])?);
        assert_eq!(dataset.retrieve_chunk::<i32>(&[1, 1])?, data);

        // absent chunk reads as fill
        assert_eq!(dataset.retrieve_chunk::<i32>(&[0, 0])?, vec![0; 16]);
        Ok(())
    }

    #[test]
    fn fill_value_elision() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::Zarr);
        let dataset = DatasetBuilder::new(vec![4, 4], DataType::UInt8, vec![4, 4])
            .fill_value(7u64)
            .build(&file, "bytes")?;

        dataset.store_chunk(&[0, 0], &[1u8; 16])?;
        assert!(dataset.chunk_exists(&[0, 0])?);

        // overwriting with all-fill deletes the blob
        dataset.store_chunk(&[0, 0], &[7u8; 16])?;
        assert!(!dataset.chunk_exists(&[0, 0])?);
        assert_eq!(dataset.retrieve_chunk::<u8>(&[0, 0])?, vec![7u8; 16]);
        Ok(())
    }

    #[test]
    fn n5_chunk_is_big_endian_with_header() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::N5);
        let dataset =
            DatasetBuilder::new(vec![2, 2], DataType::UInt16, vec![2, 2]).build(&file, "raw")?;

        dataset.store_chunk(&[0, 0], &[0x0102u16, 0x0304, 0x0506, 0x0708])?;
        let blob = std::fs::read(dir.path().join("data/raw/0/0"))?;
        // header: mode 0, ndim 2, shape [2, 2]
        assert_eq!(&blob[..12], &[0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2]);
        // the first payload byte is the most significant byte of the first element
        assert_eq!(&blob[12..16], &[0x01, 0x02, 0x03, 0x04]);

        assert_eq!(
            dataset.retrieve_chunk::<u16>(&[0, 0])?,
            vec![0x0102, 0x0304, 0x0506, 0x0708]
        );
        Ok(())
    }

    #[test]
    fn n5_edge_chunk_is_bounded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::N5);
        let dataset =
            DatasetBuilder::new(vec![7, 5], DataType::Int8, vec![4, 4]).build(&file, "edges")?;

        assert_eq!(dataset.chunk_stored_num_elements(&[1, 1]), 3);
        dataset.store_chunk(&[1, 1], &[1i8, 2, 3])?;
        let blob = std::fs::read(dir.path().join("data/edges/1/1"))?;
        // bounded shape [3, 1] reversed on disk
        assert_eq!(&blob[..12], &[0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 3]);
        assert_eq!(dataset.retrieve_chunk::<i8>(&[1, 1])?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn varlen_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::N5);
        let dataset =
            DatasetBuilder::new(vec![8], DataType::UInt16, vec![4]).build(&file, "varlen")?;

        let payload: Vec<u8> = bytemuck::cast_slice(&[10u16, 20, 30]).to_vec();
        dataset.store_chunk_varlen(&[0], &payload, 3)?;
        let (bytes, num_elements) = dataset.retrieve_chunk_varlen(&[0])?.unwrap();
        assert_eq!(num_elements, 3);
        assert_eq!(bytes, payload);

        // the typed read path rejects varlength chunks
        let mut out = [0u16; 4];
        assert!(matches!(
            dataset.retrieve_chunk_into(&[0], &mut out),
            Err(ArrayError::VarlenChunk(_))
        ));
        Ok(())
    }

    #[test]
    fn varlen_rejected_for_zarr() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::Zarr);
        let dataset =
            DatasetBuilder::new(vec![8], DataType::UInt8, vec![4]).build(&file, "varlen")?;
        assert!(matches!(
            dataset.store_chunk_varlen(&[0], &[1, 2, 3], 3),
            Err(ArrayError::VarlenUnsupported)
        ));
        Ok(())
    }

    #[test]
    fn type_and_range_checks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::Zarr);
        let dataset =
            DatasetBuilder::new(vec![8], DataType::Int32, vec![4]).build(&file, "checked")?;

        assert!(matches!(
            dataset.store_chunk(&[0], &[1.0f32; 4]),
            Err(ArrayError::IncompatibleDataType(_, _))
        ));
        assert!(matches!(
            dataset.store_chunk(&[2], &[1i32; 4]),
            Err(ArrayError::InvalidChunkIndices(_, _))
        ));
        assert!(matches!(
            dataset.store_chunk(&[0], &[1i32; 3]),
            Err(ArrayError::InvalidBufferLength(3, 4))
        ));
        Ok(())
    }

    #[test]
    fn open_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::Zarr);
        {
            let mut builder = DatasetBuilder::new(vec![10, 10], DataType::Float32, vec![4, 4]);
            builder
                .compression(Compression::Zlib {
                    level: 5,
                    zlib_framing: true,
                })
                .fill_value(1.5);
            builder.build(&file, "reopened")?;
        }
        let dataset = Dataset::open(&file, "reopened")?;
        assert_eq!(dataset.data_type(), DataType::Float32);
        assert_eq!(dataset.shape(), &[10, 10]);
        assert_eq!(dataset.chunk_shape(), &[4, 4]);
        assert_eq!(
            dataset.compression(),
            &Compression::Zlib {
                level: 5,
                zlib_framing: true
            }
        );
        assert_eq!(dataset.fill_value(), &FillValue::from(1.5f32));

        // creating over an existing dataset fails
        assert!(matches!(
            DatasetBuilder::new(vec![10, 10], DataType::Float32, vec![4, 4])
                .build(&file, "reopened"),
            Err(ArrayError::StorageError(StorageError::AlreadyExists(_)))
        ));
        Ok(())
    }

    #[test]
    fn read_only_mode_rejects_writes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        {
            let file = make_file(dir.path(), DataFormat::Zarr);
            DatasetBuilder::new(vec![4], DataType::UInt8, vec![4]).build(&file, "ro")?;
        }
        let file = File::open(dir.path().join("data"), AccessMode::ReadOnly)?;
        let dataset = Dataset::open(&file, "ro")?;
        assert!(matches!(
            dataset.store_chunk(&[0], &[1u8; 4]),
            Err(ArrayError::StorageError(StorageError::PermissionDenied(_, _)))
        ));
        assert!(matches!(
            DatasetBuilder::new(vec![4], DataType::UInt8, vec![4]).build(&file, "new"),
            Err(ArrayError::StorageError(StorageError::PermissionDenied(_, _)))
        ));
        Ok(())
    }
}
