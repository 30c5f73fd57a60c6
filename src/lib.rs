//! A Rust library for chunked, compressed, N-dimensional numeric arrays in the
//! [Zarr V2](https://zarr-specs.readthedocs.io/en/latest/v2/v2.0.html) and
//! [N5](https://github.com/saalfeldlab/n5) storage formats.
//!
//! Arrays are divided into regular rectangular chunks; each chunk is stored as
//! an independently compressed blob on the file system. Groups are directory
//! trees carrying format markers and arbitrary JSON attributes. Both dialects
//! are served by a single runtime contract: the in-memory view is always
//! C order and native endian, and the format-specific axis reversal, chunk
//! header framing, and endianness normalisation happen at the storage
//! boundary.
//!
//! ## Features
//!  - Formats: Zarr V2 (little-endian, C order, `.`-separated chunk keys) and
//!    N5 (big-endian, reversed on-disk axis order, nested chunk directories,
//!    varlength chunks).
//!  - Data types: fixed-width integers (`int8` through `uint64`) and IEEE
//!    floats (`float32`, `float64`).
//!  - Compressors: raw, blosc, zlib/gzip, bzip2, lz4, xz.
//!  - Multi-threaded subarray reads and writes with per-chunk
//!    read-modify-write for partial overlaps.
//!  - Fill-value elision: all-fill chunks are never materialised on disk.
//!
//! ## Example
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use zarrn5::array::{codec::Compression, DataType, DatasetBuilder};
//! use zarrn5::array_subset::ArraySubset;
//! use zarrn5::hierarchy::File;
//! use zarrn5::metadata::DataFormat;
//!
//! let file = File::create("volume.n5", DataFormat::N5, "a".parse()?)?;
//! let group = file.create_group("raw")?;
//! let dataset = DatasetBuilder::new(vec![100, 100, 100], DataType::UInt16, vec![64, 64, 64])
//!     .compression(Compression::Zlib { level: 5, zlib_framing: false })
//!     .build(&group, "s0")?;
//!
//! let data = vec![42u16; 10 * 10 * 10];
//! let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![10, 10, 10])?;
//! dataset.store_array_subset(&data, &subset, 4)?;
//!
//! let mut read = vec![0u16; data.len()];
//! dataset.retrieve_array_subset(&mut read, &subset, 4)?;
//! assert_eq!(read, data);
//! # Ok(())
//! # }
//! ```

#![warn(unused_variables)]
#![warn(dead_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod array;
pub mod array_subset;
pub mod attributes;
pub mod hierarchy;
pub mod metadata;
pub mod ops;
pub mod storage;
