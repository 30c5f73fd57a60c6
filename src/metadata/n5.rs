//! The N5 metadata schema.
//!
//! N5 persists dataset metadata and user attributes in a single
//! `attributes.json` document per dataset. The on-disk axis order is reversed
//! relative to the in-memory C order; this module reverses `dimensions` and
//! `blockSize` on both read and write so the rest of the crate only ever sees
//! C-order shapes.
//!
//! An example dataset document:
//! ```json
//! {
//!     "dimensions": [30, 20, 10],
//!     "blockSize": [8, 8, 8],
//!     "dataType": "uint16",
//!     "compression": {"type": "gzip", "level": 5}
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::array::{
    codec::{BloscCompressor, BloscShuffleMode, Compression},
    ArrayShape, DataType,
};

use super::{DataFormat, DatasetMetadata, FillValueMetadata, MetadataError};

/// The attribute keys reserved for N5 metadata.
///
/// These keys must not be written or removed through the attribute API.
pub const N5_RESERVED_ATTRIBUTES: [&str; 6] = [
    "dimensions",
    "blockSize",
    "dataType",
    "compressionType",
    "compression",
    "n5",
];

/// The default compression level applied when only a legacy `compressionType`
/// string is present.
const LEGACY_DEFAULT_LEVEL: u32 = 5;

/// N5 dataset metadata, the reserved keys of `attributes.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct N5DatasetMetadata {
    /// The length of each dimension of the array, fastest-varying axis first.
    pub dimensions: ArrayShape,
    /// The length of each dimension of a chunk, fastest-varying axis first.
    #[serde(rename = "blockSize")]
    pub block_size: ArrayShape,
    /// The data type name.
    #[serde(rename = "dataType")]
    pub data_type: String,
    /// The compression configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<N5Compression>,
    /// The legacy compression name, superseded by `compression`.
    #[serde(
        rename = "compressionType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub compression_type: Option<String>,
}

/// An N5 compression configuration, discriminated by `type`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum N5Compression {
    /// No compression.
    Raw,
    /// Gzip.
    Gzip {
        /// Compression level; -1 selects the library default.
        #[serde(default = "default_gzip_level")]
        level: i32,
    },
    /// Bzip2.
    Bzip2 {
        /// The 100 kB block size multiplier, 1 to 9.
        #[serde(rename = "blockSize", default = "default_bzip2_block_size")]
        block_size: u32,
    },
    /// LZ4.
    Lz4 {
        /// The block size; accepted for metadata fidelity.
        #[serde(rename = "blockSize", default = "default_lz4_block_size")]
        block_size: u32,
    },
    /// Xz (LZMA2).
    Xz {
        /// Compression preset, 0 to 9.
        #[serde(default = "default_xz_preset")]
        preset: u32,
    },
    /// Blosc meta-compression.
    Blosc {
        /// The internal compressor name.
        codec: String,
        /// Compression level, 0 to 9.
        #[serde(default = "default_blosc_level")]
        level: u8,
        /// The shuffle mode: 0 none, 1 byte-wise, 2 bit-wise.
        #[serde(default = "default_blosc_shuffle")]
        shuffle: u8,
    },
}

const fn default_gzip_level() -> i32 {
    -1
}

const fn default_bzip2_block_size() -> u32 {
    LEGACY_DEFAULT_LEVEL
}

const fn default_lz4_block_size() -> u32 {
    65536
}

const fn default_xz_preset() -> u32 {
    6
}

const fn default_blosc_level() -> u8 {
    LEGACY_DEFAULT_LEVEL as u8
}

const fn default_blosc_shuffle() -> u8 {
    1
}

/// Map a possibly-negative gzip level to a concrete deflate level.
fn gzip_level(level: i32) -> u32 {
    if level < 0 {
        6
    } else {
        level.unsigned_abs()
    }
}

fn compression_to_n5(compression: &Compression) -> N5Compression {
    match compression {
        Compression::Raw => N5Compression::Raw,
        Compression::Blosc {
            cname,
            clevel,
            shuffle,
        } => N5Compression::Blosc {
            codec: cname.name().to_string(),
            level: *clevel,
            shuffle: shuffle.as_u8(),
        },
        #[allow(clippy::cast_possible_wrap)]
        Compression::Zlib { level, .. } => N5Compression::Gzip {
            level: *level as i32,
        },
        Compression::Bzip2 { level } => N5Compression::Bzip2 { block_size: *level },
        Compression::Lz4 { level } => N5Compression::Lz4 { block_size: *level },
        Compression::Xz { preset } => N5Compression::Xz { preset: *preset },
    }
}

fn compression_from_n5(compression: &N5Compression) -> Result<Compression, MetadataError> {
    match compression {
        N5Compression::Raw => Ok(Compression::Raw),
        N5Compression::Gzip { level } => Ok(Compression::Zlib {
            level: gzip_level(*level),
            zlib_framing: false,
        }),
        N5Compression::Bzip2 { block_size } => Ok(Compression::Bzip2 { level: *block_size }),
        N5Compression::Lz4 { block_size } => Ok(Compression::Lz4 { level: *block_size }),
        N5Compression::Xz { preset } => Ok(Compression::Xz { preset: *preset }),
        N5Compression::Blosc {
            codec,
            level,
            shuffle,
        } => {
            let cname = BloscCompressor::from_name(codec).ok_or_else(|| {
                MetadataError::InvalidCompression(format!("unknown blosc codec {codec:?}"))
            })?;
            let shuffle = BloscShuffleMode::from_u8(*shuffle).ok_or_else(|| {
                MetadataError::InvalidCompression(format!("invalid blosc shuffle {shuffle}"))
            })?;
            Ok(Compression::Blosc {
                cname,
                clevel: *level,
                shuffle,
            })
        }
    }
}

/// Map a legacy `compressionType` name to a compression configuration with
/// default options.
fn compression_from_legacy(name: &str) -> Result<Compression, MetadataError> {
    match name {
        "raw" => Ok(Compression::Raw),
        "gzip" => Ok(Compression::Zlib {
            level: LEGACY_DEFAULT_LEVEL,
            zlib_framing: false,
        }),
        "bzip2" => Ok(Compression::Bzip2 {
            level: LEGACY_DEFAULT_LEVEL,
        }),
        "lz4" => Ok(Compression::Lz4 {
            level: default_lz4_block_size(),
        }),
        "xz" => Ok(Compression::Xz {
            preset: LEGACY_DEFAULT_LEVEL,
        }),
        _ => Err(MetadataError::UnsupportedCompressor(
            name.to_string(),
            DataFormat::N5,
        )),
    }
}

fn reversed(shape: &[u64]) -> ArrayShape {
    shape.iter().rev().copied().collect()
}

pub(crate) fn dataset_metadata_to_json(metadata: &DatasetMetadata) -> serde_json::Value {
    let n5 = N5DatasetMetadata {
        dimensions: reversed(&metadata.shape),
        block_size: reversed(&metadata.chunk_shape),
        data_type: metadata.data_type.n5_name().to_string(),
        compression: Some(compression_to_n5(&metadata.compression)),
        compression_type: None,
    };
    serde_json::to_value(n5).expect("n5 dataset metadata is serializable")
}

pub(crate) fn dataset_metadata_from_json(
    value: &serde_json::Value,
) -> Result<DatasetMetadata, MetadataError> {
    let n5: N5DatasetMetadata = serde_json::from_value(value.clone())?;
    let data_type = DataType::from_n5_name(&n5.data_type)?;
    let compression = match (&n5.compression, &n5.compression_type) {
        (Some(compression), _) => compression_from_n5(compression)?,
        (None, Some(legacy)) => compression_from_legacy(legacy)?,
        (None, None) => {
            return Err(MetadataError::InvalidCompression(
                "missing compression and compressionType".to_string(),
            ))
        }
    };
    DatasetMetadata::new(
        data_type,
        reversed(&n5.dimensions),
        reversed(&n5.block_size),
        DataFormat::N5,
        compression,
        // N5 has no fill value on disk; absent chunks read as zero
        FillValueMetadata::Null,
    )
}
