//! The Zarr V2 metadata schema.
//!
//! An example `.zarray` document:
//! ```json
//! {
//!     "chunks": [10, 10, 10],
//!     "compressor": {"id": "zlib", "level": 5},
//!     "dtype": "<f4",
//!     "fill_value": 0,
//!     "filters": null,
//!     "order": "C",
//!     "shape": [100, 100, 100],
//!     "zarr_format": 2
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::array::{
    codec::{BloscCompressor, BloscShuffleMode, Compression},
    ArrayShape, DataType,
};

use super::{DataFormat, DatasetMetadata, FillValueMetadata, MetadataError, ZARR_FORMAT_VERSION};

/// Zarr V2 array metadata, the `.zarray` document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ZarrArrayMetadata {
    /// The length of each dimension of a chunk.
    pub chunks: ArrayShape,
    /// The primary compression codec, or null for no compression.
    pub compressor: Option<ZarrCompressor>,
    /// The data type string.
    pub dtype: String,
    /// The default value for uninitialised portions of the array.
    pub fill_value: FillValueMetadata,
    /// Codec filters; must be null.
    #[serde(default)]
    pub filters: Option<serde_json::Value>,
    /// The memory layout; must be "C".
    pub order: String,
    /// The length of each dimension of the array.
    pub shape: ArrayShape,
    /// The storage specification version; must be 2.
    pub zarr_format: u64,
}

/// A Zarr V2 compressor configuration, discriminated by `id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "id", rename_all = "lowercase")]
pub enum ZarrCompressor {
    /// Blosc meta-compression.
    Blosc {
        /// The internal compressor name.
        cname: String,
        /// Compression level, 0 to 9.
        clevel: u8,
        /// The shuffle mode: 0 none, 1 byte-wise, 2 bit-wise.
        shuffle: u8,
        /// The block size; 0 selects it automatically.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blocksize: Option<u64>,
    },
    /// Deflate with zlib framing.
    Zlib {
        /// Compression level, 1 to 9.
        level: u32,
    },
    /// Deflate with gzip framing.
    Gzip {
        /// Compression level, 1 to 9.
        level: u32,
    },
    /// Bzip2.
    Bz2 {
        /// Compression level, 1 to 9.
        level: u32,
    },
    /// LZ4.
    Lz4 {
        /// Accepted for metadata fidelity; not applied by the block codec.
        #[serde(default)]
        level: u32,
    },
}

/// Zarr V2 group metadata, the `.zgroup` document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ZarrGroupMetadata {
    /// The storage specification version; must be 2.
    pub zarr_format: u64,
}

impl ZarrGroupMetadata {
    /// Create the group metadata document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zarr_format: ZARR_FORMAT_VERSION,
        }
    }
}

impl Default for ZarrGroupMetadata {
    fn default() -> Self {
        Self::new()
    }
}

fn compression_to_zarr(compression: &Compression) -> Option<ZarrCompressor> {
    match compression {
        Compression::Raw => None,
        Compression::Blosc {
            cname,
            clevel,
            shuffle,
        } => Some(ZarrCompressor::Blosc {
            cname: cname.name().to_string(),
            clevel: *clevel,
            shuffle: shuffle.as_u8(),
            blocksize: None,
        }),
        Compression::Zlib {
            level,
            zlib_framing,
        } => {
            if *zlib_framing {
                Some(ZarrCompressor::Zlib { level: *level })
            } else {
                Some(ZarrCompressor::Gzip { level: *level })
            }
        }
        Compression::Bzip2 { level } => Some(ZarrCompressor::Bz2 { level: *level }),
        Compression::Lz4 { level } => Some(ZarrCompressor::Lz4 { level: *level }),
        Compression::Xz { .. } => None, // not representable in Zarr V2; rejected at creation
    }
}

fn compression_from_zarr(compressor: Option<&ZarrCompressor>) -> Result<Compression, MetadataError> {
    let Some(compressor) = compressor else {
        return Ok(Compression::Raw);
    };
    match compressor {
        ZarrCompressor::Blosc {
            cname,
            clevel,
            shuffle,
            blocksize: _,
        } => {
            let cname = BloscCompressor::from_name(cname).ok_or_else(|| {
                MetadataError::InvalidCompression(format!("unknown blosc cname {cname:?}"))
            })?;
            let shuffle = BloscShuffleMode::from_u8(*shuffle).ok_or_else(|| {
                MetadataError::InvalidCompression(format!("invalid blosc shuffle {shuffle}"))
            })?;
            Ok(Compression::Blosc {
                cname,
                clevel: *clevel,
                shuffle,
            })
        }
        // the zlib id implies zlib framing, the gzip id implies gzip framing
        ZarrCompressor::Zlib { level } => Ok(Compression::Zlib {
            level: *level,
            zlib_framing: true,
        }),
        ZarrCompressor::Gzip { level } => Ok(Compression::Zlib {
            level: *level,
            zlib_framing: false,
        }),
        ZarrCompressor::Bz2 { level } => Ok(Compression::Bzip2 { level: *level }),
        ZarrCompressor::Lz4 { level } => Ok(Compression::Lz4 { level: *level }),
    }
}

pub(crate) fn dataset_metadata_to_json(metadata: &DatasetMetadata) -> serde_json::Value {
    let zarr = ZarrArrayMetadata {
        chunks: metadata.chunk_shape.clone(),
        compressor: compression_to_zarr(&metadata.compression),
        dtype: metadata.data_type.zarr_name().to_string(),
        fill_value: metadata.fill_value.clone(),
        filters: None,
        order: "C".to_string(),
        shape: metadata.shape.clone(),
        zarr_format: ZARR_FORMAT_VERSION,
    };
    serde_json::to_value(zarr).expect("zarr array metadata is serializable")
}

pub(crate) fn dataset_metadata_from_json(
    value: &serde_json::Value,
) -> Result<DatasetMetadata, MetadataError> {
    let zarr: ZarrArrayMetadata = serde_json::from_value(value.clone())?;
    if zarr.zarr_format != ZARR_FORMAT_VERSION {
        return Err(MetadataError::InvalidZarrFormat(zarr.zarr_format));
    }
    if zarr.order != "C" {
        return Err(MetadataError::InvalidOrder(zarr.order));
    }
    // a JSON null deserializes to `None`, so any present value is a real filter list
    if zarr.filters.is_some() {
        return Err(MetadataError::FiltersNotSupported);
    }
    let data_type = DataType::from_zarr_name(&zarr.dtype)?;
    let compression = compression_from_zarr(zarr.compressor.as_ref())?;
    DatasetMetadata::new(
        data_type,
        zarr.shape,
        zarr.chunks,
        DataFormat::Zarr,
        compression,
        zarr.fill_value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zarr_metadata_round_trip() {
        let metadata = DatasetMetadata::new(
            DataType::Float32,
            vec![100, 100],
            vec![10, 10],
            DataFormat::Zarr,
            Compression::Zlib {
                level: 5,
                zlib_framing: true,
            },
            FillValueMetadata::from(0i64),
        )
        .unwrap();
        let value = metadata.to_json();
        assert_eq!(value["compressor"], json!({"id": "zlib", "level": 5}));
        assert_eq!(value["dtype"], json!("<f4"));
        assert_eq!(value["order"], json!("C"));
        assert_eq!(value["zarr_format"], json!(2));
        assert_eq!(value["filters"], serde_json::Value::Null);

        let parsed = DatasetMetadata::from_json(&value, DataFormat::Zarr).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn zarr_metadata_raw_compressor_is_null() {
        let metadata = DatasetMetadata::new(
            DataType::Int8,
            vec![10],
            vec![5],
            DataFormat::Zarr,
            Compression::Raw,
            FillValueMetadata::from(0i64),
        )
        .unwrap();
        let value = metadata.to_json();
        assert_eq!(value["compressor"], serde_json::Value::Null);
        let parsed = DatasetMetadata::from_json(&value, DataFormat::Zarr).unwrap();
        assert!(parsed.compression.is_raw());
    }

    #[test]
    fn zarr_metadata_rejects_invalid_documents() {
        let valid = json!({
            "chunks": [10],
            "compressor": null,
            "dtype": "<i4",
            "fill_value": 0,
            "filters": null,
            "order": "C",
            "shape": [100],
            "zarr_format": 2
        });
        assert!(DatasetMetadata::from_json(&valid, DataFormat::Zarr).is_ok());

        let mut wrong_format = valid.clone();
        wrong_format["zarr_format"] = json!(3);
        assert!(matches!(
            DatasetMetadata::from_json(&wrong_format, DataFormat::Zarr),
            Err(MetadataError::InvalidZarrFormat(3))
        ));

        let mut wrong_order = valid.clone();
        wrong_order["order"] = json!("F");
        assert!(matches!(
            DatasetMetadata::from_json(&wrong_order, DataFormat::Zarr),
            Err(MetadataError::InvalidOrder(_))
        ));

        let mut with_filters = valid.clone();
        with_filters["filters"] = json!([{"id": "delta"}]);
        assert!(matches!(
            DatasetMetadata::from_json(&with_filters, DataFormat::Zarr),
            Err(MetadataError::FiltersNotSupported)
        ));

        let mut bad_dtype = valid.clone();
        bad_dtype["dtype"] = json!(">f4");
        assert!(DatasetMetadata::from_json(&bad_dtype, DataFormat::Zarr).is_err());

        let mut missing_shape = valid.clone();
        missing_shape.as_object_mut().unwrap().remove("shape");
        assert!(DatasetMetadata::from_json(&missing_shape, DataFormat::Zarr).is_err());

        let mut unknown_compressor = valid;
        unknown_compressor["compressor"] = json!({"id": "zstd", "level": 3});
        assert!(DatasetMetadata::from_json(&unknown_compressor, DataFormat::Zarr).is_err());
    }

    #[test]
    fn zarr_metadata_nan_fill_value() {
        let value = json!({
            "chunks": [10],
            "compressor": null,
            "dtype": "<f8",
            "fill_value": "NaN",
            "filters": null,
            "order": "C",
            "shape": [100],
            "zarr_format": 2
        });
        let parsed = DatasetMetadata::from_json(&value, DataFormat::Zarr).unwrap();
        assert_eq!(parsed.fill_value, FillValueMetadata::NaN);
    }
}
