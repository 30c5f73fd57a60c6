//! Dataset and group metadata for the two format dialects.
//!
//! The crate operates internally in C order with native-endian buffers; the
//! dialect modules translate to and from the on-disk schemas. The N5 module
//! reverses the axis order of shapes on both read and write, so the rest of
//! the crate never sees F-order shapes.

pub mod n5;
pub mod zarr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::{
    codec::Compression, data_type::UnsupportedDataTypeError, ArrayShape, DataType,
    IncompatibleFillValueError,
};

/// The Zarr V2 storage specification version.
pub const ZARR_FORMAT_VERSION: u64 = 2;

/// The N5 storage specification version.
pub const N5_FORMAT_VERSION: &str = "2.0.0";

/// The Zarr dataset metadata document name.
pub const ZARR_ARRAY_METADATA: &str = ".zarray";

/// The Zarr group metadata document name.
pub const ZARR_GROUP_METADATA: &str = ".zgroup";

/// The Zarr attributes document name.
pub const ZARR_ATTRIBUTES: &str = ".zattrs";

/// The N5 metadata and attributes document name.
pub const N5_ATTRIBUTES: &str = "attributes.json";

/// The storage format dialect.
///
/// The dialect determines the path layout, the axis order of persisted shapes,
/// the stored endianness, and the metadata schemas.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataFormat {
    /// The Zarr V2 format.
    Zarr,
    /// The N5 format.
    N5,
}

impl DataFormat {
    /// Return true for the Zarr dialect.
    #[must_use]
    pub fn is_zarr(&self) -> bool {
        matches!(self, Self::Zarr)
    }
}

impl core::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Zarr => f.write_str("zarr"),
            Self::N5 => f.write_str("n5"),
        }
    }
}

/// The metadata representation of a fill value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillValueMetadata {
    /// No fill value; reads as zero.
    Null,
    /// NaN (floats only).
    NaN,
    /// Positive infinity (floats only).
    Infinity,
    /// Negative infinity (floats only).
    NegInfinity,
    /// A finite number.
    Number(serde_json::Number),
}

impl core::fmt::Display for FillValueMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::NaN => f.write_str("NaN"),
            Self::Infinity => f.write_str("Infinity"),
            Self::NegInfinity => f.write_str("-Infinity"),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<i64> for FillValueMetadata {
    fn from(value: i64) -> Self {
        Self::Number(serde_json::Number::from(value))
    }
}

impl From<u64> for FillValueMetadata {
    fn from(value: u64) -> Self {
        Self::Number(serde_json::Number::from(value))
    }
}

impl From<f64> for FillValueMetadata {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::NaN
        } else if value == f64::INFINITY {
            Self::Infinity
        } else if value == f64::NEG_INFINITY {
            Self::NegInfinity
        } else {
            serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
        }
    }
}

impl From<f32> for FillValueMetadata {
    fn from(value: f32) -> Self {
        Self::from(f64::from(value))
    }
}

impl<'de> Deserialize<'de> for FillValueMetadata {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum FillValueMetadataType {
            String(String),
            Number(serde_json::Number),
            Null,
        }
        match FillValueMetadataType::deserialize(d)? {
            FillValueMetadataType::String(string) => match string.as_str() {
                "NaN" => Ok(Self::NaN),
                "Infinity" => Ok(Self::Infinity),
                "-Infinity" => Ok(Self::NegInfinity),
                _ => Err(serde::de::Error::custom("unsupported fill value")),
            },
            FillValueMetadataType::Number(number) => Ok(Self::Number(number)),
            FillValueMetadataType::Null => Ok(Self::Null),
        }
    }
}

impl Serialize for FillValueMetadata {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::NaN => serializer.serialize_str("NaN"),
            Self::Infinity => serializer.serialize_str("Infinity"),
            Self::NegInfinity => serializer.serialize_str("-Infinity"),
            Self::Number(number) => number.serialize(serializer),
        }
    }
}

/// The metadata of a dataset.
///
/// Shapes are in C order (fastest-varying axis last) regardless of the
/// dialect.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetMetadata {
    /// The data type.
    pub data_type: DataType,
    /// The array shape.
    pub shape: ArrayShape,
    /// The default chunk shape.
    pub chunk_shape: ArrayShape,
    /// The format dialect.
    pub format: DataFormat,
    /// The chunk compression.
    pub compression: Compression,
    /// The fill value.
    pub fill_value: FillValueMetadata,
}

impl DatasetMetadata {
    /// Create new dataset metadata.
    ///
    /// The chunk shape is clamped to the array shape per axis.
    ///
    /// # Errors
    /// Returns [`MetadataError`] if the dimensionalities of `shape` and
    /// `chunk_shape` disagree or any chunk shape component is zero.
    pub fn new(
        data_type: DataType,
        shape: ArrayShape,
        chunk_shape: ArrayShape,
        format: DataFormat,
        compression: Compression,
        fill_value: FillValueMetadata,
    ) -> Result<Self, MetadataError> {
        if shape.len() != chunk_shape.len() {
            return Err(MetadataError::IncompatibleDimensionality(
                chunk_shape.len(),
                shape.len(),
            ));
        }
        if shape.is_empty() {
            return Err(MetadataError::IncompatibleDimensionality(0, 1));
        }
        if chunk_shape.contains(&0) {
            return Err(MetadataError::InvalidChunkShape(chunk_shape));
        }
        if format.is_zarr() && matches!(compression, Compression::Xz { .. }) {
            return Err(MetadataError::UnsupportedCompressor(
                "xz".to_string(),
                format,
            ));
        }
        if let Err((field, value)) = compression.validate() {
            return Err(MetadataError::InvalidCompression(format!(
                "{field} {value} is out of range"
            )));
        }
        // N5 gzip is always gzip framed; the framing flag is not persistable there
        let compression = match (format, compression) {
            (DataFormat::N5, Compression::Zlib { level, .. }) => Compression::Zlib {
                level,
                zlib_framing: false,
            },
            (_, compression) => compression,
        };
        let chunk_shape = std::iter::zip(&chunk_shape, &shape)
            .map(|(chunk_size, array_size)| std::cmp::min(*chunk_size, std::cmp::max(*array_size, 1)))
            .collect();
        Ok(Self {
            data_type,
            shape,
            chunk_shape,
            format,
            compression,
            fill_value,
        })
    }

    /// Serialize to the on-disk JSON document of the dialect.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self.format {
            DataFormat::Zarr => zarr::dataset_metadata_to_json(self),
            DataFormat::N5 => n5::dataset_metadata_to_json(self),
        }
    }

    /// Parse from the on-disk JSON document of `format`.
    ///
    /// # Errors
    /// Returns [`MetadataError`] if the document violates the dialect schema.
    pub fn from_json(value: &serde_json::Value, format: DataFormat) -> Result<Self, MetadataError> {
        match format {
            DataFormat::Zarr => zarr::dataset_metadata_from_json(value),
            DataFormat::N5 => n5::dataset_metadata_from_json(value),
        }
    }
}

/// A metadata error.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The `zarr_format` field is not 2.
    #[error("invalid zarr_format {0}, expected {ZARR_FORMAT_VERSION}")]
    InvalidZarrFormat(u64),
    /// The `order` field is not "C".
    #[error("invalid order {0:?}, only C order is supported")]
    InvalidOrder(String),
    /// The `filters` field is not null.
    #[error("filters are not supported")]
    FiltersNotSupported,
    /// An unsupported data type.
    #[error(transparent)]
    UnsupportedDataType(#[from] UnsupportedDataTypeError),
    /// A compressor that is not valid for the dialect.
    #[error("unsupported compressor {0:?} for the {1} format")]
    UnsupportedCompressor(String, DataFormat),
    /// An invalid compression configuration.
    #[error("invalid compression configuration: {0}")]
    InvalidCompression(String),
    /// Shape and chunk shape dimensionality disagree.
    #[error("dimensionality of chunk shape ({0}) and shape ({1}) do not agree")]
    IncompatibleDimensionality(usize, usize),
    /// A chunk shape with a zero component.
    #[error("invalid chunk shape {0:?}, all components must be non-zero")]
    InvalidChunkShape(ArrayShape),
    /// A fill value incompatible with the data type.
    #[error(transparent)]
    IncompatibleFillValue(#[from] IncompatibleFillValueError),
    /// A malformed metadata document.
    #[error("malformed metadata: {0}")]
    Deserialization(#[from] serde_json::Error),
}
