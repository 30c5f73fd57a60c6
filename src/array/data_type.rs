//! Data types.
//!
//! The supported element types are fixed-width integers and IEEE floats. Each
//! data type has a Zarr V2 dtype string (little-endian on disk) and an N5 name
//! (big-endian on disk).

use thiserror::Error;

use crate::metadata::FillValueMetadata;

use super::FillValue;

/// A data type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataType {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE floating point.
    Float32,
    /// 64-bit IEEE floating point.
    Float64,
}

/// An unsupported data type error.
#[derive(Clone, Debug, Error)]
#[error("data type {0} is not supported")]
pub struct UnsupportedDataTypeError(String);

/// An incompatible fill value error.
#[derive(Clone, Debug, Error)]
#[error("fill value {1} is incompatible with data type {0}")]
pub struct IncompatibleFillValueError(DataType, String);

impl DataType {
    /// All supported data types.
    pub const ALL: [DataType; 10] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
    ];

    /// Return the size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Return the Zarr V2 dtype string.
    #[must_use]
    pub const fn zarr_name(&self) -> &'static str {
        match self {
            Self::Int8 => "|i1",
            Self::Int16 => "<i2",
            Self::Int32 => "<i4",
            Self::Int64 => "<i8",
            Self::UInt8 => "|u1",
            Self::UInt16 => "<u2",
            Self::UInt32 => "<u4",
            Self::UInt64 => "<u8",
            Self::Float32 => "<f4",
            Self::Float64 => "<f8",
        }
    }

    /// Return the N5 data type name.
    #[must_use]
    pub const fn n5_name(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Parse a Zarr V2 dtype string.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if the dtype is not in the supported table.
    pub fn from_zarr_name(name: &str) -> Result<Self, UnsupportedDataTypeError> {
        Self::ALL
            .iter()
            .find(|data_type| data_type.zarr_name() == name)
            .copied()
            .ok_or_else(|| UnsupportedDataTypeError(name.to_string()))
    }

    /// Parse an N5 data type name.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if the name is not in the supported table.
    pub fn from_n5_name(name: &str) -> Result<Self, UnsupportedDataTypeError> {
        Self::ALL
            .iter()
            .find(|data_type| data_type.n5_name() == name)
            .copied()
            .ok_or_else(|| UnsupportedDataTypeError(name.to_string()))
    }

    /// Narrow a fill value from its metadata representation to the native byte
    /// representation for this data type.
    ///
    /// NaN and the infinities are only valid for float data types. Numbers out
    /// of range for an integer data type are rejected. A `null` fill value
    /// reads as zero.
    ///
    /// # Errors
    /// Returns [`IncompatibleFillValueError`] if the fill value cannot be represented.
    pub fn fill_value_from_metadata(
        &self,
        metadata: &FillValueMetadata,
    ) -> Result<FillValue, IncompatibleFillValueError> {
        let err = || IncompatibleFillValueError(*self, metadata.to_string());
        match metadata {
            FillValueMetadata::Null => Ok(FillValue::new(vec![0; self.size()])),
            FillValueMetadata::NaN => match self {
                Self::Float32 => Ok(FillValue::from(f32::NAN)),
                Self::Float64 => Ok(FillValue::from(f64::NAN)),
                _ => Err(err()),
            },
            FillValueMetadata::Infinity => match self {
                Self::Float32 => Ok(FillValue::from(f32::INFINITY)),
                Self::Float64 => Ok(FillValue::from(f64::INFINITY)),
                _ => Err(err()),
            },
            FillValueMetadata::NegInfinity => match self {
                Self::Float32 => Ok(FillValue::from(f32::NEG_INFINITY)),
                Self::Float64 => Ok(FillValue::from(f64::NEG_INFINITY)),
                _ => Err(err()),
            },
            FillValueMetadata::Number(number) => match self {
                Self::Int8 => narrow_int(number).map(|v: i8| FillValue::from(v)).ok_or_else(err),
                Self::Int16 => narrow_int(number).map(|v: i16| FillValue::from(v)).ok_or_else(err),
                Self::Int32 => narrow_int(number).map(|v: i32| FillValue::from(v)).ok_or_else(err),
                Self::Int64 => number.as_i64().map(FillValue::from).ok_or_else(err),
                Self::UInt8 => narrow_uint(number).map(|v: u8| FillValue::from(v)).ok_or_else(err),
                Self::UInt16 => narrow_uint(number).map(|v: u16| FillValue::from(v)).ok_or_else(err),
                Self::UInt32 => narrow_uint(number).map(|v: u32| FillValue::from(v)).ok_or_else(err),
                Self::UInt64 => number.as_u64().map(FillValue::from).ok_or_else(err),
                #[allow(clippy::cast_possible_truncation)]
                Self::Float32 => number
                    .as_f64()
                    .map(|v| FillValue::from(v as f32))
                    .ok_or_else(err),
                Self::Float64 => number.as_f64().map(FillValue::from).ok_or_else(err),
            },
        }
    }
}

fn narrow_int<T: TryFrom<i64>>(number: &serde_json::Number) -> Option<T> {
    number.as_i64().and_then(|v| T::try_from(v).ok())
}

fn narrow_uint<T: TryFrom<u64>>(number: &serde_json::Number) -> Option<T> {
    number.as_u64().and_then(|v| T::try_from(v).ok())
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.n5_name())
    }
}
