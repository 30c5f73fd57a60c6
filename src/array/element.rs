//! Typed array elements.

use super::{DataType, FillValue};

/// A fixed-width scalar element of an array.
///
/// Implemented for the Rust scalar types backing each [`DataType`]. The trait
/// bridges the typed API (chunk and subarray reads and writes) and the
/// byte-level dataset engine.
pub trait Element:
    bytemuck::Pod + PartialEq + Copy + Send + Sync + 'static
{
    /// The data type tag of this element type.
    const DATA_TYPE: DataType;

    /// Return the bit pattern of the element, zero-extended to 64 bits.
    ///
    /// Used as a total-order key when accumulating unique values; distinct NaN
    /// payloads are distinct keys.
    fn bit_key(self) -> u64;
}

macro_rules! impl_element_int {
    ($t:ty, $unsigned:ty, $data_type:expr) => {
        impl Element for $t {
            const DATA_TYPE: DataType = $data_type;

            fn bit_key(self) -> u64 {
                u64::from(self as $unsigned)
            }
        }
    };
}

impl_element_int!(i8, u8, DataType::Int8);
impl_element_int!(i16, u16, DataType::Int16);
impl_element_int!(i32, u32, DataType::Int32);
impl_element_int!(i64, u64, DataType::Int64);
impl_element_int!(u8, u8, DataType::UInt8);
impl_element_int!(u16, u16, DataType::UInt16);
impl_element_int!(u32, u32, DataType::UInt32);
impl_element_int!(u64, u64, DataType::UInt64);

impl Element for f32 {
    const DATA_TYPE: DataType = DataType::Float32;

    fn bit_key(self) -> u64 {
        u64::from(self.to_bits())
    }
}

impl Element for f64 {
    const DATA_TYPE: DataType = DataType::Float64;

    fn bit_key(self) -> u64 {
        self.to_bits()
    }
}

impl FillValue {
    /// Return the fill value as a typed element.
    ///
    /// # Panics
    /// Panics if the size of the fill value does not match the element size;
    /// the dataset engine only calls this after a data type check.
    #[must_use]
    pub fn to_element<T: Element>(&self) -> T {
        bytemuck::pod_read_unaligned(self.as_ne_bytes())
    }
}
