//! Fill values.

/// The fill value of a dataset.
///
/// Holds the native-endian byte representation of the element value that is
/// logically present wherever a chunk does not exist on disk.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

macro_rules! impl_fill_value_from {
    ($t:ty) => {
        impl From<$t> for FillValue {
            fn from(value: $t) -> Self {
                Self(value.to_ne_bytes().to_vec())
            }
        }
    };
}

impl_fill_value_from!(i8);
impl_fill_value_from!(i16);
impl_fill_value_from!(i32);
impl_fill_value_from!(i64);
impl_fill_value_from!(u8);
impl_fill_value_from!(u16);
impl_fill_value_from!(u32);
impl_fill_value_from!(u64);
impl_fill_value_from!(f32);
impl_fill_value_from!(f64);

impl FillValue {
    /// Create a new fill value from `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Return the size of the fill value in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the native-endian byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return true if `bytes` is a whole number of elements all equal to the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if bytes.len() % self.0.len() != 0 {
            return false;
        }
        if self.0.len() == 1 {
            let fill = self.0[0];
            bytes.iter().all(|&byte| byte == fill)
        } else {
            bytes
                .chunks_exact(self.0.len())
                .all(|element| element == self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value_equals_all() {
        assert!(FillValue::from(42u8).equals_all(&[42; 10]));
        assert!(!FillValue::from(42u8).equals_all(&[42, 42, 7]));
        assert!(FillValue::from(0x0102_0304u32)
            .equals_all(&[0x0102_0304u32.to_ne_bytes(), 0x0102_0304u32.to_ne_bytes()].concat()));
        assert!(!FillValue::from(1u16).equals_all(&1u16.to_ne_bytes()[..1]));
    }

    #[test]
    fn fill_value_nan_bit_pattern() {
        let fill = FillValue::from(f32::NAN);
        assert!(fill.equals_all(&[f32::NAN.to_ne_bytes(), f32::NAN.to_ne_bytes()].concat()));
        // a NaN with a different payload is a different fill value
        let other = f32::from_bits(f32::NAN.to_bits() ^ 1);
        assert!(!fill.equals_all(&other.to_ne_bytes()));
    }
}
