//! Chunk blob framing.
//!
//! A Zarr chunk blob is exactly the compressed payload. An N5 chunk blob is
//! prefixed with a big-endian header:
//!
//! ```text
//! u16 mode             0 = default, 1 = varlength
//! u16 nDims
//! u32 shape[nDims]     bounded shape, reversed axis order
//! [u32 numElements]    present iff mode == 1
//! <compressed payload>
//! ```

use super::{ArrayError, ArrayShape};

const MODE_DEFAULT: u16 = 0;
const MODE_VARLENGTH: u16 = 1;

/// A parsed N5 chunk header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChunkHeader {
    /// The stored chunk shape in C order (reversed back from disk order).
    pub shape: ArrayShape,
    /// The stored element count, present for varlength chunks.
    pub num_elements: Option<u64>,
}

impl ChunkHeader {
    /// Return the number of elements of the chunk payload.
    pub fn payload_elements(&self) -> u64 {
        self.num_elements
            .unwrap_or_else(|| self.shape.iter().product())
    }
}

/// Encode an N5 chunk header.
///
/// `bounded_shape` is the C-order bounded shape of the chunk; it is reversed
/// into disk order here. `num_elements` selects varlength mode.
pub(crate) fn encode_header(bounded_shape: &[u64], num_elements: Option<u64>) -> Vec<u8> {
    let ndim = u16::try_from(bounded_shape.len()).expect("dimensionality fits u16");
    let mut header = Vec::with_capacity(4 + 4 * bounded_shape.len() + 4);
    let mode = if num_elements.is_some() {
        MODE_VARLENGTH
    } else {
        MODE_DEFAULT
    };
    header.extend_from_slice(&mode.to_be_bytes());
    header.extend_from_slice(&ndim.to_be_bytes());
    for size in bounded_shape.iter().rev() {
        let size = u32::try_from(*size).expect("chunk extent fits u32");
        header.extend_from_slice(&size.to_be_bytes());
    }
    if let Some(num_elements) = num_elements {
        let num_elements = u32::try_from(num_elements).expect("element count fits u32");
        header.extend_from_slice(&num_elements.to_be_bytes());
    }
    header
}

/// Decode an N5 chunk header, returning the header and the payload offset.
///
/// # Errors
/// Returns [`ArrayError::InvalidChunkHeader`] if the blob is truncated or the
/// mode is unknown.
pub(crate) fn decode_header(bytes: &[u8]) -> Result<(ChunkHeader, usize), ArrayError> {
    let header_err = |detail: &str| ArrayError::InvalidChunkHeader(detail.to_string());
    let read_u16 = |offset: usize| -> Result<u16, ArrayError> {
        bytes
            .get(offset..offset + 2)
            .map(|bytes| u16::from_be_bytes(bytes.try_into().expect("two bytes")))
            .ok_or_else(|| header_err("truncated header"))
    };
    let read_u32 = |offset: usize| -> Result<u32, ArrayError> {
        bytes
            .get(offset..offset + 4)
            .map(|bytes| u32::from_be_bytes(bytes.try_into().expect("four bytes")))
            .ok_or_else(|| header_err("truncated header"))
    };

    let mode = read_u16(0)?;
    if mode != MODE_DEFAULT && mode != MODE_VARLENGTH {
        return Err(header_err(&format!("unknown chunk mode {mode}")));
    }
    let ndim = usize::from(read_u16(2)?);
    let mut shape = ArrayShape::with_capacity(ndim);
    for d in 0..ndim {
        shape.push(u64::from(read_u32(4 + 4 * d)?));
    }
    // disk order is axis-reversed
    shape.reverse();
    let mut offset = 4 + 4 * ndim;
    let num_elements = if mode == MODE_VARLENGTH {
        let num_elements = u64::from(read_u32(offset)?);
        offset += 4;
        Some(num_elements)
    } else {
        None
    };
    Ok((ChunkHeader { shape, num_elements }, offset))
}
