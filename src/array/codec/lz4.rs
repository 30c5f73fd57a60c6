//! LZ4 block compression.
//!
//! Chunk payloads are compressed as a single LZ4 block without a length
//! prefix; the expected decoded size is known from the chunk shape. The
//! configured compression level is accepted in metadata but not applied.

use super::{CodecError, CodecPhase};

const IDENTIFIER: &str = "lz4";

fn error(phase: CodecPhase, detail: impl Into<String>) -> CodecError {
    CodecError::new(IDENTIFIER, phase, detail)
}

pub(crate) fn compress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    lz4::block::compress(bytes, None, false)
        .map_err(|err| error(CodecPhase::Compress, err.to_string()))
}

pub(crate) fn decompress(bytes: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    let size = i32::try_from(out.len())
        .map_err(|_| error(CodecPhase::Decompress, "expected size exceeds the block limit"))?;
    let decoded = lz4::block::decompress(bytes, Some(size))
        .map_err(|err| error(CodecPhase::Decompress, err.to_string()))?;
    if decoded.len() != out.len() {
        return Err(error(
            CodecPhase::Decompress,
            format!("decoded {} bytes, expected {}", decoded.len(), out.len()),
        ));
    }
    out.copy_from_slice(&decoded);
    Ok(())
}
