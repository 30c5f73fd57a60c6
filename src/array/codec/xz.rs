//! Xz (LZMA2) compression.

use super::{CodecError, CodecPhase};

const IDENTIFIER: &str = "xz";

fn error(phase: CodecPhase, detail: impl Into<String>) -> CodecError {
    CodecError::new(IDENTIFIER, phase, detail)
}

pub(crate) fn compress(bytes: &[u8], preset: u32) -> Result<Vec<u8>, CodecError> {
    lzma::compress(bytes, preset).map_err(|err| error(CodecPhase::Compress, err.to_string()))
}

pub(crate) fn decompress(bytes: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    let decoded =
        lzma::decompress(bytes).map_err(|err| error(CodecPhase::Decompress, err.to_string()))?;
    if decoded.len() != out.len() {
        return Err(error(
            CodecPhase::Decompress,
            format!("decoded {} bytes, expected {}", decoded.len(), out.len()),
        ));
    }
    out.copy_from_slice(&decoded);
    Ok(())
}
