//! Bzip2 compression.

use std::io::Read;

use bzip2::read::{BzDecoder, BzEncoder};

use super::{CodecError, CodecPhase};

const IDENTIFIER: &str = "bzip2";

fn error(phase: CodecPhase, detail: impl Into<String>) -> CodecError {
    CodecError::new(IDENTIFIER, phase, detail)
}

pub(crate) fn compress(bytes: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    BzEncoder::new(bytes, bzip2::Compression::new(level))
        .read_to_end(&mut out)
        .map_err(|err| error(CodecPhase::Compress, err.to_string()))?;
    Ok(out)
}

pub(crate) fn decompress(bytes: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    let mut decoder = BzDecoder::new(bytes);
    decoder
        .read_exact(out)
        .map_err(|err| error(CodecPhase::Decompress, err.to_string()))?;
    let mut surplus = [0u8; 1];
    let read = decoder
        .read(&mut surplus)
        .map_err(|err| error(CodecPhase::Decompress, err.to_string()))?;
    if read != 0 {
        return Err(error(
            CodecPhase::Decompress,
            "stream decoded to more bytes than expected",
        ));
    }
    Ok(())
}
