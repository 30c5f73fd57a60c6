//! Deflate compression with zlib or gzip framing.
//!
//! The framing is negotiated at metadata time: the Zarr `zlib` compressor and
//! payloads of at most 22 bytes use zlib framing, everything else uses gzip
//! framing. Decompression tolerates a truncated trailer as long as the
//! expected byte count was produced.

use std::io::Read;

use flate2::bufread::{GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder};

use super::{CodecError, CodecPhase, SMALL_PAYLOAD_ZLIB_MAX};

const IDENTIFIER: &str = "zlib";

fn error(phase: CodecPhase, detail: impl Into<String>) -> CodecError {
    CodecError::new(IDENTIFIER, phase, detail)
}

fn use_zlib_framing(zlib_framing: bool, decoded_len: usize) -> bool {
    zlib_framing || decoded_len <= SMALL_PAYLOAD_ZLIB_MAX
}

pub(crate) fn compress(
    bytes: &[u8],
    level: u32,
    zlib_framing: bool,
) -> Result<Vec<u8>, CodecError> {
    let compression = flate2::Compression::new(level);
    let mut out = Vec::new();
    if use_zlib_framing(zlib_framing, bytes.len()) {
        ZlibEncoder::new(bytes, compression)
            .read_to_end(&mut out)
            .map_err(|err| error(CodecPhase::Compress, err.to_string()))?;
    } else {
        GzEncoder::new(bytes, compression)
            .read_to_end(&mut out)
            .map_err(|err| error(CodecPhase::Compress, err.to_string()))?;
    }
    Ok(out)
}

pub(crate) fn decompress(
    bytes: &[u8],
    out: &mut [u8],
    zlib_framing: bool,
) -> Result<(), CodecError> {
    if use_zlib_framing(zlib_framing, out.len()) {
        decompress_into(ZlibDecoder::new(bytes), out)
    } else {
        decompress_into(GzDecoder::new(bytes), out)
    }
}

fn decompress_into<R: Read>(mut decoder: R, out: &mut [u8]) -> Result<(), CodecError> {
    decoder
        .read_exact(out)
        .map_err(|err| error(CodecPhase::Decompress, err.to_string()))?;
    // The expected element count has been produced; a stream with a missing
    // trailer is accepted for compatibility, but surplus decoded bytes are not.
    let mut surplus = [0u8; 1];
    if matches!(decoder.read(&mut surplus), Ok(read) if read != 0) {
        return Err(error(
            CodecPhase::Decompress,
            "stream decoded to more bytes than expected",
        ));
    }
    Ok(())
}
