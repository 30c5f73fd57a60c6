//! The chunk compression pipeline.
//!
//! A [`Compression`] describes how the payload of a chunk is compressed on
//! disk. It is a tagged configuration rather than a trait object; the codec
//! implementations live in the submodules and operate on byte buffers. The
//! typed boundary (element counts, endianness) is handled by the dataset
//! engine before the codec is invoked.

pub mod blosc;
pub mod bzip2;
pub mod lz4;
pub mod xz;
pub mod zlib;

use derive_more::Display;
use thiserror::Error;

pub use blosc::{BloscCompressor, BloscShuffleMode};

/// The phase of a codec operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum CodecPhase {
    /// Compression.
    #[display("compression")]
    Compress,
    /// Decompression.
    #[display("decompression")]
    Decompress,
}

/// A codec error.
#[derive(Clone, Debug, Error)]
#[error("{codec} {phase} failed: {detail}")]
pub struct CodecError {
    codec: &'static str,
    phase: CodecPhase,
    detail: String,
}

impl CodecError {
    pub(crate) fn new(codec: &'static str, phase: CodecPhase, detail: impl Into<String>) -> Self {
        Self {
            codec,
            phase,
            detail: detail.into(),
        }
    }

    /// Return the codec that failed.
    #[must_use]
    pub fn codec(&self) -> &str {
        self.codec
    }

    /// Return the phase that failed.
    #[must_use]
    pub fn phase(&self) -> CodecPhase {
        self.phase
    }
}

/// The chunk compression configuration of a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    Raw,
    /// Blosc meta-compression.
    Blosc {
        /// The internal compressor.
        cname: BloscCompressor,
        /// Compression level, 0 to 9.
        clevel: u8,
        /// The shuffle mode.
        shuffle: BloscShuffleMode,
    },
    /// Deflate, with either zlib or gzip framing.
    Zlib {
        /// Compression level, 1 to 9.
        level: u32,
        /// True for zlib framing, false for gzip framing.
        ///
        /// Payloads of at most 22 bytes are always zlib-framed, regardless of
        /// this flag. Other readers of the format rely on this behaviour, so
        /// it must be preserved.
        zlib_framing: bool,
    },
    /// Bzip2.
    Bzip2 {
        /// Compression level (100 kB block size multiplier), 1 to 9.
        level: u32,
    },
    /// LZ4 block compression.
    Lz4 {
        /// Accepted for metadata fidelity; the block codec does not use it.
        level: u32,
    },
    /// Xz (LZMA2).
    Xz {
        /// Compression preset, 0 to 9.
        preset: u32,
    },
}

/// The maximum payload size in bytes that is always zlib-framed, even when
/// gzip framing is configured.
pub(crate) const SMALL_PAYLOAD_ZLIB_MAX: usize = 22;

impl Compression {
    /// Return true for the raw (identity) compression.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw)
    }

    /// Validate the configured levels against the ranges of the codecs.
    ///
    /// # Errors
    /// Returns the offending field and value.
    pub fn validate(&self) -> Result<(), (&'static str, u64)> {
        match self {
            Self::Raw | Self::Lz4 { .. } => Ok(()),
            Self::Blosc { clevel, .. } => {
                if *clevel <= 9 {
                    Ok(())
                } else {
                    Err(("blosc clevel", u64::from(*clevel)))
                }
            }
            Self::Zlib { level, .. } => {
                if (1..=9).contains(level) {
                    Ok(())
                } else {
                    Err(("zlib level", u64::from(*level)))
                }
            }
            Self::Bzip2 { level } => {
                if (1..=9).contains(level) {
                    Ok(())
                } else {
                    Err(("bzip2 level", u64::from(*level)))
                }
            }
            Self::Xz { preset } => {
                if *preset <= 9 {
                    Ok(())
                } else {
                    Err(("xz preset", u64::from(*preset)))
                }
            }
        }
    }

    /// Compress `bytes`.
    ///
    /// `element_size` is the size of an element of the decoded data; it
    /// parameterises shuffling codecs.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the underlying compression library fails.
    pub fn encode(&self, bytes: &[u8], element_size: usize) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Raw => Ok(bytes.to_vec()),
            Self::Blosc {
                cname,
                clevel,
                shuffle,
            } => blosc::compress(bytes, *cname, *clevel, *shuffle, element_size),
            Self::Zlib { level, zlib_framing } => zlib::compress(bytes, *level, *zlib_framing),
            Self::Bzip2 { level } => bzip2::compress(bytes, *level),
            Self::Lz4 { .. } => lz4::compress(bytes),
            Self::Xz { preset } => xz::compress(bytes, *preset),
        }
    }

    /// Decompress `bytes` into `out`, which must be sized to the exact
    /// expected decoded byte count.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the underlying compression library fails or
    /// the decoded size does not match `out`.
    pub fn decode(&self, bytes: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        match self {
            Self::Raw => {
                if bytes.len() != out.len() {
                    return Err(CodecError::new(
                        "raw",
                        CodecPhase::Decompress,
                        format!("got {} bytes, expected {}", bytes.len(), out.len()),
                    ));
                }
                out.copy_from_slice(bytes);
                Ok(())
            }
            Self::Blosc { .. } => blosc::decompress(bytes, out),
            Self::Zlib { zlib_framing, .. } => zlib::decompress(bytes, out, *zlib_framing),
            Self::Bzip2 { .. } => bzip2::decompress(bytes, out),
            Self::Lz4 { .. } => lz4::decompress(bytes, out),
            Self::Xz { .. } => xz::decompress(bytes, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codecs() -> Vec<Compression> {
        vec![
            Compression::Raw,
            Compression::Blosc {
                cname: BloscCompressor::LZ4,
                clevel: 5,
                shuffle: BloscShuffleMode::Shuffle,
            },
            Compression::Blosc {
                cname: BloscCompressor::Zstd,
                clevel: 3,
                shuffle: BloscShuffleMode::BitShuffle,
            },
            Compression::Zlib {
                level: 5,
                zlib_framing: true,
            },
            Compression::Zlib {
                level: 5,
                zlib_framing: false,
            },
            Compression::Bzip2 { level: 5 },
            Compression::Lz4 { level: 0 },
            Compression::Xz { preset: 3 },
        ]
    }

    #[test]
    fn codec_round_trips() {
        let data: Vec<u8> = (0..4096u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
        for compression in codecs() {
            let encoded = compression.encode(&data, 4).unwrap();
            let mut decoded = vec![0u8; data.len()];
            compression.decode(&encoded, &mut decoded).unwrap();
            assert_eq!(decoded, data, "round trip failed for {compression:?}");
        }
    }

    #[test]
    fn codec_round_trips_small_payload() {
        // small payloads exercise the zlib small-input framing exception
        let data = [7u8; 8];
        for compression in codecs() {
            let encoded = compression.encode(&data, 8).unwrap();
            let mut decoded = vec![0u8; data.len()];
            compression.decode(&encoded, &mut decoded).unwrap();
            assert_eq!(decoded, data, "round trip failed for {compression:?}");
        }
    }

    #[test]
    fn small_gzip_payload_is_zlib_framed() {
        let compression = Compression::Zlib {
            level: 5,
            zlib_framing: false,
        };
        let data = [1u8; 16];
        let encoded = compression.encode(&data, 1).unwrap();
        // zlib framing: 0x78 header, not the gzip magic 0x1f 0x8b
        assert_eq!(encoded[0], 0x78);

        let data = [1u8; 64];
        let encoded = compression.encode(&data, 1).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn raw_decode_rejects_wrong_size() {
        let mut out = vec![0u8; 4];
        assert!(Compression::Raw.decode(&[1, 2, 3], &mut out).is_err());
    }
}
