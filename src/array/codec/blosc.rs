//! Blosc meta-compression.
//!
//! Uses the blosc context API, which is safe to call from multiple threads
//! without global library initialisation. Chunks are compressed with a single
//! internal thread and an automatic block size; parallelism in this crate is
//! across chunks, not within them.

use std::ffi::{c_char, c_int, c_void};

use blosc_sys::{
    blosc_cbuffer_sizes, blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx,
    BLOSC_BITSHUFFLE, BLOSC_BLOSCLZ_COMPNAME, BLOSC_LZ4HC_COMPNAME, BLOSC_LZ4_COMPNAME,
    BLOSC_MAX_OVERHEAD, BLOSC_NOSHUFFLE, BLOSC_SHUFFLE, BLOSC_SNAPPY_COMPNAME,
    BLOSC_ZLIB_COMPNAME, BLOSC_ZSTD_COMPNAME,
};

use super::{CodecError, CodecPhase};

const IDENTIFIER: &str = "blosc";

fn error(phase: CodecPhase, detail: impl Into<String>) -> CodecError {
    CodecError::new(IDENTIFIER, phase, detail)
}

/// The blosc internal compressor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BloscCompressor {
    /// BloscLZ, the blosc default compressor.
    BloscLZ,
    /// LZ4.
    LZ4,
    /// LZ4HC.
    LZ4HC,
    /// Snappy.
    Snappy,
    /// Zlib.
    Zlib,
    /// Zstd.
    Zstd,
}

impl BloscCompressor {
    /// Return the compressor name as used in metadata.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BloscLZ => "blosclz",
            Self::LZ4 => "lz4",
            Self::LZ4HC => "lz4hc",
            Self::Snappy => "snappy",
            Self::Zlib => "zlib",
            Self::Zstd => "zstd",
        }
    }

    /// Parse a compressor name from metadata.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "blosclz" => Some(Self::BloscLZ),
            "lz4" => Some(Self::LZ4),
            "lz4hc" => Some(Self::LZ4HC),
            "snappy" => Some(Self::Snappy),
            "zlib" => Some(Self::Zlib),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }

    const fn as_cstr(&self) -> *const u8 {
        match self {
            Self::BloscLZ => BLOSC_BLOSCLZ_COMPNAME.as_ptr(),
            Self::LZ4 => BLOSC_LZ4_COMPNAME.as_ptr(),
            Self::LZ4HC => BLOSC_LZ4HC_COMPNAME.as_ptr(),
            Self::Snappy => BLOSC_SNAPPY_COMPNAME.as_ptr(),
            Self::Zlib => BLOSC_ZLIB_COMPNAME.as_ptr(),
            Self::Zstd => BLOSC_ZSTD_COMPNAME.as_ptr(),
        }
    }
}

/// The blosc shuffle mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum BloscShuffleMode {
    /// No shuffling.
    NoShuffle = BLOSC_NOSHUFFLE,
    /// Byte-wise shuffling.
    Shuffle = BLOSC_SHUFFLE,
    /// Bit-wise shuffling.
    BitShuffle = BLOSC_BITSHUFFLE,
}

impl BloscShuffleMode {
    /// Return the shuffle mode as its metadata integer.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::NoShuffle => 0,
            Self::Shuffle => 1,
            Self::BitShuffle => 2,
        }
    }

    /// Parse a shuffle mode from its metadata integer.
    #[must_use]
    pub const fn from_u8(shuffle: u8) -> Option<Self> {
        match shuffle {
            0 => Some(Self::NoShuffle),
            1 => Some(Self::Shuffle),
            2 => Some(Self::BitShuffle),
            _ => None,
        }
    }
}

pub(crate) fn compress(
    src: &[u8],
    cname: BloscCompressor,
    clevel: u8,
    shuffle: BloscShuffleMode,
    typesize: usize,
) -> Result<Vec<u8>, CodecError> {
    let destsize = src.len() + BLOSC_MAX_OVERHEAD as usize;
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let written = unsafe {
        blosc_compress_ctx(
            c_int::from(clevel),
            shuffle as c_int,
            typesize,
            src.len(),
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            cname.as_cstr().cast::<c_char>(),
            0, // automatic block size
            1, // internal threads
        )
    };
    if written > 0 {
        #[allow(clippy::cast_sign_loss)]
        unsafe {
            dest.set_len(written as usize);
        }
        dest.shrink_to_fit();
        Ok(dest)
    } else {
        Err(error(
            CodecPhase::Compress,
            format!(
                "blosc_compress_ctx(clevel: {clevel}, shuffle: {shuffle:?}, typesize: {typesize}, \
                 nbytes: {}, compressor: {cname:?}) returned {written}",
                src.len()
            ),
        ))
    }
}

pub(crate) fn decompress(src: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    let mut nbytes: usize = 0;
    let mut cbytes: usize = 0;
    let mut blocksize: usize = 0;
    let valid = unsafe {
        blosc_cbuffer_validate(
            src.as_ptr().cast::<c_void>(),
            src.len(),
            std::ptr::addr_of_mut!(nbytes),
        )
    } == 0;
    if !valid {
        return Err(error(CodecPhase::Decompress, "invalid blosc buffer"));
    }
    unsafe {
        blosc_cbuffer_sizes(
            src.as_ptr().cast::<c_void>(),
            std::ptr::addr_of_mut!(nbytes),
            std::ptr::addr_of_mut!(cbytes),
            std::ptr::addr_of_mut!(blocksize),
        );
    }
    if nbytes != out.len() {
        return Err(error(
            CodecPhase::Decompress,
            format!("buffer holds {nbytes} bytes, expected {}", out.len()),
        ));
    }
    let written = unsafe {
        blosc_decompress_ctx(
            src.as_ptr().cast::<c_void>(),
            out.as_mut_ptr().cast::<c_void>(),
            out.len(),
            1, // internal threads
        )
    };
    #[allow(clippy::cast_sign_loss)]
    let written_bytes = if written > 0 { written as usize } else { 0 };
    if written_bytes == out.len() {
        Ok(())
    } else {
        Err(error(
            CodecPhase::Decompress,
            format!("blosc_decompress_ctx returned {written}"),
        ))
    }
}
