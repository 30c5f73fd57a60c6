//! Storage backends.
//!
//! The filesystem is the reference backend: files, groups, and datasets are
//! directories, chunks are files inside a dataset directory. Handles are
//! value-semantic — they carry the path, access mode, and whatever descriptor
//! data they need by copy, so they can be freely cloned across threads.

pub mod filesystem;

use std::path::PathBuf;

use derive_more::Display;
use thiserror::Error;

pub use filesystem::{ChunkHandle, DatasetHandle, GroupHandle};

/// The access mode of a file and the handles derived from it.
///
/// Follows the conventional open modes:
/// `r` read-only, `r+` read-write (must exist), `w` create (replacing any
/// existing content), `w-` create (must not exist), `a` read-write (created
/// on demand).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum AccessMode {
    /// `r`: read-only; the file must exist.
    #[display("r")]
    ReadOnly,
    /// `r+`: read-write; the file must exist.
    #[display("r+")]
    ReadWrite,
    /// `w`: create, replacing an existing file.
    #[display("w")]
    Overwrite,
    /// `w-`: create; the file must not exist.
    #[display("w-")]
    CreateNew,
    /// `a`: read-write, created on demand.
    #[display("a")]
    Append,
}

impl AccessMode {
    /// Return true if the mode permits reading.
    #[must_use]
    pub fn can_read(self) -> bool {
        true
    }

    /// Return true if the mode permits writing.
    #[must_use]
    pub fn can_write(self) -> bool {
        self != Self::ReadOnly
    }

    /// Return true if the mode permits creating new files, groups, and datasets.
    #[must_use]
    pub fn can_create(self) -> bool {
        matches!(self, Self::Overwrite | Self::CreateNew | Self::Append)
    }

    /// Return true if the mode requires the file to not exist yet.
    #[must_use]
    pub fn must_not_exist(self) -> bool {
        self == Self::CreateNew
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::Append
    }
}

/// An invalid access mode string error.
#[derive(Clone, Debug, Error)]
#[error("invalid access mode {0:?}, expected one of r, r+, w, w-, a")]
pub struct InvalidAccessModeError(String);

impl std::str::FromStr for AccessMode {
    type Err = InvalidAccessModeError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "r" => Ok(Self::ReadOnly),
            "r+" => Ok(Self::ReadWrite),
            "w" => Ok(Self::Overwrite),
            "w-" => Ok(Self::CreateNew),
            "a" => Ok(Self::Append),
            _ => Err(InvalidAccessModeError(mode.to_string())),
        }
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An underlying I/O error.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// A path that was required to exist does not.
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    /// A path that was required to not exist does.
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    /// The access mode forbids the operation.
    #[error("operation requires {1} permission, but the access mode is {0}")]
    PermissionDenied(AccessMode, &'static str),
    /// A path carries neither Zarr nor N5 metadata.
    #[error("{0} is neither in the zarr nor the n5 format")]
    UnknownFormat(PathBuf),
    /// A path carries both Zarr and N5 metadata.
    #[error("{0} has both zarr and n5 metadata")]
    AmbiguousFormat(PathBuf),
}
