//! Filesystem handles.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    array::ArrayIndices,
    metadata::{DataFormat, N5_ATTRIBUTES, ZARR_ARRAY_METADATA, ZARR_GROUP_METADATA},
};

use super::{AccessMode, StorageError};

/// List the names of the child directories of `path`, sorted.
fn list_child_dirs(path: &Path) -> Result<Vec<String>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    let mut keys = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Ok(name) = entry.file_name().into_string() {
                keys.push(name);
            }
        }
    }
    keys.sort();
    Ok(keys)
}

/// A handle to a group directory.
#[derive(Clone, Debug)]
pub struct GroupHandle {
    path: PathBuf,
    mode: AccessMode,
}

impl GroupHandle {
    /// Create a handle at `path` with `mode`.
    #[must_use]
    pub fn new(path: PathBuf, mode: AccessMode) -> Self {
        Self { path, mode }
    }

    /// Return the path of the group.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the access mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Return true if the group directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the group directory.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn create_dir(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Remove the group directory and everything below it.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn remove(&self) -> Result<(), StorageError> {
        std::fs::remove_dir_all(&self.path)?;
        Ok(())
    }

    /// Return the names of the child directories, sorted.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if the group does not exist.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        list_child_dirs(&self.path)
    }

    /// Return true if a child directory `key` exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.path.join(key).is_dir()
    }

    /// Return a handle to the child group `key`.
    #[must_use]
    pub fn child_group(&self, key: &str) -> GroupHandle {
        GroupHandle::new(self.path.join(key), self.mode)
    }

    /// Return a handle to the child dataset `key`.
    #[must_use]
    pub fn child_dataset(&self, key: &str) -> DatasetHandle {
        DatasetHandle::new(self.path.join(key), self.mode)
    }

    /// Detect the format of the group from its markers.
    ///
    /// A Zarr group carries `.zgroup`; an N5 group either carries
    /// `attributes.json` or (below the root) no marker at all, so `fallback`
    /// decides when neither marker is present.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if the group does not exist.
    pub fn format_or(&self, fallback: Option<DataFormat>) -> Result<DataFormat, StorageError> {
        if !self.exists() {
            return Err(StorageError::NotFound(self.path.clone()));
        }
        if self.path.join(ZARR_GROUP_METADATA).is_file() {
            Ok(DataFormat::Zarr)
        } else if self.path.join(N5_ATTRIBUTES).is_file() {
            Ok(DataFormat::N5)
        } else {
            fallback.ok_or_else(|| StorageError::UnknownFormat(self.path.clone()))
        }
    }
}

/// A handle to a dataset directory.
#[derive(Clone, Debug)]
pub struct DatasetHandle {
    path: PathBuf,
    mode: AccessMode,
}

impl DatasetHandle {
    /// Create a handle at `path` with `mode`.
    #[must_use]
    pub fn new(path: PathBuf, mode: AccessMode) -> Self {
        Self { path, mode }
    }

    /// Return the path of the dataset.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the access mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Return true if the dataset directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the dataset directory.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn create_dir(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Remove the dataset directory and everything below it.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn remove(&self) -> Result<(), StorageError> {
        std::fs::remove_dir_all(&self.path)?;
        Ok(())
    }

    /// Infer the format dialect from the metadata present in the directory.
    ///
    /// # Errors
    /// - [`StorageError::NotFound`] if the dataset has not been created yet.
    /// - [`StorageError::UnknownFormat`] if neither metadata document exists.
    /// - [`StorageError::AmbiguousFormat`] if both metadata documents exist.
    pub fn format(&self) -> Result<DataFormat, StorageError> {
        if !self.exists() {
            return Err(StorageError::NotFound(self.path.clone()));
        }
        let is_zarr = self.path.join(ZARR_ARRAY_METADATA).is_file();
        let is_n5 = self.path.join(N5_ATTRIBUTES).is_file();
        match (is_zarr, is_n5) {
            (true, false) => Ok(DataFormat::Zarr),
            (false, true) => Ok(DataFormat::N5),
            (true, true) => Err(StorageError::AmbiguousFormat(self.path.clone())),
            (false, false) => Err(StorageError::UnknownFormat(self.path.clone())),
        }
    }

    /// Return the path of the metadata document for `format`.
    #[must_use]
    pub fn metadata_path(&self, format: DataFormat) -> PathBuf {
        match format {
            DataFormat::Zarr => self.path.join(ZARR_ARRAY_METADATA),
            DataFormat::N5 => self.path.join(N5_ATTRIBUTES),
        }
    }

    /// Return a handle to the chunk at `chunk_indices`.
    ///
    /// Zarr chunks are single files named by the dot-joined indices. N5 chunks
    /// are nested one directory per index, in reversed axis order.
    #[must_use]
    pub fn chunk(&self, chunk_indices: &[u64], format: DataFormat) -> ChunkHandle {
        let path = match format {
            DataFormat::Zarr => {
                let name = chunk_indices
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                self.path.join(name)
            }
            DataFormat::N5 => {
                let mut path = self.path.clone();
                for index in chunk_indices.iter().rev() {
                    path.push(index.to_string());
                }
                path
            }
        };
        ChunkHandle { path }
    }

    /// Return the coordinates of all chunks existing on disk.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn enumerate_chunks(&self, format: DataFormat) -> Result<Vec<ArrayIndices>, StorageError> {
        let mut chunks = Vec::new();
        match format {
            DataFormat::Zarr => {
                for entry in std::fs::read_dir(&self.path)? {
                    let entry = entry?;
                    if !entry.file_type()?.is_file() {
                        continue;
                    }
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    let indices: Option<ArrayIndices> =
                        name.split('.').map(|part| part.parse().ok()).collect();
                    if let Some(indices) = indices {
                        chunks.push(indices);
                    }
                }
            }
            DataFormat::N5 => {
                for entry in WalkDir::new(&self.path).into_iter().filter_map(Result::ok) {
                    if !entry.path().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&self.path) else {
                        continue;
                    };
                    let indices: Option<ArrayIndices> = relative
                        .components()
                        .map(|part| part.as_os_str().to_str().and_then(|s| s.parse().ok()))
                        .collect();
                    if let Some(mut indices) = indices {
                        // on-disk component order is axis-reversed
                        indices.reverse();
                        chunks.push(indices);
                    }
                }
            }
        }
        Ok(chunks)
    }
}

/// A handle to a single chunk blob.
#[derive(Clone, Debug)]
pub struct ChunkHandle {
    path: PathBuf,
}

impl ChunkHandle {
    /// Return the path of the chunk blob.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return true if the chunk blob exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the chunk blob, or [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure other than absence.
    pub fn read(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the chunk blob, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure.
    pub fn write(&self, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Delete the chunk blob if it exists.
    ///
    /// # Errors
    /// Returns [`StorageError`] on filesystem failure other than absence.
    pub fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
