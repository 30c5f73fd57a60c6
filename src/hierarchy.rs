//! Files and groups.
//!
//! A file is a root directory carrying a format marker: `.zgroup` with
//! `zarr_format: 2` for Zarr, `attributes.json` with an `"n5"` version key for
//! N5. A group is a nested container of groups and datasets. Zarr groups
//! carry their own `.zgroup` marker; N5 groups below the root are plain
//! directories.

use std::path::Path;

use thiserror::Error;

use crate::{
    metadata::{
        zarr::ZarrGroupMetadata, DataFormat, MetadataError, N5_ATTRIBUTES, N5_FORMAT_VERSION,
        ZARR_GROUP_METADATA,
    },
    storage::{AccessMode, GroupHandle, StorageError},
};

/// A hierarchy error.
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A malformed marker document.
    #[error(transparent)]
    MetadataError(#[from] MetadataError),
}

impl From<serde_json::Error> for HierarchyError {
    fn from(err: serde_json::Error) -> Self {
        Self::MetadataError(MetadataError::from(err))
    }
}

/// A group: a hierarchical container of groups and datasets.
#[derive(Clone, Debug)]
pub struct Group {
    handle: GroupHandle,
    format: DataFormat,
}

impl Group {
    fn write_marker(&self) -> Result<(), HierarchyError> {
        match self.format {
            DataFormat::Zarr => {
                let document = serde_json::to_string_pretty(&ZarrGroupMetadata::new())?;
                std::fs::write(self.handle.path().join(ZARR_GROUP_METADATA), document)
                    .map_err(StorageError::from)?;
            }
            // n5 groups below the root carry no marker
            DataFormat::N5 => {}
        }
        Ok(())
    }

    /// Return the path of the group.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Return the access mode of the group.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.handle.mode()
    }

    /// Return the format dialect of the group.
    #[must_use]
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Return the storage handle of the group.
    #[must_use]
    pub fn handle(&self) -> &GroupHandle {
        &self.handle
    }

    /// Create the child group `key`.
    ///
    /// # Errors
    /// - [`StorageError::PermissionDenied`] if the mode forbids creation.
    /// - [`StorageError::AlreadyExists`] if the child already exists.
    pub fn create_group(&self, key: &str) -> Result<Group, HierarchyError> {
        if !self.mode().can_create() {
            return Err(StorageError::PermissionDenied(self.mode(), "create").into());
        }
        let handle = self.handle.child_group(key);
        if handle.exists() {
            return Err(StorageError::AlreadyExists(handle.path().to_path_buf()).into());
        }
        handle.create_dir()?;
        let group = Group {
            handle,
            format: self.format,
        };
        group.write_marker()?;
        Ok(group)
    }

    /// Open the existing child group `key`.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if the child does not exist.
    pub fn open_group(&self, key: &str) -> Result<Group, HierarchyError> {
        let handle = self.handle.child_group(key);
        if !handle.exists() {
            return Err(StorageError::NotFound(handle.path().to_path_buf()).into());
        }
        Ok(Group {
            handle,
            format: self.format,
        })
    }

    /// Return the names of the children of the group, sorted.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the group cannot be listed.
    pub fn keys(&self) -> Result<Vec<String>, HierarchyError> {
        Ok(self.handle.keys()?)
    }

    /// Return true if a child `key` exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.handle.contains(key)
    }

    /// Open the existing child dataset `key`.
    ///
    /// # Errors
    /// See [`Dataset::open`](crate::array::Dataset::open).
    pub fn open_dataset(&self, key: &str) -> Result<crate::array::Dataset, crate::array::ArrayError> {
        crate::array::Dataset::open(self, key)
    }
}

/// A file: the root group of a hierarchy, carrying the format marker.
#[derive(Clone, Debug)]
pub struct File {
    root: Group,
}

impl File {
    /// Create a new file at `path` with format `format`.
    ///
    /// With [`AccessMode::Overwrite`] an existing file is replaced; with any
    /// other creating mode an existing path is an error.
    ///
    /// # Errors
    /// - [`StorageError::PermissionDenied`] if the mode forbids creation.
    /// - [`StorageError::AlreadyExists`] if the path exists and the mode does
    ///   not replace it.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: DataFormat,
        mode: AccessMode,
    ) -> Result<Self, HierarchyError> {
        let path = path.as_ref().to_path_buf();
        if !mode.can_create() {
            return Err(StorageError::PermissionDenied(mode, "create").into());
        }
        if path.exists() {
            if mode == AccessMode::Overwrite {
                std::fs::remove_dir_all(&path).map_err(StorageError::from)?;
            } else {
                return Err(StorageError::AlreadyExists(path).into());
            }
        }
        std::fs::create_dir_all(&path).map_err(StorageError::from)?;
        let root = Group {
            handle: GroupHandle::new(path, mode),
            format,
        };
        root.write_marker()?;
        if format == DataFormat::N5 {
            // the n5 root marker is the version key in attributes.json
            let document = serde_json::json!({ "n5": N5_FORMAT_VERSION });
            std::fs::write(
                root.path().join(N5_ATTRIBUTES),
                serde_json::to_string_pretty(&document)?,
            )
            .map_err(StorageError::from)?;
        }
        Ok(Self { root })
    }

    /// Open the existing file at `path`, detecting the format from its marker.
    ///
    /// # Errors
    /// - [`StorageError::NotFound`] if the path does not exist.
    /// - [`StorageError::AlreadyExists`] if the mode requires a fresh path.
    /// - [`StorageError::UnknownFormat`] if no marker is present.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self, HierarchyError> {
        let path = path.as_ref().to_path_buf();
        if mode.must_not_exist() && path.exists() {
            return Err(StorageError::AlreadyExists(path).into());
        }
        let handle = GroupHandle::new(path, mode);
        let format = handle.format_or(None)?;
        Ok(Self {
            root: Group { handle, format },
        })
    }

    /// Return the root group path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Return the access mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.root.mode()
    }

    /// Return the format dialect.
    #[must_use]
    pub fn format(&self) -> DataFormat {
        self.root.format()
    }

    /// Return the root group.
    #[must_use]
    pub fn root(&self) -> &Group {
        &self.root
    }
}

impl std::ops::Deref for File {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.root
    }
}

/// Create a new file at `path`.
///
/// Convenience wrapper over [`File::create`].
///
/// # Errors
/// See [`File::create`].
pub fn create_file<P: AsRef<Path>>(
    path: P,
    format: DataFormat,
    mode: AccessMode,
) -> Result<File, HierarchyError> {
    File::create(path, format, mode)
}

/// Open the existing file at `path`.
///
/// Convenience wrapper over [`File::open`].
///
/// # Errors
/// See [`File::open`].
pub fn open_file<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<File, HierarchyError> {
    File::open(path, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn root(dir: &Path) -> PathBuf {
        dir.join("data")
    }

    #[test]
    fn file_markers() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;

        let zarr = File::create(root(dir.path()).join("z"), DataFormat::Zarr, AccessMode::Append)?;
        let marker: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
            zarr.path().join(".zgroup"),
        )?)?;
        assert_eq!(marker, serde_json::json!({"zarr_format": 2}));

        let n5 = File::create(root(dir.path()).join("n"), DataFormat::N5, AccessMode::Append)?;
        let marker: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
            n5.path().join("attributes.json"),
        )?)?;
        assert_eq!(marker, serde_json::json!({"n5": "2.0.0"}));
        Ok(())
    }

    #[test]
    fn open_detects_the_format() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        File::create(root(dir.path()), DataFormat::N5, AccessMode::Append)?;
        let file = File::open(root(dir.path()), AccessMode::ReadOnly)?;
        assert_eq!(file.format(), DataFormat::N5);

        assert!(matches!(
            File::open(dir.path().join("missing"), AccessMode::ReadOnly),
            Err(HierarchyError::StorageError(StorageError::NotFound(_)))
        ));

        std::fs::create_dir(dir.path().join("unmarked"))?;
        assert!(matches!(
            File::open(dir.path().join("unmarked"), AccessMode::ReadOnly),
            Err(HierarchyError::StorageError(StorageError::UnknownFormat(_)))
        ));
        Ok(())
    }

    #[test]
    fn group_nesting_and_listing() -> Result<(), Box<dyn std::error::Error>> {
        for format in [DataFormat::Zarr, DataFormat::N5] {
            let dir = tempfile::TempDir::new()?;
            let file = File::create(root(dir.path()), format, AccessMode::Append)?;

            let outer = file.create_group("volumes")?;
            outer.create_group("raw")?;
            outer.create_group("labels")?;
            assert_eq!(outer.keys()?, vec!["labels", "raw"]);
            assert!(outer.contains("raw"));
            assert!(!outer.contains("missing"));

            let reopened = file.open_group("volumes")?.open_group("raw")?;
            assert_eq!(reopened.format(), format);

            if format.is_zarr() {
                assert!(reopened.path().join(".zgroup").is_file());
            }

            assert!(matches!(
                file.create_group("volumes"),
                Err(HierarchyError::StorageError(StorageError::AlreadyExists(_)))
            ));
            assert!(matches!(
                file.open_group("missing"),
                Err(HierarchyError::StorageError(StorageError::NotFound(_)))
            ));
        }
        Ok(())
    }

    #[test]
    fn create_modes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        File::create(root(dir.path()), DataFormat::Zarr, AccessMode::Append)?;

        // w- refuses to replace
        assert!(matches!(
            File::create(root(dir.path()), DataFormat::Zarr, AccessMode::CreateNew),
            Err(HierarchyError::StorageError(StorageError::AlreadyExists(_)))
        ));

        // w replaces
        let file = File::create(root(dir.path()), DataFormat::N5, AccessMode::Overwrite)?;
        assert_eq!(file.format(), DataFormat::N5);

        // r cannot create
        assert!(matches!(
            File::create(dir.path().join("ro"), DataFormat::Zarr, AccessMode::ReadOnly),
            Err(HierarchyError::StorageError(StorageError::PermissionDenied(_, _)))
        ));
        Ok(())
    }
}
