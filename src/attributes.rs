//! User attributes.
//!
//! Every file, group, and dataset can carry an arbitrary JSON object of user
//! attributes. In the Zarr dialect they live in a `.zattrs` document next to
//! the metadata; in N5 they share `attributes.json` with the reserved metadata
//! keys, which are hidden on read and refused on write.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    array::Dataset,
    hierarchy::{File, Group},
    metadata::{n5::N5_RESERVED_ATTRIBUTES, DataFormat, MetadataError, N5_ATTRIBUTES, ZARR_ATTRIBUTES},
    storage::{AccessMode, StorageError},
};

/// A JSON object of user attributes.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// An attribute error.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A malformed attributes document.
    #[error(transparent)]
    MetadataError(#[from] MetadataError),
    /// A key reserved for N5 metadata.
    #[error("attribute key {0:?} is reserved for n5 metadata")]
    ReservedKey(String),
    /// A key that does not exist.
    #[error("attribute key {0:?} does not exist")]
    KeyNotFound(String),
}

/// A node of the hierarchy that carries attributes: a file, group, or dataset.
pub trait Node {
    /// Return the directory of the node.
    fn node_path(&self) -> &Path;

    /// Return the access mode of the node.
    fn node_mode(&self) -> AccessMode;

    /// Return the format dialect of the node.
    fn node_format(&self) -> DataFormat;
}

impl Node for File {
    fn node_path(&self) -> &Path {
        self.path()
    }

    fn node_mode(&self) -> AccessMode {
        self.mode()
    }

    fn node_format(&self) -> DataFormat {
        self.format()
    }
}

impl Node for Group {
    fn node_path(&self) -> &Path {
        self.path()
    }

    fn node_mode(&self) -> AccessMode {
        self.mode()
    }

    fn node_format(&self) -> DataFormat {
        self.format()
    }
}

impl Node for Dataset {
    fn node_path(&self) -> &Path {
        self.handle().path()
    }

    fn node_mode(&self) -> AccessMode {
        self.handle().mode()
    }

    fn node_format(&self) -> DataFormat {
        self.format()
    }
}

fn attributes_path(node: &impl Node) -> PathBuf {
    let document = match node.node_format() {
        DataFormat::Zarr => ZARR_ATTRIBUTES,
        DataFormat::N5 => N5_ATTRIBUTES,
    };
    node.node_path().join(document)
}

fn is_reserved(key: &str) -> bool {
    N5_RESERVED_ATTRIBUTES.contains(&key)
}

fn read_document(path: &Path) -> Result<Attributes, AttributeError> {
    match std::fs::read_to_string(path) {
        Ok(document) => {
            let attributes: Attributes =
                serde_json::from_str(&document).map_err(MetadataError::from)?;
            Ok(attributes)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Attributes::new()),
        Err(err) => Err(StorageError::from(err).into()),
    }
}

fn write_document(path: &Path, attributes: &Attributes) -> Result<(), AttributeError> {
    let document = serde_json::to_string_pretty(attributes).map_err(MetadataError::from)?;
    std::fs::write(path, document).map_err(StorageError::from)?;
    Ok(())
}

fn check_writable(node: &impl Node) -> Result<(), AttributeError> {
    if node.node_mode().can_write() {
        Ok(())
    } else {
        Err(StorageError::PermissionDenied(node.node_mode(), "write").into())
    }
}

/// Read the user attributes of `node`.
///
/// Returns an empty object if no attributes have been written. For N5 nodes
/// the reserved metadata keys are hidden.
///
/// # Errors
/// Returns [`AttributeError`] on a storage failure or a malformed document.
pub fn read_attributes(node: &impl Node) -> Result<Attributes, AttributeError> {
    let mut attributes = read_document(&attributes_path(node))?;
    if node.node_format() == DataFormat::N5 {
        attributes.retain(|key, _| !is_reserved(key));
    }
    Ok(attributes)
}

/// Merge `attributes` into the attributes of `node`.
///
/// Existing keys are overwritten; other keys are preserved. For N5 nodes any
/// reserved metadata key in `attributes` is refused before anything is
/// written.
///
/// # Errors
/// Returns [`AttributeError`] on a reserved key, a storage failure, or a
/// malformed existing document.
pub fn write_attributes(
    node: &impl Node,
    attributes: &Attributes,
) -> Result<(), AttributeError> {
    check_writable(node)?;
    if node.node_format() == DataFormat::N5 {
        if let Some(key) = attributes.keys().find(|key| is_reserved(key)) {
            return Err(AttributeError::ReservedKey(key.clone()));
        }
    }
    let path = attributes_path(node);
    let mut merged = read_document(&path)?;
    for (key, value) in attributes {
        merged.insert(key.clone(), value.clone());
    }
    write_document(&path, &merged)
}

/// Remove the attribute `key` of `node`.
///
/// # Errors
/// Returns [`AttributeError::KeyNotFound`] if the key does not exist and
/// [`AttributeError::ReservedKey`] for reserved N5 metadata keys.
pub fn remove_attribute(node: &impl Node, key: &str) -> Result<(), AttributeError> {
    check_writable(node)?;
    if node.node_format() == DataFormat::N5 && is_reserved(key) {
        return Err(AttributeError::ReservedKey(key.to_string()));
    }
    let path = attributes_path(node);
    let mut attributes = read_document(&path)?;
    if attributes.remove(key).is_none() {
        return Err(AttributeError::KeyNotFound(key.to_string()));
    }
    write_document(&path, &attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::AccessMode;

    fn make_file(dir: &std::path::Path, format: DataFormat) -> File {
        File::create(dir.join("data"), format, AccessMode::Append).unwrap()
    }

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn attributes_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        for format in [DataFormat::Zarr, DataFormat::N5] {
            let dir = tempfile::TempDir::new()?;
            let file = make_file(dir.path(), format);
            let group = file.create_group("observations")?;

            assert!(read_attributes(&group)?.is_empty());
            write_attributes(&group, &attrs(&[("instrument", json!("em1"))]))?;
            write_attributes(&group, &attrs(&[("resolution", json!([4, 4, 40]))]))?;

            let read = read_attributes(&group)?;
            assert_eq!(read["instrument"], json!("em1"));
            assert_eq!(read["resolution"], json!([4, 4, 40]));

            remove_attribute(&group, "instrument")?;
            assert!(!read_attributes(&group)?.contains_key("instrument"));
            assert!(matches!(
                remove_attribute(&group, "instrument"),
                Err(AttributeError::KeyNotFound(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn n5_reserved_keys_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::N5);
        let dataset = crate::array::DatasetBuilder::new(
            vec![10, 10],
            crate::array::DataType::UInt8,
            vec![5, 5],
        )
        .build(&file, "masks")?;

        // metadata keys are hidden from the attribute view
        assert!(read_attributes(&dataset)?.is_empty());

        // and cannot be overwritten or removed
        for key in ["dimensions", "blockSize", "dataType", "compression", "n5"] {
            assert!(matches!(
                write_attributes(&dataset, &attrs(&[(key, json!("clobbered"))])),
                Err(AttributeError::ReservedKey(_))
            ));
            assert!(matches!(
                remove_attribute(&dataset, key),
                Err(AttributeError::ReservedKey(_))
            ));
        }

        // user attributes coexist with the metadata in the same document
        write_attributes(&dataset, &attrs(&[("label", json!("cells"))]))?;
        let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
            dataset.handle().path().join("attributes.json"),
        )?)?;
        assert_eq!(document["label"], json!("cells"));
        assert_eq!(document["dataType"], json!("uint8"));

        let reopened = crate::array::Dataset::open(&file, "masks")?;
        assert_eq!(reopened.shape(), &[10, 10]);
        Ok(())
    }

    #[test]
    fn n5_root_attributes_preserve_the_version_marker() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = make_file(dir.path(), DataFormat::N5);
        write_attributes(&file, &attrs(&[("project", json!("cremi"))]))?;

        let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
            file.path().join("attributes.json"),
        )?)?;
        assert_eq!(document["n5"], json!("2.0.0"));
        assert_eq!(document["project"], json!("cremi"));
        assert!(!read_attributes(&file)?.contains_key("n5"));
        Ok(())
    }

    #[test]
    fn read_only_mode_rejects_attribute_writes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        make_file(dir.path(), DataFormat::Zarr);
        let file = File::open(dir.path().join("data"), AccessMode::ReadOnly)?;
        assert!(matches!(
            write_attributes(&file, &attrs(&[("k", json!(1))])),
            Err(AttributeError::StorageError(
                StorageError::PermissionDenied(_, _)
            ))
        ));
        Ok(())
    }
}
