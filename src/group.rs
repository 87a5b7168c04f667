//! Groups.
//!
//! A group is a node in a hierarchy which may have child nodes (groups or [arrays](crate::array)).
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#group>.
//!
//! Groups are created implicitly when an array is created at a nested path: appending to `a/b/c` creates the groups `/`, `/a`, and `/a/b`.
//! Existing groups are reused as is.
//!
//! A group stores its metadata in a `zarr.json` file. For example:
//! ```json
//! {
//!     "zarr_format": 3,
//!     "node_type": "group"
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    node::{NodePath, NodePathError},
    storage::{
        meta_key, retrieve_metadata_json, ReadableStorageTraits, StorageError,
        WritableStorageTraits,
    },
};

/// Group metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GroupMetadata {
    /// An integer defining the version of the storage specification to which the group adheres. Must be `3`.
    pub zarr_format: usize,
    /// A string defining the type of hierarchy node element, must be `group` here.
    pub node_type: String,
    /// Optional user metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self {
            zarr_format: 3,
            node_type: "group".to_string(),
            attributes: serde_json::Map::default(),
        }
    }
}

/// A group.
#[derive(Clone, Debug)]
pub struct Group<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    path: NodePath,
    metadata: GroupMetadata,
}

/// A group creation error.
#[derive(Debug, Error)]
pub enum GroupCreateError {
    /// Invalid zarr format.
    #[error("invalid zarr format {0}, expected 3")]
    InvalidZarrFormat(usize),
    /// Invalid node type.
    #[error("invalid node type {0}, expected group")]
    InvalidNodeType(String),
    /// An array already exists where a group is required.
    #[error("an array exists at {0}, expected a group")]
    ExistingArray(NodePath),
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error deserializing the metadata.
    #[error(transparent)]
    MetadataDeserializationError(#[from] serde_json::Error),
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Create a group in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Group::store_metadata) to write `metadata` to `storage`.
    ///
    /// # Errors
    /// Returns [`GroupCreateError`] if the path or metadata is invalid.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: GroupMetadata,
    ) -> Result<Self, GroupCreateError> {
        let path = NodePath::new(path)?;
        if metadata.zarr_format != 3 {
            return Err(GroupCreateError::InvalidZarrFormat(metadata.zarr_format));
        }
        if metadata.node_type != "group" {
            return Err(GroupCreateError::InvalidNodeType(metadata.node_type));
        }
        Ok(Self {
            storage,
            path,
            metadata,
        })
    }

    /// Get the path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the metadata.
    #[must_use]
    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    /// Get the attributes.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata.attributes
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Group<TStorage> {
    /// Open the group in `storage` at `path`. The metadata is read from the store.
    ///
    /// A path without metadata is an implicit group.
    ///
    /// # Errors
    /// Returns [`GroupCreateError`] if there is a storage error or the metadata is invalid.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupCreateError> {
        let node_path = NodePath::new(path)?;
        let metadata = match retrieve_metadata_json(&*storage, &node_path)? {
            Some(metadata) => serde_json::from_value(metadata)?,
            None => GroupMetadata::default(),
        };
        Self::new_with_metadata(storage, path, metadata)
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Group<TStorage> {
    /// Store metadata.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        let key = meta_key(&self.path);
        let json = serde_json::to_vec_pretty(&self.metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, &json)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> Group<TStorage> {
    /// Write default group metadata at `path` unless the node already has metadata.
    ///
    /// Returns `true` if the group was created, or `false` if an existing group was reused.
    ///
    /// # Errors
    /// Returns [`GroupCreateError::ExistingArray`] if an array exists at `path`, or an error if there is an underlying store error.
    pub fn create_if_missing(
        storage: &Arc<TStorage>,
        path: &NodePath,
    ) -> Result<bool, GroupCreateError> {
        match retrieve_metadata_json(&**storage, path)? {
            Some(metadata) if metadata["node_type"] == "array" => {
                Err(GroupCreateError::ExistingArray(path.clone()))
            }
            Some(_) => Ok(false),
            None => {
                let group = Self::new_with_metadata(
                    storage.clone(),
                    path.as_str(),
                    GroupMetadata::default(),
                )?;
                group.store_metadata()?;
                Ok(true)
            }
        }
    }
}

/// Create every missing ancestor group of the node at `path`, starting from the root.
///
/// # Errors
/// Returns [`GroupCreateError`] if an ancestor is an array or there is an underlying store error.
pub fn create_ancestor_groups<TStorage>(
    storage: &Arc<TStorage>,
    path: &NodePath,
) -> Result<(), GroupCreateError>
where
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits,
{
    for ancestor in path.ancestors() {
        if Group::create_if_missing(storage, &ancestor)? {
            tracing::debug!(group = %ancestor, "created group");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::storage::{store::MemoryStore, ListableStorageTraits};

    use super::*;

    const JSON_VALID: &str = r#"{
    "zarr_format": 3,
    "node_type": "group",
    "attributes": {
        "spam": "ham",
        "eggs": 42
    }
}"#;

    #[test]
    fn group_metadata() {
        let metadata: GroupMetadata = serde_json::from_str(JSON_VALID).unwrap();
        assert_eq!(metadata.attributes["eggs"], 42);
        let group =
            Group::new_with_metadata(Arc::new(MemoryStore::new()), "/group", metadata).unwrap();
        assert_eq!(group.attributes()["spam"], "ham");
    }

    #[test]
    fn group_metadata_invalid() {
        let store = Arc::new(MemoryStore::new());
        let metadata = GroupMetadata {
            node_type: "array".to_string(),
            ..GroupMetadata::default()
        };
        assert!(Group::new_with_metadata(store.clone(), "/", metadata).is_err());
        let metadata = GroupMetadata {
            zarr_format: 2,
            ..GroupMetadata::default()
        };
        assert!(Group::new_with_metadata(store, "/", metadata).is_err());
    }

    #[test]
    fn group_create_ancestors() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        create_ancestor_groups(&store, &NodePath::from_array_path("a/b/c")?)?;
        assert_eq!(
            store.list()?,
            &[
                "a/b/zarr.json".try_into()?,
                "a/zarr.json".try_into()?,
                "zarr.json".try_into()?
            ]
        );
        let group = Group::open(store.clone(), "/a/b")?;
        assert_eq!(group.metadata(), &GroupMetadata::default());

        // existing groups are reused
        assert!(!Group::create_if_missing(&store, &"/a/b".try_into()?)?);
        assert!(Group::create_if_missing(&store, &"/a/d".try_into()?)?);
        Ok(())
    }

    #[test]
    fn group_create_under_array() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        store.set(
            &"a/zarr.json".try_into()?,
            br#"{"zarr_format":3,"node_type":"array"}"#,
        )?;
        assert!(matches!(
            create_ancestor_groups(&store, &NodePath::from_array_path("a/b")?),
            Err(GroupCreateError::ExistingArray(_))
        ));
        Ok(())
    }
}
