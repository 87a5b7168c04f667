//! Key/value storage backing arrays and groups.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#storage>.
//!
//! A [store] maps [`StoreKey`]s to byte values.
//! Storage capabilities are split into [`ReadableStorageTraits`], [`WritableStorageTraits`], and [`ListableStorageTraits`].
//! A [`UsageLogStorageAdapter`] can wrap any store to record the storage calls made by an array or an append session.

pub mod store;
mod store_key;
mod store_prefix;
mod usage_log;

use std::sync::Arc;

use thiserror::Error;

use crate::node::{NodePath, NodePathError};

pub use self::{
    store_key::{StoreKey, StoreKeyError, StoreKeys},
    store_prefix::{StorePrefix, StorePrefixError, StorePrefixes},
    usage_log::UsageLogStorageAdapter,
};

/// An alias for bytes which may or may not be available.
///
/// When a value is read from a store, it is [`None`] if the key is not available.
pub type MaybeBytes = Option<Vec<u8>>;

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Return the size in bytes of the value at `key`.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Store bytes at a [`StoreKey`], replacing any existing value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError>;

    /// Erase a [`StoreKey`].
    ///
    /// Succeeds if the key does not exist.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Erase all [`StoreKey`] under [`StorePrefix`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError>;
}

/// Listable storage traits.
pub trait ListableStorageTraits: Send + Sync {
    /// Retrieve all [`StoreKeys`] in the store.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list(&self) -> Result<StoreKeys, StorageError> {
        self.list_prefix(&StorePrefix::root())
    }

    /// Retrieve all [`StoreKeys`] with a given [`StorePrefix`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// Retrieve all [`StoreKeys`] and [`StorePrefix`] which are direct children of [`StorePrefix`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`], [`WritableStorageTraits`], and [`ListableStorageTraits`].
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

/// [`StoreKeys`] and [`StorePrefixes`].
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a new [`StoreKeysPrefixes`].
    #[must_use]
    pub fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// Returns the keys.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Returns the prefixes.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error parsing the metadata for a key.
    #[error("error parsing metadata for {0}: {1}")]
    InvalidMetadata(StoreKey, String),
    /// An invalid store prefix.
    #[error(transparent)]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error(transparent)]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Return the metadata key (`zarr.json`) given a node path.
#[must_use]
pub fn meta_key(path: &NodePath) -> StoreKey {
    let path = path.as_str();
    if path.eq("/") {
        unsafe { StoreKey::new_unchecked("zarr.json") }
    } else {
        let path = path.strip_prefix('/').unwrap_or(path);
        unsafe { StoreKey::new_unchecked(format!("{path}/zarr.json")) }
    }
}

/// Return the data key given a node path and chunk grid indices.
///
/// Keys use the `default` chunk key encoding with the `/` separator, e.g. `array/c/1/0`.
#[must_use]
pub fn data_key(path: &NodePath, chunk_grid_indices: &[u64]) -> StoreKey {
    let path = path.as_str();
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut key = if path.is_empty() {
        "c".to_string()
    } else {
        format!("{path}/c")
    };
    for index in chunk_grid_indices {
        key.push('/');
        key.push_str(&index.to_string());
    }
    unsafe { StoreKey::new_unchecked(key) }
}

/// Read and parse the JSON metadata of the node at `path`.
///
/// Returns [`None`] if the node has no metadata.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store or the metadata is not valid JSON.
pub fn retrieve_metadata_json<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Option<serde_json::Value>, StorageError> {
    let key = meta_key(path);
    storage
        .get(&key)?
        .map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))
        })
        .transpose()
}

/// Check if a node (a group or an array) has metadata in the store.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn node_exists<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<bool, StorageError> {
    Ok(storage.size_key(&meta_key(path))?.is_some())
}

/// Erase a node (group or array) and all of its children.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn erase_node<TStorage: ?Sized + WritableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<(), StorageError> {
    let prefix: StorePrefix = path.try_into()?;
    storage.erase_prefix(&prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys() {
        let root = NodePath::root();
        let array: NodePath = "/a/b".try_into().unwrap();
        assert_eq!(meta_key(&root).as_str(), "zarr.json");
        assert_eq!(meta_key(&array).as_str(), "a/b/zarr.json");
        assert_eq!(data_key(&array, &[3, 0, 0]).as_str(), "a/b/c/3/0/0");
        assert_eq!(data_key(&array, &[12]).as_str(), "a/b/c/12");
    }

    #[test]
    fn storage_node_exists() -> Result<(), Box<dyn std::error::Error>> {
        let store = store::MemoryStore::new();
        let path: NodePath = "/group".try_into()?;
        assert!(!node_exists(&store, &path)?);
        store.set(&meta_key(&path), br#"{"zarr_format":3,"node_type":"group"}"#)?;
        assert!(node_exists(&store, &path)?);
        let metadata = retrieve_metadata_json(&store, &path)?.unwrap();
        assert_eq!(metadata["node_type"], "group");
        erase_node(&store, &path)?;
        assert!(!node_exists(&store, &path)?);
        Ok(())
    }
}
