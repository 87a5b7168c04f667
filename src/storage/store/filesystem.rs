//! A filesystem store.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/stores/filesystem/v1.0.html>.

use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

use crate::storage::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeyError, StoreKeys, StoreKeysPrefixes, StorePrefix, StorePrefixes,
    WritableStorageTraits,
};

/// A filesystem store.
///
/// Each store key maps to a file below the base directory, e.g. `group/array/c/0` maps to `<base>/group/array/c/0`.
#[derive(Debug)]
pub struct FilesystemStore {
    base_directory: PathBuf,
    readonly: bool,
    write_lock: Mutex<()>,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// Base directory is an existing file.
    #[error("{0} is an existing file")]
    ExistingFile(PathBuf),
    /// The path is not valid on this system.
    #[error("base directory {0} is not valid")]
    InvalidBaseDirectory(PathBuf),
}

impl FilesystemStore {
    /// Create a new filesystem store at a given `base_directory`.
    /// The base directory will be created if it does not exist.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_directory`:
    ///   - is not valid UTF-8,
    ///   - points to an existing file rather than a directory, or
    ///   - cannot be created.
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if base_directory.to_str().is_none() {
            return Err(FilesystemStoreCreateError::InvalidBaseDirectory(
                base_directory,
            ));
        }
        if base_directory.is_file() {
            return Err(FilesystemStoreCreateError::ExistingFile(base_directory));
        }
        let readonly = if base_directory.is_dir() {
            std::fs::metadata(&base_directory)?
                .permissions()
                .readonly()
        } else {
            std::fs::create_dir_all(&base_directory)?;
            false
        };
        Ok(Self {
            base_directory,
            readonly,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the base directory of the store.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Maps a [`StoreKey`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        self.base_directory.join(key.as_str())
    }

    /// Maps a [`StorePrefix`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        self.base_directory.join(prefix.as_str())
    }

    fn fspath_to_key(&self, path: &Path) -> Result<StoreKey, StoreKeyError> {
        let relative = pathdiff::diff_paths(path, &self.base_directory).unwrap_or_default();
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        StoreKey::new(key)
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn walk_keys(&self, directory: &Path) -> StoreKeys {
        let mut keys: StoreKeys = WalkDir::new(directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.fspath_to_key(entry.path()).ok())
            .collect();
        keys.sort();
        keys
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let mut file = match File::open(self.key_to_fspath(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(self.key_to_fspath(key)) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        let _lock = self.write_lock.lock();
        let key_path = self.key_to_fspath(key);
        if let Some(parent) = key_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(key_path)?;
        file.write_all(value)?;
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.check_writable()?;
        let _lock = self.write_lock.lock();
        match std::fs::remove_file(self.key_to_fspath(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.check_writable()?;
        let _lock = self.write_lock.lock();
        let prefix_path = self.prefix_to_fspath(prefix);
        if prefix.as_str().is_empty() {
            // Keep the base directory itself
            for entry in std::fs::read_dir(prefix_path)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else {
                    std::fs::remove_file(path)?;
                }
            }
            Ok(())
        } else {
            match std::fs::remove_dir_all(prefix_path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            }
        }
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self.walk_keys(&self.prefix_to_fspath(prefix)))
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: StorePrefixes = vec![];
        let dir = match std::fs::read_dir(self.prefix_to_fspath(prefix)) {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(StoreKeysPrefixes::default())
            }
            Err(err) => return Err(err.into()),
        };
        for entry in dir {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if entry.file_type()?.is_dir() {
                prefixes.push(StorePrefix::new(format!("{}{name}/", prefix.as_str()))?);
            } else {
                keys.push(StoreKey::new(format!("{}{name}", prefix.as_str()))?);
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn filesystem_set() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        let key = "a/b".try_into()?;
        store.set(&key, &[0, 1, 2])?;
        assert_eq!(store.get(&key)?, Some(vec![0, 1, 2]));
        assert_eq!(store.size_key(&key)?, Some(3));
        store.set(&key, &[4])?;
        assert_eq!(store.get(&key)?, Some(vec![4]));
        store.erase(&key)?;
        assert_eq!(store.get(&key)?, None);
        assert_eq!(store.size_key(&key)?, None);
        Ok(())
    }

    #[test]
    fn filesystem_list() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&"a/b".try_into()?, &[])?;
        store.set(&"a/c".try_into()?, &[])?;
        store.set(&"a/d/e".try_into()?, &[])?;
        store.set(&"a/d/f".try_into()?, &[])?;
        store.erase(&"a/d/e".try_into()?)?;
        assert_eq!(
            store.list()?,
            &["a/b".try_into()?, "a/c".try_into()?, "a/d/f".try_into()?]
        );
        assert_eq!(
            store.list_prefix(&"a/d/".try_into()?)?,
            &["a/d/f".try_into()?]
        );
        store.erase_prefix(&"a/d/".try_into()?)?;
        assert_eq!(store.list()?, &["a/b".try_into()?, "a/c".try_into()?]);
        store.erase_prefix(&StorePrefix::root())?;
        assert!(store.list()?.is_empty());
        assert!(path.path().is_dir());
        Ok(())
    }

    #[test]
    fn filesystem_list_dir() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&"a/b".try_into()?, &[])?;
        store.set(&"a/c".try_into()?, &[])?;
        store.set(&"a/d/e".try_into()?, &[])?;
        store.set(&"a/f/g".try_into()?, &[])?;
        store.set(&"b/c/d".try_into()?, &[])?;

        let list_dir = store.list_dir(&"a/".try_into()?)?;
        assert_eq!(list_dir.keys(), &["a/b".try_into()?, "a/c".try_into()?]);
        assert_eq!(
            list_dir.prefixes(),
            &["a/d/".try_into()?, "a/f/".try_into()?]
        );
        assert_eq!(store.list_dir(&"x/".try_into()?)?, StoreKeysPrefixes::default());
        Ok(())
    }

    #[test]
    fn filesystem_existing_file() -> Result<(), Box<dyn Error>> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(matches!(
            FilesystemStore::new(file.path()),
            Err(FilesystemStoreCreateError::ExistingFile(_))
        ));
        Ok(())
    }
}
