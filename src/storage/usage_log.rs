//! A storage adapter which logs storage method calls.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use itertools::Itertools;

use super::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// The usage log storage adapter. Logs storage method calls.
///
/// It is intended to aid in debugging and optimising performance by revealing storage access patterns.
/// For an append session, this shows exactly when chunks are written and arrays are resized.
///
/// ### Example (log to stdout)
/// ```rust
/// # use std::sync::{Arc, Mutex};
/// # use zarrs_append::storage::{store::MemoryStore, UsageLogStorageAdapter};
/// let store = Arc::new(MemoryStore::new());
/// let log_writer = Arc::new(Mutex::new(std::io::stdout()));
/// let store = Arc::new(UsageLogStorageAdapter::new(store, log_writer, || "[usage] ".to_string()));
/// ```
///
/// Appending to an array through the above adapter prints outputs like:
/// ```text
/// [usage] get(numbers/c/0) -> len=Ok(None)
/// [usage] set(numbers/c/0, len=16) -> Ok(())
/// [usage] set(numbers/zarr.json, len=487) -> Ok(())
/// ```
pub struct UsageLogStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    handle: Arc<Mutex<dyn Write + Send + Sync>>,
    prefix_func: fn() -> String,
}

impl<TStorage: ?Sized> core::fmt::Debug for UsageLogStorageAdapter<TStorage> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "usage log")
    }
}

impl<TStorage: ?Sized> UsageLogStorageAdapter<TStorage> {
    /// Create a new usage log storage adapter.
    ///
    /// Each log line is prefixed by the output of `prefix_func` (e.g. a timestamp).
    pub fn new(
        storage: Arc<TStorage>,
        handle: Arc<Mutex<dyn Write + Send + Sync>>,
        prefix_func: fn() -> String,
    ) -> Self {
        Self {
            storage,
            handle,
            prefix_func,
        }
    }

    fn log(&self, message: std::fmt::Arguments<'_>) -> Result<(), StorageError> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| StorageError::Other("the usage log writer is poisoned".to_string()))?;
        writeln!(handle, "{}{message}", (self.prefix_func)())?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let result = self.storage.get(key);
        self.log(format_args!(
            "get({key}) -> len={:?}",
            result.as_ref().map(|v| v.as_ref().map(Vec::len))
        ))?;
        result
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let result = self.storage.size_key(key);
        self.log(format_args!("size_key({key}) -> {result:?}"))?;
        result
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        let result = self.storage.set(key, value);
        self.log(format_args!(
            "set({key}, len={}) -> {result:?}",
            value.len()
        ))?;
        result
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        let result = self.storage.erase(key);
        self.log(format_args!("erase({key}) -> {result:?}"))?;
        result
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        let result = self.storage.erase_prefix(prefix);
        self.log(format_args!("erase_prefix({prefix}) -> {result:?}"))?;
        result
    }
}

impl<TStorage: ?Sized + ListableStorageTraits> ListableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn list(&self) -> Result<StoreKeys, StorageError> {
        let result = self.storage.list();
        self.log(format_args!(
            "list() -> [{}]",
            result.as_ref().map(|keys| keys.iter().join(", ")).unwrap_or_default()
        ))?;
        result
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let result = self.storage.list_prefix(prefix);
        self.log(format_args!(
            "list_prefix({prefix}) -> [{}]",
            result.as_ref().map(|keys| keys.iter().join(", ")).unwrap_or_default()
        ))?;
        result
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let result = self.storage.list_dir(prefix);
        self.log(format_args!(
            "list_dir({prefix}) -> {}",
            result
                .as_ref()
                .map(|keys_prefixes| format!(
                    "(keys:[{}], prefixes:[{}])",
                    keys_prefixes.keys().iter().join(", "),
                    keys_prefixes.prefixes().iter().join(", ")
                ))
                .unwrap_or_default()
        ))?;
        result
    }
}
