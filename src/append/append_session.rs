use std::{path::Path, sync::Arc};

use indexmap::{map::Entry, IndexMap};

use crate::{
    array::ArrayCreateError,
    group::create_ancestor_groups,
    node::NodePath,
    storage::{
        store::FilesystemStore, ReadableWritableListableStorageTraits, StorePrefix,
        WritableStorageTraits,
    },
};

use super::{AppendError, AppendOptions, AppendValue, ChunkedAppendBuffer, ValueConverter};

/// The mode of a session opened with [`AppendSession::open`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Erase any existing content of the store.
    #[default]
    Write,
    /// Keep the existing content of the store.
    ///
    /// Existing groups are reused, but appending to a path which already holds an array fails with [`ArrayCreateError::ArrayExists`].
    Append,
}

/// An append target: the buffer and value converter of a path.
#[derive(Debug)]
pub struct AppendTarget<TStorage: ?Sized> {
    buffer: ChunkedAppendBuffer<TStorage>,
    converter: ValueConverter,
    options: AppendOptions,
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> AppendTarget<TStorage> {
    /// Create the target of the first append of `value` to `path`.
    ///
    /// Nothing is created in the store if `value` is invalid or the options are invalid.
    fn create(
        storage: &Arc<TStorage>,
        path: &NodePath,
        value: &AppendValue,
        options: AppendOptions,
    ) -> Result<Self, AppendError> {
        let converter = ValueConverter::for_value(value)?;
        let element = converter.convert(value.clone())?;
        if element.shape().contains(&0) {
            return Err(AppendError::InvalidValue(format!(
                "element shape {:?} has a zero dimension",
                element.shape()
            )));
        }
        let element_shape = element.shape().iter().map(|&size| size as u64).collect();
        options.block_size()?;

        create_ancestor_groups(storage, path).map_err(ArrayCreateError::from)?;
        let buffer = ChunkedAppendBuffer::create(storage.clone(), path, element_shape, &options)?;
        Ok(Self {
            buffer,
            converter,
            options,
        })
    }

    /// Convert and append a value.
    ///
    /// # Errors
    /// Returns an [`AppendError`] if the value cannot be converted or the buffer rejects it.
    pub fn append(&mut self, value: impl Into<AppendValue>) -> Result<(), AppendError> {
        let element = self.converter.convert(value.into())?;
        self.buffer.append_normalized(&element)
    }
}

impl<TStorage: ?Sized> AppendTarget<TStorage> {
    /// Return the buffer.
    #[must_use]
    pub const fn buffer(&self) -> &ChunkedAppendBuffer<TStorage> {
        &self.buffer
    }

    /// Return the mutable buffer.
    #[must_use]
    pub fn buffer_mut(&mut self) -> &mut ChunkedAppendBuffer<TStorage> {
        &mut self.buffer
    }

    /// Return the value converter.
    #[must_use]
    pub const fn converter(&self) -> ValueConverter {
        self.converter
    }

    /// Return the options the target was created with.
    #[must_use]
    pub const fn options(&self) -> &AppendOptions {
        &self.options
    }
}

/// An append session.
///
/// A session routes values appended to slash separated paths to one [`ChunkedAppendBuffer`] per path.
/// The buffer of a path, and the array behind it, is created by the first append to the path.
/// Its element shape and [`ValueConverter`] are inferred from that first value, and the [`AppendOptions`] of that append set its data type, chunk size, and block factor.
///
/// Every buffer is flushed and its array trimmed when the session is [closed](AppendSession::close).
/// A session is closed when it is dropped, logging any error, so call [`close`](AppendSession::close) explicitly to handle errors.
///
/// ```rust
/// # use zarrs_append::{append::{AppendOptions, AppendSession, OpenMode}, array::DataType};
/// # let dir = tempfile::TempDir::new()?;
/// let mut session = AppendSession::open(dir.path(), OpenMode::Write)?.with_prefix("run/");
/// let options = AppendOptions::builder().data_type(DataType::Int32).chunk_size(100).build();
/// for i in 0..250 {
///     session.append_with_options(i, "counter", &options)?;
///     session.append((i, 2 * i), "pairs")?;
/// }
/// session.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct AppendSession<TStorage: ?Sized + ReadableWritableListableStorageTraits> {
    storage: Arc<TStorage>,
    prefix: Option<String>,
    targets: IndexMap<NodePath, AppendTarget<TStorage>>,
    closed: bool,
}

impl AppendSession<FilesystemStore> {
    /// Open a session over a [`FilesystemStore`] at `location`.
    ///
    /// # Errors
    /// Returns an [`AppendError`] if the store cannot be created, or its existing content cannot be erased in [`OpenMode::Write`].
    pub fn open<P: AsRef<Path>>(location: P, mode: OpenMode) -> Result<Self, AppendError> {
        let store = FilesystemStore::new(location.as_ref())?;
        if mode == OpenMode::Write {
            store.erase_prefix(&StorePrefix::root())?;
        }
        tracing::debug!(location = %location.as_ref().display(), ?mode, "opened session");
        Ok(Self::new(Arc::new(store)))
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> AppendSession<TStorage> {
    /// Create a session over `storage`.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self {
            storage,
            prefix: None,
            targets: IndexMap::new(),
            closed: false,
        }
    }

    /// Set the prefix prepended to every path.
    ///
    /// The prefix is concatenated as is, so `"prefix/"` and `"test"` resolve to `"prefix/test"`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.set_prefix(Some(prefix.into()));
        self
    }

    /// Set or clear the prefix prepended to every path.
    ///
    /// Paths which already have a target keep it, the prefix only applies to subsequent appends.
    pub fn set_prefix(&mut self, prefix: Option<String>) {
        self.prefix = prefix;
    }

    /// Return the prefix.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Return the storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.storage
    }

    /// Returns true if the session is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Return the node paths of the targets in the order they were created.
    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.targets.keys()
    }

    /// Resolve `path` (with the prefix) to a node path.
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidPath`] if the path is empty or has an invalid node name.
    pub fn resolve_path(&self, path: &str) -> Result<NodePath, AppendError> {
        let node_path = match &self.prefix {
            Some(prefix) => NodePath::from_array_path(&format!("{prefix}{path}")),
            None => NodePath::from_array_path(path),
        };
        Ok(node_path?)
    }

    /// Return the target of `path` (with the prefix), if it has one.
    #[must_use]
    pub fn target(&self, path: &str) -> Option<&AppendTarget<TStorage>> {
        let path = self.resolve_path(path).ok()?;
        self.targets.get(&path)
    }

    /// Return the mutable target of `path` (with the prefix), if it has one.
    #[must_use]
    pub fn target_mut(&mut self, path: &str) -> Option<&mut AppendTarget<TStorage>> {
        let path = self.resolve_path(path).ok()?;
        self.targets.get_mut(&path)
    }

    /// Append `value` to `path` with the [default options](AppendOptions::default).
    ///
    /// See [`append_with_options`](AppendSession::append_with_options).
    ///
    /// # Errors
    /// Returns an [`AppendError`] on failure.
    pub fn append(&mut self, value: impl Into<AppendValue>, path: &str) -> Result<(), AppendError> {
        let value = value.into();
        self.target_entry(path, &value, None)?.append(value)
    }

    /// Append `value` to `path`.
    ///
    /// If `path` has no target, one is created with `options`, see [`get_or_create`](AppendSession::get_or_create).
    /// The value is then converted and buffered, and the buffer writes a chunk if it is full.
    ///
    /// # Errors
    /// Returns an [`AppendError`] if:
    ///  - the session is closed,
    ///  - the path or value is invalid,
    ///  - the element shape of the value differs from the element shape of the path, or
    ///  - the array cannot be created or written.
    pub fn append_with_options(
        &mut self,
        value: impl Into<AppendValue>,
        path: &str,
        options: &AppendOptions,
    ) -> Result<(), AppendError> {
        let value = value.into();
        self.target_entry(path, &value, Some(options))?
            .append(value)
    }

    /// Return the target of `path`, creating it for a first append of `value` with `options` if it does not exist.
    ///
    /// Creating a target infers the element shape and value converter from `value`, creates any missing parent groups, and creates an array of one block of rows.
    /// Nothing is created if `value` or `options` are invalid.
    /// The options of an existing target are not changed, and a warning is logged if `options` differ from them.
    ///
    /// # Errors
    /// Returns an [`AppendError`] if the session is closed, or the target cannot be created.
    pub fn get_or_create(
        &mut self,
        path: &str,
        value: &AppendValue,
        options: &AppendOptions,
    ) -> Result<&mut AppendTarget<TStorage>, AppendError> {
        self.target_entry(path, value, Some(options))
    }

    fn target_entry(
        &mut self,
        path: &str,
        value: &AppendValue,
        options: Option<&AppendOptions>,
    ) -> Result<&mut AppendTarget<TStorage>, AppendError> {
        let path = self.resolve_path(path)?;
        if self.closed {
            return Err(AppendError::Closed(path));
        }
        match self.targets.entry(path) {
            Entry::Occupied(entry) => {
                let target = entry.into_mut();
                if let Some(options) = options {
                    if options != target.options() {
                        tracing::warn!(
                            array = %target.buffer().path(),
                            ?options,
                            current = ?target.options(),
                            "ignoring append options for an existing array"
                        );
                    }
                }
                Ok(target)
            }
            Entry::Vacant(entry) => {
                let options = options.cloned().unwrap_or_default();
                let target = AppendTarget::create(&self.storage, entry.key(), value, options)?;
                Ok(entry.insert(target))
            }
        }
    }

    /// Flush the pending rows of every target in the order they were created, without trimming.
    ///
    /// Unlike a trimming flush, the arrays keep their allocated length and the pending rows stay buffered.
    /// The flushed rows are readable from the store, and are written again as part of their chunk once it is full or the session is closed.
    /// Use [`ChunkedAppendBuffer::flush`] with `trim` through [`AppendTarget::buffer_mut`] to also trim an array.
    ///
    /// Every target is flushed even if one fails.
    ///
    /// # Errors
    /// Returns the first [`AppendError`] of a failed flush.
    pub fn flush_all(&mut self) -> Result<(), AppendError> {
        let mut result = Ok(());
        for target in self.targets.values_mut() {
            if let Err(err) = target.buffer.flush(false) {
                if result.is_ok() {
                    result = Err(err);
                } else {
                    tracing::error!(array = %target.buffer.path(), error = %err, "flush failed");
                }
            }
        }
        result
    }

    /// Close the session: flush every target, trim its array to its exact length, and close it.
    ///
    /// Every target is closed even if one fails.
    /// No targets can be created after the session is closed.
    /// Closing again retries any target that failed to close, and does nothing otherwise.
    ///
    /// # Errors
    /// Returns the first [`AppendError`] of a target that failed to close.
    pub fn close(&mut self) -> Result<(), AppendError> {
        if !self.closed {
            tracing::debug!(targets = self.targets.len(), "closing session");
        }
        self.closed = true;
        let mut result = Ok(());
        for target in self.targets.values_mut() {
            if let Err(err) = target.buffer.close() {
                if result.is_ok() {
                    result = Err(err);
                } else {
                    tracing::error!(array = %target.buffer.path(), error = %err, "close failed");
                }
            }
        }
        result
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Drop for AppendSession<TStorage> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::error!(error = %err, "failed to close append session");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        array::{Array, DataType},
        storage::{store::MemoryStore, ListableStorageTraits},
    };

    use super::*;

    #[test]
    fn append_session_targets() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut session = AppendSession::new(store.clone());
        session.append(1.0, "/b/")?;
        session.append([1, 2], "a")?;
        session.append(2.0, "b")?;
        assert_eq!(
            session.paths().map(NodePath::as_str).collect::<Vec<_>>(),
            ["/b", "/a"]
        );
        let target = session.target("b").unwrap();
        assert_eq!(target.converter(), ValueConverter::Identity);
        assert_eq!(target.buffer().pending_len(), 2);
        assert_eq!(session.target("a").unwrap().converter(), ValueConverter::Coerce);
        assert!(session.target("c").is_none());

        session.close()?;
        assert!(session.is_closed());
        assert!(matches!(
            session.append(1.0, "c"),
            Err(AppendError::Closed(_))
        ));
        assert!(matches!(
            session.append(1.0, "b"),
            Err(AppendError::Closed(_))
        ));
        assert_eq!(Array::open(store.clone(), "/b")?.shape(), &[2]);
        assert_eq!(store.list_prefix(&"c/".try_into()?)?.len(), 0);
        Ok(())
    }

    #[test]
    fn append_session_get_or_create() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut session = AppendSession::new(store.clone());
        let options = AppendOptions::builder()
            .data_type(DataType::UInt8)
            .chunk_size(3)
            .block_factor(2)
            .build();
        let value = AppendValue::from([1u8, 2, 3]);
        let target = session.get_or_create("x/y", &value, &options)?;
        assert_eq!(target.buffer().element_shape(), &[3]);
        assert_eq!(target.buffer().allocated_len(), 6);
        assert_eq!(target.buffer().pending_len(), 0);
        target.append(value.clone())?;
        assert_eq!(target.buffer().pending_len(), 1);

        // an existing target keeps its options
        let target = session.get_or_create("x/y", &value, &AppendOptions::default())?;
        assert_eq!(target.options(), &options);
        assert_eq!(target.buffer().data_type(), DataType::UInt8);
        Ok(())
    }

    #[test]
    fn append_session_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut session = AppendSession::new(store.clone());
        assert!(matches!(
            session.append("text", "text"),
            Err(AppendError::InvalidValue(_))
        ));
        assert!(matches!(
            session.append(Vec::<f64>::new(), "empty"),
            Err(AppendError::InvalidValue(_))
        ));
        assert!(matches!(
            session.append(1, "/"),
            Err(AppendError::InvalidPath(_))
        ));
        assert!(matches!(
            session.append(1, "a//b"),
            Err(AppendError::InvalidPath(_))
        ));
        let options = AppendOptions::builder().block_factor(0).build();
        assert!(matches!(
            session.append_with_options(1, "zero", &options),
            Err(AppendError::InvalidOptions(_))
        ));
        // nothing was created
        assert!(store.list()?.is_empty());
        assert_eq!(session.paths().count(), 0);
        Ok(())
    }
}
