use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use ndarray::{ArrayD, IxDyn};
use zarrs_append::{
    append::{AppendError, AppendOptions, AppendSession, ChunkedAppendBuffer},
    array::{Array, DataType},
    node::NodePath,
    storage::{
        store::MemoryStore, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
        StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
        UsageLogStorageAdapter, WritableStorageTraits,
    },
};

/// A memory store whose writes fail while `fail_writes` is set.
#[derive(Debug, Default)]
struct FailingStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FailingStore {
    fn set_fail_writes(&self, fail_writes: bool) {
        self.fail_writes.store(fail_writes, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Other("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ReadableStorageTraits for FailingStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.inner.get(key)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.inner.size_key(key)
    }
}

impl WritableStorageTraits for FailingStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.check()?;
        self.inner.erase(key)
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.check()?;
        self.inner.erase_prefix(prefix)
    }
}

impl ListableStorageTraits for FailingStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.inner.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.inner.list_dir(prefix)
    }
}

fn options(chunk_size: u64, block_factor: u64) -> AppendOptions {
    AppendOptions::builder()
        .chunk_size(chunk_size)
        .block_factor(block_factor)
        .build()
}

fn scalar(value: f64) -> ArrayD<f64> {
    ArrayD::from_elem(IxDyn(&[]), value)
}

fn create<TStorage>(
    storage: &Arc<TStorage>,
    chunk_size: u64,
    block_factor: u64,
) -> ChunkedAppendBuffer<TStorage>
where
    TStorage: ReadableStorageTraits + WritableStorageTraits,
{
    ChunkedAppendBuffer::create(
        storage.clone(),
        &NodePath::from_array_path("array").unwrap(),
        vec![],
        &options(chunk_size, block_factor),
    )
    .unwrap()
}

#[test]
fn append_buffer_chunk_offsets() {
    let store = Arc::new(MemoryStore::new());
    let log_writer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let store = Arc::new(UsageLogStorageAdapter::new(
        store,
        log_writer.clone(),
        String::new,
    ));
    let mut buffer = create(&store, 3, 2);

    let mut offsets = Vec::new();
    for i in 0..20 {
        let offset = buffer.write_offset();
        buffer.append_normalized(&scalar(f64::from(i))).unwrap();
        if buffer.write_offset() != offset {
            offsets.push(offset);
        }
    }
    // the k-th chunk is written at k * chunk_size, without gaps or overlaps
    assert_eq!(offsets, [0, 3, 6, 9, 12, 15]);

    let log = String::from_utf8(log_writer.lock().unwrap().clone()).unwrap();
    let chunk_writes: Vec<&str> = log
        .lines()
        .filter(|line| line.starts_with("set(array/c/"))
        .collect();
    assert_eq!(
        chunk_writes,
        (0..6)
            .map(|chunk| format!("set(array/c/{chunk}, len=24) -> Ok(())"))
            .collect::<Vec<_>>()
    );
    // full chunks are never read back
    assert!(!log.contains("get(array/c/"));

    buffer.close().unwrap();
    assert_eq!(buffer.allocated_len(), 20);
    assert_eq!(
        buffer.array().retrieve_rows(0, 20).unwrap(),
        (0..20).map(f64::from).collect::<Vec<_>>()
    );
}

#[test]
fn append_buffer_block_growth() {
    let store = Arc::new(MemoryStore::new());
    let mut buffer = create(&store, 2, 3);
    assert_eq!(buffer.block_size(), 6);

    let mut rows_flushed = 0;
    for i in 0..40 {
        buffer.append_normalized(&scalar(f64::from(i))).unwrap();
        if buffer.pending_len() == 0 {
            rows_flushed += buffer.chunk_size();
        }
        assert_eq!(buffer.block_index(), rows_flushed / buffer.block_size());
        assert_eq!(
            buffer.allocated_len(),
            (buffer.block_index() + 1) * buffer.block_size()
        );
        assert_eq!(
            Array::open(store.clone(), "/array").unwrap().num_rows(),
            buffer.allocated_len()
        );
    }
    assert_eq!(buffer.block_index(), 6);
}

#[test]
fn append_buffer_trim_exactness() {
    for rows in [0u32, 1, 4, 5, 6, 7, 19, 20, 21] {
        let store = Arc::new(MemoryStore::new());
        let mut buffer = create(&store, 5, 4);
        for i in 0..rows {
            buffer.append_normalized(&scalar(f64::from(i))).unwrap();
        }
        buffer.close().unwrap();
        assert_eq!(buffer.allocated_len(), u64::from(rows));
        let array = Array::open(store, "/array").unwrap();
        assert_eq!(array.shape(), &[u64::from(rows)]);
        assert_eq!(
            array.retrieve_ndarray().unwrap().sum(),
            f64::from(rows * rows.saturating_sub(1) / 2)
        );
    }
}

#[test]
fn append_buffer_failed_write_retry() {
    let store = Arc::new(FailingStore::default());
    let mut buffer = create(&store, 2, 1);
    buffer.append_normalized(&scalar(1.0)).unwrap();

    // a failed chunk write leaves the buffer unchanged
    store.set_fail_writes(true);
    assert!(matches!(
        buffer.append_normalized(&scalar(2.0)),
        Err(AppendError::Array(_))
    ));
    assert_eq!(buffer.pending_len(), 1);
    assert_eq!(buffer.write_offset(), 0);
    assert_eq!(buffer.block_index(), 0);
    assert_eq!(buffer.allocated_len(), 2);

    store.set_fail_writes(false);
    buffer.append_normalized(&scalar(2.0)).unwrap();
    assert_eq!(buffer.write_offset(), 2);
    assert_eq!(buffer.block_index(), 1);
    assert_eq!(buffer.allocated_len(), 4);
    buffer.append_normalized(&scalar(3.0)).unwrap();

    // a failed final flush can be retried
    store.set_fail_writes(true);
    assert!(buffer.close().is_err());
    assert!(!buffer.is_closed());
    assert_eq!(buffer.pending_len(), 1);
    assert_eq!(buffer.write_offset(), 2);
    assert!(buffer.flush(true).is_err());

    store.set_fail_writes(false);
    buffer.close().unwrap();
    assert!(buffer.is_closed());
    assert_eq!(buffer.array().retrieve_rows(0, 3).unwrap(), [1.0, 2.0, 3.0]);
}

#[test]
fn append_buffer_data_type() {
    let store = Arc::new(MemoryStore::new());
    let options = AppendOptions::builder()
        .data_type(DataType::Int8)
        .chunk_size(2)
        .block_factor(1)
        .build();
    let mut buffer = ChunkedAppendBuffer::create(
        store.clone(),
        &NodePath::from_array_path("int8").unwrap(),
        vec![2],
        &options,
    )
    .unwrap();
    assert_eq!(buffer.data_type(), DataType::Int8);
    let row = ndarray::array![1.0, -2.0].into_dyn();
    buffer.append_normalized(&row).unwrap();
    // 200 is out of range for int8, the chunk write fails and the row is not appended
    let row_overflow = ndarray::array![200.0, 0.0].into_dyn();
    assert!(matches!(
        buffer.append_normalized(&row_overflow),
        Err(AppendError::Array(_))
    ));
    buffer.append_normalized(&row).unwrap();
    buffer.close().unwrap();
    let array = Array::open(store, "/int8").unwrap();
    assert_eq!(array.data_type(), DataType::Int8);
    assert_eq!(
        array.retrieve_ndarray().unwrap(),
        ndarray::array![[1.0, -2.0], [1.0, -2.0]].into_dyn()
    );
}

#[test]
fn append_session_failed_close_retry() {
    let store = Arc::new(FailingStore::default());
    let mut session = AppendSession::new(store.clone());
    let options = options(4, 1);
    for i in 0..6 {
        session.append_with_options(i, "first", &options).unwrap();
        session.append_with_options([i, i], "second", &options).unwrap();
    }

    store.set_fail_writes(true);
    assert!(matches!(session.close(), Err(AppendError::Array(_))));
    assert!(session.is_closed());
    assert!(matches!(
        session.append(6, "first"),
        Err(AppendError::Closed(_))
    ));
    for path in ["first", "second"] {
        let buffer = session.target(path).unwrap().buffer();
        assert!(!buffer.is_closed());
        assert_eq!(buffer.pending_len(), 2);
    }

    store.set_fail_writes(false);
    session.close().unwrap();
    let first = Array::open(store.clone(), "/first").unwrap();
    assert_eq!(first.shape(), &[6]);
    assert_eq!(first.retrieve_ndarray().unwrap().sum(), 15.0);
    let second = Array::open(store, "/second").unwrap();
    assert_eq!(second.shape(), &[6, 2]);
    assert_eq!(second.retrieve_ndarray().unwrap().sum(), 30.0);
}
