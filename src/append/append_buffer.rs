use std::sync::Arc;

use ndarray::ArrayD;

use crate::{
    array::{Array, ArrayBuilder, DataType},
    config::global_config,
    node::NodePath,
    storage::{ReadableStorageTraits, WritableStorageTraits},
};

use super::{AppendError, AppendOptions};

/// A buffer of rows appended to a growable array.
///
/// The buffer holds up to one chunk of rows in memory.
/// When it holds `chunk_size` rows they are written to the array as a whole chunk at the next write offset:
/// ```text
/// write offset = block_index * block_size + chunk_index * chunk_size
/// ```
/// The array is allocated a *block* of `block_size = block_factor * chunk_size` rows at a time.
/// When a written chunk fills the current block, the array grows by one block.
/// [`close`](ChunkedAppendBuffer::close) writes the remaining rows and trims the array to its exact length.
///
/// Counters and pending rows are only updated once every store operation of a write has succeeded.
/// A failed [`append_normalized`](ChunkedAppendBuffer::append_normalized) or [`flush`](ChunkedAppendBuffer::flush) therefore leaves the buffer as it was, and the identical call can be retried.
#[derive(Debug)]
pub struct ChunkedAppendBuffer<TStorage: ?Sized> {
    array: Array<TStorage>,
    chunk_size: u64,
    block_size: u64,
    element_shape: Vec<u64>,
    chunk_index: u64,
    block_index: u64,
    /// Pending elements in C order.
    pending: Vec<f64>,
    pending_len: u64,
    validate_element_shape: bool,
    closed: bool,
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> ChunkedAppendBuffer<TStorage> {
    /// Create an array for elements of `element_shape` at `path` with one block of rows allocated, and a buffer for it.
    ///
    /// The array has shape `(block_size, *element_shape)` and chunk shape `(chunk_size, *element_shape)`.
    /// Element shape validation follows the [global configuration](crate::config::Config#validate-element-shape).
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidOptions`] if the options are invalid, or [`AppendError::ArrayCreate`] if the array cannot be created.
    pub fn create(
        storage: Arc<TStorage>,
        path: &NodePath,
        element_shape: Vec<u64>,
        options: &AppendOptions,
    ) -> Result<Self, AppendError> {
        let chunk_size = options.chunk_size();
        let block_size = options.block_size()?;

        let mut shape = vec![block_size];
        shape.extend(&element_shape);
        let mut chunk_shape = vec![chunk_size];
        chunk_shape.extend(&element_shape);
        let builder = ArrayBuilder::new(shape, options.data_type(), chunk_shape);
        let array = Array::create(storage, path.as_str(), &builder)?;
        tracing::debug!(
            array = %path,
            data_type = %options.data_type(),
            chunk_size,
            block_size,
            ?element_shape,
            "created array"
        );

        Ok(Self {
            array,
            chunk_size,
            block_size,
            element_shape,
            chunk_index: 0,
            block_index: 0,
            pending: Vec::new(),
            pending_len: 0,
            validate_element_shape: global_config().validate_element_shape(),
            closed: false,
        })
    }

    /// Append an element.
    ///
    /// The pending rows are written to the array once there are `chunk_size` of them.
    /// If that write fails, the element is not appended.
    ///
    /// # Errors
    /// Returns
    ///  - [`AppendError::Closed`] if the buffer is closed,
    ///  - [`AppendError::ShapeMismatch`] if element shape validation is enabled and the shape of `element` differs from the element shape, or
    ///  - [`AppendError::Array`] if the write or the growth of the array fails.
    pub fn append_normalized(&mut self, element: &ArrayD<f64>) -> Result<(), AppendError> {
        if self.closed {
            return Err(AppendError::Closed(self.path().clone()));
        }
        if self.validate_element_shape && !self.element_has_shape(element) {
            return Err(AppendError::ShapeMismatch {
                path: self.path().clone(),
                expected: self.element_shape.clone(),
                got: element.shape().iter().map(|&size| size as u64).collect(),
            });
        }

        let pending_elements = self.pending.len();
        self.pending.extend(element.iter().copied());
        self.pending_len += 1;
        if self.pending_len < self.chunk_size {
            return Ok(());
        }

        if let Err(err) = self.write_chunk() {
            self.pending.truncate(pending_elements);
            self.pending_len -= 1;
            return Err(err);
        }
        Ok(())
    }

    fn element_has_shape(&self, element: &ArrayD<f64>) -> bool {
        element.ndim() == self.element_shape.len()
            && std::iter::zip(element.shape(), &self.element_shape)
                .all(|(&size, &expected)| size as u64 == expected)
    }

    /// The end of the current block.
    fn block_end(&self) -> u64 {
        (self.block_index + 1) * self.block_size
    }

    /// Grow the array back to the end of the current block if it was trimmed.
    fn ensure_block_allocated(&mut self) -> Result<(), AppendError> {
        let block_end = self.block_end();
        if self.array.num_rows() < block_end {
            self.array.resize(block_end)?;
        }
        Ok(())
    }

    /// Write a full chunk of pending rows, growing the array if the chunk completes a block.
    fn write_chunk(&mut self) -> Result<(), AppendError> {
        let offset = self.write_offset();
        self.ensure_block_allocated()?;
        self.array
            .store_rows(offset, self.chunk_size, &self.pending)?;
        tracing::debug!(array = %self.path(), offset, rows = self.chunk_size, "wrote chunk");

        let end = offset + self.chunk_size;
        if end == self.block_end() {
            self.array.resize(end + self.block_size)?;
            tracing::debug!(array = %self.path(), rows = end + self.block_size, "grew array");
            self.block_index += 1;
            self.chunk_index = 0;
        } else {
            self.chunk_index += 1;
        }
        self.pending.clear();
        self.pending_len = 0;
        Ok(())
    }

    /// Write the pending rows to the array at the write offset and, if `trim`, resize the array to the exact number of rows appended.
    ///
    /// The pending rows are kept, so they are written again as part of the next full chunk.
    /// An array trimmed by a flush is grown back to the end of the current block on the next write.
    /// Flushing a closed buffer does nothing.
    ///
    /// # Errors
    /// Returns [`AppendError::Array`] if the write or resize fails.
    /// The buffer is unchanged, so the identical flush can be retried.
    pub fn flush(&mut self, trim: bool) -> Result<(), AppendError> {
        if self.closed {
            return Ok(());
        }
        let offset = self.write_offset();
        let end = offset + self.pending_len;
        if self.array.num_rows() < end {
            self.ensure_block_allocated()?;
        }
        self.array
            .store_rows(offset, self.pending_len, &self.pending)?;
        if trim && self.array.num_rows() != end {
            self.array.resize(end)?;
            tracing::debug!(array = %self.path(), rows = end, "trimmed array");
        }
        tracing::debug!(array = %self.path(), offset, rows = self.pending_len, trim, "flushed");
        Ok(())
    }

    /// Flush the pending rows, trim the array to its exact length, and close the buffer.
    ///
    /// Closing a closed buffer does nothing.
    ///
    /// # Errors
    /// Returns [`AppendError::Array`] if the final flush fails, in which case the buffer remains open.
    pub fn close(&mut self) -> Result<(), AppendError> {
        if self.closed {
            return Ok(());
        }
        self.flush(true)?;
        self.pending = Vec::new();
        self.pending_len = 0;
        self.closed = true;
        tracing::debug!(array = %self.path(), rows = self.array.num_rows(), "closed");
        Ok(())
    }
}

impl<TStorage: ?Sized> ChunkedAppendBuffer<TStorage> {
    /// Return the path of the array.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        self.array.path()
    }

    /// Return the array.
    #[must_use]
    pub const fn array(&self) -> &Array<TStorage> {
        &self.array
    }

    /// Return the data type of the array.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.array.data_type()
    }

    /// Return the chunk size.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Return the block size.
    #[must_use]
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Return the index of the next chunk to be written within the current block.
    #[must_use]
    pub const fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    /// Return the index of the current block.
    #[must_use]
    pub const fn block_index(&self) -> u64 {
        self.block_index
    }

    /// Return the row offset where the pending rows are written.
    #[must_use]
    pub const fn write_offset(&self) -> u64 {
        self.block_index * self.block_size + self.chunk_index * self.chunk_size
    }

    /// Return the number of pending rows.
    #[must_use]
    pub const fn pending_len(&self) -> u64 {
        self.pending_len
    }

    /// Return the number of rows appended, written or pending.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.write_offset() + self.pending_len
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the number of rows allocated in the array.
    #[must_use]
    pub fn allocated_len(&self) -> u64 {
        self.array.num_rows()
    }

    /// Return the element shape.
    #[must_use]
    pub fn element_shape(&self) -> &[u64] {
        &self.element_shape
    }

    /// Returns true if element shapes are validated on append.
    #[must_use]
    pub const fn validate_element_shape(&self) -> bool {
        self.validate_element_shape
    }

    /// Enable or disable element shape validation, overriding the [global configuration](crate::config::Config#validate-element-shape).
    pub fn set_validate_element_shape(&mut self, validate_element_shape: bool) {
        self.validate_element_shape = validate_element_shape;
    }

    /// Returns true if the buffer is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::store::MemoryStore;

    use super::*;

    fn buffer(chunk_size: u64, block_factor: u64) -> ChunkedAppendBuffer<MemoryStore> {
        let options = AppendOptions::builder()
            .chunk_size(chunk_size)
            .block_factor(block_factor)
            .build();
        ChunkedAppendBuffer::create(
            Arc::new(MemoryStore::new()),
            &"/array".try_into().unwrap(),
            vec![],
            &options,
        )
        .unwrap()
    }

    fn scalar(value: f64) -> ArrayD<f64> {
        ArrayD::from_elem(ndarray::IxDyn(&[]), value)
    }

    #[test]
    fn append_buffer_counters() {
        let mut buffer = buffer(2, 2);
        assert_eq!(buffer.block_size(), 4);
        assert_eq!(buffer.allocated_len(), 4);
        assert!(buffer.is_empty());

        for i in 0..5 {
            buffer.append_normalized(&scalar(f64::from(i))).unwrap();
            if i == 1 {
                assert_eq!(buffer.chunk_index(), 1);
                assert_eq!(buffer.write_offset(), 2);
            }
        }
        // 5 rows: chunks [0, 2) and [2, 4) written, block 0 full so the array grew
        assert_eq!(buffer.block_index(), 1);
        assert_eq!(buffer.chunk_index(), 0);
        assert_eq!(buffer.write_offset(), 4);
        assert_eq!(buffer.pending_len(), 1);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.allocated_len(), 8);

        buffer.close().unwrap();
        assert!(buffer.is_closed());
        assert_eq!(buffer.allocated_len(), 5);
        assert_eq!(buffer.pending_len(), 0);
        assert_eq!(
            buffer.array().retrieve_rows(0, 5).unwrap(),
            [0.0, 1.0, 2.0, 3.0, 4.0]
        );
        assert!(matches!(
            buffer.append_normalized(&scalar(5.0)),
            Err(AppendError::Closed(_))
        ));
        buffer.close().unwrap();
    }

    #[test]
    fn append_buffer_shape_mismatch() {
        let mut buffer = buffer(3, 1);
        buffer.append_normalized(&scalar(1.0)).unwrap();
        let row = ArrayD::from_elem(ndarray::IxDyn(&[2]), 1.0);
        assert!(matches!(
            buffer.append_normalized(&row),
            Err(AppendError::ShapeMismatch { .. })
        ));
        assert_eq!(buffer.pending_len(), 1);

        // lazily, the mismatch surfaces when the chunk is written
        buffer.set_validate_element_shape(false);
        buffer.append_normalized(&row).unwrap();
        assert!(matches!(
            buffer.append_normalized(&scalar(1.0)),
            Err(AppendError::Array(_))
        ));
        assert_eq!(buffer.pending_len(), 2);
        assert_eq!(buffer.write_offset(), 0);
    }

    #[test]
    fn append_buffer_flush_without_trim() {
        let mut buffer = buffer(4, 1);
        for i in 0..6 {
            buffer.append_normalized(&scalar(f64::from(i))).unwrap();
            if i == 4 {
                buffer.flush(false).unwrap();
                assert_eq!(buffer.allocated_len(), 8);
                assert_eq!(buffer.pending_len(), 1);
            }
        }
        buffer.flush(true).unwrap();
        assert_eq!(buffer.allocated_len(), 6);

        // appending after a trim grows the array back to the end of the block
        for i in 6..9 {
            buffer.append_normalized(&scalar(f64::from(i))).unwrap();
        }
        assert_eq!(buffer.allocated_len(), 12);
        buffer.close().unwrap();
        assert_eq!(
            buffer.array().retrieve_rows(0, 9).unwrap(),
            (0..9).map(f64::from).collect::<Vec<_>>()
        );
    }
}
