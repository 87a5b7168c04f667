//! Zarr arrays.
//!
//! An array is a node in a hierarchy (see [`crate::node`]) which is a collection of homogeneous elements arranged into a regular grid of chunks.
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#array>.
//!
//! The arrays in this crate are *row stores*: the leading dimension counts records (rows) and the trailing dimensions are the shape of a single record.
//! A chunk holds a fixed number of whole rows, so an array grows and shrinks by changing its leading dimension with [`Array::resize`].
//! Rows are written with [`Array::store_rows`] and read with [`Array::retrieve_rows`] or [`Array::retrieve_ndarray`].
//! Elements are passed as [`f64`] and encoded to the [`DataType`] of the array.
//!
//! An [`Array`] is initialised with an [`ArrayBuilder`] or opened from existing metadata with [`Array::open`].
//! Its metadata is stored in a `zarr.json` file, see [`ArrayMetadata`].
//! Chunks are stored uncompressed with the `default` chunk key encoding, e.g. `group/array/c/3/0`.

mod array_builder;
mod array_errors;
mod array_metadata;
pub mod data_type;

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

pub use self::{
    array_builder::ArrayBuilder,
    array_errors::{ArrayCreateError, ArrayError},
    array_metadata::{ArrayMetadata, MetadataV3},
    data_type::DataType,
};

use crate::{
    node::NodePath,
    storage::{
        data_key, meta_key, node_exists, retrieve_metadata_json, ReadableStorageTraits,
        StorageError, StoreKey, WritableStorageTraits,
    },
};

/// An array shape. Dimensions may be zero.
pub type ArrayShape = Vec<u64>;

/// A Zarr array.
///
/// ## Initilisation
/// A *new* array can be initialised with an [`ArrayBuilder`] or [`Array::new_with_metadata`].
/// Use [`Array::create`] to initialise an array and store its metadata in a single step.
///
/// An *existing* array can be initialised with [`Array::open`], its metadata is read from the store.
///
/// ## Rows
/// The first dimension of the array is the row dimension.
/// Every chunk covers `chunk_shape[0]` rows and the whole extent of the remaining dimensions.
/// Chunks which have not been written read as the fill value.
#[derive(Debug)]
pub struct Array<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array in a store.
    path: NodePath,
    /// An array of integers providing the length of each dimension of the Zarr array.
    shape: ArrayShape,
    /// The data type of the Zarr array.
    data_type: DataType,
    /// The regular chunk shape.
    chunk_shape: ArrayShape,
    /// Provides an element value to use for uninitialised portions of the Zarr array.
    fill_value: f64,
    /// The encoded fill value.
    fill_value_bytes: Vec<u8>,
    /// Optional user defined attributes.
    attributes: serde_json::Map<String, serde_json::Value>,
}

fn validate_chunk_shape(shape: &[u64], chunk_shape: &[u64]) -> bool {
    !shape.is_empty()
        && shape.len() == chunk_shape.len()
        && !chunk_shape.contains(&0)
        && shape[1..] == chunk_shape[1..]
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Create an array in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Array::store_metadata) to write `metadata` to `storage`.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if:
    ///  - the path or metadata is invalid,
    ///  - the chunk grid is not a regular grid spanning all but the first dimension,
    ///  - the chunk key encoding or codecs are unsupported, or
    ///  - the fill value is incompatible with the data type.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: ArrayMetadata,
    ) -> Result<Self, ArrayCreateError> {
        let path = NodePath::new(path)?;
        if metadata.zarr_format != 3 {
            return Err(ArrayCreateError::InvalidZarrFormat(metadata.zarr_format));
        }
        if metadata.node_type != "array" {
            return Err(ArrayCreateError::InvalidNodeType(metadata.node_type));
        }
        let chunk_shape = metadata.regular_chunk_shape().ok_or_else(|| {
            ArrayCreateError::UnsupportedMetadata(format!(
                "chunk grid {}",
                metadata.chunk_grid.name
            ))
        })?;
        if !metadata.has_default_chunk_key_encoding() {
            return Err(ArrayCreateError::UnsupportedMetadata(format!(
                "chunk key encoding {}",
                metadata.chunk_key_encoding.name
            )));
        }
        if !metadata.has_little_endian_bytes_codec() {
            return Err(ArrayCreateError::UnsupportedMetadata(
                "codecs other than a little endian bytes codec".to_string(),
            ));
        }
        if !validate_chunk_shape(&metadata.shape, &chunk_shape) {
            return Err(ArrayCreateError::InvalidChunkShape(
                metadata.shape,
                chunk_shape,
            ));
        }
        let fill_value = metadata
            .data_type
            .fill_value_from_metadata(&metadata.fill_value)?;
        let mut fill_value_bytes = Vec::with_capacity(metadata.data_type.size());
        metadata
            .data_type
            .encode_into(&[fill_value], &mut fill_value_bytes)?;
        Ok(Self {
            storage,
            path,
            shape: metadata.shape,
            data_type: metadata.data_type,
            chunk_shape,
            fill_value,
            fill_value_bytes,
            attributes: metadata.attributes,
        })
    }

    /// Get the underlying storage backing the array.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Get the fill value.
    #[must_use]
    pub const fn fill_value(&self) -> f64 {
        self.fill_value
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Get the number of rows, the length of the first dimension.
    #[must_use]
    pub fn num_rows(&self) -> u64 {
        self.shape[0]
    }

    /// Get the shape of a row, the trailing dimensions of the array shape.
    #[must_use]
    pub fn element_shape(&self) -> &[u64] {
        &self.shape[1..]
    }

    /// Get the regular chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Get the number of rows in a chunk.
    #[must_use]
    pub fn chunk_rows(&self) -> u64 {
        self.chunk_shape[0]
    }

    /// Get the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Create [`ArrayMetadata`].
    #[must_use]
    pub fn metadata(&self) -> ArrayMetadata {
        ArrayMetadata::new(
            self.shape.clone(),
            self.data_type,
            &self.chunk_shape,
            self.data_type.fill_value_metadata(self.fill_value),
            self.attributes.clone(),
        )
    }

    /// Return the key of the chunk holding rows `[chunk * chunk_rows, (chunk + 1) * chunk_rows)`.
    #[must_use]
    pub fn chunk_key(&self, chunk: u64) -> StoreKey {
        let mut chunk_grid_indices = vec![0; self.dimensionality()];
        chunk_grid_indices[0] = chunk;
        data_key(&self.path, &chunk_grid_indices)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn row_elements(&self) -> usize {
        self.element_shape().iter().product::<u64>() as usize
    }

    fn row_bytes(&self) -> usize {
        self.row_elements() * self.data_type.size()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn chunk_bytes_len(&self) -> usize {
        self.chunk_rows() as usize * self.row_bytes()
    }

    /// Iterate over the chunks intersecting rows `[begin, end)`, yielding the chunk and the intersecting rows.
    fn chunks_intersecting(&self, begin: u64, end: u64) -> impl Iterator<Item = (u64, u64, u64)> {
        let chunk_rows = self.chunk_rows();
        (begin / chunk_rows..end.div_ceil(chunk_rows)).map(move |chunk| {
            let chunk_begin = chunk * chunk_rows;
            (
                chunk,
                begin.max(chunk_begin),
                end.min(chunk_begin + chunk_rows),
            )
        })
    }

    fn validate_chunk_bytes(&self, key: &StoreKey, bytes: &[u8]) -> Result<(), ArrayError> {
        let expected = self.chunk_bytes_len();
        if bytes.len() == expected {
            Ok(())
        } else {
            Err(ArrayError::InvalidChunkSize(key.clone(), bytes.len(), expected))
        }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Array<TStorage> {
    /// Open an existing array in `storage` at `path`. The metadata is read from the store.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is a storage error or any metadata is invalid.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let node_path = NodePath::new(path)?;
        let metadata = retrieve_metadata_json(&*storage, &node_path)?
            .ok_or_else(|| ArrayCreateError::MissingMetadata(node_path))?;
        let metadata: ArrayMetadata = serde_json::from_value(metadata)?;
        Self::new_with_metadata(storage, path, metadata)
    }

    /// Read and return the encoded bytes of a chunk.
    ///
    /// A chunk which does not exist in the store is filled with the fill value.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if there is a store error or the stored chunk has an unexpected size.
    pub fn retrieve_chunk_bytes(&self, chunk: u64) -> Result<Vec<u8>, ArrayError> {
        let key = self.chunk_key(chunk);
        if let Some(bytes) = self.storage.get(&key)? {
            self.validate_chunk_bytes(&key, &bytes)?;
            Ok(bytes)
        } else {
            Ok(self
                .fill_value_bytes
                .repeat(self.chunk_bytes_len() / self.data_type.size()))
        }
    }

    /// Read and return the elements of rows `[begin, end)` in C order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the rows are out of bounds or a chunk cannot be read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn retrieve_rows(&self, begin: u64, end: u64) -> Result<Vec<f64>, ArrayError> {
        if begin > end || end > self.num_rows() {
            return Err(ArrayError::RowsOutOfBounds(begin, end, self.num_rows()));
        }
        let row_bytes = self.row_bytes();
        let mut elements = Vec::with_capacity((end - begin) as usize * self.row_elements());
        if begin == end {
            return Ok(elements);
        }
        for (chunk, rows_begin, rows_end) in self.chunks_intersecting(begin, end) {
            let chunk_bytes = self.retrieve_chunk_bytes(chunk)?;
            let offset = (rows_begin - chunk * self.chunk_rows()) as usize * row_bytes;
            let length = (rows_end - rows_begin) as usize * row_bytes;
            self.data_type
                .decode_into(&chunk_bytes[offset..offset + length], &mut elements);
        }
        Ok(elements)
    }

    /// Read and return the entire array as an [`ndarray::ArrayD<f64>`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if a chunk cannot be read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn retrieve_ndarray(&self) -> Result<ArrayD<f64>, ArrayError> {
        let elements = self.retrieve_rows(0, self.num_rows())?;
        let shape: Vec<usize> = self.shape.iter().map(|&size| size as usize).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), elements)?)
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Array<TStorage> {
    /// Store metadata.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        self.store_metadata_with_shape(self.shape.clone())
    }

    fn store_metadata_with_shape(&self, shape: ArrayShape) -> Result<(), StorageError> {
        let metadata = ArrayMetadata {
            shape,
            ..self.metadata()
        };
        let key = meta_key(&self.path);
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, &json)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> Array<TStorage> {
    /// Build an array with `builder` in `storage` at `path` and store its metadata.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError::ArrayExists`] if a node already exists at `path`, or another [`ArrayCreateError`] if the array cannot be built or its metadata cannot be stored.
    pub fn create(
        storage: Arc<TStorage>,
        path: &str,
        builder: &ArrayBuilder,
    ) -> Result<Self, ArrayCreateError> {
        let array = builder.build(storage, path)?;
        if node_exists(&*array.storage, &array.path)? {
            return Err(ArrayCreateError::ArrayExists(array.path));
        }
        array.store_metadata()?;
        Ok(array)
    }

    /// Encode and store `elements` into rows `[begin, begin + rows)`.
    ///
    /// Chunks wholly covered by the rows are written without being read.
    /// Chunks partially covered by the rows are read, updated, and written back.
    /// All elements are encoded before anything is written.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if:
    ///  - the rows are out of bounds,
    ///  - the number of elements is not `rows` times the number of elements in a row,
    ///  - an element cannot be represented by the data type, or
    ///  - there is an underlying store error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn store_rows(&self, begin: u64, rows: u64, elements: &[f64]) -> Result<(), ArrayError> {
        let end = begin
            .checked_add(rows)
            .filter(|&end| end <= self.num_rows())
            .ok_or_else(|| {
                ArrayError::RowsOutOfBounds(begin, begin.saturating_add(rows), self.num_rows())
            })?;
        let expected = rows as usize * self.row_elements();
        if elements.len() != expected {
            return Err(ArrayError::InvalidElementCount(elements.len(), expected));
        }
        if rows == 0 {
            return Ok(());
        }

        let mut bytes = Vec::new();
        self.data_type.encode_into(elements, &mut bytes)?;

        let row_bytes = self.row_bytes();
        let chunk_rows = self.chunk_rows();
        for (chunk, rows_begin, rows_end) in self.chunks_intersecting(begin, end) {
            let rows_bytes = &bytes
                [(rows_begin - begin) as usize * row_bytes..(rows_end - begin) as usize * row_bytes];
            let key = self.chunk_key(chunk);
            if rows_end - rows_begin == chunk_rows {
                self.storage.set(&key, rows_bytes)?;
            } else {
                let mut chunk_bytes = self.retrieve_chunk_bytes(chunk)?;
                let offset = (rows_begin - chunk * chunk_rows) as usize * row_bytes;
                chunk_bytes[offset..offset + rows_bytes.len()].copy_from_slice(rows_bytes);
                self.storage.set(&key, &chunk_bytes)?;
            }
        }
        Ok(())
    }

    /// Resize the first dimension of the array to `num_rows` and store the updated metadata.
    ///
    /// When shrinking, chunks beyond the new bound are erased and the rows of the boundary chunk beyond the new bound are reset to the fill value.
    /// Data outside the new bound therefore does not reappear if the array grows again.
    ///
    /// The shape of the array is only updated once every store operation has succeeded.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if there is an underlying store error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn resize(&mut self, num_rows: u64) -> Result<(), ArrayError> {
        let chunk_rows = self.chunk_rows();
        if num_rows < self.num_rows() {
            for chunk in num_rows.div_ceil(chunk_rows)..self.num_rows().div_ceil(chunk_rows) {
                self.storage.erase(&self.chunk_key(chunk))?;
            }
            let boundary_rows = num_rows % chunk_rows;
            if boundary_rows != 0 {
                let key = self.chunk_key(num_rows / chunk_rows);
                if let Some(mut chunk_bytes) = self.storage.get(&key)? {
                    self.validate_chunk_bytes(&key, &chunk_bytes)?;
                    let offset = boundary_rows as usize * self.row_bytes();
                    let fill_elements = (chunk_rows - boundary_rows) as usize * self.row_elements();
                    chunk_bytes[offset..].copy_from_slice(&self.fill_value_bytes.repeat(fill_elements));
                    self.storage.set(&key, &chunk_bytes)?;
                }
            }
        }

        let mut shape = self.shape.clone();
        shape[0] = num_rows;
        self.store_metadata_with_shape(shape.clone())?;
        self.shape = shape;
        Ok(())
    }
}
