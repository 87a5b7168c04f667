use std::sync::Arc;

use super::{Array, ArrayCreateError, ArrayMetadata, ArrayShape, DataType};

/// An [`Array`] builder.
///
/// The array builder is initialised from an array shape, data type, and regular chunk shape.
///  - Chunks are encoded by the `bytes` codec with little endian encoding, so the output is uncompressed.
///  - The chunk key encoding is `default` with the `/` chunk key separator.
///  - The fill value is zero (or `false`) and the attributes are empty.
///
/// Chunks must span every dimension of the array except the first, so an array only grows or shrinks along its leading dimension.
/// Note that [`build`](ArrayBuilder::build) does not modify the store; the array metadata has to be explicitly written with [`Array::store_metadata`], or use [`Array::create`].
///
/// For example:
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use std::sync::Arc;
/// use zarrs_append::array::{ArrayBuilder, DataType};
/// # let store = Arc::new(zarrs_append::storage::store::MemoryStore::new());
/// let mut array = ArrayBuilder::new(
///     vec![100, 3], // array shape
///     DataType::Float32,
///     vec![10, 3], // regular chunk shape (elements must be non-zero)
/// )
/// .fill_value(f64::NAN)
/// .build(store.clone(), "/group/array")?;
/// array.store_metadata()?; // write metadata to the store
///
/// array.store_rows(0, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
/// array.resize(2)?; // revise the number of rows, updating stored metadata
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    /// Array shape.
    pub shape: ArrayShape,
    /// Data type.
    pub data_type: DataType,
    /// Regular chunk shape.
    pub chunk_shape: ArrayShape,
    /// Fill value.
    pub fill_value: f64,
    /// Attributes.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ArrayBuilder {
    /// Create a new array builder.
    ///
    /// The length of the array shape must match the dimensionality of the chunk shape, but its leading dimension can be zero on initialisation.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType, chunk_shape: ArrayShape) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape,
            fill_value: 0.0,
            attributes: serde_json::Map::default(),
        }
    }

    /// Set the shape.
    pub fn shape(&mut self, shape: ArrayShape) -> &mut Self {
        self.shape = shape;
        self
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: f64) -> &mut Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the user defined attributes.
    ///
    /// If left unmodified, the user defined attributes of the array will be empty.
    pub fn attributes(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Return the array metadata described by the builder.
    #[must_use]
    pub fn build_metadata(&self) -> ArrayMetadata {
        ArrayMetadata::new(
            self.shape.clone(),
            self.data_type,
            &self.chunk_shape,
            self.data_type.fill_value_metadata(self.fill_value),
            self.attributes.clone(),
        )
    }

    /// Build into an [`Array`].
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is an error creating the array.
    /// This can be due to an invalid `path` or an incompatible chunk shape.
    pub fn build<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        Array::new_with_metadata(storage, path, self.build_metadata())
    }
}
