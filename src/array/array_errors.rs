use thiserror::Error;

use crate::{
    group::GroupCreateError,
    node::{NodePath, NodePathError},
    storage::{StorageError, StoreKey},
};

use super::{
    data_type::{IncompatibleFillValueError, UnrepresentableValueError},
    ArrayShape,
};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// Invalid zarr format.
    #[error("invalid zarr format {0}, expected 3")]
    InvalidZarrFormat(usize),
    /// Invalid node type.
    #[error("invalid node type {0}, expected array")]
    InvalidNodeType(String),
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// Invalid fill value.
    #[error(transparent)]
    InvalidFillValue(#[from] IncompatibleFillValueError),
    /// A fill value that cannot be encoded by the data type.
    #[error(transparent)]
    UnrepresentableFillValue(#[from] UnrepresentableValueError),
    /// The chunk shape is incompatible with the array shape.
    ///
    /// Chunks must have the same dimensionality as the array, non-zero dimensions, and must span every dimension except the first.
    #[error("chunk shape {1:?} is incompatible with array shape {0:?}")]
    InvalidChunkShape(ArrayShape, ArrayShape),
    /// Unsupported array metadata, such as an irregular chunk grid or a compressing codec.
    #[error("unsupported array metadata: {0}")]
    UnsupportedMetadata(String),
    /// A node already exists at the path of a new array.
    #[error("an array or group already exists at {0}")]
    ArrayExists(NodePath),
    /// An error creating the parent groups of an array.
    #[error(transparent)]
    GroupCreateError(#[from] GroupCreateError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error deserializing the metadata.
    #[error(transparent)]
    MetadataDeserializationError(#[from] serde_json::Error),
    /// Missing metadata.
    #[error("array metadata is missing at {0}")]
    MissingMetadata(NodePath),
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Rows are outside the bounds of the leading dimension of the array.
    #[error("rows [{0}, {1}) are out of bounds for an array with {2} rows")]
    RowsOutOfBounds(u64, u64, u64),
    /// The number of elements does not match the number of rows.
    #[error("got {0} elements, expected {1}")]
    InvalidElementCount(usize, usize),
    /// An element which cannot be encoded by the data type of the array.
    #[error(transparent)]
    UnrepresentableValue(#[from] UnrepresentableValueError),
    /// A stored chunk has an unexpected size.
    #[error("chunk {0} has {1} bytes, expected {2}")]
    InvalidChunkSize(StoreKey, usize, usize),
    /// An error creating an [`ndarray`] from the retrieved elements.
    #[error(transparent)]
    NdarrayShapeError(#[from] ndarray::ShapeError),
}
