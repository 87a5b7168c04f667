//! Buffered appending of records to growable arrays.
//!
//! - [`AppendSession`] routes appended values to per path targets, creating arrays on first use.
//! - [`ChunkedAppendBuffer`] buffers the rows of one array and writes them a chunk at a time, growing the array a block at a time.
//! - [`AppendValue`] is the set of accepted values and [`ValueConverter`] normalizes them to elements.
//! - [`AppendOptions`] sets the data type, chunk size, and block factor of a new array.
//!
//! Appending `N` scalars to a path with a chunk size `C` and block factor `F` writes `⌊N/C⌋` whole chunks while appending, grows the array `⌊N/(C·F)⌋` times, and writes the final `N mod C` rows when the session is closed.

mod append_buffer;
mod append_options;
mod append_session;
mod append_value;

use thiserror::Error;

use crate::{
    array::{ArrayCreateError, ArrayError},
    node::{NodePath, NodePathError},
    storage::{store::FilesystemStoreCreateError, StorageError},
};

pub use self::{
    append_buffer::ChunkedAppendBuffer,
    append_options::{AppendOptions, AppendOptionsBuilder},
    append_session::{AppendSession, AppendTarget, OpenMode},
    append_value::{AppendValue, ValueConverter},
};

/// An append error.
#[derive(Debug, Error)]
pub enum AppendError {
    /// A value which is not numeric, or is a ragged sequence.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// An element with a different shape to the element shape of the array.
    #[error("element shape {got:?} does not match the element shape {expected:?} of {path}")]
    ShapeMismatch {
        /// The path of the array.
        path: NodePath,
        /// The element shape of the array.
        expected: Vec<u64>,
        /// The element shape of the rejected value.
        got: Vec<u64>,
    },
    /// An append to a closed buffer or session.
    #[error("cannot append to {0}, it is closed")]
    Closed(NodePath),
    /// Invalid append options.
    #[error("invalid append options: {0}")]
    InvalidOptions(String),
    /// A path which does not map to an array node.
    #[error(transparent)]
    InvalidPath(#[from] NodePathError),
    /// An error creating an array or its parent groups.
    #[error(transparent)]
    ArrayCreate(#[from] ArrayCreateError),
    /// An error writing or resizing an array.
    #[error(transparent)]
    Array(#[from] ArrayError),
    /// A storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An error opening a filesystem store.
    #[error(transparent)]
    StoreCreate(#[from] FilesystemStoreCreateError),
}
