//! Buffered appending of numeric records to growable, chunked [Zarr V3](https://zarr.dev) arrays.
//!
//! Records (scalars, fixed-shape vectors, or n-dimensional arrays) are appended one at a time to a slash-separated path.
//! Each path is backed by a [`ChunkedAppendBuffer`](append::ChunkedAppendBuffer) which holds up to one chunk of rows in memory, writes whole chunks to the array, grows the array a *block* (a multiple of the chunk size) at a time, and trims it to its exact logical length when the session is closed.
//!
//! ## Getting Started
//! - [`AppendSession`](append::AppendSession) is the entry point: open one over a [store](storage::store), append values, then close it.
//! - [`AppendOptions`](append::AppendOptions) sets the data type, chunk size, and block factor of a path on its first append.
//! - [`array::Array`] can be used to read the stored data back.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use zarrs_append::append::AppendSession;
//! use zarrs_append::array::Array;
//! use zarrs_append::storage::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut session = AppendSession::new(store.clone());
//! for i in 0..5 {
//!     session.append(i, "numbers")?;
//!     session.append([i, i + 1], "group/pairs")?;
//! }
//! session.close()?;
//!
//! let array = Array::open(store, "/group/pairs")?;
//! assert_eq!(array.shape(), &[5, 2]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `zarrs_append` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod append;
pub mod array;
pub mod config;
pub mod group;
pub mod node;
pub mod storage;
