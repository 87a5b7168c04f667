//! Stores.
//!
//! - [`MemoryStore`]: holds all values in memory, useful for tests and short-lived sessions.
//! - [`FilesystemStore`]: maps store keys to files below a base directory.

mod filesystem;
mod memory;

pub use self::{
    filesystem::{FilesystemStore, FilesystemStoreCreateError},
    memory::MemoryStore,
};
