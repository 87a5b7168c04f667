//! Hierarchy node paths.
//!
//! A node is either a [group](crate::group) or an [array](crate::array), identified by a [`NodePath`].
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#hierarchy>.

mod node_path;

pub use node_path::{NodePath, NodePathError};
