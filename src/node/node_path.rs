use derive_more::Display;
use thiserror::Error;

/// A hierarchy node path.
///
/// A path always starts with `/`, and a non-root path has non-empty, `/` separated node names, e.g. `/group/array`.
/// See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#path>.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Debug, Error)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`()].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// Create a node path from a slash-separated array path such as `group/array`.
    ///
    /// Leading and trailing `/` are ignored, so `/group/array/` maps to the same node as `group/array`.
    ///
    /// # Errors
    /// Returns [`NodePathError`] if `path` is empty (the root cannot hold an array) or has an invalid node name.
    pub fn from_array_path(path: &str) -> Result<Self, NodePathError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(NodePathError(path.to_string()));
        }
        Self::new(&format!("/{trimmed}")).map_err(|_| NodePathError(path.to_string()))
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns true if this is the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Extracts a string slice of the path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name of the node, which is empty for the root node.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the parent of the node, or [`None`] for the root node.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some(("", _)) | None => Some(Self::root()),
            Some((parent, _)) => Some(Self(parent.to_string())),
        }
    }

    /// Returns all ancestors of the node, starting from the root.
    ///
    /// The node itself is not included.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            ancestors.push(path);
        }
        ancestors.reverse();
        ancestors
    }

    /// Validates a path.
    ///
    /// A path is valid if it is `/`, or it:
    ///  - starts with `/`,
    ///  - does not end with `/`,
    ///  - has no empty node names (i.e. no `//` substring), and
    ///  - has no node name composed only of periods (e.g. `.` or `..`) or starting with the reserved prefix `__`.
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path.eq("/")
            || (path.starts_with('/')
                && !path.ends_with('/')
                && path[1..].split('/').all(|name| {
                    !name.is_empty() && !name.starts_with("__") && !name.replace('.', "").is_empty()
                }))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path() {
        assert!(NodePath::new("/").is_ok());
        assert!(NodePath::new("/a/b").is_ok());
        assert_eq!(NodePath::new("/a/b").unwrap().to_string(), "/a/b");
        assert!(NodePath::new("a/b").is_err());
        assert!(NodePath::new("/a/b/").is_err());
        assert!(NodePath::new("/a//b").is_err());
        assert!(NodePath::new("/a/../b").is_err());
        assert!(NodePath::new("/__a").is_err());
        assert_eq!(
            NodePath::new("/a/b/").unwrap_err().to_string(),
            "invalid node path /a/b/"
        );
    }

    #[test]
    fn node_path_from_array_path() {
        let path = NodePath::from_array_path("at/this/location").unwrap();
        assert_eq!(path.as_str(), "/at/this/location");
        assert_eq!(
            NodePath::from_array_path("/at/this/location/").unwrap(),
            path
        );
        assert_eq!(path.name(), "location");
        assert!(NodePath::from_array_path("").is_err());
        assert!(NodePath::from_array_path("/").is_err());
        assert!(NodePath::from_array_path("a//b").is_err());
    }

    #[test]
    fn node_path_ancestors() {
        let path = NodePath::from_array_path("a/b/c").unwrap();
        assert_eq!(path.parent(), Some(NodePath::new("/a/b").unwrap()));
        assert_eq!(
            path.ancestors(),
            vec![
                NodePath::root(),
                NodePath::new("/a").unwrap(),
                NodePath::new("/a/b").unwrap()
            ]
        );
        assert_eq!(
            NodePath::new("/a").unwrap().ancestors(),
            vec![NodePath::root()]
        );
        assert!(NodePath::root().ancestors().is_empty());
        assert_eq!(NodePath::root().name(), "");
    }
}
