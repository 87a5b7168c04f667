use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{ArrayShape, DataType};

/// A named metadata entry with an optional configuration, such as a chunk grid or a codec.
///
/// For example:
/// ```json
/// {
///     "name": "regular",
///     "configuration": {
///         "chunk_shape": [1000, 2]
///     }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct MetadataV3 {
    /// The name.
    pub name: String,
    /// The configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Map<String, serde_json::Value>>,
}

impl MetadataV3 {
    /// Create metadata from a `name` and a JSON object `configuration`.
    ///
    /// A `configuration` which is not a JSON object is dropped.
    #[must_use]
    pub fn new_with_configuration(name: &str, configuration: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            configuration: match configuration {
                serde_json::Value::Object(configuration) => Some(configuration),
                _ => None,
            },
        }
    }

    /// Return a configuration value.
    #[must_use]
    pub fn configuration_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.configuration.as_ref().and_then(|configuration| configuration.get(key))
    }
}

/// Zarr array metadata (storage specification v3).
///
/// Arrays written by this crate use a `regular` chunk grid, the `default` chunk key encoding with the `/` separator, and a single little endian `bytes` codec.
/// An example `JSON` document:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "array",
///     "shape": [12345, 2],
///     "data_type": "float64",
///     "chunk_grid": {
///         "name": "regular",
///         "configuration": {
///             "chunk_shape": [1000, 2]
///         }
///     },
///     "chunk_key_encoding": {
///         "name": "default",
///         "configuration": {
///             "separator": "/"
///         }
///     },
///     "fill_value": 0.0,
///     "codecs": [{
///         "name": "bytes",
///         "configuration": {
///             "endian": "little"
///         }
///     }]
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadata {
    /// An integer defining the version of the storage specification to which the array adheres. Must be `3`.
    pub zarr_format: usize,
    /// A string defining the type of hierarchy node element, must be `array` here.
    pub node_type: String,
    /// An array of integers providing the length of each dimension of the Zarr array.
    pub shape: ArrayShape,
    /// The data type of the Zarr array.
    pub data_type: DataType,
    /// The chunk grid of the Zarr array.
    pub chunk_grid: MetadataV3,
    /// The mapping from chunk grid cell coordinates to keys in the underlying store.
    pub chunk_key_encoding: MetadataV3,
    /// Provides an element value to use for uninitialised portions of the Zarr array.
    pub fill_value: serde_json::Value,
    /// Specifies a list of codecs to be used for encoding and decoding chunks.
    pub codecs: Vec<MetadataV3>,
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ArrayMetadata {
    /// Create array metadata with a regular chunk grid of `chunk_shape`.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: &[u64],
        fill_value: serde_json::Value,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            zarr_format: 3,
            node_type: "array".to_string(),
            shape,
            data_type,
            chunk_grid: MetadataV3::new_with_configuration(
                "regular",
                serde_json::json!({ "chunk_shape": chunk_shape }),
            ),
            chunk_key_encoding: MetadataV3::new_with_configuration(
                "default",
                serde_json::json!({ "separator": "/" }),
            ),
            fill_value,
            codecs: vec![MetadataV3::new_with_configuration(
                "bytes",
                serde_json::json!({ "endian": "little" }),
            )],
            attributes,
        }
    }

    /// Returns the chunk shape of a `regular` chunk grid, or [`None`] for any other chunk grid.
    #[must_use]
    pub fn regular_chunk_shape(&self) -> Option<ArrayShape> {
        if self.chunk_grid.name != "regular" {
            return None;
        }
        serde_json::from_value(self.chunk_grid.configuration_value("chunk_shape")?.clone()).ok()
    }

    /// Returns true if chunk keys use the `default` chunk key encoding with the `/` separator.
    #[must_use]
    pub fn has_default_chunk_key_encoding(&self) -> bool {
        self.chunk_key_encoding.name == "default"
            && self
                .chunk_key_encoding
                .configuration_value("separator")
                .map_or(true, |separator| separator == "/")
    }

    /// Returns true if chunks are encoded by a single little endian `bytes` codec.
    ///
    /// The `endian` configuration may be omitted for single byte data types.
    #[must_use]
    pub fn has_little_endian_bytes_codec(&self) -> bool {
        match self.codecs.as_slice() {
            [codec] if codec.name == "bytes" => match codec.configuration_value("endian") {
                Some(endian) => endian == "little",
                None => self.data_type.size() == 1,
            },
            _ => false,
        }
    }
}
