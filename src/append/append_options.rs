//! Options for the first append to a path.

use serde::{Deserialize, Serialize};

use crate::{array::DataType, config::global_config};

use super::AppendError;

/// Options for the array created by the first append to a path.
///
/// The defaults are taken from the [global configuration](crate::config::Config).
/// Options can also be deserialized from JSON, where missing fields take their default value:
/// ```rust
/// # use zarrs_append::{append::AppendOptions, array::DataType};
/// let options: AppendOptions = serde_json::from_str(r#"{"data_type": "int16", "chunk_size": 50}"#)?;
/// assert_eq!(options.data_type(), DataType::Int16);
/// assert_eq!(options.chunk_size(), 50);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppendOptions {
    data_type: DataType,
    chunk_size: u64,
    block_factor: u64,
}

impl Default for AppendOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            data_type: config.default_data_type(),
            chunk_size: config.default_chunk_size(),
            block_factor: config.default_block_factor(),
        }
    }
}

impl AppendOptions {
    /// Create a new append options builder.
    #[must_use]
    pub fn builder() -> AppendOptionsBuilder {
        AppendOptionsBuilder::new()
    }

    /// Return the data type of the array.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Set the data type of the array.
    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    /// Return the number of rows in a chunk, which is also the number of rows buffered before a write.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Set the chunk size.
    pub fn set_chunk_size(&mut self, chunk_size: u64) {
        self.chunk_size = chunk_size;
    }

    /// Return the number of chunks in a block.
    #[must_use]
    pub fn block_factor(&self) -> u64 {
        self.block_factor
    }

    /// Set the block factor.
    pub fn set_block_factor(&mut self, block_factor: u64) {
        self.block_factor = block_factor;
    }

    /// Return the block size, the number of rows the array grows by at a time.
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidOptions`] if the chunk size or block factor is zero, or the block size overflows.
    pub fn block_size(&self) -> Result<u64, AppendError> {
        if self.chunk_size == 0 {
            return Err(AppendError::InvalidOptions(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.block_factor == 0 {
            return Err(AppendError::InvalidOptions(
                "block factor must be at least 1".to_string(),
            ));
        }
        self.block_factor
            .checked_mul(self.chunk_size)
            .ok_or_else(|| {
                AppendError::InvalidOptions(format!(
                    "block size {} x {} overflows",
                    self.block_factor, self.chunk_size
                ))
            })
    }
}

/// Builder for [`AppendOptions`].
#[derive(Debug, Clone)]
pub struct AppendOptionsBuilder {
    options: AppendOptions,
}

impl Default for AppendOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppendOptionsBuilder {
    /// Create a new append options builder initialised with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: AppendOptions::default(),
        }
    }

    /// Build into append options.
    #[must_use]
    pub fn build(&self) -> AppendOptions {
        self.options.clone()
    }

    /// Set the data type.
    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.options.data_type = data_type;
        self
    }

    /// Set the chunk size.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.options.chunk_size = chunk_size;
        self
    }

    /// Set the block factor.
    #[must_use]
    pub fn block_factor(mut self, block_factor: u64) -> Self {
        self.options.block_factor = block_factor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_options_builder() {
        let options = AppendOptions::builder()
            .data_type(DataType::UInt32)
            .chunk_size(2)
            .block_factor(3)
            .build();
        assert_eq!(options.data_type(), DataType::UInt32);
        assert_eq!(options.block_size().unwrap(), 6);

        let mut options = options;
        options.set_chunk_size(0);
        assert!(matches!(
            options.block_size(),
            Err(AppendError::InvalidOptions(_))
        ));
        options.set_chunk_size(u64::MAX);
        assert!(options.block_size().is_err());
        options.set_chunk_size(1);
        options.set_block_factor(0);
        assert!(options.block_size().is_err());
    }

    #[test]
    fn append_options_json() {
        let options: AppendOptions = serde_json::from_str(r#"{"block_factor": 1}"#).unwrap();
        assert_eq!(options.block_factor(), 1);
        assert_eq!(options.chunk_size(), AppendOptions::default().chunk_size());
        assert!(serde_json::from_str::<AppendOptions>(r#"{"dtype": "int8"}"#).is_err());
        assert!(serde_json::from_str::<AppendOptions>(r#"{"data_type": "complex64"}"#).is_err());
    }
}
