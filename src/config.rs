//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::array::DataType;

/// Global configuration options for the `zarrs_append` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// # Append Defaults
/// These defaults are used by [`AppendOptions::default`](crate::append::AppendOptions::default) and only apply to the first append to a path.
///
/// ## Default Chunk Size
/// > default: `1000`
///
/// The number of rows buffered in memory before a chunk is written.
/// Choose it so that a chunk of rows stays between roughly 10 KiB and 1 MiB.
///
/// ## Default Block Factor
/// > default: `100`
///
/// The number of chunks allocated at once when an array grows, so the block size is `block_factor * chunk_size` rows.
///
/// ## Default Data Type
/// > default: [`DataType::Float64`]
///
/// # Validation
/// ## Validate Element Shape
/// > default: [`true`]
///
/// If enabled, every element appended to a path must have the element shape established by the first append to that path, otherwise it is rejected with [`AppendError::ShapeMismatch`](crate::append::AppendError::ShapeMismatch) and nothing is buffered.
/// If disabled, a mismatched element is buffered and the mismatch surfaces later as an array error when its chunk is written.
#[derive(Debug)]
pub struct Config {
    default_chunk_size: u64,
    default_block_factor: u64,
    default_data_type: DataType,
    validate_element_shape: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_chunk_size: 1000,
            default_block_factor: 100,
            default_data_type: DataType::Float64,
            validate_element_shape: true,
        }
    }
}

impl Config {
    /// Get the [default chunk size](#default-chunk-size) configuration.
    #[must_use]
    pub fn default_chunk_size(&self) -> u64 {
        self.default_chunk_size
    }

    /// Set the [default chunk size](#default-chunk-size) configuration.
    pub fn set_default_chunk_size(&mut self, chunk_size: u64) {
        self.default_chunk_size = chunk_size;
    }

    /// Get the [default block factor](#default-block-factor) configuration.
    #[must_use]
    pub fn default_block_factor(&self) -> u64 {
        self.default_block_factor
    }

    /// Set the [default block factor](#default-block-factor) configuration.
    pub fn set_default_block_factor(&mut self, block_factor: u64) {
        self.default_block_factor = block_factor;
    }

    /// Get the [default data type](#default-data-type) configuration.
    #[must_use]
    pub fn default_data_type(&self) -> DataType {
        self.default_data_type
    }

    /// Set the [default data type](#default-data-type) configuration.
    pub fn set_default_data_type(&mut self, data_type: DataType) {
        self.default_data_type = data_type;
    }

    /// Get the [validate element shape](#validate-element-shape) configuration.
    #[must_use]
    pub fn validate_element_shape(&self) -> bool {
        self.validate_element_shape
    }

    /// Set the [validate element shape](#validate-element-shape) configuration.
    pub fn set_validate_element_shape(&mut self, validate_element_shape: bool) {
        self.validate_element_shape = validate_element_shape;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.default_chunk_size(), 1000);
        assert_eq!(config.default_block_factor(), 100);
        assert_eq!(config.default_data_type(), DataType::Float64);
        assert!(config.validate_element_shape());
    }

    #[test]
    fn config_setters() {
        let mut config = Config::default();
        config.set_default_chunk_size(7);
        config.set_default_block_factor(3);
        config.set_default_data_type(DataType::Int32);
        config.set_validate_element_shape(false);
        assert_eq!(config.default_chunk_size(), 7);
        assert_eq!(config.default_block_factor(), 3);
        assert_eq!(config.default_data_type(), DataType::Int32);
        assert!(!config.validate_element_shape());
    }

    #[test]
    fn config_global() {
        assert!(global_config().default_chunk_size() > 0);
    }
}
