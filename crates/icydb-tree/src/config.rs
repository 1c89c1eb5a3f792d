//! Module: config
//! Responsibility: engine tunables and their TOML surface.
//! Does not own: per-index definitions (see `index::IndexDef`).

use crate::error::InternalError;
use serde::{Deserialize, Serialize};

/// Bytes per tree block.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Bytes of the first build-array extent.
pub const DEFAULT_BUILD_EXTENT_SIZE: usize = 16 * 1024;

/// Records released per reclaim step.
///
/// Debug builds yield far more often so that the resumable path is
/// exercised by ordinary test runs.
#[cfg(not(debug_assertions))]
pub const DEFAULT_GC_BATCH: usize = 1000;
#[cfg(debug_assertions)]
pub const DEFAULT_GC_BATCH: usize = 10;

/// Smallest number of elements a tree block may hold.
pub const MIN_BLOCK_ELEMENTS: usize = 4;

///
/// TreeConfig
///
/// Engine-wide tunables shared by every tree index created from it.
/// Unknown fields are rejected so that typos in deployment configs fail
/// loudly instead of silently falling back to defaults.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    pub block_size: usize,
    pub build_extent_size: usize,
    pub gc_batch: usize,
    pub memory_limit: Option<usize>,
    pub debug: bool,
}

impl TreeConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, InternalError> {
        let config: Self = toml::from_str(text)
            .map_err(|err| InternalError::config_unsupported(format!("invalid config: {err}")))?;

        config.validate()
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(self) -> Result<Self, InternalError> {
        if self.block_size == 0 {
            return Err(InternalError::config_unsupported(
                "block_size must be greater than zero",
            ));
        }
        if self.gc_batch == 0 {
            return Err(InternalError::config_unsupported(
                "gc_batch must be greater than zero",
            ));
        }

        Ok(self)
    }

    /// Number of elements of `elem_size` bytes that fit one block.
    #[must_use]
    pub fn block_capacity(&self, elem_size: usize) -> usize {
        (self.block_size / elem_size.max(1)).max(MIN_BLOCK_ELEMENTS)
    }

    /// Number of elements in the first build-array extent.
    #[must_use]
    pub fn build_extent_capacity(&self, elem_size: usize) -> usize {
        (self.build_extent_size / elem_size.max(1)).max(1)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            build_extent_size: DEFAULT_BUILD_EXTENT_SIZE,
            gc_batch: DEFAULT_GC_BATCH,
            memory_limit: None,
            debug: false,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = TreeConfig::from_toml("").expect("empty config should parse");

        assert_eq!(config, TreeConfig::default());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = TreeConfig::from_toml(
            r"
            block_size = 128
            memory_limit = 65536
            debug = true
            ",
        )
        .expect("config should parse");

        assert_eq!(config.block_size, 128);
        assert_eq!(config.memory_limit, Some(65536));
        assert!(config.debug);
        assert_eq!(config.gc_batch, DEFAULT_GC_BATCH);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = TreeConfig::from_toml("block_sise = 10").unwrap_err();

        assert!(err.is_unsupported());
        assert!(err.message.contains("invalid config"));
    }

    #[test]
    fn zero_gc_batch_is_rejected() {
        let err = TreeConfig::from_toml("gc_batch = 0").unwrap_err();

        assert!(err.message.contains("gc_batch"));
    }

    #[test]
    fn block_capacity_has_a_floor() {
        let config = TreeConfig {
            block_size: 8,
            ..TreeConfig::default()
        };

        assert_eq!(config.block_capacity(16), MIN_BLOCK_ELEMENTS);
        assert_eq!(TreeConfig::default().block_capacity(16), 32);
    }
}
