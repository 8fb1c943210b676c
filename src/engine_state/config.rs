//! # Engine Configuration
//!
//! Streaming parameters that are fixed for the lifetime of an engine instance.
//! The configuration can be built in code, parsed from JSON text, or loaded from
//! a JSON file. Missing fields fall back to their defaults, so a file only needs
//! to name the values it overrides:
//!
//! ```json
//! { "view_distance": 12, "worker_count": 4 }
//! ```
//!
//! A configuration must pass [`EngineConfig::validate`] before it is used. The
//! chunk dimensions are powers of two because voxel indices are bit-packed.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration text is not valid JSON for [`EngineConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field that must be non-zero was zero.
    #[error("`{field}` must be at least 1")]
    Zero {
        /// Name of the offending field
        field: &'static str,
    },
    /// A chunk dimension is not a power of two.
    #[error("`{field}` must be a power of two, got {value}")]
    NotPowerOfTwo {
        /// Name of the offending field
        field: &'static str,
        /// The rejected value
        value: u32,
    },
    /// Sections cannot be taller than the chunk that contains them.
    #[error("section height {section_height} exceeds chunk height {chunk_height}")]
    SectionTallerThanChunk {
        /// Configured section height
        section_height: u32,
        /// Configured chunk height
        chunk_height: u32,
    },
}

/// Streaming and worker parameters for an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Radius of the loaded disk, in chunks
    pub view_distance: u32,
    /// Horizontal chunk size in voxels (x and z)
    pub chunk_width: u32,
    /// Vertical chunk size in voxels
    pub chunk_height: u32,
    /// Height of a meshing section in voxels
    pub section_height: u32,
    /// Number of mesh build worker threads
    pub worker_count: usize,
    /// Maximum number of mesh uploads applied per tick
    pub max_uploads_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            view_distance: 8,
            chunk_width: 32,
            chunk_height: 256,
            section_height: 32,
            worker_count: 3,
            max_uploads_per_tick: 1,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON text and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks every invariant the engine relies on.
    ///
    /// # Returns
    /// `Ok(())` when the configuration is usable, otherwise the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.view_distance == 0 {
            return Err(ConfigError::Zero {
                field: "view_distance",
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Zero {
                field: "worker_count",
            });
        }
        if self.max_uploads_per_tick == 0 {
            return Err(ConfigError::Zero {
                field: "max_uploads_per_tick",
            });
        }

        for (field, value) in [
            ("chunk_width", self.chunk_width),
            ("chunk_height", self.chunk_height),
            ("section_height", self.section_height),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }

        if self.section_height > self.chunk_height {
            return Err(ConfigError::SectionTallerThanChunk {
                section_height: self.section_height,
                chunk_height: self.chunk_height,
            });
        }

        Ok(())
    }

    /// Number of meshing sections stacked in one chunk.
    pub fn sections_per_chunk(&self) -> u32 {
        self.chunk_height / self.section_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sections_per_chunk(), 8);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "view_distance": 12 }"#).unwrap();
        assert_eq!(config.view_distance, 12);
        assert_eq!(config.chunk_width, 32);
        assert_eq!(config.max_uploads_per_tick, 1);
    }

    #[test]
    fn rejects_non_power_of_two_width() {
        let err = EngineConfig::from_json(r#"{ "chunk_width": 24 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPowerOfTwo {
                field: "chunk_width",
                value: 24
            }
        ));
    }

    #[test]
    fn rejects_section_taller_than_chunk() {
        let config = EngineConfig {
            chunk_height: 16,
            section_height: 32,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SectionTallerThanChunk { .. })
        ));
    }

    #[test]
    fn rejects_zero_workers() {
        let config = EngineConfig {
            worker_count: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "worker_count"
            })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_json("{ view_distance: }"),
            Err(ConfigError::Parse(_))
        ));
    }
}
