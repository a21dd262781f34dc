//! Configuration for annomerge-core
//!
//! Merge tunables plus the per-source exclusion filters. Every field has a
//! default, so a partial TOML or JSON document is enough.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::MergeParameters;

/// Default number of bookmark slots per publication
pub const DEFAULT_MAX_BOOKMARK_SLOTS: i32 = 10;

/// Default duration of a synthesized thumbnail media map (4 seconds)
pub const DEFAULT_THUMBNAIL_DURATION_TICKS: i64 = 40_000_000;

/// Merge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    /// Slots available per publication; bookmarks beyond this are dropped
    pub max_bookmark_slots: i32,
    /// Duration given to a synthesized playlist-item thumbnail media map
    pub thumbnail_media_duration_ticks: i64,
    /// Whether playlist items whose thumbnail is a known media file but which
    /// have no media map receive one
    pub synthesize_thumbnail_media_maps: bool,
    /// What each source contributes
    pub parameters: MergeParameters,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_bookmark_slots: DEFAULT_MAX_BOOKMARK_SLOTS,
            thumbnail_media_duration_ticks: DEFAULT_THUMBNAIL_DURATION_TICKS,
            synthesize_thumbnail_media_maps: true,
            parameters: MergeParameters::default(),
        }
    }
}

impl MergeConfig {
    /// Builder method to set the exclusion filters
    pub fn with_parameters(mut self, parameters: MergeParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bookmark_slots <= 0 {
            return Err(ConfigError::OutOfRange(
                "max_bookmark_slots must be positive".to_string(),
            ));
        }

        if self.thumbnail_media_duration_ticks < 0 {
            return Err(ConfigError::OutOfRange(
                "thumbnail_media_duration_ticks must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration could not be written
    #[error("Serialize error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MergeConfig::default();
        assert_eq!(config.max_bookmark_slots, 10);
        assert_eq!(config.thumbnail_media_duration_ticks, 40_000_000);
        assert!(config.synthesize_thumbnail_media_maps);
        assert!(!config.parameters.any_excludes());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = MergeConfig::from_toml(
            r#"
            max_bookmark_slots = 5

            [parameters]
            include_bookmarks = false
            "#,
        )
        .unwrap();
        assert_eq!(config.max_bookmark_slots, 5);
        assert!(!config.parameters.include_bookmarks);
        assert!(config.parameters.include_notes);
        assert_eq!(config.thumbnail_media_duration_ticks, DEFAULT_THUMBNAIL_DURATION_TICKS);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MergeConfig {
            synthesize_thumbnail_media_maps: false,
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(MergeConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_json_round_trip() {
        let config = MergeConfig::default().with_parameters(MergeParameters {
            include_tags: false,
            ..Default::default()
        });
        let json = config.to_json().unwrap();
        assert_eq!(MergeConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_zero_slots() {
        let config = MergeConfig {
            max_bookmark_slots: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange(_))));
    }

    #[test]
    fn test_validation_rejects_negative_duration() {
        let config = MergeConfig {
            thumbnail_media_duration_ticks: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            MergeConfig::from_toml("max_bookmark_slots = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
