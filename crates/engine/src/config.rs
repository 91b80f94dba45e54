use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::error::TagError;

pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Hard ceiling for `max_depth`; closure cost grows with every level.
pub const MAX_DEPTH_LIMIT: usize = 64;

pub const MAX_DEPTH_ENV: &str = "TAGNEST_MAX_DEPTH";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest depth accepted by closure-based queries
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngineConfig {
    #[serde(default)]
    schema_version: Option<u32>,
    max_depth: Option<usize>,
}

impl EngineConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawEngineConfig =
            toml::from_str(input).context("Failed to parse engine config TOML")?;
        Self::from_raw(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config {}", path.display()))?;
        let config = Self::from_toml_str(&input)
            .with_context(|| format!("Invalid engine config {}", path.display()))?;
        log::debug!("Loaded engine config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Apply `TAGNEST_MAX_DEPTH` when it is set.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_max_depth_override(std::env::var(MAX_DEPTH_ENV).ok())
    }

    fn with_max_depth_override(mut self, value: Option<String>) -> Result<Self> {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return Ok(self);
        };
        self.max_depth = value
            .trim()
            .parse()
            .with_context(|| format!("{MAX_DEPTH_ENV}='{value}' is not a number"))?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> std::result::Result<(), TagError> {
        if (1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            Ok(())
        } else {
            Err(TagError::InvalidDepth {
                depth: self.max_depth,
                max: MAX_DEPTH_LIMIT,
            })
        }
    }

    fn from_raw(raw: RawEngineConfig) -> Result<Self> {
        if let Some(schema_version) = raw.schema_version {
            if schema_version != 1 {
                return Err(anyhow!(
                    "engine config schema_version {schema_version} is not supported (expected 1)"
                ));
            }
        }
        let config = Self {
            max_depth: raw.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        };
        config.validate()?;
        Ok(config)
    }
}
