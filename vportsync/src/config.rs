//! Harness settings: the engine configuration plus a `[harness]` section.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vportsync_core::{Config, ConfigError};

/// Scenario driven by the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Render frames to run before stopping.
    pub frames: u32,
    pub frame_interval_ms: u64,
    /// Surface size in device pixels, `[width, height]`.
    pub viewport: [f32; 2],
    /// Page size in CSS pixels, `[width, height]`.
    pub page: [f32; 2],
    /// Initial fling velocity in device px/s, `[x, y]`.
    pub fling_velocity: [f32; 2],
    /// Velocity multiplier applied every frame while flinging.
    pub fling_decay: f32,
    /// Height of the toolbar overlapping the top of the content.
    pub toolbar_height: f32,
    /// Simulated content draw speed.
    pub content_px_per_ms: f32,
    /// Draw a coarse pass before each full-resolution one.
    pub low_precision_first: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            frames: 240,
            frame_interval_ms: 16,
            viewport: [400.0, 800.0],
            page: [1000.0, 20000.0],
            fling_velocity: [0.0, 6000.0],
            fling_decay: 0.95,
            toolbar_height: 56.0,
            content_px_per_ms: 20_000.0,
            low_precision_first: true,
        }
    }
}

impl HarnessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "harness.frame_interval_ms",
                reason: "must be at least 1",
            });
        }
        if !(self.fling_decay > 0.0 && self.fling_decay < 1.0) {
            return Err(ConfigError::Invalid {
                field: "harness.fling_decay",
                reason: "must be in (0, 1)",
            });
        }
        if !(self.content_px_per_ms.is_finite() && self.content_px_per_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "harness.content_px_per_ms",
                reason: "must be a positive number",
            });
        }
        let sizes = [self.viewport, self.page];
        if sizes.iter().flatten().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::Invalid {
                field: "harness.viewport",
                reason: "viewport and page sizes must be positive",
            });
        }
        Ok(())
    }
}

/// Only the `[harness]` table; engine sections are parsed by [`Config`].
#[derive(Debug, Default, Deserialize)]
struct HarnessFile {
    #[serde(default)]
    harness: HarnessConfig,
}

/// Everything the harness needs to run.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub engine: Config,
    pub harness: HarnessConfig,
}

impl Settings {
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let engine = Config::from_toml_str(data)?;
        let file: HarnessFile = toml::from_str(data)?;
        file.harness.validate()?;
        Ok(Self {
            engine,
            harness: file.harness,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    /// Defaults as a TOML document.
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        let defaults = Self::default();
        let mut table = toml::Table::try_from(&defaults.engine)?;
        table.insert("harness".into(), toml::Value::try_from(&defaults.harness)?);
        toml::to_string_pretty(&table)
    }
}
