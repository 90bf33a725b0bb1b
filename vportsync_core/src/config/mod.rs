//! Tunable parameters for the calculator, arbiter, timing queue and
//! synchronizer.
//!
//! Every section falls back to its defaults when absent from the TOML, so a
//! partial file only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calculator: CalculatorConfig,
    pub arbiter: ArbiterConfig,
    pub timing: TimingConfig,
    pub sync: SyncConfig,
}

/// Display-port sizing and checkerboard prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Margin added on each side at rest, as a fraction of the viewport
    /// dimension on that axis.
    pub base_margin_fraction: f32,
    /// Upper bound on display-port size as a multiple of the viewport.
    pub max_size_multiplier: f32,
    /// Speeds (device px/s) below this count as stationary.
    pub velocity_threshold: f32,
    /// Fraction of the base margin kept behind the direction of travel.
    pub reverse_buffer: f32,
    /// How far ahead (seconds) the viewport is projected when predicting
    /// checkerboarding.
    pub checkerboard_horizon_secs: f32,
    /// Draw time assumed before any completion has been measured.
    pub default_draw_time_ms: f32,
    /// Weight of the newest sample in the pixels-per-ms average.
    pub ewma_weight: f32,
    /// Samples after which draw-time recording is switched off.
    pub draw_time_samples: u32,
    /// Speed (device px/s) that counts toward dropping resolution.
    pub high_velocity: f32,
    /// Consecutive high-velocity calculations before resolution drops.
    pub sustained_frames: u32,
    /// Resolution multiplier for the low tier. `1.0` disables the tier.
    pub low_resolution_scale: f32,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            base_margin_fraction: 0.25,
            max_size_multiplier: 3.0,
            velocity_threshold: 32.0,
            reverse_buffer: 0.2,
            checkerboard_horizon_secs: 0.5,
            default_draw_time_ms: 100.0,
            ewma_weight: 0.2,
            draw_time_samples: 20,
            high_velocity: 4000.0,
            sustained_frames: 4,
            low_resolution_scale: 1.0,
        }
    }
}

/// Progressive-update abort heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Per-edge slack (device px) when comparing the last sent display-port
    /// with the region being drawn. Content-side rounding and tile alignment
    /// make exact comparison useless.
    pub display_port_tolerance: f32,
    /// Slack (device px) when checking that a pass still covers the screen.
    pub coverage_slack: f32,
    /// Tolerance when comparing a pass resolution with the current zoom.
    pub resolution_epsilon: f32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            display_port_tolerance: 2.0,
            coverage_slack: 1.0,
            resolution_epsilon: 1e-3,
        }
    }
}

/// Outstanding-request bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Maximum outstanding requests; the oldest is dropped past this.
    pub capacity: usize,
    /// Per-edge slack (device px) when matching a drawn region to a request.
    pub match_tolerance: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            match_tolerance: 1.0,
        }
    }
}

/// Synchronizer behavior switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Snap an overscrolled viewport back when a fixed margin shrinks.
    pub clamp_on_margin_change: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            clamp_on_margin_change: true,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&data)?;
        log::debug!("config: loaded from {}", path.display());
        Ok(cfg)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.calculator;
        if !(c.max_size_multiplier.is_finite() && c.max_size_multiplier > 1.0) {
            return Err(ConfigError::Invalid {
                field: "calculator.max_size_multiplier",
                reason: "must be greater than 1",
            });
        }
        non_negative("calculator.base_margin_fraction", c.base_margin_fraction)?;
        non_negative("calculator.velocity_threshold", c.velocity_threshold)?;
        unit_interval("calculator.reverse_buffer", c.reverse_buffer)?;
        non_negative("calculator.checkerboard_horizon_secs", c.checkerboard_horizon_secs)?;
        positive("calculator.default_draw_time_ms", c.default_draw_time_ms)?;
        unit_interval("calculator.ewma_weight", c.ewma_weight)?;
        positive("calculator.high_velocity", c.high_velocity)?;
        if !(c.low_resolution_scale > 0.0 && c.low_resolution_scale <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "calculator.low_resolution_scale",
                reason: "must be in (0, 1]",
            });
        }

        let a = &self.arbiter;
        non_negative("arbiter.display_port_tolerance", a.display_port_tolerance)?;
        non_negative("arbiter.coverage_slack", a.coverage_slack)?;
        positive("arbiter.resolution_epsilon", a.resolution_epsilon)?;

        if self.timing.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "timing.capacity",
                reason: "must be at least 1",
            });
        }
        non_negative("timing.match_tolerance", self.timing.match_tolerance)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be a positive number",
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be a non-negative number",
        })
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be within [0, 1]",
        })
    }
}
