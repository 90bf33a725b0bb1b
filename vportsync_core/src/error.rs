//! Error types for rejected metrics and bad configuration.

use std::path::PathBuf;

/// Why a viewport snapshot was refused at an update boundary.
///
/// A refused update is dropped and the previous snapshot stays published.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("non-finite value in {field}")]
    NonFinite { field: &'static str },
    #[error("zoom factor must be positive, got {0}")]
    NonPositiveZoom(f32),
    #[error("viewport size must not be negative")]
    NegativeSize,
    #[error("fixed-layer margins must not be negative")]
    NegativeMargin,
}

/// Failure to load or validate a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
