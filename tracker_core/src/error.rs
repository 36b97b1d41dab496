//! Error types for configuration and per-frame tracking.

use crate::types::TrackId;
use thiserror::Error;

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for tracking operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Invalid or incomplete configuration. Always raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown behavior '{0}'")]
    UnknownBehavior(String),

    #[error("behavior '{behavior}' is missing required parameter '{parameter}'")]
    MissingParameter {
        behavior: String,
        parameter: &'static str,
    },

    #[error("behavior '{behavior}' does not take parameter '{parameter}'")]
    UnexpectedParameter {
        behavior: String,
        parameter: &'static str,
    },

    #[error("behavior '{0}' is configured more than once")]
    DuplicateBehavior(String),

    #[error("classifier must configure at least one behavior")]
    NoBehaviors,

    #[error("{section}.{parameter} is invalid ({value}): {reason}")]
    InvalidParameter {
        section: String,
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(
        section: impl Into<String>,
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            section: section.into(),
            parameter,
            value,
            reason,
        }
    }
}

/// Per-frame precondition violations reported by the track manager.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("frame has {detections} detections but {assignments} association entries")]
    AssociationMismatch {
        detections: usize,
        assignments: usize,
    },

    #[error("track {track_id} was assigned more than one detection in the same frame")]
    DuplicateAssignment { track_id: TrackId },
}

/// Check that `value` is finite and strictly positive.
pub(crate) fn require_positive(
    section: &str,
    parameter: &'static str,
    value: f64,
) -> ConfigResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            section,
            parameter,
            value,
            "must be finite and > 0",
        ));
    }
    Ok(())
}

/// Check that `value` is finite and non-negative.
pub(crate) fn require_non_negative(
    section: &str,
    parameter: &'static str,
    value: f64,
) -> ConfigResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            section,
            parameter,
            value,
            "must be finite and >= 0",
        ));
    }
    Ok(())
}

/// Check that `value` is finite.
pub(crate) fn require_finite(
    section: &str,
    parameter: &'static str,
    value: f64,
) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(section, parameter, value, "must be finite"));
    }
    Ok(())
}
