//! Error taxonomy shared by every analysis stage.

use thiserror::Error;

/// Errors surfaced by the analysis engine.
///
/// Per-disk zone analysis has no error outcome: degraded zones are reported
/// through [`crate::QualityFlag`] instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No circular plate boundary could be located in the image.
    #[error("plate not found: {reason}")]
    PlateNotFound {
        /// Short machine-readable reason (e.g. `no_candidates`).
        reason: String,
    },

    /// A geometric fit received too few or collinear points.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The plate has no pixel-to-millimeter scale, so millimeter diameters
    /// cannot be reported.
    #[error("calibration missing: plate scale (mm/px) is unset")]
    CalibrationMissing,

    /// Programming-contract violation between pipeline stages.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Pixel buffer rejected at ingestion.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Calibration input is malformed (non-positive length, coincident points).
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    /// Configuration values are out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    pub(crate) fn plate_not_found(reason: impl Into<String>) -> Self {
        Self::PlateNotFound {
            reason: reason.into(),
        }
    }

    /// `true` when no plate was visible (retry with better framing/lighting).
    pub fn is_plate_not_found(&self) -> bool {
        matches!(self, Self::PlateNotFound { .. })
    }

    /// `true` when a plate was found but no calibration was available.
    pub fn is_calibration_missing(&self) -> bool {
        matches!(self, Self::CalibrationMissing)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;
