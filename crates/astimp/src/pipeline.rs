//! End-to-end analysis: plate → disks → zones → measurements.

use crate::calibration::{scale_from_disk_radii, Calibration};
use crate::config::AnalysisConfig;
use crate::disk::{detect_disks, Disk};
use crate::error::{AnalysisError, Result};
use crate::measure::{aggregate, MeasurementSet};
use crate::pixels::Image;
use crate::plate::{locate_plate, Plate};
use crate::zone::{analyze_zones, Zone};

/// Geometry produced before aggregation.
#[derive(Debug, Clone)]
struct Stages {
    plate: Plate,
    disks: Vec<Disk>,
    zones: Vec<Zone>,
}

fn run_stages(image: &Image, calibration: Option<&Calibration>, config: &AnalysisConfig) -> Result<Stages> {
    let mut plate = locate_plate(image, calibration, config)?;
    let disks = detect_disks(image, &plate, config);

    if let Some(Calibration::KnownDiskDiameter { diameter_mm }) = calibration {
        let radii: Vec<f64> = disks.iter().map(|d| d.radius).collect();
        match scale_from_disk_radii(&radii, *diameter_mm).or(config.default_scale_mm_per_px) {
            Some(scale) => {
                tracing::debug!(scale_mm_per_px = scale, "scale derived from disk size");
                plate = plate.with_scale(scale);
            }
            None => tracing::warn!("no disks to derive the scale from"),
        }
    }

    let zones = analyze_zones(image, &disks, &plate, config);
    Ok(Stages {
        plate,
        disks,
        zones,
    })
}

/// Run the full pipeline on one image.
///
/// Plate failures short-circuit before disk detection; an uncalibrated plate
/// fails aggregation with [`AnalysisError::CalibrationMissing`].
pub fn analyze_image(
    image: &Image,
    calibration: Option<&Calibration>,
    config: &AnalysisConfig,
) -> Result<MeasurementSet> {
    let stages = run_stages(image, calibration, config)?;
    let set = aggregate(&stages.plate, &stages.disks, &stages.zones)?;
    tracing::info!("{} measurements", set.len());
    Ok(set)
}

/// Machine-readable failure attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReportFailure {
    /// Stable failure kind (`plate_not_found`, `calibration_missing`, ...).
    pub kind: String,
    pub message: String,
}

impl From<&AnalysisError> for ReportFailure {
    fn from(err: &AnalysisError) -> Self {
        let kind = match err {
            AnalysisError::PlateNotFound { .. } => "plate_not_found",
            AnalysisError::DegenerateGeometry(_) => "degenerate_geometry",
            AnalysisError::CalibrationMissing => "calibration_missing",
            AnalysisError::InternalInconsistency(_) => "internal_inconsistency",
            AnalysisError::InvalidImage(_) => "invalid_image",
            AnalysisError::InvalidCalibration(_) => "invalid_calibration",
            AnalysisError::InvalidConfig(_) => "invalid_config",
            AnalysisError::Io(_) => "io",
            AnalysisError::Json(_) => "json",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything known about one image, including partial geometry when a
/// later stage failed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub image_size: [u32; 2],
    pub plate: Option<Plate>,
    pub disks: Vec<Disk>,
    pub zones: Vec<Zone>,
    pub measurements: Option<MeasurementSet>,
    pub failure: Option<ReportFailure>,
}

/// Like [`analyze_image`] but never fails: geometry detected before a
/// failing stage is kept, and the failure is recorded in the report.
pub fn analyze_image_report(
    image: &Image,
    calibration: Option<&Calibration>,
    config: &AnalysisConfig,
) -> AnalysisReport {
    let (w, h) = image.dimensions();
    let mut report = AnalysisReport {
        image_size: [w, h],
        plate: None,
        disks: Vec::new(),
        zones: Vec::new(),
        measurements: None,
        failure: None,
    };

    let stages = match run_stages(image, calibration, config) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(%err, "analysis stopped");
            report.failure = Some(ReportFailure::from(&err));
            return report;
        }
    };
    match aggregate(&stages.plate, &stages.disks, &stages.zones) {
        Ok(set) => report.measurements = Some(set),
        Err(err) => {
            tracing::warn!(%err, "aggregation failed");
            report.failure = Some(ReportFailure::from(&err));
        }
    }
    report.plate = Some(stages.plate);
    report.disks = stages.disks;
    report.zones = stages.zones;
    report
}
