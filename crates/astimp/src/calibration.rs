//! Pixel-to-millimeter calibration inputs.

use crate::error::{AnalysisError, Result};
use crate::geometry::Point;

/// How the plate scale (mm per pixel) is established.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibration {
    /// Two image points a known physical distance apart (e.g. a ruler).
    ReferenceLength {
        from: Point,
        to: Point,
        length_mm: f64,
    },
    /// All disks share this physical diameter; the scale is derived from the
    /// median detected disk radius.
    KnownDiskDiameter { diameter_mm: f64 },
}

impl Calibration {
    /// Check that the calibration can produce a finite positive scale.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Calibration::ReferenceLength {
                from,
                to,
                length_mm,
            } => {
                if !(length_mm > 0.0 && length_mm.is_finite()) {
                    return Err(AnalysisError::InvalidCalibration(format!(
                        "reference length must be positive, got {length_mm}"
                    )));
                }
                if !from.is_finite() || !to.is_finite() || from.distance(to) < 1e-6 {
                    return Err(AnalysisError::InvalidCalibration(
                        "reference points must be finite and distinct".to_string(),
                    ));
                }
                Ok(())
            }
            Calibration::KnownDiskDiameter { diameter_mm } => {
                if diameter_mm > 0.0 && diameter_mm.is_finite() {
                    Ok(())
                } else {
                    Err(AnalysisError::InvalidCalibration(format!(
                        "disk diameter must be positive, got {diameter_mm}"
                    )))
                }
            }
        }
    }

    /// Scale available before any detection (`None` for disk-derived scales).
    pub fn direct_scale(&self) -> Result<Option<f64>> {
        self.validate()?;
        Ok(match *self {
            Calibration::ReferenceLength {
                from,
                to,
                length_mm,
            } => Some(length_mm / from.distance(to)),
            Calibration::KnownDiskDiameter { .. } => None,
        })
    }
}

/// Scale from the median of detected disk radii.
pub(crate) fn scale_from_disk_radii(radii_px: &[f64], diameter_mm: f64) -> Option<f64> {
    let mut r: Vec<f64> = radii_px
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if r.is_empty() || !(diameter_mm > 0.0) {
        return None;
    }
    r.sort_by(f64::total_cmp);
    let mid = r.len() / 2;
    let median = if r.len() % 2 == 0 {
        0.5 * (r[mid - 1] + r[mid])
    } else {
        r[mid]
    };
    Some(diameter_mm / (2.0 * median))
}
