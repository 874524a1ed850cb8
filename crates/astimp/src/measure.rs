//! Measurement aggregation: calibrated zone diameters per disk.

use std::collections::BTreeMap;

use crate::disk::Disk;
use crate::error::{AnalysisError, Result};
use crate::plate::Plate;
use crate::zone::{QualityFlag, Zone};

/// Final per-disk result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Measurement {
    pub disk_id: usize,
    /// Zone diameter in millimeters, rounded to the calibration resolution.
    pub diameter_mm: f64,
    pub quality: QualityFlag,
    pub raw_zone: Zone,
}

/// All measurements of one image, ordered by disk id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasurementSet {
    /// Scale the diameters were computed with.
    pub scale_mm_per_px: f64,
    /// Decimal places kept in `diameter_mm`.
    pub decimals: u32,
    pub measurements: Vec<Measurement>,
}

impl MeasurementSet {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    /// Measurement for `disk_id`, if present.
    pub fn get(&self, disk_id: usize) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.disk_id == disk_id)
    }
}

impl<'a> IntoIterator for &'a MeasurementSet {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

/// Decimal places resolvable at `scale_mm_per_px`: one pixel at 0.1 mm/px
/// resolves 0.1 mm, so one decimal.
pub fn precision_decimals(scale_mm_per_px: f64) -> u32 {
    if !(scale_mm_per_px > 0.0) || !scale_mm_per_px.is_finite() {
        return 0;
    }
    (-scale_mm_per_px.log10() - 1e-9).ceil().clamp(0.0, 6.0) as u32
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let f = 10f64.powi(decimals as i32);
    (value * f).round() / f
}

/// Combine plate, disks and zones into calibrated measurements.
///
/// Fails with [`AnalysisError::CalibrationMissing`] on an uncalibrated plate
/// and with [`AnalysisError::InternalInconsistency`] when disks and zones do
/// not pair up one-to-one.
pub fn aggregate(plate: &Plate, disks: &[Disk], zones: &[Zone]) -> Result<MeasurementSet> {
    let scale = plate.scale().ok_or(AnalysisError::CalibrationMissing)?;

    let mut by_disk: BTreeMap<usize, &Zone> = BTreeMap::new();
    for zone in zones {
        if by_disk.insert(zone.disk_id, zone).is_some() {
            return Err(AnalysisError::InternalInconsistency(format!(
                "more than one zone for disk {}",
                zone.disk_id
            )));
        }
    }

    let mut ids: Vec<usize> = disks.iter().map(|d| d.id).collect();
    ids.sort_unstable();
    if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
        return Err(AnalysisError::InternalInconsistency(format!(
            "duplicate disk id {}",
            w[0]
        )));
    }
    if let Some(orphan) = by_disk.keys().find(|id| ids.binary_search(id).is_err()) {
        return Err(AnalysisError::InternalInconsistency(format!(
            "zone references unknown disk {orphan}"
        )));
    }

    let decimals = precision_decimals(scale);
    let mut measurements = Vec::with_capacity(ids.len());
    for id in ids {
        let zone = by_disk.get(&id).ok_or_else(|| {
            AnalysisError::InternalInconsistency(format!("no zone for disk {id}"))
        })?;
        let radius_mm = zone
            .boundary_radius_mm
            .unwrap_or(zone.boundary_radius_px * scale);
        measurements.push(Measurement {
            disk_id: id,
            diameter_mm: round_to(2.0 * radius_mm, decimals),
            quality: zone.quality,
            raw_zone: (*zone).clone(),
        });
    }

    tracing::debug!(
        count = measurements.len(),
        scale_mm_per_px = scale,
        decimals,
        "measurements aggregated"
    );
    Ok(MeasurementSet {
        scale_mm_per_px: scale,
        decimals,
        measurements,
    })
}
