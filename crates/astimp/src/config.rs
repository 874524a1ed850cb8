//! Analysis configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON file only
//! needs the fields it overrides.

use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::geometry::{CircleRansacConfig, SampleMode};
use crate::radial::GradPolarity;
use crate::zone::GrowthContrast;

/// Plate locator parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlateConfig {
    /// Expected plate radius range in millimeters (used when a scale is known).
    pub radius_range_mm: [f64; 2],
    /// Plate radius range as a fraction of half the shorter image side
    /// (used when no scale is known before detection).
    pub relative_radius_range: [f64; 2],
    /// Images larger than this (pixels, longer side) are downsampled by an
    /// integer factor before the search.
    pub working_max_dim: u32,
    /// Gaussian blur sigma applied to the working image.
    pub blur_sigma: f32,
    /// Gradient magnitude threshold for voting (fraction of max gradient).
    pub grad_threshold: f32,
    /// Spacing of voting radii in working pixels.
    pub vote_radius_step: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
    /// Minimum accumulator value for a center candidate (fraction of max).
    pub min_vote_frac: f32,
    /// Number of top-scoring center candidates verified by the rim search.
    pub max_candidates: usize,
    /// Rays cast per candidate during the rim search.
    pub theta_samples: usize,
    /// Radial sample spacing of the rim search, in working pixels.
    pub radial_step_px: f32,
    /// Candidates whose rim theta-consistency is below this are rejected.
    pub min_confidence: f32,
    /// Relative accumulator score difference treated as a tie (larger radius wins).
    pub score_tie_tolerance: f32,
    /// Robust refit of the rim points.
    pub ransac: CircleRansacConfig,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            radius_range_mm: [40.0, 75.0],
            relative_radius_range: [0.5, 1.05],
            working_max_dim: 800,
            blur_sigma: 1.5,
            grad_threshold: 0.1,
            vote_radius_step: 2.0,
            accum_sigma: 2.0,
            min_vote_frac: 0.2,
            max_candidates: 8,
            theta_samples: 180,
            radial_step_px: 0.75,
            min_confidence: 0.5,
            score_tie_tolerance: 1e-3,
            ransac: CircleRansacConfig {
                max_iters: 300,
                inlier_threshold: 3.0,
                min_inliers: 12,
                seed: 7,
            },
        }
    }
}

/// Disk detector parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Expected disk radius range in millimeters (standard disks are 6 mm wide).
    pub radius_range_mm: [f64; 2],
    /// Plate radius range in millimeters assumed when deriving disk radii
    /// from an uncalibrated plate.
    pub assumed_plate_radius_mm: [f64; 2],
    /// Band inside the plate rim excluded from the disk search (millimeters).
    pub rim_margin_mm: f64,
    /// Rim margin as a fraction of the plate radius when no scale is known.
    pub relative_rim_margin: f64,
    /// Disk rim polarity seen walking outward from the disk center.
    pub polarity: GradPolarity,
    /// Gaussian blur sigma applied before voting and rim search.
    pub blur_sigma: f32,
    /// Gradient magnitude threshold for voting (fraction of max gradient).
    pub grad_threshold: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
    /// Minimum accumulator value for a candidate (fraction of max).
    pub min_vote_frac: f32,
    /// Cap on center candidates verified per plate.
    pub max_candidates: usize,
    /// Rays cast per candidate during the rim search.
    pub theta_samples: usize,
    /// Radial samples across the rim search window.
    pub radial_samples: usize,
    /// Minimum rim theta-consistency for a confirmed disk.
    pub min_confidence: f32,
    /// Minimum polarity-adjusted intensity difference between the disk body
    /// and its immediate surroundings.
    pub min_contrast: f32,
    /// Maximum number of disks reported.
    pub max_disks: usize,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            radius_range_mm: [2.5, 3.5],
            assumed_plate_radius_mm: [40.0, 75.0],
            rim_margin_mm: 3.0,
            relative_rim_margin: 0.05,
            polarity: GradPolarity::LightToDark,
            blur_sigma: 1.0,
            grad_threshold: 0.15,
            accum_sigma: 1.5,
            min_vote_frac: 0.15,
            max_candidates: 96,
            theta_samples: 64,
            radial_samples: 48,
            min_confidence: 0.6,
            min_contrast: 0.08,
            max_disks: 32,
        }
    }
}

/// Inhibition-zone analyzer parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Maximum search radius from the disk center in millimeters.
    pub max_search_radius_mm: f64,
    /// Maximum search radius as a fraction of the plate radius when no scale
    /// is known.
    pub relative_max_search_radius: f64,
    /// Number of rays cast around each disk.
    pub n_rays: usize,
    /// Spacing of intensity samples along each ray (pixels).
    pub radial_step_px: f64,
    /// Rays start this far outside the disk rim (pixels).
    pub disk_edge_guard_px: f64,
    /// Interpolation used when sampling along rays.
    pub sample_mode: SampleMode,
    /// Smoothed intensity at which clear agar turns into growth.
    pub threshold: f32,
    /// Margin above the threshold a sample must reach to count as growth.
    pub noise_floor: f32,
    /// Minimum length (pixels) of a growth run for a transition to count.
    pub sustain_px: f64,
    /// Whether growth is brighter or darker than the clear zone.
    pub growth_contrast: GrowthContrast,
    /// Relative dispersion (std/mean) of per-ray radii above which the zone
    /// is reported as uncertain.
    pub dispersion_threshold: f64,
    /// Below this fraction of crossing rays the zone is reported as overgrown.
    pub min_crossing_fraction: f64,
    /// At or above this fraction of clear rays no growth zone is reported.
    pub no_growth_fraction: f64,
    /// Robust circle fit on the crossing points.
    pub ransac: CircleRansacConfig,
    /// Analyze zones of different disks on the rayon pool.
    pub parallel: bool,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            max_search_radius_mm: 20.0,
            relative_max_search_radius: 0.45,
            n_rays: 72,
            radial_step_px: 0.5,
            disk_edge_guard_px: 1.5,
            sample_mode: SampleMode::Bilinear,
            threshold: 0.5,
            noise_floor: 0.05,
            sustain_px: 3.0,
            growth_contrast: GrowthContrast::Brighter,
            dispersion_threshold: 0.15,
            min_crossing_fraction: 0.5,
            no_growth_fraction: 0.9,
            ransac: CircleRansacConfig::default(),
            parallel: true,
        }
    }
}

/// Top-level analysis configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub plate: PlateConfig,
    pub disk: DiskConfig,
    pub zone: ZoneConfig,
    /// Scale (mm/px) used when the caller supplies no calibration.
    pub default_scale_mm_per_px: Option<f64>,
}

impl AnalysisConfig {
    /// Load a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and internal consistency.
    pub fn validate(&self) -> Result<()> {
        fn range(name: &str, r: [f64; 2]) -> Result<()> {
            if r[0] > 0.0 && r[1] > r[0] && r[1].is_finite() {
                Ok(())
            } else {
                Err(invalid(format!("{name} must satisfy 0 < min < max, got {r:?}")))
            }
        }
        fn fraction(name: &str, v: f64) -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(invalid(format!("{name} must be in [0, 1], got {v}")))
            }
        }
        fn positive(name: &str, v: f64) -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(invalid(format!("{name} must be positive, got {v}")))
            }
        }

        let p = &self.plate;
        range("plate.radius_range_mm", p.radius_range_mm)?;
        range("plate.relative_radius_range", p.relative_radius_range)?;
        if p.working_max_dim < 64 {
            return Err(invalid("plate.working_max_dim must be at least 64"));
        }
        positive("plate.vote_radius_step", p.vote_radius_step as f64)?;
        positive("plate.radial_step_px", p.radial_step_px as f64)?;
        fraction("plate.grad_threshold", p.grad_threshold as f64)?;
        fraction("plate.min_confidence", p.min_confidence as f64)?;
        if p.max_candidates == 0 || p.theta_samples < 8 {
            return Err(invalid("plate needs max_candidates >= 1 and theta_samples >= 8"));
        }

        let d = &self.disk;
        range("disk.radius_range_mm", d.radius_range_mm)?;
        range("disk.assumed_plate_radius_mm", d.assumed_plate_radius_mm)?;
        if !(d.rim_margin_mm >= 0.0) {
            return Err(invalid("disk.rim_margin_mm must be non-negative"));
        }
        fraction("disk.relative_rim_margin", d.relative_rim_margin)?;
        fraction("disk.grad_threshold", d.grad_threshold as f64)?;
        fraction("disk.min_confidence", d.min_confidence as f64)?;
        if d.theta_samples < 8 || d.radial_samples < 7 {
            return Err(invalid("disk needs theta_samples >= 8 and radial_samples >= 7"));
        }

        let z = &self.zone;
        positive("zone.max_search_radius_mm", z.max_search_radius_mm)?;
        positive("zone.relative_max_search_radius", z.relative_max_search_radius)?;
        positive("zone.radial_step_px", z.radial_step_px)?;
        positive("zone.sustain_px", z.sustain_px)?;
        positive("zone.dispersion_threshold", z.dispersion_threshold)?;
        fraction("zone.min_crossing_fraction", z.min_crossing_fraction)?;
        fraction("zone.no_growth_fraction", z.no_growth_fraction)?;
        if z.n_rays < 8 {
            return Err(invalid("zone.n_rays must be at least 8"));
        }
        if !(z.disk_edge_guard_px >= 0.0) || !(z.noise_floor >= 0.0) {
            return Err(invalid(
                "zone.disk_edge_guard_px and zone.noise_floor must be non-negative",
            ));
        }

        if let Some(scale) = self.default_scale_mm_per_px {
            positive("default_scale_mm_per_px", scale)?;
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"zone": {"n_rays": 36}, "default_scale_mm_per_px": 0.05}"#)
                .unwrap();
        assert_eq!(cfg.zone.n_rays, 36);
        assert_eq!(cfg.zone.threshold, ZoneConfig::default().threshold);
        assert_eq!(cfg.default_scale_mm_per_px, Some(0.05));
        assert_eq!(cfg.plate.working_max_dim, 800);
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        let mut cfg = AnalysisConfig::default();
        cfg.disk.radius_range_mm = [3.5, 2.5];
        assert!(matches!(cfg.validate(), Err(AnalysisError::InvalidConfig(_))));

        let mut cfg = AnalysisConfig::default();
        cfg.default_scale_mm_per_px = Some(0.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = AnalysisConfig::default();
        let text = serde_json::to_string_pretty(&cfg).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.zone.growth_contrast, cfg.zone.growth_contrast);
        assert_eq!(back.disk.polarity, cfg.disk.polarity);
    }
}
