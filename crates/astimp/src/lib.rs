//! astimp: antibiotic susceptibility measurement from disk-diffusion plates.
//!
//! Given a photograph of an agar plate, the engine measures the growth
//! inhibition zone around every antibiotic disk. The pipeline stages are:
//!
//! 1. **Plate**: gradient votes and a radial rim search locate the dish and
//!    fix the pixel-to-millimeter scale.
//! 2. **Disks**: small circular high-contrast blobs inside the plate,
//!    excluding the rim band.
//! 3. **Zones**: rays cast outward from each disk find the first sustained
//!    transition from clear agar to bacterial lawn; the transitions are fitted
//!    with a circle or kept as an irregular contour, with a quality flag.
//! 4. **Measurements**: calibrated zone diameters per disk, rounded to the
//!    resolution of the scale.
//!
//! Every stage is deterministic: the same pixels and configuration always
//! produce the same measurements.
//!
//! # Public API
//! - [`Analyzer`] as the primary entry point
//! - stage functions [`locate_plate`], [`detect_disks`], [`analyze_zone`],
//!   [`aggregate`] and [`analyze_image`]
//! - [`AnalysisConfig`] for tuning
//! - [`Image`] for pixel ingestion (8/16-bit gray, RGB, any decoded image)

mod api;
mod calibration;
mod config;
mod disk;
mod error;
mod geometry;
mod measure;
mod pipeline;
mod pixels;
mod plate;
mod proposal;
mod radial;
mod zone;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Analyzer;
pub use calibration::Calibration;
pub use config::{AnalysisConfig, DiskConfig, PlateConfig, ZoneConfig};
pub use disk::{detect_disks, Disk};
pub use error::{AnalysisError, Result};
pub use geometry::{
    fit_circle, fit_circle_ransac, ray_angles, ray_directions, rms_radial_residual, sample_ray,
    Circle, CircleRansacConfig, CircleRansacResult, Point, SampleMode,
};
pub use measure::{aggregate, precision_decimals, Measurement, MeasurementSet};
pub use pipeline::{analyze_image, analyze_image_report, AnalysisReport, ReportFailure};
pub use pixels::{Gradients, Image, LumaF32Image};
pub use plate::{locate_plate, Plate};
pub use radial::{AngularAggregator, GradPolarity};
pub use zone::{
    analyze_zone, analyze_zones, BoundaryShape, GrowthContrast, QualityFlag, RadialProfile,
    RayCounts, Zone,
};
