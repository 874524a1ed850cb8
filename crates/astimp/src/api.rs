//! High-level analysis API.
//!
//! [`Analyzer`] wraps an [`AnalysisConfig`] and exposes every pipeline stage
//! as a method, so callers can run the whole pipeline or drive the stages
//! one at a time.

use std::path::Path;

use crate::calibration::Calibration;
use crate::config::AnalysisConfig;
use crate::disk::{self, Disk};
use crate::error::Result;
use crate::measure::{self, MeasurementSet};
use crate::pipeline::{self, AnalysisReport};
use crate::pixels::Image;
use crate::plate::{self, Plate};
use crate::zone::{self, Zone};

/// Primary analysis interface. Create once, analyze many images.
///
/// # Examples
///
/// ```no_run
/// use astimp::{Analyzer, Calibration, Image, Point};
///
/// let analyzer = Analyzer::default();
/// let image = Image::from_raw(640, 480, vec![0.0; 640 * 480]).unwrap();
/// let ruler = Calibration::ReferenceLength {
///     from: Point::new(12.0, 40.0),
///     to: Point::new(212.0, 40.0),
///     length_mm: 20.0,
/// };
/// match analyzer.analyze_image(&image, Some(&ruler)) {
///     Ok(set) => println!("{} measurements", set.len()),
///     Err(err) => eprintln!("analysis failed: {err}"),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    /// Create an analyzer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with a validated configuration.
    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load a JSON configuration file and create an analyzer.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            config: AnalysisConfig::from_json_file(path)?,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Mutable access for fine-tuning; not re-validated.
    pub fn config_mut(&mut self) -> &mut AnalysisConfig {
        &mut self.config
    }

    pub fn locate_plate(&self, image: &Image, calibration: Option<&Calibration>) -> Result<Plate> {
        plate::locate_plate(image, calibration, &self.config)
    }

    pub fn detect_disks(&self, image: &Image, plate: &Plate) -> Vec<Disk> {
        disk::detect_disks(image, plate, &self.config)
    }

    pub fn analyze_zone(&self, image: &Image, disk: &Disk, plate: &Plate) -> Zone {
        zone::analyze_zone(image, disk, plate, &self.config)
    }

    pub fn analyze_zones(&self, image: &Image, disks: &[Disk], plate: &Plate) -> Vec<Zone> {
        zone::analyze_zones(image, disks, plate, &self.config)
    }

    pub fn aggregate(&self, plate: &Plate, disks: &[Disk], zones: &[Zone]) -> Result<MeasurementSet> {
        measure::aggregate(plate, disks, zones)
    }

    pub fn analyze_image(
        &self,
        image: &Image,
        calibration: Option<&Calibration>,
    ) -> Result<MeasurementSet> {
        pipeline::analyze_image(image, calibration, &self.config)
    }

    pub fn analyze_image_report(
        &self,
        image: &Image,
        calibration: Option<&Calibration>,
    ) -> AnalysisReport {
        pipeline::analyze_image_report(image, calibration, &self.config)
    }
}
