//! Inhibition zone analyzer.
//!
//! Rays are cast from each disk center, starting just outside the disk rim
//! and ending at the search radius (capped inside the plate rim). Every ray
//! is classified by [`transition`]; the per-ray transitions are then turned
//! into one zone boundary with a quality flag. Analysis never fails: a
//! degraded zone is still reported, flagged accordingly.

mod transition;

pub use transition::{GrowthContrast, RadialProfile};

use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::disk::{rim_margin_px, Disk};
use crate::geometry::{fit_circle_ransac, ray_angles, Circle, Point};
use crate::pixels::Image;
use crate::plate::Plate;
use transition::{detect_transition, RayOutcome, TransitionRule};

/// Confidence of a zone measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Circular boundary with consistent per-ray radii.
    Good,
    /// Boundary located, but irregular or only partially observed.
    Uncertain,
    /// No growth inside the search radius (total inhibition).
    NoGrowthZoneDetected,
    /// Growth too patchy or confluent to localize a boundary.
    Overgrown,
}

/// Geometry of the zone boundary.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryShape {
    Circle { circle: Circle },
    /// Per-ray transition points, in ray order.
    IrregularContour { points: Vec<Point> },
}

/// Per-outcome ray counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RayCounts {
    pub total: usize,
    pub crossings: usize,
    pub clear: usize,
    pub ambiguous: usize,
    pub out_of_bounds: usize,
}

impl RayCounts {
    /// Rays that stayed inside the image or found a transition.
    pub fn valid(&self) -> usize {
        self.crossings + self.clear + self.ambiguous
    }
}

/// Inhibition zone around one disk.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Zone {
    /// Id of the disk this zone belongs to.
    pub disk_id: usize,
    /// Boundary radius in pixels, measured from the disk center.
    pub boundary_radius_px: f64,
    /// Boundary radius in millimeters; `None` on an uncalibrated plate.
    pub boundary_radius_mm: Option<f64>,
    pub boundary_shape: BoundaryShape,
    pub quality: QualityFlag,
    /// Effective search radius (pixels) after capping at the plate rim.
    pub search_radius_px: f64,
    pub rays: RayCounts,
    /// Relative dispersion (std / mean) of the per-ray radii.
    pub dispersion: f64,
}

/// One ray's sustained transition.
#[derive(Debug, Clone, Copy)]
struct RayHit {
    point: Point,
    radius: f64,
    at_disk_edge: bool,
}

/// Search radius in pixels: the configured maximum, capped so rays stay
/// inside the plate rim band, and never below the disk radius.
pub(crate) fn max_search_radius_px(disk: &Disk, plate: &Plate, config: &AnalysisConfig) -> f64 {
    let cfg = &config.zone;
    let configured = plate
        .mm_to_px(cfg.max_search_radius_mm)
        .unwrap_or(cfg.relative_max_search_radius * plate.radius);
    let cap = plate.radius - rim_margin_px(plate, &config.disk) - disk.center.distance(plate.center);
    configured.min(cap).max(disk.radius)
}

/// Analyze the zone around one disk.
pub fn analyze_zone(image: &Image, disk: &Disk, plate: &Plate, config: &AnalysisConfig) -> Zone {
    let cfg = &config.zone;
    let r_max = max_search_radius_px(disk, plate, config);
    let r_start = disk.radius + cfg.disk_edge_guard_px;
    let step = cfg.radial_step_px;
    let rule = TransitionRule {
        threshold: cfg.threshold,
        noise_floor: cfg.noise_floor,
        sustain_samples: (cfg.sustain_px / step).ceil().max(1.0) as usize,
        contrast: cfg.growth_contrast,
    };

    let mut rays = RayCounts {
        total: cfg.n_rays,
        ..RayCounts::default()
    };
    let mut crossings: Vec<RayHit> = Vec::new();
    let mut tentative: Vec<f64> = Vec::new();
    if r_max >= r_start + step {
        for angle in ray_angles(cfg.n_rays) {
            let profile =
                RadialProfile::sample(image, disk.center, angle, r_start, r_max, step, cfg.sample_mode);
            match detect_transition(&profile, &rule, disk.radius) {
                RayOutcome::Crossing {
                    radius,
                    at_disk_edge,
                } => {
                    rays.crossings += 1;
                    crossings.push(RayHit {
                        point: disk.circle().point_at(angle, radius),
                        radius,
                        at_disk_edge,
                    });
                }
                RayOutcome::Clear => {
                    rays.clear += 1;
                    tentative.push(r_max);
                }
                RayOutcome::Ambiguous {
                    first_growth_radius,
                } => {
                    rays.ambiguous += 1;
                    tentative.push(first_growth_radius);
                }
                RayOutcome::OutOfBounds => rays.out_of_bounds += 1,
            }
        }
    } else {
        rays.out_of_bounds = cfg.n_rays;
    }

    let mut zone = Zone {
        disk_id: disk.id,
        boundary_radius_px: disk.radius,
        boundary_radius_mm: None,
        boundary_shape: BoundaryShape::IrregularContour { points: Vec::new() },
        quality: QualityFlag::Uncertain,
        search_radius_px: r_max,
        rays,
        dispersion: 0.0,
    };
    resolve_boundary(&mut zone, disk, r_max, &crossings, &tentative, config);
    zone.boundary_radius_mm = plate.px_to_mm(zone.boundary_radius_px);

    tracing::debug!(
        disk_id = zone.disk_id,
        quality = ?zone.quality,
        radius_px = zone.boundary_radius_px,
        crossings = rays.crossings,
        clear = rays.clear,
        ambiguous = rays.ambiguous,
        out_of_bounds = rays.out_of_bounds,
        "zone analyzed"
    );
    zone
}

fn resolve_boundary(
    zone: &mut Zone,
    disk: &Disk,
    r_max: f64,
    crossings: &[RayHit],
    tentative: &[f64],
    config: &AnalysisConfig,
) {
    let cfg = &config.zone;
    let valid = zone.rays.valid();
    if valid == 0 {
        tracing::trace!(disk_id = disk.id, "no usable rays");
        return;
    }

    let points: Vec<Point> = crossings.iter().map(|c| c.point).collect();
    let clear_frac = zone.rays.clear as f64 / valid as f64;
    if zone.rays.crossings + zone.rays.ambiguous == 0 || clear_frac >= cfg.no_growth_fraction {
        zone.quality = QualityFlag::NoGrowthZoneDetected;
        zone.boundary_radius_px = r_max;
        zone.boundary_shape = BoundaryShape::Circle {
            circle: Circle::new(disk.center, r_max),
        };
        return;
    }

    let crossing_frac = zone.rays.crossings as f64 / valid as f64;
    if crossing_frac < cfg.min_crossing_fraction {
        set_overgrown(zone, crossings, tentative, points);
        return;
    }

    // Clear rays count at the search radius.
    let radii: Vec<f64> = crossings
        .iter()
        .map(|c| c.radius)
        .chain(std::iter::repeat(r_max).take(zone.rays.clear))
        .collect();
    zone.dispersion = relative_dispersion(&radii);
    if zone.dispersion > cfg.dispersion_threshold {
        zone.quality = QualityFlag::Uncertain;
        zone.boundary_radius_px = median(&radii);
        zone.boundary_shape = BoundaryShape::IrregularContour { points };
        return;
    }

    if crossings.iter().all(|c| c.at_disk_edge) {
        zone.quality = QualityFlag::Good;
        zone.boundary_radius_px = disk.radius;
        zone.boundary_shape = BoundaryShape::Circle {
            circle: disk.circle(),
        };
        return;
    }

    match fit_circle_ransac(&points, &cfg.ransac) {
        Ok(fit) => {
            let offset = fit.circle.center.distance(disk.center);
            if 2 * fit.num_inliers < points.len() || offset > disk.radius {
                tracing::trace!(
                    disk_id = disk.id,
                    inliers = fit.num_inliers,
                    offset,
                    "zone fit not concentric"
                );
                zone.quality = QualityFlag::Uncertain;
                zone.boundary_radius_px = median(&radii);
                zone.boundary_shape = BoundaryShape::IrregularContour { points };
            } else {
                zone.quality = QualityFlag::Good;
                zone.boundary_radius_px = fit.circle.radius;
                zone.boundary_shape = BoundaryShape::Circle { circle: fit.circle };
            }
        }
        Err(err) => {
            tracing::trace!(disk_id = disk.id, %err, "zone fit failed");
            set_overgrown(zone, crossings, tentative, points);
        }
    }
}

/// Best-effort mean over every ray that produced a radius.
fn set_overgrown(
    zone: &mut Zone,
    crossings: &[RayHit],
    tentative: &[f64],
    points: Vec<Point>,
) {
    let all: Vec<f64> = crossings
        .iter()
        .map(|c| c.radius)
        .chain(tentative.iter().copied())
        .collect();
    zone.quality = QualityFlag::Overgrown;
    if !all.is_empty() {
        zone.boundary_radius_px = all.iter().sum::<f64>() / all.len() as f64;
        zone.dispersion = relative_dispersion(&all);
    }
    zone.boundary_shape = BoundaryShape::IrregularContour { points };
}

fn relative_dispersion(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() / mean
}

fn median(values: &[f64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    match v.len() {
        0 => 0.0,
        n if n % 2 == 1 => v[n / 2],
        n => 0.5 * (v[n / 2 - 1] + v[n / 2]),
    }
}

/// Analyze every disk, one zone per disk, ordered by disk id.
///
/// Disks are independent; with `zone.parallel` they run on the rayon pool.
pub fn analyze_zones(
    image: &Image,
    disks: &[Disk],
    plate: &Plate,
    config: &AnalysisConfig,
) -> Vec<Zone> {
    let mut zones: Vec<Zone> = if config.zone.parallel {
        disks
            .par_iter()
            .map(|d| analyze_zone(image, d, plate, config))
            .collect()
    } else {
        disks
            .iter()
            .map(|d| analyze_zone(image, d, plate, config))
            .collect()
    };
    zones.sort_by_key(|z| z.disk_id);
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::PlateScene;

    fn plate(scale: f64) -> Plate {
        Plate {
            center: Point::new(250.0, 250.0),
            radius: 200.0,
            scale_mm_per_px: scale,
            confidence: 1.0,
            vote_score: 1.0,
        }
    }

    fn disk(id: usize, x: f64, y: f64) -> Disk {
        Disk {
            id,
            center: Point::new(x, y),
            radius: 15.0,
            confidence: 1.0,
        }
    }

    fn config() -> AnalysisConfig {
        let mut cfg = AnalysisConfig::default();
        cfg.zone.max_search_radius_mm = 10.0;
        cfg
    }

    #[test]
    fn sharp_zone_edge_gives_good_circle() {
        let img = PlateScene::new(500, 500, [250.0, 250.0], 200.0)
            .disk([250.0, 250.0], 15.0, 60.0)
            .render();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::Good, "{zone:?}");
        assert!((zone.boundary_radius_px - 60.5).abs() < 0.75, "{zone:?}");
        let mm = zone.boundary_radius_mm.unwrap();
        assert!((mm - 6.05).abs() < 0.075);
        assert!(matches!(zone.boundary_shape, BoundaryShape::Circle { .. }));
        assert_eq!(zone.rays.crossings, 72);
    }

    #[test]
    fn faint_clear_zone_is_not_mistaken_for_growth() {
        // Clear agar just above the cutoff but below the growth level.
        let mut scene = PlateScene::new(500, 500, [250.0, 250.0], 200.0);
        scene.clear = 0.52;
        let img = scene.disk([250.0, 250.0], 15.0, 60.0).render();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::Good, "{zone:?}");
        assert!((zone.boundary_radius_px - 60.0).abs() < 2.0, "{zone:?}");
        assert_eq!(zone.rays.crossings, 72);
    }

    #[test]
    fn uniform_clear_agar_is_total_inhibition() {
        let mut plate_img = PlateScene::new(500, 500, [250.0, 250.0], 200.0);
        plate_img.lawn = plate_img.clear;
        let img = plate_img.disk([250.0, 250.0], 15.0, 15.0).render();
        let zone = analyze_zone(&img, &disk(3, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::NoGrowthZoneDetected);
        assert_eq!(zone.disk_id, 3);
        assert!((zone.boundary_radius_mm.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn growth_at_the_disk_edge_is_zero_inhibition() {
        let img = PlateScene::new(500, 500, [250.0, 250.0], 200.0)
            .disk([250.0, 250.0], 15.0, 15.0)
            .render();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::Good);
        assert_eq!(zone.boundary_radius_px, 15.0);
        assert!((zone.boundary_radius_mm.unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn search_radius_is_capped_inside_the_plate() {
        let d = disk(0, 250.0, 120.0);
        let cfg = config();
        // 200 - 30 (rim margin) - 130 (offset) = 40 px < 100 px configured.
        assert!((max_search_radius_px(&d, &plate(0.1), &cfg) - 40.0).abs() < 1e-9);
        let far = disk(1, 250.0, 70.0);
        assert_eq!(max_search_radius_px(&far, &plate(0.1), &cfg), 15.0);
    }

    #[test]
    fn elliptic_zone_is_uncertain() {
        let mut data = Vec::with_capacity(500 * 500);
        for y in 0..500 {
            for x in 0..500 {
                let dx = (x as f64 - 250.0) / 70.0;
                let dy = (y as f64 - 250.0) / 30.0;
                let r = ((x as f64 - 250.0).powi(2) + (y as f64 - 250.0).powi(2)).sqrt();
                let v = if r <= 15.0 {
                    0.95
                } else if dx * dx + dy * dy <= 1.0 {
                    0.25
                } else {
                    0.7
                };
                data.push(v);
            }
        }
        let img = Image::from_raw(500, 500, data).unwrap();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::Uncertain, "{zone:?}");
        assert!(zone.dispersion > 0.15);
        assert!(matches!(zone.boundary_shape, BoundaryShape::IrregularContour { .. }));
    }

    #[test]
    fn patchy_growth_is_overgrown() {
        // Isolated single-pixel colonies on clear agar: no sustained run.
        let mut data = Vec::with_capacity(500 * 500);
        for y in 0..500 {
            for x in 0..500 {
                let dx = x as f64 - 250.0;
                let dy = y as f64 - 250.0;
                let r = (dx * dx + dy * dy).sqrt();
                let v = if r <= 15.0 {
                    0.95
                } else if x % 3 == 0 && y % 3 == 0 {
                    0.9
                } else {
                    0.25
                };
                data.push(v);
            }
        }
        let img = Image::from_raw(500, 500, data).unwrap();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.1), &config());
        assert_eq!(zone.quality, QualityFlag::Overgrown, "{zone:?}");
        assert!(zone.boundary_radius_px > 15.0);
    }

    #[test]
    fn uncalibrated_zone_has_no_millimeters() {
        let img = PlateScene::new(500, 500, [250.0, 250.0], 200.0)
            .disk([250.0, 250.0], 15.0, 60.0)
            .render();
        let zone = analyze_zone(&img, &disk(0, 250.0, 250.0), &plate(0.0), &config());
        assert!(zone.boundary_radius_mm.is_none());
        assert!((zone.boundary_radius_px - 60.5).abs() < 0.75);
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let img = PlateScene::new(500, 500, [250.0, 250.0], 200.0)
            .disk([180.0, 180.0], 15.0, 40.0)
            .disk([320.0, 180.0], 15.0, 30.0)
            .disk([250.0, 320.0], 15.0, 50.0)
            .render();
        let disks = [
            disk(0, 180.0, 180.0),
            disk(1, 320.0, 180.0),
            disk(2, 250.0, 320.0),
        ];
        let mut cfg = config();
        cfg.zone.parallel = true;
        let par = analyze_zones(&img, &disks, &plate(0.1), &cfg);
        cfg.zone.parallel = false;
        let ser = analyze_zones(&img, &disks, &plate(0.1), &cfg);
        assert_eq!(par, ser);
        assert_eq!(par.iter().map(|z| z.disk_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(par.iter().all(|z| z.quality == QualityFlag::Good));
    }
}
