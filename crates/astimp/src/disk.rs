//! Disk detector: finds the antibiotic disks inside a located plate.
//!
//! Candidates come from gradient votes restricted to the plate interior (the
//! rim band is excluded). Each candidate is confirmed by a radial rim search
//! of the expected polarity and a body-versus-surroundings contrast check,
//! then overlapping detections are suppressed.

use crate::config::{AnalysisConfig, DiskConfig};
use crate::geometry::{fit_circle, Circle, Point};
use crate::pixels::Image;
use crate::plate::Plate;
use crate::proposal::{find_proposals, VoteConfig};
use crate::radial::{estimate_edge_radius, AngularAggregator, EdgeSearch, GradPolarity};

/// A confirmed antibiotic disk.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Disk {
    /// Index in detection order, unique within one plate.
    pub id: usize,
    /// Center in image pixels.
    pub center: Point,
    /// Radius in pixels.
    pub radius: f64,
    /// Fraction of rim rays agreeing on the radius, in `[0, 1]`.
    pub confidence: f32,
}

impl Disk {
    pub fn circle(&self) -> Circle {
        Circle::new(self.center, self.radius)
    }
}

/// Confirmed candidate before id assignment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DiskCandidate {
    pub center: Point,
    pub radius: f64,
    pub confidence: f32,
}

/// Width of the excluded band inside the plate rim, in pixels.
pub(crate) fn rim_margin_px(plate: &Plate, cfg: &DiskConfig) -> f64 {
    match plate.mm_to_px(cfg.rim_margin_mm) {
        Some(px) => px,
        None => cfg.relative_rim_margin * plate.radius,
    }
}

/// Expected disk radius range in pixels.
pub(crate) fn radius_range_px(plate: &Plate, cfg: &DiskConfig) -> [f64; 2] {
    match (plate.mm_to_px(cfg.radius_range_mm[0]), plate.mm_to_px(cfg.radius_range_mm[1])) {
        (Some(lo), Some(hi)) => [lo, hi],
        _ => {
            // Disk-to-plate size ratio from the physical ranges.
            let lo = cfg.radius_range_mm[0] / cfg.assumed_plate_radius_mm[1];
            let hi = cfg.radius_range_mm[1] / cfg.assumed_plate_radius_mm[0];
            [lo * plate.radius, hi * plate.radius]
        }
    }
}

/// Detect disks inside `plate`.
///
/// Returns disks in detection (raster scan) order with ids `0..n`. A plate
/// without disks yields an empty list.
pub fn detect_disks(image: &Image, plate: &Plate, config: &AnalysisConfig) -> Vec<Disk> {
    let cfg = &config.disk;
    let roi_radius = plate.radius - rim_margin_px(plate, cfg);
    let [r_lo, r_hi] = radius_range_px(plate, cfg);
    if !(roi_radius > r_lo) || !(r_hi > r_lo) || !(r_lo > 1.0) {
        tracing::debug!(roi_radius, r_lo, r_hi, "disk search region is empty");
        return Vec::new();
    }

    // Crop to the ROI bounding box plus room for the rim search.
    let pad = (r_hi * 1.5).ceil() + 2.0;
    let (w, h) = image.dimensions();
    let x0 = (plate.center.x - roi_radius - pad).floor().clamp(0.0, w as f64) as u32;
    let y0 = (plate.center.y - roi_radius - pad).floor().clamp(0.0, h as f64) as u32;
    let x1 = (plate.center.x + roi_radius + pad).ceil().clamp(0.0, w as f64) as u32;
    let y1 = (plate.center.y + roi_radius + pad).ceil().clamp(0.0, h as f64) as u32;
    if x1 <= x0 + 4 || y1 <= y0 + 4 {
        return Vec::new();
    }
    let raw = image.crop(x0, y0, x1 - x0, y1 - y0);
    let work = raw.gaussian_blur(cfg.blur_sigma);
    let offset = Point::new(x0 as f64, y0 as f64);
    let roi = Circle::new(
        Point::new(plate.center.x - offset.x, plate.center.y - offset.y),
        roi_radius,
    );

    let proposals = find_proposals(
        &work,
        &VoteConfig {
            r_min: r_lo as f32,
            r_max: r_hi as f32,
            r_step: 1.0,
            grad_threshold: cfg.grad_threshold,
            nms_radius: (0.8 * r_lo as f32).max(2.0),
            min_vote_frac: cfg.min_vote_frac,
            accum_sigma: cfg.accum_sigma,
            max_candidates: Some(cfg.max_candidates),
            roi: Some(roi),
        },
    );
    tracing::debug!("{} disk proposals", proposals.len());

    let search = EdgeSearch {
        window: [(0.7 * r_lo) as f32, (1.3 * r_hi) as f32],
        radial_samples: cfg.radial_samples,
        theta_samples: cfg.theta_samples,
        polarity: cfg.polarity,
        aggregator: AngularAggregator::Median,
        min_theta_coverage: 0.9,
        clamp_to_image: false,
        refine_halfwidth_px: (0.15 * r_hi as f32).max(1.5),
    };

    let mut candidates = Vec::new();
    for p in &proposals {
        if !roi.contains(Point::new(p.x as f64, p.y as f64)) {
            continue;
        }
        let Some(edge) = estimate_edge_radius(&work, [p.x, p.y], &search) else {
            tracing::trace!(x = p.x, y = p.y, "disk proposal without rim");
            continue;
        };
        let radius = edge.radius as f64;
        if radius < 0.85 * r_lo || radius > 1.15 * r_hi || edge.theta_consistency < cfg.min_confidence {
            tracing::trace!(
                x = p.x,
                y = p.y,
                radius,
                consistency = edge.theta_consistency,
                "disk proposal rejected by rim gate"
            );
            continue;
        }

        let coarse = Circle::new(Point::new(p.x as f64, p.y as f64), radius);
        let circle = match fit_circle(&edge.edge_points) {
            Ok(c) if c.center.distance(coarse.center) <= 0.5 * radius
                && (c.radius - radius).abs() <= 0.25 * radius =>
            {
                c
            }
            _ => coarse,
        };

        let contrast = rim_contrast(&raw, &circle, cfg.polarity);
        if contrast < cfg.min_contrast {
            tracing::trace!(x = p.x, y = p.y, contrast, "disk proposal rejected by contrast");
            continue;
        }

        candidates.push(DiskCandidate {
            center: Point::new(circle.center.x + offset.x, circle.center.y + offset.y),
            radius: circle.radius,
            confidence: edge.theta_consistency,
        });
    }

    let mut kept = suppress_duplicates(&candidates);
    if kept.len() > cfg.max_disks {
        let mut order: Vec<usize> = (0..kept.len()).collect();
        order.sort_by(|&a, &b| kept[b].confidence.total_cmp(&kept[a].confidence).then(a.cmp(&b)));
        order.truncate(cfg.max_disks);
        order.sort_unstable();
        kept = order.into_iter().map(|i| kept[i]).collect();
    }

    let disks: Vec<Disk> = kept
        .into_iter()
        .enumerate()
        .map(|(id, c)| Disk {
            id,
            center: c.center,
            radius: c.radius,
            confidence: c.confidence,
        })
        .collect();
    tracing::info!("{} disks detected", disks.len());
    disks
}

/// Polarity-adjusted mean intensity difference between the disk body
/// (inside 0.6 r) and a thin annulus just outside the rim (1.3 r to 1.6 r).
fn rim_contrast(image: &Image, circle: &Circle, polarity: GradPolarity) -> f32 {
    let ring_mean = |r_frac: &[f64]| -> Option<f32> {
        let mut sum = 0.0f32;
        let mut n = 0usize;
        for &f in r_frac {
            for p in circle.sample_points(32) {
                let dx = p.x - circle.center.x;
                let dy = p.y - circle.center.y;
                let x = circle.center.x + dx * f;
                let y = circle.center.y + dy * f;
                if let Some(v) = image.bilinear(x as f32, y as f32) {
                    sum += v;
                    n += 1;
                }
            }
        }
        (n > 0).then(|| sum / n as f32)
    };
    let (Some(inside), Some(outside)) = (ring_mean(&[0.2, 0.4, 0.6]), ring_mean(&[1.3, 1.45, 1.6]))
    else {
        return 0.0;
    };
    match polarity {
        GradPolarity::LightToDark => inside - outside,
        GradPolarity::DarkToLight => outside - inside,
        GradPolarity::Auto => (inside - outside).abs(),
    }
}

/// Resolve overlapping candidates.
///
/// Two candidates overlap when their centers are closer than the larger of
/// their radii. The higher-confidence one survives; on equal confidence the
/// earlier candidate wins. Survivors keep their input order.
pub(crate) fn suppress_duplicates(candidates: &[DiskCandidate]) -> Vec<DiskCandidate> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .confidence
            .total_cmp(&candidates[a].confidence)
            .then(a.cmp(&b))
    });

    let mut kept_idx: Vec<usize> = Vec::with_capacity(candidates.len());
    for i in order {
        let c = &candidates[i];
        let overlaps = kept_idx.iter().any(|&k| {
            let o = &candidates[k];
            c.center.distance(o.center) < c.radius.max(o.radius)
        });
        if !overlaps {
            kept_idx.push(i);
        }
    }
    kept_idx.sort_unstable();
    kept_idx.into_iter().map(|i| candidates[i]).collect()
}
