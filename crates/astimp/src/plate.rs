//! Plate locator: finds the circular agar dish and fixes the pixel scale.
//!
//! The search runs on a downsampled, blurred working image:
//!
//! 1. gradient votes propose plate centers,
//! 2. each of the top candidates is verified by a radial rim search
//!    (confidence = fraction of rays agreeing on the rim radius),
//! 3. the best-voted confident candidate is refined by a robust circle fit
//!    of the per-ray rim points at full resolution.

use crate::calibration::Calibration;
use crate::config::{AnalysisConfig, PlateConfig};
use crate::error::{AnalysisError, Result};
use crate::geometry::{fit_circle_ransac, Circle, Point};
use crate::pixels::Image;
use crate::proposal::{find_proposals, VoteConfig};
use crate::radial::{estimate_edge_radius, AngularAggregator, EdgeEstimate, EdgeSearch, GradPolarity};

/// Located plate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Plate {
    /// Plate center in image pixels.
    pub center: Point,
    /// Plate radius in pixels.
    pub radius: f64,
    /// Millimeters per pixel; `0.0` when no calibration was available.
    pub scale_mm_per_px: f64,
    /// Fraction of rim rays agreeing on the radius, in `[0, 1]`.
    pub confidence: f32,
    /// Center-vote accumulator score of the selected candidate.
    pub vote_score: f32,
}

impl Plate {
    pub fn circle(&self) -> Circle {
        Circle::new(self.center, self.radius)
    }

    /// `true` when a positive finite scale is set.
    pub fn is_calibrated(&self) -> bool {
        self.scale_mm_per_px > 0.0 && self.scale_mm_per_px.is_finite()
    }

    pub fn scale(&self) -> Option<f64> {
        self.is_calibrated().then_some(self.scale_mm_per_px)
    }

    /// Same plate with a new scale.
    pub fn with_scale(mut self, scale_mm_per_px: f64) -> Self {
        self.scale_mm_per_px = scale_mm_per_px;
        self
    }

    pub fn px_to_mm(&self, px: f64) -> Option<f64> {
        self.scale().map(|s| px * s)
    }

    pub fn mm_to_px(&self, mm: f64) -> Option<f64> {
        self.scale().map(|s| mm / s)
    }
}

#[derive(Debug, Clone)]
struct RimCandidate {
    center: [f32; 2],
    vote_score: f32,
    edge: EdgeEstimate,
}

/// Scale known before detection: explicit calibration first, then the
/// configured default. A disk-derived calibration defers the scale.
pub(crate) fn direct_scale(
    calibration: Option<&Calibration>,
    config: &AnalysisConfig,
) -> Result<Option<f64>> {
    match calibration {
        Some(cal) => cal.direct_scale(),
        None => Ok(config.default_scale_mm_per_px),
    }
}

/// Expected plate radius range in full-resolution pixels.
fn radius_range_px(width: u32, height: u32, scale: Option<f64>, cfg: &PlateConfig) -> [f64; 2] {
    match scale {
        Some(s) => [cfg.radius_range_mm[0] / s, cfg.radius_range_mm[1] / s],
        None => {
            let half = 0.5 * width.min(height) as f64;
            [
                cfg.relative_radius_range[0] * half,
                cfg.relative_radius_range[1] * half,
            ]
        }
    }
}

/// Locate the plate boundary.
///
/// Fails with [`AnalysisError::PlateNotFound`] when no candidate passes the
/// rim confidence gate, and propagates [`AnalysisError::DegenerateGeometry`]
/// from the final rim fit.
pub fn locate_plate(
    image: &Image,
    calibration: Option<&Calibration>,
    config: &AnalysisConfig,
) -> Result<Plate> {
    let cfg = &config.plate;
    let (w, h) = image.dimensions();
    if w.min(h) < 16 {
        return Err(AnalysisError::plate_not_found("image_too_small"));
    }
    let scale = direct_scale(calibration, config)?;
    let [r_lo, r_hi] = radius_range_px(w, h, scale, cfg);

    let factor = w.max(h).div_ceil(cfg.working_max_dim.max(1)).max(1);
    let f = factor as f64;
    let work = image.downsample(factor).gaussian_blur(cfg.blur_sigma);
    let lo_w = (r_lo / f).max(4.0) as f32;
    let hi_w = (r_hi / f) as f32;
    if !(hi_w > lo_w) {
        return Err(AnalysisError::plate_not_found("radius_range_empty"));
    }
    tracing::debug!(
        factor,
        r_lo_px = r_lo,
        r_hi_px = r_hi,
        calibrated = scale.is_some(),
        "plate search"
    );

    let mut proposals = find_proposals(
        &work,
        &VoteConfig {
            r_min: lo_w,
            r_max: hi_w,
            r_step: cfg.vote_radius_step,
            grad_threshold: cfg.grad_threshold,
            nms_radius: (0.25 * lo_w).max(3.0),
            min_vote_frac: cfg.min_vote_frac,
            accum_sigma: cfg.accum_sigma,
            max_candidates: Some(cfg.max_candidates),
            roi: None,
        },
    );
    if proposals.is_empty() {
        return Err(AnalysisError::plate_not_found("no_center_votes"));
    }
    proposals.sort_by(|a, b| b.score.total_cmp(&a.score));
    tracing::debug!("{} plate center candidates", proposals.len());

    let search = EdgeSearch {
        window: [lo_w, hi_w],
        radial_samples: (((hi_w - lo_w) / cfg.radial_step_px).ceil() as usize + 1).clamp(7, 4096),
        theta_samples: cfg.theta_samples,
        polarity: GradPolarity::Auto,
        aggregator: AngularAggregator::Median,
        min_theta_coverage: 0.0,
        clamp_to_image: true,
        refine_halfwidth_px: (0.03 * hi_w).max(2.0),
    };

    let mut candidates = Vec::new();
    for p in &proposals {
        let Some(edge) = estimate_edge_radius(&work, [p.x, p.y], &search) else {
            tracing::trace!(x = p.x, y = p.y, "plate candidate without rim");
            continue;
        };
        if edge.theta_consistency < cfg.min_confidence {
            tracing::trace!(
                x = p.x,
                y = p.y,
                consistency = edge.theta_consistency,
                "plate candidate rejected"
            );
            continue;
        }
        candidates.push(RimCandidate {
            center: [p.x, p.y],
            vote_score: p.score,
            edge,
        });
    }

    let best = select_candidate(&candidates, cfg.score_tie_tolerance)
        .ok_or_else(|| AnalysisError::plate_not_found("no_confident_rim"))?;

    let to_full = |v: f64| v * f + 0.5 * (f - 1.0);
    let coarse = Circle::new(
        Point::new(to_full(best.center[0] as f64), to_full(best.center[1] as f64)),
        best.edge.radius as f64 * f,
    );
    let rim_points: Vec<Point> = best
        .edge
        .edge_points
        .iter()
        .map(|p| Point::new(to_full(p.x), to_full(p.y)))
        .collect();

    let mut ransac = cfg.ransac.clone();
    ransac.inlier_threshold *= f;
    let fit = fit_circle_ransac(&rim_points, &ransac)?;
    let circle = if (fit.circle.radius - coarse.radius).abs() <= 0.1 * coarse.radius
        && fit.circle.center.distance(coarse.center) <= 0.1 * coarse.radius
    {
        fit.circle
    } else {
        tracing::debug!(
            fit_radius = fit.circle.radius,
            coarse_radius = coarse.radius,
            "rim refit drifted, keeping coarse circle"
        );
        coarse
    };

    let plate = Plate {
        center: circle.center,
        radius: circle.radius,
        scale_mm_per_px: scale.unwrap_or(0.0),
        confidence: best.edge.theta_consistency,
        vote_score: best.vote_score,
    };
    tracing::info!(
        cx = plate.center.x,
        cy = plate.center.y,
        radius = plate.radius,
        confidence = plate.confidence,
        "plate located"
    );
    Ok(plate)
}

/// Highest vote score wins; scores within `tie_tolerance` (relative) are
/// resolved in favor of the larger radius.
fn select_candidate(candidates: &[RimCandidate], tie_tolerance: f32) -> Option<&RimCandidate> {
    let max_score = candidates
        .iter()
        .map(|c| c.vote_score)
        .max_by(f32::total_cmp)?;
    let floor = max_score - tie_tolerance.max(0.0) * max_score.abs();
    candidates
        .iter()
        .filter(|c| c.vote_score >= floor)
        .max_by(|a, b| a.edge.radius.total_cmp(&b.edge.radius))
}
