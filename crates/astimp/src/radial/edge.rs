//! Circular edge estimation around a center prior.
//!
//! Used for the plate rim (coarse image, border clamped) and for disk rims
//! (plate crop, strict bounds).

use super::sweep::{RadiusGrid, RaySweep};
use super::{local_maxima, AngularAggregator, GradPolarity, Polarity};
use crate::geometry::Point;
use crate::pixels::Image;

/// Search parameters for one edge estimate.
#[derive(Debug, Clone)]
pub(crate) struct EdgeSearch {
    /// Radial window `[min, max]` in pixels.
    pub window: [f32; 2],
    pub radial_samples: usize,
    pub theta_samples: usize,
    pub polarity: GradPolarity,
    pub aggregator: AngularAggregator,
    /// Minimum fraction of rays that must stay inside the image.
    pub min_theta_coverage: f32,
    /// Replicate border pixels instead of dropping rays that leave the image.
    pub clamp_to_image: bool,
    /// Half-width (pixels) of the per-ray refinement window around the
    /// selected radius.
    pub refine_halfwidth_px: f32,
}

/// Selected circular edge.
#[derive(Debug, Clone)]
pub(crate) struct EdgeEstimate {
    pub radius: f32,
    pub polarity: Polarity,
    /// Aggregated derivative response at `radius`, sign-adjusted.
    pub peak_strength: f32,
    /// Fraction of rays whose own peak agrees with `radius`.
    pub theta_consistency: f32,
    pub coverage: f32,
    /// Per-ray sub-sample edge points near `radius`, in image coordinates.
    pub edge_points: Vec<Point>,
}

/// Estimate the dominant circular edge around `center` inside `search.window`.
///
/// Candidates are interior maxima of the aggregated response, ranked by
/// strength × ray agreement. `None` when the window is empty, too few rays
/// stay in bounds, or no edge of the requested polarity responds.
pub(crate) fn estimate_edge_radius(
    image: &Image,
    center: [f32; 2],
    search: &EdgeSearch,
) -> Option<EdgeEstimate> {
    let grid = RadiusGrid::spanning(search.window, search.radial_samples.max(7))?;
    let sweep = RaySweep::run(
        image,
        center,
        grid,
        search.theta_samples.max(8),
        search.clamp_to_image,
    );
    let coverage = sweep.coverage();
    if sweep.rays.is_empty() || coverage < search.min_theta_coverage {
        return None;
    }

    let response = sweep.response(&search.aggregator);
    let mut best: Option<(EdgeEstimate, f32)> = None;
    for &pol in search.polarity.candidates() {
        let score: Vec<f32> = response.iter().map(|&d| pol.score(d)).collect();
        // Strongest interior maximum; the smaller radius wins ties.
        let Some(pi) = local_maxima(&score)
            .into_iter()
            .max_by(|&a, &b| score[a].total_cmp(&score[b]).then(b.cmp(&a)))
        else {
            continue;
        };
        if !(score[pi] > 0.0) {
            continue;
        }

        let radius = sweep.grid.radii[pi];
        let tolerance = (4.0 * sweep.grid.step).max(0.02 * radius).max(0.75);
        let consistency = sweep.agreement(pol, radius, tolerance);
        let quality = score[pi] * consistency;
        if best.as_ref().map_or(true, |(_, q)| quality > *q) {
            best = Some((
                EdgeEstimate {
                    radius,
                    polarity: pol,
                    peak_strength: score[pi],
                    theta_consistency: consistency,
                    coverage,
                    edge_points: Vec::new(),
                },
                quality,
            ));
        }
    }

    let (mut est, _) = best?;
    est.edge_points = edge_points_near(&sweep, center, &est, search.refine_halfwidth_px);
    Some(est)
}

/// Per-ray derivative peak within `halfwidth_px` of the selected radius,
/// refined with a parabola through its neighbours.
fn edge_points_near(sweep: &RaySweep, center: [f32; 2], est: &EdgeEstimate, halfwidth_px: f32) -> Vec<Point> {
    let radii = &sweep.grid.radii;
    let step = sweep.grid.step;
    let hw = halfwidth_px.max(step);
    let lo = radii.partition_point(|&r| r < est.radius - hw);
    let hi = radii.partition_point(|&r| r <= est.radius + hw);
    if lo >= hi {
        return Vec::new();
    }

    sweep
        .rays
        .iter()
        .filter_map(|ray| {
            let s = |i: usize| est.polarity.score(ray.derivative[i]);
            let idx = (lo..hi).max_by(|&a, &b| s(a).total_cmp(&s(b)))?;
            if !(s(idx) > 0.0) {
                return None;
            }
            let mut r = radii[idx];
            if idx > 0 && idx + 1 < radii.len() {
                let (a, b, c) = (s(idx - 1), s(idx), s(idx + 1));
                let denom = a - 2.0 * b + c;
                if denom.abs() > 1e-12 {
                    r += (0.5 * (a - c) / denom).clamp(-0.5, 0.5) * step;
                }
            }
            Some(Point::new(
                (center[0] + ray.dir[0] * r) as f64,
                (center[1] + ray.dir[1] * r) as f64,
            ))
        })
        .collect()
}
