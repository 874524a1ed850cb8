//! Gradient-voting radial symmetry for circle center proposals.
//!
//! For each pixel with a strong gradient, votes are cast along both gradient
//! directions at distances in `[r_min, r_max]`. Circular edges (plate rim,
//! disk rim) produce accumulator peaks at their centers because the gradient
//! vectors along the rim converge radially.

use crate::geometry::{Circle, Point};
use crate::pixels::{Image, LumaF32Image};

/// Voting parameters for one proposal pass.
#[derive(Debug, Clone)]
pub(crate) struct VoteConfig {
    /// Minimum voting radius (pixels).
    pub r_min: f32,
    /// Maximum voting radius (pixels).
    pub r_max: f32,
    /// Spacing of voting radii (pixels).
    pub r_step: f32,
    /// Gradient magnitude threshold (fraction of the max gradient in the ROI).
    pub grad_threshold: f32,
    /// NMS radius for peak extraction (pixels).
    pub nms_radius: f32,
    /// Minimum accumulator value for a proposal (fraction of max).
    pub min_vote_frac: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
    /// Keep at most this many proposals (highest scores win).
    pub max_candidates: Option<usize>,
    /// Only pixels inside this circle vote.
    pub roi: Option<Circle>,
}

/// A proposed circle center with its vote score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Proposal {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Center-vote accumulator, one cell per pixel.
struct Accumulator {
    width: usize,
    height: usize,
    votes: Vec<f32>,
}

impl Accumulator {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            votes: vec![0.0; width * height],
        }
    }

    /// Spread `weight` bilinearly over the four cells around `(x, y)`;
    /// votes that would touch the last row or column are dropped.
    #[inline]
    fn splat(&mut self, x: f32, y: f32, weight: f32) {
        if !(x >= 0.0 && y >= 0.0 && x < (self.width - 1) as f32 && y < (self.height - 1) as f32) {
            return;
        }
        let (x0, y0) = (x as usize, y as usize);
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);
        let i = y0 * self.width + x0;
        let w = self.width;
        self.votes[i] += weight * (1.0 - fx) * (1.0 - fy);
        self.votes[i + 1] += weight * fx * (1.0 - fy);
        self.votes[i + w] += weight * (1.0 - fx) * fy;
        self.votes[i + w + 1] += weight * fx * fy;
    }

    /// Gaussian-smoothed votes (row-major).
    fn into_smoothed(self, sigma: f32) -> Vec<f32> {
        if !(sigma > 0.0) {
            return self.votes;
        }
        match LumaF32Image::from_raw(self.width as u32, self.height as u32, self.votes) {
            Some(buf) => imageproc::filter::gaussian_blur_f32(&buf, sigma).into_raw(),
            None => Vec::new(),
        }
    }
}

fn in_roi(roi: Option<&Circle>, x: usize, y: usize) -> bool {
    roi.map_or(true, |c| c.contains(Point::new(x as f64, y as f64)))
}

fn voting_radii(config: &VoteConfig) -> Vec<f32> {
    let step = config.r_step.max(0.25);
    let n = ((config.r_max - config.r_min) / step).floor() as usize + 1;
    (0..n).map(|i| config.r_min + i as f32 * step).collect()
}

/// Offsets of the disk of radius `radius` around a cell, center excluded.
fn neighbourhood(radius: f32) -> Vec<(i64, i64)> {
    let r = radius.max(1.0);
    let reach = r.ceil() as i64;
    (-reach..=reach)
        .flat_map(|dy| (-reach..=reach).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx, dy) != (0, 0) && ((dx * dx + dy * dy) as f32) <= r * r)
        .collect()
}

/// Cells at or above `floor` that beat every neighbour within `radius`;
/// plateaus resolve to their first cell in raster order.
fn local_peaks(data: &[f32], width: usize, height: usize, radius: f32, floor: f32) -> Vec<Proposal> {
    let offsets = neighbourhood(radius);
    let mut peaks = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let val = data[idx];
            if val < floor {
                continue;
            }
            let dominated = offsets.iter().any(|&(dx, dy)| {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    return false;
                }
                let n = ny as usize * width + nx as usize;
                data[n] > val || (data[n] == val && n < idx)
            });
            if !dominated {
                peaks.push(Proposal {
                    x: x as f32,
                    y: y as f32,
                    score: val,
                });
            }
        }
    }
    peaks
}

/// Keep the `n` best-scoring proposals without disturbing their order.
fn keep_strongest(proposals: Vec<Proposal>, n: usize) -> Vec<Proposal> {
    if proposals.len() <= n {
        return proposals;
    }
    let mut rank: Vec<usize> = (0..proposals.len()).collect();
    rank.sort_by(|&a, &b| proposals[b].score.total_cmp(&proposals[a].score).then(a.cmp(&b)));
    rank.truncate(n);
    rank.sort_unstable();
    rank.into_iter().map(|i| proposals[i]).collect()
}

/// Detect candidate circle centers.
///
/// Proposals are returned in raster scan order (top-to-bottom,
/// left-to-right). When `max_candidates` is set, the highest-scoring
/// proposals are kept and their raster order is preserved.
pub(crate) fn find_proposals(image: &Image, config: &VoteConfig) -> Vec<Proposal> {
    let (w, h) = image.dimensions();
    if w < 4 || h < 4 || !(config.r_max >= config.r_min) || !(config.r_min > 0.0) {
        return Vec::new();
    }
    let (w, h) = (w as usize, h as usize);
    let grad = image.gradients();
    let roi = config.roi.as_ref();

    let magnitude = |i: usize| grad.gx[i].hypot(grad.gy[i]);
    let max_mag = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .filter(|&(x, y)| in_roi(roi, x, y))
        .map(|(x, y)| magnitude(y * w + x))
        .fold(0.0f32, f32::max);
    if max_mag < 1e-6 {
        return Vec::new();
    }
    let min_mag = config.grad_threshold * max_mag;
    let radii = voting_radii(config);

    let mut acc = Accumulator::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let mag = magnitude(i);
            if mag < min_mag || !(mag > 0.0) || !in_roi(roi, x, y) {
                continue;
            }
            let (ux, uy) = (grad.gx[i] / mag, grad.gy[i] / mag);
            for &r in &radii {
                acc.splat(x as f32 + ux * r, y as f32 + uy * r, mag);
                acc.splat(x as f32 - ux * r, y as f32 - uy * r, mag);
            }
        }
    }

    let votes = acc.into_smoothed(config.accum_sigma);
    let peak = votes.iter().copied().fold(0.0f32, f32::max);
    if peak < 1e-6 {
        return Vec::new();
    }
    let proposals = local_peaks(&votes, w, h, config.nms_radius, config.min_vote_frac * peak);
    match config.max_candidates {
        Some(n) => keep_strongest(proposals, n),
        None => proposals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{blur, draw_disk_image};

    fn config(r_min: f32, r_max: f32) -> VoteConfig {
        VoteConfig {
            r_min,
            r_max,
            r_step: 1.0,
            grad_threshold: 0.1,
            nms_radius: 5.0,
            min_vote_frac: 0.3,
            accum_sigma: 1.5,
            max_candidates: None,
            roi: None,
        }
    }

    #[test]
    fn proposal_lands_on_disk_center() {
        let img = blur(&draw_disk_image(100, 90, [52.0, 41.0], 14.0, 0.9, 0.2), 1.0);
        let props = find_proposals(&img, &config(8.0, 20.0));
        assert!(!props.is_empty());
        let best = props
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert!((best.x - 52.0).abs() < 2.0 && (best.y - 41.0).abs() < 2.0, "{best:?}");
    }

    #[test]
    fn roi_excludes_outside_voters() {
        let img = blur(&draw_disk_image(100, 100, [30.0, 30.0], 10.0, 0.9, 0.2), 1.0);
        let mut cfg = config(6.0, 14.0);
        cfg.roi = Some(Circle::new(Point::new(75.0, 75.0), 15.0));
        assert!(find_proposals(&img, &cfg).is_empty());
    }

    #[test]
    fn proposals_are_in_raster_order_and_capped() {
        let mut data = vec![0.2f32; 160 * 60];
        for &(cx, cy) in &[(30.0f32, 30.0f32), (80.0, 28.0), (130.0, 31.0)] {
            for y in 0..60 {
                for x in 0..160 {
                    let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                    if d <= 10.0 {
                        data[y * 160 + x] = 0.9;
                    }
                }
            }
        }
        let img = blur(&Image::from_raw(160, 60, data).unwrap(), 1.0);
        let mut cfg = config(6.0, 14.0);
        cfg.nms_radius = 8.0;
        let all = find_proposals(&img, &cfg);
        assert!(all.len() >= 3);
        for pair in all.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.y < b.y || (a.y == b.y && a.x < b.x));
        }
        cfg.max_candidates = Some(2);
        let capped = find_proposals(&img, &cfg);
        assert_eq!(capped.len(), 2);
        assert!(capped[0].y < capped[1].y || capped[0].x < capped[1].x);
    }

    #[test]
    fn flat_image_has_no_proposals() {
        let img = Image::from_raw(32, 32, vec![0.5; 32 * 32]).unwrap();
        assert!(find_proposals(&img, &config(4.0, 10.0)).is_empty());
    }
}
