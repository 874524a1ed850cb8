//! Ray sweep around a center prior.

use super::{smoothed_derivative, strongest, AngularAggregator, Polarity};
use crate::geometry::ray_directions;
use crate::pixels::Image;

/// Evenly spaced radii covering a search window.
#[derive(Debug, Clone)]
pub(crate) struct RadiusGrid {
    pub(crate) radii: Vec<f32>,
    pub(crate) step: f32,
}

impl RadiusGrid {
    /// `n` radii from `window[0]` to `window[1]` inclusive; `None` for an
    /// empty window or fewer than 2 samples.
    pub(crate) fn spanning(window: [f32; 2], n: usize) -> Option<Self> {
        let [lo, hi] = window;
        if n < 2 || !(hi - lo > 1e-6) {
            return None;
        }
        let step = (hi - lo) / (n - 1) as f32;
        Some(Self {
            radii: (0..n).map(|i| lo + i as f32 * step).collect(),
            step,
        })
    }
}

/// One in-bounds ray of a sweep.
#[derive(Debug, Clone)]
pub(crate) struct SweptRay {
    /// Unit direction `(cos, sin)`.
    pub(crate) dir: [f32; 2],
    /// Smoothed `dI/dr` at every grid radius.
    pub(crate) derivative: Vec<f32>,
    rising_peak: f32,
    falling_peak: f32,
}

impl SweptRay {
    /// Radius of this ray's strongest derivative response for `pol`.
    pub(crate) fn peak_radius(&self, pol: Polarity) -> f32 {
        match pol {
            Polarity::Rising => self.rising_peak,
            Polarity::Falling => self.falling_peak,
        }
    }
}

/// Derivative profiles of `attempted` rays, of which `rays` stayed usable.
#[derive(Debug, Clone)]
pub(crate) struct RaySweep {
    pub(crate) grid: RadiusGrid,
    pub(crate) attempted: usize,
    pub(crate) rays: Vec<SweptRay>,
}

impl RaySweep {
    /// Cast `n_rays` rays from `center` over `grid`.
    ///
    /// With `clamp` the border is replicated and every ray is kept;
    /// otherwise a ray that leaves the image is dropped.
    pub(crate) fn run(image: &Image, center: [f32; 2], grid: RadiusGrid, n_rays: usize, clamp: bool) -> Self {
        let attempted = n_rays.max(1);
        let mut profile = Vec::with_capacity(grid.radii.len());
        let mut rays = Vec::with_capacity(attempted);

        'rays: for [c, s] in ray_directions(attempted) {
            let dir = [c as f32, s as f32];
            profile.clear();
            for &r in &grid.radii {
                let (x, y) = (center[0] + dir[0] * r, center[1] + dir[1] * r);
                let v = if clamp {
                    image.bilinear_clamped(x, y)
                } else {
                    match image.bilinear(x, y) {
                        Some(v) => v,
                        None => continue 'rays,
                    }
                };
                profile.push(v);
            }
            let mut derivative = Vec::with_capacity(profile.len());
            smoothed_derivative(&profile, grid.step, &mut derivative);
            let rising_peak = grid.radii[strongest(&derivative, Polarity::Rising)];
            let falling_peak = grid.radii[strongest(&derivative, Polarity::Falling)];
            rays.push(SweptRay {
                dir,
                derivative,
                rising_peak,
                falling_peak,
            });
        }

        Self {
            grid,
            attempted,
            rays,
        }
    }

    /// Fraction of attempted rays that were usable.
    pub(crate) fn coverage(&self) -> f32 {
        self.rays.len() as f32 / self.attempted as f32
    }

    /// Per-radius reduction of the ray derivatives.
    pub(crate) fn response(&self, agg: &AngularAggregator) -> Vec<f32> {
        let mut column = Vec::with_capacity(self.rays.len());
        (0..self.grid.radii.len())
            .map(|ri| {
                column.clear();
                column.extend(self.rays.iter().map(|ray| ray.derivative[ri]));
                agg.reduce(&mut column)
            })
            .collect()
    }

    /// Fraction of rays whose own peak for `pol` lies within `tolerance`
    /// pixels of `radius`.
    pub(crate) fn agreement(&self, pol: Polarity, radius: f32, tolerance: f32) -> f32 {
        if self.rays.is_empty() {
            return 0.0;
        }
        let close = self
            .rays
            .iter()
            .filter(|ray| (ray.peak_radius(pol) - radius).abs() <= tolerance)
            .count();
        close as f32 / self.rays.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::test_utils::{blur, draw_disk_image};

    #[test]
    fn sweep_locates_disk_rim() {
        let center = [72.0f32, 66.0f32];
        let radius = 27.35f32;
        let img = blur(&draw_disk_image(160, 152, center, radius, 0.9, 0.1), 1.1);

        let grid = RadiusGrid::spanning([23.0, 31.0], 97).expect("valid grid");
        let sweep = RaySweep::run(&img, center, grid, 72, false);
        assert_abs_diff_eq!(sweep.coverage(), 1.0);

        let resp = sweep.response(&AngularAggregator::Median);
        let r_found = sweep.grid.radii[strongest(&resp, Polarity::Falling)];
        assert_abs_diff_eq!(r_found, radius, epsilon = 0.5);
        assert!(sweep.agreement(Polarity::Falling, r_found, 0.75) > 0.9);
        assert!(sweep.agreement(Polarity::Rising, r_found, 0.75) < 0.5);
    }

    #[test]
    fn rays_leaving_the_image_are_dropped_unless_clamped() {
        let img = draw_disk_image(40, 40, [8.0, 20.0], 5.0, 0.9, 0.1);
        let grid = RadiusGrid::spanning([2.0, 15.0], 27).expect("valid grid");
        let strict = RaySweep::run(&img, [8.0, 20.0], grid.clone(), 32, false);
        assert!(strict.coverage() < 1.0);
        let clamped = RaySweep::run(&img, [8.0, 20.0], grid, 32, true);
        assert_eq!(clamped.rays.len(), 32);
    }

    #[test]
    fn empty_window_has_no_grid() {
        assert!(RadiusGrid::spanning([5.0, 5.0], 10).is_none());
        assert!(RadiusGrid::spanning([1.0, 5.0], 1).is_none());
    }
}
