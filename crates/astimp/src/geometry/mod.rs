//! Geometry primitives: points, circles, ray sampling and circle fitting.
//!
//! Everything here is a pure function over immutable inputs.

mod fit;
mod ransac;

pub use fit::{fit_circle, rms_radial_residual};
pub use ransac::{fit_circle_ransac, CircleRansacConfig, CircleRansacResult};

use crate::pixels::Image;

/// 2D point in pixel coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

/// Circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub const fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Signed distance from `p` to the circle boundary (positive outside).
    #[inline]
    pub fn distance_to_point(&self, p: Point) -> f64 {
        self.center.distance(p) - self.radius
    }

    /// `true` when `p` lies inside or on the circle.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        self.distance_to_point(p) <= 0.0
    }

    /// Point on the ray from the center at `angle` (radians) and distance `r`.
    #[inline]
    pub fn point_at(&self, angle: f64, r: f64) -> Point {
        Point::new(
            self.center.x + r * angle.cos(),
            self.center.y + r * angle.sin(),
        )
    }

    /// Sample `n` evenly spaced boundary points.
    pub fn sample_points(&self, n: usize) -> Vec<Point> {
        ray_angles(n)
            .into_iter()
            .map(|a| self.point_at(a, self.radius))
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.center.is_finite() && self.radius.is_finite() && self.radius > 0.0
    }
}

/// Sub-pixel intensity interpolation used along rays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    #[default]
    Bilinear,
    Nearest,
}

impl SampleMode {
    /// Intensity at a sub-pixel position, `None` outside the image.
    #[inline]
    pub fn sample(self, image: &Image, x: f32, y: f32) -> Option<f32> {
        match self {
            SampleMode::Bilinear => image.bilinear(x, y),
            SampleMode::Nearest => image.nearest(x, y),
        }
    }
}

/// `n` evenly spaced angles in `[0, 2π)`, starting at 0.
pub fn ray_angles(n: usize) -> Vec<f64> {
    let step = std::f64::consts::TAU / n.max(1) as f64;
    (0..n).map(|i| i as f64 * step).collect()
}

/// Unit direction vectors `(cos, sin)` for [`ray_angles`].
pub fn ray_directions(n: usize) -> Vec<[f64; 2]> {
    ray_angles(n)
        .into_iter()
        .map(|a| [a.cos(), a.sin()])
        .collect()
}

/// Sample intensities along the ray from `center` at `angle` for each radius.
///
/// Returns `None` as soon as one sample falls outside the image.
pub fn sample_ray(
    image: &Image,
    center: Point,
    angle: f64,
    radii: &[f64],
    mode: SampleMode,
) -> Option<Vec<f32>> {
    let (ct, st) = (angle.cos(), angle.sin());
    radii
        .iter()
        .map(|&r| {
            mode.sample(image, (center.x + ct * r) as f32, (center.y + st * r) as f32)
        })
        .collect()
}
