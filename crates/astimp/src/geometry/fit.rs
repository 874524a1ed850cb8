//! Algebraic least-squares circle fitting (Kåsa).
//!
//! Minimizes `Σ (x² + y² + D x + E y + F)²` on centroid-normalized points,
//! then maps the solution back to pixel coordinates.

use nalgebra::{Matrix2, Matrix3, SymmetricEigen, Vector3};

use super::{Circle, Point};
use crate::error::{AnalysisError, Result};

/// Ratio of covariance eigenvalues below which a point set is collinear.
const COLLINEAR_EIG_RATIO: f64 = 1e-10;

/// Fit a circle to boundary points.
///
/// Fails with `DegenerateGeometry` for fewer than 3 points, coincident or
/// collinear points, or a non-finite solution.
pub fn fit_circle(points: &[Point]) -> Result<Circle> {
    let n = points.len();
    if n < 3 {
        return Err(AnalysisError::DegenerateGeometry(format!(
            "circle fit needs at least 3 points, got {n}"
        )));
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(AnalysisError::DegenerateGeometry(
            "non-finite point in circle fit".to_string(),
        ));
    }

    let (mean_x, mean_y, scale) = normalization_params(points)?;

    let mut cov = Matrix2::<f64>::zeros();
    let mut ata = Matrix3::<f64>::zeros();
    let mut atb = Vector3::<f64>::zeros();
    for p in points {
        let x = (p.x - mean_x) * scale;
        let y = (p.y - mean_y) * scale;
        cov[(0, 0)] += x * x;
        cov[(0, 1)] += x * y;
        cov[(1, 1)] += y * y;

        let row = Vector3::new(x, y, 1.0);
        let b = -(x * x + y * y);
        ata += row * row.transpose();
        atb += row * b;
    }
    cov[(1, 0)] = cov[(0, 1)];

    let eig = SymmetricEigen::new(cov);
    let (lo, hi) = (eig.eigenvalues.min(), eig.eigenvalues.max());
    if !(hi > 0.0) || lo / hi < COLLINEAR_EIG_RATIO {
        return Err(AnalysisError::DegenerateGeometry(
            "circle fit points are collinear".to_string(),
        ));
    }

    let sol = ata.lu().solve(&atb).ok_or_else(|| {
        AnalysisError::DegenerateGeometry("singular circle normal equations".to_string())
    })?;
    let (d, e, f) = (sol[0], sol[1], sol[2]);
    let cx = -0.5 * d;
    let cy = -0.5 * e;
    let r_sq = cx * cx + cy * cy - f;
    if !r_sq.is_finite() || r_sq <= 0.0 {
        return Err(AnalysisError::DegenerateGeometry(
            "circle fit produced non-positive radius".to_string(),
        ));
    }

    let circle = Circle::new(
        Point::new(cx / scale + mean_x, cy / scale + mean_y),
        r_sq.sqrt() / scale,
    );
    if !circle.is_valid() {
        return Err(AnalysisError::DegenerateGeometry(
            "circle fit produced non-finite parameters".to_string(),
        ));
    }
    Ok(circle)
}

/// RMS of signed radial residuals of `points` against `circle`.
pub fn rms_radial_residual(circle: &Circle, points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|&p| circle.distance_to_point(p).powi(2))
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Centroid and isotropic scale so that mean distance from centroid is √2.
fn normalization_params(points: &[Point]) -> Result<(f64, f64, f64)> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| (p.x - mean_x).hypot(p.y - mean_y))
        .sum::<f64>()
        / n;
    if !(mean_dist > 1e-12) {
        return Err(AnalysisError::DegenerateGeometry(
            "circle fit points are coincident".to_string(),
        ));
    }
    Ok((mean_x, mean_y, std::f64::consts::SQRT_2 / mean_dist))
}
