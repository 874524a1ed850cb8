//! RANSAC wrapper for outlier-robust circle fitting.

use rand::prelude::*;

use super::{fit_circle, Circle, Point};
use crate::error::{AnalysisError, Result};

/// Configuration for RANSAC circle fitting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleRansacConfig {
    /// Maximum number of RANSAC iterations.
    pub max_iters: usize,
    /// Inlier threshold on absolute radial distance (pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
    /// RNG seed; fixed so identical inputs give identical fits.
    pub seed: u64,
}

impl Default for CircleRansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 200,
            inlier_threshold: 2.0,
            min_inliers: 6,
            seed: 42,
        }
    }
}

/// Result of a RANSAC circle fit.
#[derive(Debug, Clone)]
pub struct CircleRansacResult {
    /// Circle re-fitted on the inlier set.
    pub circle: Circle,
    /// Inlier mask aligned with the input points.
    pub inliers: Vec<bool>,
    /// Number of inliers of the final model.
    pub num_inliers: usize,
}

/// Fit a circle robustly using RANSAC.
///
/// Samples 3-point minimal subsets, keeps the model with most inliers and
/// re-fits it on all inliers with [`fit_circle`].
pub fn fit_circle_ransac(points: &[Point], config: &CircleRansacConfig) -> Result<CircleRansacResult> {
    let n = points.len();
    if n < 3 {
        return Err(AnalysisError::DegenerateGeometry(format!(
            "circle RANSAC needs at least 3 points, got {n}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];

    for _ in 0..config.max_iters.max(1) {
        let sample_pts: Vec<Point> = rand::seq::index::sample(&mut rng, n, 3)
            .into_iter()
            .map(|i| points[i])
            .collect();
        let Ok(circle) = fit_circle(&sample_pts) else {
            continue;
        };

        let mask = inlier_mask(&circle, points, config.inlier_threshold);
        let count = mask.iter().filter(|&&m| m).count();
        if count > best_count {
            best_count = count;
            best_mask = mask;

            // Over 90 % inliers: no better model is likely.
            if best_count * 10 > n * 9 {
                break;
            }
        }
    }

    let needed = config.min_inliers.max(3);
    if best_count < needed {
        return Err(AnalysisError::DegenerateGeometry(format!(
            "circle RANSAC found {best_count} inliers, need {needed}"
        )));
    }

    let inlier_pts: Vec<Point> = best_mask
        .iter()
        .zip(points.iter())
        .filter(|(&m, _)| m)
        .map(|(_, &p)| p)
        .collect();
    let circle = fit_circle(&inlier_pts)?;
    let inliers = inlier_mask(&circle, points, config.inlier_threshold);
    let num_inliers = inliers.iter().filter(|&&m| m).count();

    Ok(CircleRansacResult {
        circle,
        inliers,
        num_inliers,
    })
}

fn inlier_mask(circle: &Circle, points: &[Point], threshold: f64) -> Vec<bool> {
    points
        .iter()
        .map(|&p| circle.distance_to_point(p).abs() < threshold)
        .collect()
}
