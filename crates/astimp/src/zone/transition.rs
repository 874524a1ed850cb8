//! Per-ray growth transition detection.
//!
//! A sample counts as growth when its smoothed, contrast-adjusted intensity
//! reaches `threshold + noise_floor`. The transition is the first run of
//! growth samples lasting at least `sustain` samples; its position is
//! interpolated where the profile crosses `threshold` just before the run.

use crate::geometry::{Point, SampleMode};
use crate::pixels::Image;
use crate::radial::smooth3_in_place;

/// Whether the bacterial lawn images brighter or darker than clear agar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthContrast {
    /// Lawn is brighter (typical reflected-light photographs).
    #[default]
    Brighter,
    /// Lawn is darker (transmitted-light setups).
    Darker,
}

/// Intensities sampled along one ray from a disk center.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    /// Ray angle in radians.
    pub angle: f64,
    /// Sample radii from the disk center (pixels).
    pub radii: Vec<f64>,
    /// Intensity at each radius.
    pub intensities: Vec<f32>,
    /// The ray left the image before reaching the search radius.
    pub truncated: bool,
}

impl RadialProfile {
    /// Sample `image` along the ray at `angle` for radii
    /// `r_start, r_start + step, ..` up to `r_max`, stopping at the image edge.
    pub fn sample(
        image: &Image,
        center: Point,
        angle: f64,
        r_start: f64,
        r_max: f64,
        step: f64,
        mode: SampleMode,
    ) -> Self {
        let n = if r_max >= r_start && step > 0.0 {
            ((r_max - r_start) / step + 1e-9).floor() as usize + 1
        } else {
            0
        };
        let (ct, st) = (angle.cos(), angle.sin());
        let mut radii = Vec::with_capacity(n);
        let mut intensities = Vec::with_capacity(n);
        let mut truncated = false;
        for i in 0..n {
            let r = r_start + i as f64 * step;
            let x = (center.x + ct * r) as f32;
            let y = (center.y + st * r) as f32;
            match mode.sample(image, x, y) {
                Some(v) => {
                    radii.push(r);
                    intensities.push(v);
                }
                None => {
                    truncated = true;
                    break;
                }
            }
        }
        Self {
            angle,
            radii,
            intensities,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }
}

/// Transition rule parameters resolved for one analysis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransitionRule {
    pub threshold: f32,
    pub noise_floor: f32,
    pub sustain_samples: usize,
    pub contrast: GrowthContrast,
}

/// Outcome of one ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RayOutcome {
    /// Sustained growth starts at `radius`; `at_disk_edge` when growth is
    /// present from the first sample on.
    Crossing { radius: f64, at_disk_edge: bool },
    /// No growth sample anywhere along the full ray.
    Clear,
    /// Growth samples exist but none form a sustained run.
    Ambiguous { first_growth_radius: f64 },
    /// The ray left the image before any transition was confirmed.
    OutOfBounds,
}

/// Classify one profile. Only a run starting at the first sample snaps to
/// `disk_radius`.
pub(crate) fn detect_transition(
    profile: &RadialProfile,
    rule: &TransitionRule,
    disk_radius: f64,
) -> RayOutcome {
    let n = profile.len();
    if n == 0 {
        return if profile.truncated {
            RayOutcome::OutOfBounds
        } else {
            RayOutcome::Clear
        };
    }

    let sign = match rule.contrast {
        GrowthContrast::Brighter => 1.0f32,
        GrowthContrast::Darker => -1.0f32,
    };
    let mut s: Vec<f32> = profile.intensities.iter().map(|&v| sign * v).collect();
    smooth3_in_place(&mut s);
    let cut = sign * rule.threshold;
    let growth = cut + rule.noise_floor;
    let sustain = rule.sustain_samples.max(1);

    let mut run_start: Option<usize> = None;
    let mut first_growth: Option<usize> = None;
    let mut onset: Option<usize> = None;
    for (i, &v) in s.iter().enumerate() {
        if v >= growth {
            first_growth.get_or_insert(i);
            let start = *run_start.get_or_insert(i);
            if i + 1 - start >= sustain {
                onset = Some(start);
                break;
            }
        } else {
            run_start = None;
        }
    }

    match onset {
        Some(0) => RayOutcome::Crossing {
            radius: disk_radius,
            at_disk_edge: true,
        },
        Some(start) => {
            // Clear agar may sit between the cutoff and the growth level; the
            // run start is then located at the growth level instead.
            let (j, level) = match (0..start).rev().find(|&j| s[j] < cut) {
                Some(j) => (j, cut),
                None => (start - 1, growth),
            };
            let (a, b) = (s[j], s[j + 1]);
            let t = if b > a { ((level - a) / (b - a)).clamp(0.0, 1.0) } else { 0.0 };
            let r0 = profile.radii[j];
            let r1 = profile.radii[j + 1];
            RayOutcome::Crossing {
                radius: r0 + t as f64 * (r1 - r0),
                at_disk_edge: false,
            }
        }
        None if profile.truncated => RayOutcome::OutOfBounds,
        None => match first_growth {
            Some(i) => RayOutcome::Ambiguous {
                first_growth_radius: profile.radii[i],
            },
            None => RayOutcome::Clear,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(values: &[f32], r0: f64, step: f64) -> RadialProfile {
        RadialProfile {
            angle: 0.0,
            radii: (0..values.len()).map(|i| r0 + i as f64 * step).collect(),
            intensities: values.to_vec(),
            truncated: false,
        }
    }

    fn rule(sustain: usize) -> TransitionRule {
        TransitionRule {
            threshold: 0.5,
            noise_floor: 0.05,
            sustain_samples: sustain,
            contrast: GrowthContrast::Brighter,
        }
    }

    #[test]
    fn step_profile_crosses_at_interpolated_threshold() {
        let mut v = vec![0.2f32; 10];
        v.extend(std::iter::repeat(0.8).take(10));
        let out = detect_transition(&profile(&v, 20.0, 1.0), &rule(3), 15.0);
        let RayOutcome::Crossing { radius, at_disk_edge } = out else {
            panic!("expected crossing, got {out:?}");
        };
        assert!(!at_disk_edge);
        // Smoothed samples around the step: 0.2, 0.4, 0.6, 0.8 at r = 28..31.
        assert!((radius - 29.5).abs() < 1e-6, "radius {radius}");
    }

    #[test]
    fn growth_from_the_first_sample_snaps_to_disk_edge() {
        let out = detect_transition(&profile(&[0.7; 12], 16.5, 0.5), &rule(4), 15.0);
        assert_eq!(
            out,
            RayOutcome::Crossing {
                radius: 15.0,
                at_disk_edge: true
            }
        );
    }

    #[test]
    fn short_spikes_are_not_sustained() {
        let mut v = vec![0.2f32; 30];
        v[10] = 0.95;
        v[11] = 0.95;
        let out = detect_transition(&profile(&v, 0.0, 0.5), &rule(6), 0.0);
        assert!(matches!(out, RayOutcome::Ambiguous { .. }), "{out:?}");
    }

    #[test]
    fn values_inside_the_noise_floor_are_clear() {
        let out = detect_transition(&profile(&[0.52; 20], 0.0, 1.0), &rule(2), 0.0);
        assert_eq!(out, RayOutcome::Clear);
    }

    #[test]
    fn clear_agar_inside_the_noise_band_still_crosses_at_the_step() {
        let mut v = vec![0.52f32; 10];
        v.extend(std::iter::repeat(0.8).take(10));
        let out = detect_transition(&profile(&v, 20.0, 1.0), &rule(3), 15.0);
        let RayOutcome::Crossing { radius, at_disk_edge } = out else {
            panic!("expected crossing, got {out:?}");
        };
        assert!(!at_disk_edge);
        // Raw step between r = 29 and r = 30; smoothing pulls the run start to 29.
        assert!(radius > 28.0 && radius <= 29.0, "radius {radius}");
    }

    #[test]
    fn noisy_clear_zone_crosses_at_the_step() {
        let mut v: Vec<f32> = (0..20).map(|i| 0.48 + 0.05 * (i as f32 * 1.7).sin()).collect();
        v.extend(std::iter::repeat(0.8).take(10));
        let out = detect_transition(&profile(&v, 20.0, 1.0), &rule(3), 15.0);
        let RayOutcome::Crossing { radius, at_disk_edge } = out else {
            panic!("expected crossing, got {out:?}");
        };
        assert!(!at_disk_edge);
        assert!((radius - 39.0).abs() < 2.5, "radius {radius}");
    }

    #[test]
    fn darker_lawn_is_detected_with_inverted_contrast() {
        let mut v = vec![0.8f32; 10];
        v.extend(std::iter::repeat(0.2).take(10));
        let r = TransitionRule {
            contrast: GrowthContrast::Darker,
            ..rule(3)
        };
        assert!(matches!(
            detect_transition(&profile(&v, 0.0, 1.0), &r, 0.0),
            RayOutcome::Crossing { at_disk_edge: false, .. }
        ));
    }

    #[test]
    fn truncated_ray_without_transition_is_out_of_bounds() {
        let mut p = profile(&[0.2; 5], 0.0, 1.0);
        p.truncated = true;
        assert_eq!(detect_transition(&p, &rule(2), 0.0), RayOutcome::OutOfBounds);
    }

    #[test]
    fn sampling_stops_at_the_image_edge() {
        let img = Image::from_raw(20, 20, vec![0.5; 400]).unwrap();
        let p = RadialProfile::sample(&img, Point::new(10.0, 10.0), 0.0, 2.0, 15.0, 1.0, SampleMode::Bilinear);
        assert!(p.truncated);
        assert_eq!(p.len(), 7);
        assert!((p.radii[6] - 8.0).abs() < 1e-12);
    }
}
