//! Radial edge search shared by the plate locator and the disk detector.
//!
//! Both stages look for a circular intensity edge around a center prior:
//! rays are swept over a radial window, each intensity profile is turned
//! into a smoothed derivative, and the per-ray responses are reduced over
//! theta into one radial response.

mod edge;
mod sweep;

pub(crate) use edge::{estimate_edge_radius, EdgeEstimate, EdgeSearch};

/// Sign of the radial intensity derivative at an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Polarity {
    /// Intensity grows outward (`dI/dr > 0`).
    Rising,
    /// Intensity drops outward (`dI/dr < 0`).
    Falling,
}

impl Polarity {
    /// Map a derivative value to a score where larger is stronger.
    #[inline]
    pub(crate) fn score(self, d: f32) -> f32 {
        match self {
            Polarity::Rising => d,
            Polarity::Falling => -d,
        }
    }
}

/// Expected polarity of the radial intensity derivative `dI/dr` at an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradPolarity {
    /// Intensity increases as radius increases (dark → light).
    DarkToLight,
    /// Intensity decreases as radius increases (light → dark).
    LightToDark,
    /// Try both and keep the more coherent edge.
    Auto,
}

impl GradPolarity {
    pub(crate) fn candidates(self) -> &'static [Polarity] {
        match self {
            GradPolarity::DarkToLight => &[Polarity::Rising],
            GradPolarity::LightToDark => &[Polarity::Falling],
            GradPolarity::Auto => &[Polarity::Rising, Polarity::Falling],
        }
    }
}

/// Reduction of per-ray responses at one radius.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngularAggregator {
    Median,
    /// Mean after dropping `trim_fraction` of the values on each side.
    TrimmedMean { trim_fraction: f32 },
}

impl AngularAggregator {
    /// Reduce `values` (reordered in place) to one scalar; 0 when empty.
    pub(crate) fn reduce(&self, values: &mut [f32]) -> f32 {
        let n = values.len();
        if n == 0 {
            return 0.0;
        }
        match *self {
            AngularAggregator::Median => {
                let (_, m, _) = values.select_nth_unstable_by(n / 2, f32::total_cmp);
                *m
            }
            AngularAggregator::TrimmedMean { trim_fraction } => {
                values.sort_unstable_by(f32::total_cmp);
                let cut = (n as f32 * trim_fraction.clamp(0.0, 0.45)) as usize;
                let kept = &values[cut..n - cut];
                kept.iter().sum::<f32>() / kept.len() as f32
            }
        }
    }
}

/// Smoothed radial derivative of `profile` sampled every `step` pixels.
///
/// Central differences inside, one-sided at the ends, then a 3-point
/// moving average over the interior.
pub(crate) fn smoothed_derivative(profile: &[f32], step: f32, out: &mut Vec<f32>) {
    out.clear();
    let n = profile.len();
    if n < 2 {
        out.resize(n, 0.0);
        return;
    }
    out.push((profile[1] - profile[0]) / step);
    out.extend(profile.windows(3).map(|w| (w[2] - w[0]) / (2.0 * step)));
    out.push((profile[n - 1] - profile[n - 2]) / step);
    smooth3_in_place(out);
}

/// 3-point moving average over the interior; curves shorter than 5 samples
/// are left as is.
pub(crate) fn smooth3_in_place(v: &mut [f32]) {
    if v.len() < 5 {
        return;
    }
    let mut prev = v[0];
    for i in 1..v.len() - 1 {
        let cur = v[i];
        v[i] = (prev + cur + v[i + 1]) / 3.0;
        prev = cur;
    }
}

/// Index of the strongest response for `pol` (first one on ties).
pub(crate) fn strongest(values: &[f32], pol: Polarity) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if pol.score(v) > pol.score(values[best]) {
            best = i;
        }
    }
    best
}

/// Interior local maxima of `score`.
pub(crate) fn local_maxima(score: &[f32]) -> Vec<usize> {
    if score.len() < 3 {
        return Vec::new();
    }
    (1..score.len() - 1)
        .filter(|&i| score[i].is_finite() && score[i] >= score[i - 1] && score[i] >= score[i + 1])
        .collect()
}
