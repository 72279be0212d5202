//! Gaussian kernel density over retention time, evaluated on a regular grid.

/// Grid points per bandwidth.
const GRID_STEPS_PER_BANDWIDTH: f32 = 10.0;
/// The grid extends this many bandwidths past the outermost points.
const GRID_PADDING_BANDWIDTHS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DensityPeak {
    pub rt: f32,
    pub density: f64,
}

/// Unnormalized Gaussian KDE of `rts`, sampled every `bandwidth / 10`.
#[derive(Debug)]
pub(crate) struct RtDensity {
    origin: f32,
    step: f32,
    values: Vec<f64>,
}

impl RtDensity {
    pub fn new(rts: &[f32], bandwidth: f32) -> Self {
        let step = bandwidth / GRID_STEPS_PER_BANDWIDTH;
        let (lo, hi) = rts
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        if rts.is_empty() {
            return Self {
                origin: 0.0,
                step,
                values: Vec::new(),
            };
        }
        let origin = lo - GRID_PADDING_BANDWIDTHS * bandwidth;
        let end = hi + GRID_PADDING_BANDWIDTHS * bandwidth;
        let n = ((end - origin) / step).ceil() as usize + 1;

        let inv_two_var = 1.0 / (2.0 * (bandwidth as f64).powi(2));
        let values = (0..n)
            .map(|i| {
                let x = (origin + i as f32 * step) as f64;
                rts.iter()
                    .map(|&rt| {
                        let d = x - rt as f64;
                        (-d * d * inv_two_var).exp()
                    })
                    .sum()
            })
            .collect();
        Self {
            origin,
            step,
            values,
        }
    }

    /// Local maxima of the density, left to right.
    ///
    /// A plateau reports its left-most point once.
    pub fn peaks(&self) -> Vec<DensityPeak> {
        let v = &self.values;
        let n = v.len();
        let mut out = Vec::new();
        for i in 0..n {
            let left = if i == 0 { 0.0 } else { v[i - 1] };
            let right = if i + 1 == n { 0.0 } else { v[i + 1] };
            if v[i] > left && v[i] >= right {
                out.push(DensityPeak {
                    rt: self.origin + i as f32 * self.step,
                    density: v[i],
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cluster_has_one_peak() {
        let density = RtDensity::new(&[100.0, 101.0, 102.0], 5.0);
        let peaks = density.peaks();
        assert_eq!(peaks.len(), 1, "{:?}", peaks);
        assert!((peaks[0].rt - 101.0).abs() <= 0.5);
    }

    #[test]
    fn test_separated_clusters_have_two_peaks() {
        let density = RtDensity::new(&[100.0, 100.5, 160.0], 5.0);
        let peaks = density.peaks();
        assert_eq!(peaks.len(), 2, "{:?}", peaks);
        assert!(peaks[0].density > peaks[1].density);
        assert!((peaks[1].rt - 160.0).abs() <= 0.5);
    }

    #[test]
    fn test_empty_input() {
        assert!(RtDensity::new(&[], 5.0).peaks().is_empty());
    }
}
