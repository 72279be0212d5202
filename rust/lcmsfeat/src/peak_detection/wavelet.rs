//! Continuous wavelet transform with a Mexican hat wavelet and ridge
//! tracing across scales.

/// Number of scale units the wavelet kernel extends to each side.
const KERNEL_HALF_WIDTH_SCALES: f64 = 5.0;

fn mexican_hat(t: f64) -> f64 {
    let t2 = t * t;
    (1.0 - t2) * (-t2 / 2.0).exp()
}

/// Wavelet coefficients for a trace at a set of scales (in scan units).
///
/// Buffers are kept between traces so one workspace can serve every ROI of
/// a sample.
#[derive(Debug, Default)]
pub(crate) struct CwtWorkspace {
    pub scales: Vec<f64>,
    pub coefficients: Vec<Vec<f64>>,
    kernel: Vec<f64>,
}

impl CwtWorkspace {
    pub fn new(scales: Vec<f64>) -> Self {
        let coefficients = vec![Vec::new(); scales.len()];
        Self {
            scales,
            coefficients,
            kernel: Vec::new(),
        }
    }

    pub fn num_scales(&self) -> usize {
        self.scales.len()
    }

    /// Computes the coefficients of `signal` at every scale.
    ///
    /// Positions outside the signal are treated as zero.
    pub fn transform(&mut self, signal: &[f32]) {
        let n = signal.len();
        for (scale_idx, &scale) in self.scales.iter().enumerate() {
            let half = (KERNEL_HALF_WIDTH_SCALES * scale).ceil() as usize;
            let norm = 1.0 / scale.sqrt();
            self.kernel.clear();
            self.kernel.extend(
                (0..=2 * half).map(|k| mexican_hat((k as f64 - half as f64) / scale) * norm),
            );

            let out = &mut self.coefficients[scale_idx];
            out.clear();
            out.resize(n, 0.0);
            for (i, slot) in out.iter_mut().enumerate() {
                let start = i.saturating_sub(half);
                let end = (i + half).min(n.saturating_sub(1));
                let mut acc = 0.0;
                for k in start..=end {
                    // kernel index of position k relative to center i
                    let kidx = k + half - i;
                    acc += signal[k] as f64 * self.kernel[kidx];
                }
                *slot = acc;
            }
        }
    }
}

/// Positions that are strict local maxima with a positive coefficient.
///
/// The left neighbour may be equal, so a flat top yields its right-most
/// position exactly once.
pub(crate) fn local_maxima(coefs: &[f64]) -> Vec<usize> {
    if coefs.len() < 3 {
        return Vec::new();
    }
    (1..coefs.len() - 1)
        .filter(|&i| coefs[i] > 0.0 && coefs[i] >= coefs[i - 1] && coefs[i] > coefs[i + 1])
        .collect()
}

/// A chain of local maxima linked across consecutive scales.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Ridge {
    /// Position at the smallest scale the ridge reached.
    pub position: usize,
    pub length: usize,
    pub best_scale_idx: usize,
    pub best_position: usize,
    pub best_coefficient: f64,
    last_scale_idx: usize,
    last_position: usize,
}

/// Traces ridges from the smallest scale upwards.
///
/// A maximum extends the closest ridge that ended on the previous scale
/// within `max(1, scale)` positions; each ridge takes at most one maximum per
/// scale, closest pairs first.
pub(crate) fn trace_ridges(ws: &CwtWorkspace) -> Vec<Ridge> {
    let mut ridges: Vec<Ridge> = Vec::new();

    for (scale_idx, coefs) in ws.coefficients.iter().enumerate() {
        let maxima = local_maxima(coefs);
        let max_shift = ws.scales[scale_idx].round().max(1.0) as usize;

        let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
        for (ridge_idx, ridge) in ridges.iter().enumerate() {
            if scale_idx == 0 || ridge.last_scale_idx != scale_idx - 1 {
                continue;
            }
            for (max_idx, &pos) in maxima.iter().enumerate() {
                let dist = pos.abs_diff(ridge.last_position);
                if dist <= max_shift {
                    pairs.push((dist, ridge_idx, max_idx));
                }
            }
        }
        pairs.sort_unstable();

        let mut ridge_taken = vec![false; ridges.len()];
        let mut max_taken = vec![false; maxima.len()];
        for (_, ridge_idx, max_idx) in pairs {
            if ridge_taken[ridge_idx] || max_taken[max_idx] {
                continue;
            }
            ridge_taken[ridge_idx] = true;
            max_taken[max_idx] = true;
            let pos = maxima[max_idx];
            let ridge = &mut ridges[ridge_idx];
            ridge.length += 1;
            ridge.last_scale_idx = scale_idx;
            ridge.last_position = pos;
            if coefs[pos] > ridge.best_coefficient {
                ridge.best_coefficient = coefs[pos];
                ridge.best_scale_idx = scale_idx;
                ridge.best_position = pos;
            }
        }

        for (max_idx, &pos) in maxima.iter().enumerate() {
            if max_taken[max_idx] {
                continue;
            }
            ridges.push(Ridge {
                position: pos,
                length: 1,
                best_scale_idx: scale_idx,
                best_position: pos,
                best_coefficient: coefs[pos],
                last_scale_idx: scale_idx,
                last_position: pos,
            });
        }
    }
    ridges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(n: usize, center: f64, sigma: f64, height: f32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let z = (i as f64 - center) / sigma;
                height * (-0.5 * z * z).exp() as f32
            })
            .collect()
    }

    #[test]
    fn test_transform_peaks_at_signal_apex() {
        let signal = gaussian(61, 30.0, 3.0, 1000.0);
        let mut ws = CwtWorkspace::new(vec![2.0, 3.0, 4.0]);
        ws.transform(&signal);
        for coefs in ws.coefficients.iter() {
            assert_eq!(local_maxima(coefs), vec![30]);
        }
    }

    #[test]
    fn test_flat_signal_has_no_maxima() {
        let mut ws = CwtWorkspace::new(vec![2.0]);
        ws.transform(&[0.0; 20]);
        assert!(local_maxima(&ws.coefficients[0]).is_empty());
    }

    #[test]
    fn test_ridges_span_scales() {
        let mut signal = gaussian(120, 30.0, 3.0, 1000.0);
        for (x, y) in signal.iter_mut().zip(gaussian(120, 90.0, 3.0, 500.0)) {
            *x += y;
        }
        let mut ws = CwtWorkspace::new(vec![1.0, 2.0, 3.0, 4.0]);
        ws.transform(&signal);
        let ridges = trace_ridges(&ws);
        let long: Vec<&Ridge> = ridges.iter().filter(|r| r.length == 4).collect();
        assert_eq!(long.len(), 2, "{:?}", ridges);
        assert_eq!(long[0].position, 30);
        assert_eq!(long[1].position, 90);
        assert!(long[0].best_coefficient > long[1].best_coefficient);
    }
}
