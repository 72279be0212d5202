//! Small numeric helpers shared by the detection and grouping stages.

/// Median of a slice, ignoring NaN values.
///
/// Returns `None` when no finite values are present.
///
/// ```
/// use lcmsfeat::utils::stats::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Same as [`median`] for single precision data.
pub fn median_f32(values: &[f32]) -> Option<f32> {
    let as_f64: Vec<f64> = values.iter().map(|&x| x as f64).collect();
    median(&as_f64).map(|x| x as f32)
}

/// Mean and (population) standard deviation of the lowest `keep_fraction`
/// of the values.
///
/// Used as a robust baseline/noise estimate on a chromatographic trace:
/// trimming the top of the distribution removes the peak itself.
pub fn lower_trimmed_mean_sd(values: &[f32], keep_fraction: f64) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mut sorted: Vec<f64> = values.iter().map(|&x| x as f64).collect();
    sorted.sort_by(f64::total_cmp);
    let keep = ((sorted.len() as f64 * keep_fraction).ceil() as usize).clamp(1, sorted.len());
    let kept = &sorted[..keep];
    let mean = kept.iter().sum::<f64>() / keep as f64;
    let var = kept.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / keep as f64;
    (mean, var.sqrt())
}

/// Trapezoidal integral of `y` over `x`.
///
/// `x` must be sorted ascending. Fewer than two points integrate to zero.
///
/// ```
/// use lcmsfeat::utils::stats::trapezoid;
///
/// let x = [0.0, 1.0, 2.0];
/// let y = [0.0, 10.0, 0.0];
/// assert_eq!(trapezoid(&x, &y), 10.0);
/// ```
pub fn trapezoid(x: &[f32], y: &[f32]) -> f64 {
    assert_eq!(x.len(), y.len(), "trapezoid expects equal length slices");
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] as f64 - xs[0] as f64) * (ys[0] as f64 + ys[1] as f64) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_ignores_nan() {
        assert_eq!(median(&[f64::NAN, 1.0, 5.0, 3.0]), Some(3.0));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_trimmed_baseline_drops_peak() {
        let mut trace = vec![10.0f32; 18];
        trace.push(1000.0);
        trace.push(5000.0);
        let (mean, sd) = lower_trimmed_mean_sd(&trace, 0.9);
        assert_eq!(mean, 10.0);
        assert_eq!(sd, 0.0);
    }

    #[test]
    fn test_trapezoid_irregular_spacing() {
        let x = [0.0f32, 1.0, 3.0];
        let y = [2.0f32, 2.0, 2.0];
        assert!((trapezoid(&x, &y) - 6.0).abs() < 1e-12);
        assert_eq!(trapezoid(&[1.0], &[5.0]), 0.0);
    }
}
