//! Chromatographic peak detection (centWave-style).
//!
//! Per sample:
//! 1. Build regions of interest (ROIs) by linking centroids of consecutive
//!    MS1 scans within a ppm tolerance ([`roi`]).
//! 2. Run a Mexican hat continuous wavelet transform over each ROI trace at
//!    scales matching the expected peak widths and trace ridges of local
//!    maxima across scales ([`wavelet`]).
//! 3. Turn each ridge into a candidate peak, estimate its signal-to-noise
//!    against a trimmed baseline, and keep the non-overlapping candidates
//!    with the best S/N.
//! 4. Integrate the raw signal inside the peak box with the trapezoidal rule.
//! 5. Drop peaks repeated across ROIs. Missing centroids can split one
//!    signal into several ROIs, and every padded trace sees it whole.
//!
//! Running the detector twice on the same data yields identical peaks;
//! every ordering step has a total tie-break.

mod roi;
mod wavelet;

use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use crate::errors::ConfigError;
use crate::models::{
    ChromPeak,
    SampleScans,
};
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};
use crate::utils::stats::{
    lower_trimmed_mean_sd,
    trapezoid,
};
use roi::{
    Roi,
    RoiParams,
    build_rois,
};
use wavelet::{
    CwtWorkspace,
    trace_ridges,
};

/// Lowest noise standard deviation used in the S/N denominator.
const MIN_NOISE_SD: f64 = 1.0;
/// Fraction of the (sorted) background kept for the baseline estimate.
const BASELINE_KEEP_FRACTION: f64 = 0.9;
/// Below this many background points the whole trace is used instead.
const MIN_BACKGROUND_POINTS: usize = 5;

/// How the retention time bounds of a peak are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntegrationBounds {
    /// Where the wavelet response at the ridge's best scale stays positive.
    #[default]
    #[serde(rename = "wavelet")]
    Wavelet,
    /// Walk down the raw trace from the apex to the nearest local minima.
    #[serde(rename = "descent")]
    Descent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PeakDetectionParams {
    /// m/z tolerance used to link centroids into ROIs.
    pub ppm: f64,
    /// Expected (min, max) peak width in seconds.
    pub peak_width: (f32, f32),
    pub snthresh: f64,
    /// Centroids below this intensity are ignored; peaks must exceed it.
    pub noise: f32,
    /// A ROI is kept only with at least `.0` scans of intensity >= `.1`.
    pub prefilter: (usize, f32),
    pub max_missing_scans: usize,
    pub integrate: IntegrationBounds,
}

impl Default for PeakDetectionParams {
    fn default() -> Self {
        Self {
            ppm: 10.0,
            peak_width: (5.0, 30.0),
            snthresh: 10.0,
            noise: 0.0,
            prefilter: (3, 100.0),
            max_missing_scans: 1,
            integrate: IntegrationBounds::Wavelet,
        }
    }
}

impl PeakDetectionParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (wmin, wmax) = self.peak_width;
        if !(wmin.is_finite() && wmin > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "peak_detection.peak_width",
                value: wmin as f64,
                expected: "a positive minimum width",
            });
        }
        if !(wmax.is_finite() && wmin <= wmax) {
            return Err(ConfigError::InvertedRange {
                field: "peak_detection.peak_width",
                low: wmin as f64,
                high: wmax as f64,
            });
        }
        let non_negative = [
            ("peak_detection.ppm", self.ppm),
            ("peak_detection.snthresh", self.snthresh),
            ("peak_detection.noise", self.noise as f64),
            ("peak_detection.prefilter", self.prefilter.1 as f64),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    expected: "a finite, non-negative value",
                });
            }
        }
        Ok(())
    }

    /// Wavelet scales (in scans) for a given scan interval.
    ///
    /// Half the expected width in scans, from min to max in steps of two.
    fn scales(&self, scan_interval: f32) -> Vec<f64> {
        let smin = ((self.peak_width.0 / scan_interval / 2.0).round() as usize).max(1);
        let smax = ((self.peak_width.1 / scan_interval / 2.0).round() as usize).max(smin);
        (smin..=smax).step_by(2).map(|s| s as f64).collect()
    }

    fn roi_params(&self) -> RoiParams {
        RoiParams {
            ppm: self.ppm,
            noise: self.noise,
            max_missing_scans: self.max_missing_scans,
            prefilter_scans: self.prefilter.0,
            prefilter_intensity: self.prefilter.1,
        }
    }
}

/// A ROI densified onto the scan grid, padded on both sides.
#[derive(Debug, Default)]
struct RoiTrace {
    /// Index of the first trace position in the sample's MS1 scans.
    first_scan: usize,
    rts: Vec<f32>,
    intensities: Vec<f32>,
    /// ROI centroid for a position, if the ROI had one there.
    roi_points: Vec<Option<(f64, f32)>>,
}

impl RoiTrace {
    fn fill(&mut self, roi: &Roi, sample: &SampleScans, pad: usize) {
        let scans = sample.ms1();
        let first = roi.first_scan().saturating_sub(pad);
        let last = (roi.last_scan() + pad).min(scans.len() - 1);
        let roi_mz = roi.mz_range();

        self.first_scan = first;
        self.rts.clear();
        self.intensities.clear();
        self.roi_points.clear();
        self.roi_points.resize(last - first + 1, None);
        for p in roi.points.iter() {
            self.roi_points[p.scan - first] = Some((p.mz, p.intensity));
        }
        for (offset, scan) in scans[first..=last].iter().enumerate() {
            self.rts.push(scan.rt_seconds);
            let intensity = match self.roi_points[offset] {
                Some((_, int)) => int,
                None => scan.summed_intensity_in(roi_mz) as f32,
            };
            self.intensities.push(intensity);
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    lo: usize,
    hi: usize,
    apex: usize,
    max_intensity: f32,
    baseline: f64,
    signal_to_noise: f64,
}

/// Detects chromatographic peaks in one sample at a time.
///
/// Holds no sample state, so one detector can be shared across threads.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    params: PeakDetectionParams,
}

impl PeakDetector {
    pub fn new(params: PeakDetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PeakDetectionParams {
        &self.params
    }

    /// All peaks of a sample, sorted by (m/z, apex rt).
    ///
    /// A sample without MS1 spacing information or without qualifying
    /// traces yields an empty list.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, fields(sample = %sample.info.name), level = "debug")
    )]
    pub fn detect(&self, sample: &SampleScans) -> Vec<ChromPeak> {
        let Some(scan_interval) = sample.median_scan_interval() else {
            debug!("Sample {} has fewer than two MS1 scans", sample.info.name);
            return Vec::new();
        };
        let scales = self.params.scales(scan_interval);
        let pad = scales.last().copied().unwrap_or(1.0) as usize;
        let rois = build_rois(sample.ms1(), &self.params.roi_params());
        debug!(
            "Sample {}: {} ROIs, scan interval {:.3}s, scales {:?}",
            sample.info.name,
            rois.len(),
            scan_interval,
            scales
        );

        let mut workspace = CwtWorkspace::new(scales);
        let mut trace = RoiTrace::default();
        let mut peaks = Vec::new();
        for roi in rois.iter() {
            trace.fill(roi, sample, pad);
            workspace.transform(&trace.intensities);
            let candidates = self.resolve_overlaps(self.candidates(&trace, &workspace));
            for cand in candidates {
                if let Some(peak) = self.build_peak(&cand, &trace, sample) {
                    peaks.push(peak);
                }
            }
        }

        let mut peaks = self.drop_duplicate_peaks(peaks);
        peaks.sort_by(|a: &ChromPeak, b: &ChromPeak| {
            a.mz.total_cmp(&b.mz).then(a.rt.total_cmp(&b.rt))
        });
        peaks
    }

    fn candidates(&self, trace: &RoiTrace, ws: &CwtWorkspace) -> Vec<Candidate> {
        let ridges = trace_ridges(ws);
        let min_length = ws.num_scales().div_ceil(2).max(1);
        let n = trace.intensities.len();

        let mut out = Vec::new();
        for ridge in ridges.iter().filter(|r| r.length >= min_length) {
            let scale = ws.scales[ridge.best_scale_idx];
            let reach = scale.ceil() as usize;

            // Refine the apex on the raw trace near the ridge position.
            let search_lo = ridge.position.saturating_sub(reach);
            let search_hi = (ridge.position + reach).min(n - 1);
            let apex = argmax(&trace.intensities[search_lo..=search_hi]) + search_lo;

            let (lo, hi) = match self.params.integrate {
                IntegrationBounds::Wavelet => {
                    positive_span(&ws.coefficients[ridge.best_scale_idx], apex)
                }
                IntegrationBounds::Descent => descent_span(&trace.intensities, apex),
            };
            if lo == hi {
                continue;
            }

            let max_intensity = trace.intensities[apex];
            let background: Vec<f32> = trace
                .intensities
                .iter()
                .enumerate()
                .filter(|(i, _)| *i < lo || *i > hi)
                .map(|(_, v)| *v)
                .collect();
            let (baseline, noise_sd) = if background.len() >= MIN_BACKGROUND_POINTS {
                lower_trimmed_mean_sd(&background, BASELINE_KEEP_FRACTION)
            } else {
                lower_trimmed_mean_sd(&trace.intensities, BASELINE_KEEP_FRACTION)
            };
            let baseline = baseline.max(0.0);
            let signal_to_noise = (max_intensity as f64 - baseline) / noise_sd.max(MIN_NOISE_SD);

            if signal_to_noise < self.params.snthresh || max_intensity < self.params.noise {
                continue;
            }
            out.push(Candidate {
                lo,
                hi,
                apex,
                max_intensity,
                baseline,
                signal_to_noise,
            });
        }
        out
    }

    /// Keeps the best S/N candidate among overlapping ones.
    fn resolve_overlaps(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.signal_to_noise
                .total_cmp(&a.signal_to_noise)
                .then(b.max_intensity.total_cmp(&a.max_intensity))
                .then(a.apex.cmp(&b.apex))
        });
        let mut kept: Vec<Candidate> = Vec::new();
        for cand in candidates {
            if kept.iter().all(|k| cand.hi < k.lo || k.hi < cand.lo) {
                kept.push(cand);
            }
        }
        kept
    }

    /// Keeps the best S/N peak among those with m/z within `ppm` of each
    /// other and intersecting rt ranges.
    fn drop_duplicate_peaks(&self, mut peaks: Vec<ChromPeak>) -> Vec<ChromPeak> {
        peaks.sort_by(|a, b| {
            b.signal_to_noise
                .total_cmp(&a.signal_to_noise)
                .then(b.max_intensity.total_cmp(&a.max_intensity))
                .then(a.mz.total_cmp(&b.mz))
                .then(a.rt.total_cmp(&b.rt))
        });
        let total = peaks.len();

        // Sorted by m/z.
        let mut kept: Vec<ChromPeak> = Vec::with_capacity(total);
        for peak in peaks {
            let tol = peak.mz * self.params.ppm / 1e6;
            let near = binary_search_range_by_key(&kept, peak.mz - tol, peak.mz + tol, |k| k.mz);
            if kept[near]
                .iter()
                .any(|k| k.rt_range.intersects(peak.rt_range))
            {
                continue;
            }
            let at = kept.partition_point(|k| k.mz <= peak.mz);
            kept.insert(at, peak);
        }

        if kept.len() < total {
            debug!("Dropped {} peaks repeated across ROIs", total - kept.len());
        }
        kept
    }

    fn build_peak(
        &self,
        cand: &Candidate,
        trace: &RoiTrace,
        sample: &SampleScans,
    ) -> Option<ChromPeak> {
        let points: Vec<(f64, f32)> = trace.roi_points[cand.lo..=cand.hi]
            .iter()
            .flatten()
            .copied()
            .collect();
        if points.is_empty() {
            return None;
        }
        let weight: f64 = points.iter().map(|p| p.1 as f64).sum();
        let mz = points.iter().map(|p| p.0 * p.1 as f64).sum::<f64>() / weight;
        let (mz_lo, mz_hi) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.0), hi.max(p.0))
            });
        let mz_range = TupleRange::try_new(mz_lo, mz_hi).ok()?;
        let rt_range = TupleRange::try_new(trace.rts[cand.lo], trace.rts[cand.hi]).ok()?;
        if rt_range.width() <= 0.0 {
            return None;
        }

        let area = integrate_box(sample, mz_range, rt_range);
        if area <= 0.0 {
            return None;
        }
        let area_baseline_corrected = (area - cand.baseline * rt_range.width() as f64).max(0.0);

        Some(ChromPeak {
            sample: sample.id(),
            mz,
            mz_range,
            rt: trace.rts[cand.apex],
            rt_range,
            area,
            area_baseline_corrected,
            max_intensity: cand.max_intensity,
            baseline: cand.baseline,
            signal_to_noise: cand.signal_to_noise,
        })
    }
}

/// Trapezoidal integral of the extracted ion chromatogram in the box.
///
/// This is the definition of a peak's area: recomputing it from the stored
/// m/z and rt ranges reproduces [`ChromPeak::area`].
pub fn integrate_box(
    sample: &SampleScans,
    mz_range: TupleRange<f64>,
    rt_range: TupleRange<f32>,
) -> f64 {
    let (rts, intensities) = sample.extract_trace(mz_range, rt_range);
    trapezoid(&rts, &intensities)
}

/// First index of the maximum value.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Widest span around `center` where the coefficients stay positive.
fn positive_span(coefs: &[f64], center: usize) -> (usize, usize) {
    let mut lo = center;
    while lo > 0 && coefs[lo - 1] > 0.0 {
        lo -= 1;
    }
    let mut hi = center;
    while hi + 1 < coefs.len() && coefs[hi + 1] > 0.0 {
        hi += 1;
    }
    (lo, hi)
}

/// Span from `apex` down to the closest local minimum on each side.
fn descent_span(values: &[f32], apex: usize) -> (usize, usize) {
    let mut lo = apex;
    while lo > 0 && values[lo - 1] < values[lo] {
        lo -= 1;
    }
    let mut hi = apex;
    while hi + 1 < values.len() && values[hi + 1] < values[hi] {
        hi += 1;
    }
    (lo, hi)
}
