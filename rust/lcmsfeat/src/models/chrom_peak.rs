use serde::Serialize;

use super::SampleId;
use crate::utils::TupleRange;

/// Index of a peak inside a [`PeakSet`].
pub type PeakId = usize;

/// A chromatographic peak detected in a single sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromPeak {
    pub sample: SampleId,
    /// Intensity weighted m/z of the trace points under the peak.
    pub mz: f64,
    pub mz_range: TupleRange<f64>,
    /// Apex retention time (seconds).
    pub rt: f32,
    pub rt_range: TupleRange<f32>,
    /// Trapezoidal integral of the raw signal in the peak box ("into").
    pub area: f64,
    /// `area` minus the baseline under the peak, floored at 0 ("intb").
    pub area_baseline_corrected: f64,
    /// Highest raw trace intensity under the peak ("maxo").
    pub max_intensity: f32,
    pub baseline: f64,
    pub signal_to_noise: f64,
}

/// Every detected peak of a run, stored contiguously per sample.
///
/// Immutable once built; features refer to peaks by [`PeakId`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeakSet {
    peaks: Vec<ChromPeak>,
    #[serde(skip)]
    sample_offsets: Vec<std::ops::Range<usize>>,
}

impl PeakSet {
    /// Builds the set from per-sample peak lists, given in sample id order.
    pub fn from_per_sample(per_sample: Vec<Vec<ChromPeak>>) -> Self {
        let total = per_sample.iter().map(|x| x.len()).sum();
        let mut peaks = Vec::with_capacity(total);
        let mut sample_offsets = Vec::with_capacity(per_sample.len());
        for (sample, sample_peaks) in per_sample.into_iter().enumerate() {
            let start = peaks.len();
            debug_assert!(sample_peaks.iter().all(|p| p.sample == sample));
            peaks.extend(sample_peaks);
            sample_offsets.push(start..peaks.len());
        }
        Self {
            peaks,
            sample_offsets,
        }
    }

    pub fn peaks(&self) -> &[ChromPeak] {
        &self.peaks
    }

    pub fn get(&self, id: PeakId) -> Option<&ChromPeak> {
        self.peaks.get(id)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.sample_offsets.len()
    }

    /// Peak count per sample, in sample id order.
    pub fn counts_per_sample(&self) -> Vec<usize> {
        self.sample_offsets.iter().map(|r| r.len()).collect()
    }

    /// Median retention time width across all peaks.
    pub fn median_rt_width(&self) -> Option<f32> {
        let widths: Vec<f32> = self.peaks.iter().map(|p| p.rt_range.width()).collect();
        crate::utils::stats::median_f32(&widths)
    }
}
