use serde::Serialize;

use super::{
    PeakId,
    SampleId,
};
use crate::utils::TupleRange;

/// Feature ids start at 1 and are dense.
pub type FeatureId = u32;

/// The intensity a sample contributes to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SampleValue {
    /// Area of the detected peak the sample contributed.
    Detected { peak: PeakId, area: f64 },
    /// Raw signal recovered by gap filling.
    Filled { area: f64 },
}

impl SampleValue {
    pub fn area(&self) -> f64 {
        match self {
            SampleValue::Detected { area, .. } | SampleValue::Filled { area } => *area,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, SampleValue::Filled { .. })
    }
}

/// A group of peaks across samples representing one chemical entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub id: FeatureId,
    /// Median m/z of the member peaks.
    pub mz: f64,
    pub mz_range: TupleRange<f64>,
    /// Median apex retention time of the member peaks.
    pub rt: f32,
    pub rt_range: TupleRange<f32>,
    /// Peaks that fell into the density group, before per-sample dedup.
    pub npeaks: usize,
    /// Number of samples with a peak, per sample group.
    pub samples_per_group: Vec<usize>,
    /// One slot per sample, `None` until detected or filled.
    pub values: Vec<Option<SampleValue>>,
}

impl Feature {
    /// Label used in exports, e.g. `FT0012`.
    pub fn label(&self) -> String {
        format!("FT{:04}", self.id)
    }

    pub fn value(&self, sample: SampleId) -> Option<SampleValue> {
        self.values.get(sample).copied().flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|x| x.is_some())
    }

    pub fn detected_peaks(&self) -> impl Iterator<Item = (SampleId, PeakId)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(sample, v)| match v {
                Some(SampleValue::Detected { peak, .. }) => Some((sample, *peak)),
                _ => None,
            })
    }

    /// Whether a precursor at (`mz`, `rt`) falls in both feature ranges.
    pub fn contains(&self, mz: f64, rt: f32) -> bool {
        self.mz_range.contains(mz) && self.rt_range.contains(rt)
    }
}

/// The features of a run, indexed by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureSet {
    features: Vec<Feature>,
    num_samples: usize,
    gap_filled: bool,
}

impl FeatureSet {
    /// Numbers the features 1..=n in the given order.
    pub(crate) fn new(mut features: Vec<Feature>, num_samples: usize) -> Self {
        for (i, feature) in features.iter_mut().enumerate() {
            feature.id = (i + 1) as FeatureId;
            debug_assert_eq!(feature.values.len(), num_samples);
        }
        Self {
            features,
            num_samples,
            gap_filled: false,
        }
    }

    pub(crate) fn into_filled(features: Vec<Feature>, num_samples: usize) -> Self {
        Self {
            features,
            num_samples,
            gap_filled: true,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        let idx = (id as usize).checked_sub(1)?;
        self.features.get(idx)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn is_gap_filled(&self) -> bool {
        self.gap_filled
    }
}
