use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use super::association::{
    AssociatedSpectra,
    FeatureSpectra,
};
use crate::errors::ConfigError;
use crate::models::{
    ConsensusPeak,
    ConsensusSpectrum,
    FeatureId,
    Ms2Spectrum,
    MzTolerance,
};

/// Slack on the min_prop comparison, so a fraction that equals the
/// threshold is never lost to rounding.
const MIN_PROP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConsensusIntensity {
    #[default]
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "max")]
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Fraction of the spectra a peak group must appear in.
    pub min_prop: f64,
    /// Peaks within this distance of a group's mean m/z join the group.
    pub tolerance: MzTolerance,
    pub intensity: ConsensusIntensity,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            min_prop: 0.5,
            tolerance: MzTolerance::Either { da: 0.01, ppm: 10.0 },
            intensity: ConsensusIntensity::Mean,
        }
    }
}

impl ConsensusParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_prop) {
            return Err(ConfigError::OutOfRange {
                field: "consensus.min_prop",
                value: self.min_prop,
                expected: "a fraction in [0, 1]",
            });
        }
        self.tolerance.validate("consensus.tolerance")
    }
}

/// How the spectra of one feature are reduced to a single spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReductionStrategy {
    /// Keep the spectrum with the largest total intensity.
    #[serde(rename = "max_intensity")]
    MaxIntensity,
    /// Merge all spectra, keeping peaks present in enough of them.
    #[serde(rename = "consensus")]
    Consensus(ConsensusParams),
}

impl ReductionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ReductionStrategy::MaxIntensity => "max_intensity",
            ReductionStrategy::Consensus(_) => "consensus",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ReductionStrategy::MaxIntensity => Ok(()),
            ReductionStrategy::Consensus(params) => params.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReducedSpectrum {
    Selected(Ms2Spectrum),
    Consensus(ConsensusSpectrum),
}

impl ReducedSpectrum {
    pub fn feature(&self) -> Option<FeatureId> {
        match self {
            ReducedSpectrum::Selected(s) => s.feature_id(),
            ReducedSpectrum::Consensus(c) => Some(c.feature),
        }
    }

    /// Empty spectra are kept in memory but never exported.
    pub fn is_empty(&self) -> bool {
        match self {
            ReducedSpectrum::Selected(s) => s.is_empty(),
            ReducedSpectrum::Consensus(c) => c.is_empty(),
        }
    }
}

/// One reduced spectrum per feature with MS2 data, sorted by feature id.
#[derive(Debug, Clone, Serialize)]
pub struct ReducedSpectra {
    pub strategy: ReductionStrategy,
    pub spectra: Vec<ReducedSpectrum>,
}

impl ReducedSpectra {
    pub fn exportable(&self) -> impl Iterator<Item = &ReducedSpectrum> {
        self.spectra.iter().filter(|s| !s.is_empty())
    }

    /// Ids of the features with a non-empty reduced spectrum.
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.exportable().filter_map(|s| s.feature()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SpectrumReducer {
    strategy: ReductionStrategy,
}

impl SpectrumReducer {
    pub fn new(strategy: ReductionStrategy) -> Self {
        Self { strategy }
    }

    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "debug")
    )]
    pub fn reduce(&self, associated: &AssociatedSpectra) -> ReducedSpectra {
        let reduce_one = |group: &FeatureSpectra| self.reduce_feature(group);
        #[cfg(not(feature = "serial"))]
        let spectra: Vec<ReducedSpectrum> = associated
            .groups()
            .par_iter()
            .filter_map(reduce_one)
            .collect();
        #[cfg(feature = "serial")]
        let spectra: Vec<ReducedSpectrum> =
            associated.groups().iter().filter_map(reduce_one).collect();

        let out = ReducedSpectra {
            strategy: self.strategy,
            spectra,
        };
        info!(
            "Reduced spectra of {} features with {}: {} exportable",
            associated.num_features(),
            self.strategy.name(),
            out.exportable().count()
        );
        out
    }

    fn reduce_feature(&self, group: &FeatureSpectra) -> Option<ReducedSpectrum> {
        match self.strategy {
            ReductionStrategy::MaxIntensity => {
                most_intense(&group.spectra).map(|s| ReducedSpectrum::Selected(s.clone()))
            }
            ReductionStrategy::Consensus(params) => {
                consensus(group.feature, &group.spectra, &params).map(ReducedSpectrum::Consensus)
            }
        }
    }
}

/// Ordering used to pick the representative spectrum: largest total
/// intensity, then earliest sample, then earliest scan.
fn representative_order(a: &Ms2Spectrum, b: &Ms2Spectrum) -> Ordering {
    b.total_intensity()
        .total_cmp(&a.total_intensity())
        .then(a.sample.cmp(&b.sample))
        .then(a.scan_index.cmp(&b.scan_index))
}

/// The spectrum with the largest total intensity.
pub fn most_intense(spectra: &[Ms2Spectrum]) -> Option<&Ms2Spectrum> {
    spectra.iter().min_by(|a, b| representative_order(a, b))
}

struct PeakGroup {
    mz_sum: f64,
    count: usize,
    intensity_sum: f64,
    intensity_max: f32,
    spectra: Vec<usize>,
}

impl PeakGroup {
    fn new(mz: f64, intensity: f32, spectrum: usize) -> Self {
        Self {
            mz_sum: mz,
            count: 1,
            intensity_sum: intensity as f64,
            intensity_max: intensity,
            spectra: vec![spectrum],
        }
    }

    fn mean_mz(&self) -> f64 {
        self.mz_sum / self.count as f64
    }

    fn push(&mut self, mz: f64, intensity: f32, spectrum: usize) {
        self.mz_sum += mz;
        self.count += 1;
        self.intensity_sum += intensity as f64;
        self.intensity_max = self.intensity_max.max(intensity);
        if !self.spectra.contains(&spectrum) {
            self.spectra.push(spectrum);
        }
    }
}

/// Consensus of a feature's spectra by peak presence voting.
///
/// Peaks of all spectra are pooled and sorted by m/z; each peak joins the
/// current group when it is within tolerance of the group's running mean
/// m/z. A group is kept when the fraction of distinct spectra contributing
/// to it is at least `min_prop`. Returns `None` only without spectra; a
/// consensus where nothing survives is returned empty.
pub fn consensus(
    feature: FeatureId,
    spectra: &[Ms2Spectrum],
    params: &ConsensusParams,
) -> Option<ConsensusSpectrum> {
    let representative = most_intense(spectra)?;
    let n = spectra.len();

    let mut pooled: Vec<(f64, f32, usize)> = spectra
        .iter()
        .enumerate()
        .flat_map(|(idx, s)| {
            s.mz.iter()
                .zip(s.intensity.iter())
                .map(move |(&mz, &int)| (mz, int, idx))
        })
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));

    let mut groups: Vec<PeakGroup> = Vec::new();
    for (mz, intensity, idx) in pooled {
        match groups.last_mut() {
            Some(group) if params.tolerance.matches(group.mean_mz(), mz) => {
                group.push(mz, intensity, idx)
            }
            _ => groups.push(PeakGroup::new(mz, intensity, idx)),
        }
    }

    let needed = params.min_prop * n as f64 - MIN_PROP_EPSILON;
    let peaks = groups
        .iter()
        .filter(|g| g.spectra.len() as f64 >= needed)
        .map(|g| ConsensusPeak {
            mz: g.mean_mz(),
            intensity: match params.intensity {
                ConsensusIntensity::Mean => (g.intensity_sum / g.count as f64) as f32,
                ConsensusIntensity::Max => g.intensity_max,
            },
            fraction: g.spectra.len() as f64 / n as f64,
        })
        .collect();

    Some(ConsensusSpectrum {
        feature,
        precursor_mz: representative.precursor_mz,
        precursor_charge: representative.precursor_charge,
        rt_seconds: representative.rt_seconds,
        sample: representative.sample,
        num_contributing: n,
        peaks,
    })
}
