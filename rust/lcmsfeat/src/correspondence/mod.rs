//! Cross-sample grouping of chromatographic peaks into features
//! (peak-density correspondence).
//!
//! Peaks are sorted by m/z and cut into bins: a new bin starts at the first
//! peak beyond the m/z tolerance of the current bin's lowest m/z. Inside a
//! bin a Gaussian kernel density over apex retention times is computed and its
//! maxima become feature centers. Every peak belongs to the center closest
//! in retention time (within two bandwidths), centers backed by too few
//! peaks are dropped, and a candidate survives only if one sample group is
//! represented well enough.

mod density;

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

use crate::errors::ConfigError;
use crate::models::{
    ChromPeak,
    Feature,
    FeatureSet,
    MzTolerance,
    PeakId,
    PeakSet,
    SampleValue,
};
use crate::utils::stats::median;
use density::RtDensity;

/// Peaks further than this many bandwidths from every center stay ungrouped.
const MAX_CENTER_DISTANCE_BANDWIDTHS: f32 = 2.0;
/// Smallest accepted kernel bandwidth. The density grid has ten points per
/// bandwidth, so its length grows without bound as the bandwidth shrinks.
pub const MIN_BANDWIDTH_SECONDS: f32 = 0.1;

/// Which peak a sample keeps when it has several in one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuplicatePeakPolicy {
    /// Closest apex to the density maximum; ties go to the larger area.
    #[default]
    #[serde(rename = "closest_rt")]
    ClosestRt,
    /// Largest area; ties go to the closer apex.
    #[serde(rename = "largest_area")]
    LargestArea,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrespondenceParams {
    pub mz_tolerance: MzTolerance,
    /// Kernel standard deviation, in seconds.
    pub bandwidth: f32,
    /// Fraction of a group's samples that must contribute a peak.
    pub min_fraction: f64,
    /// Peaks a density maximum needs to become a feature center.
    pub min_samples: usize,
    pub max_features_per_bin: usize,
    pub duplicate_peaks: DuplicatePeakPolicy,
}

impl Default for CorrespondenceParams {
    fn default() -> Self {
        Self {
            mz_tolerance: MzTolerance::Ppm(10.0),
            bandwidth: 5.0,
            min_fraction: 0.5,
            min_samples: 1,
            max_features_per_bin: 50,
            duplicate_peaks: DuplicatePeakPolicy::ClosestRt,
        }
    }
}

impl CorrespondenceParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mz_tolerance.validate("correspondence.mz_tolerance")?;
        if !(self.bandwidth.is_finite() && self.bandwidth >= MIN_BANDWIDTH_SECONDS) {
            return Err(ConfigError::OutOfRange {
                field: "correspondence.bandwidth",
                value: self.bandwidth as f64,
                expected: "at least 0.1 seconds",
            });
        }
        if !(0.0..=1.0).contains(&self.min_fraction) {
            return Err(ConfigError::OutOfRange {
                field: "correspondence.min_fraction",
                value: self.min_fraction,
                expected: "a fraction in [0, 1]",
            });
        }
        if self.max_features_per_bin == 0 {
            return Err(ConfigError::OutOfRange {
                field: "correspondence.max_features_per_bin",
                value: 0.0,
                expected: "at least 1",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CorrespondenceEngine {
    params: CorrespondenceParams,
}

impl CorrespondenceEngine {
    pub fn new(params: CorrespondenceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CorrespondenceParams {
        &self.params
    }

    /// Groups the peaks of every sample into features.
    ///
    /// `sample_groups[s]` is the group index of sample `s`; its length is the
    /// number of samples. Features come back numbered 1.. in ascending
    /// (m/z, rt) order, with only the detected values populated.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "debug")
    )]
    pub fn group(&self, peaks: &PeakSet, sample_groups: &[usize]) -> FeatureSet {
        let num_samples = sample_groups.len();
        let num_groups = sample_groups.iter().map(|g| g + 1).max().unwrap_or(0);
        let mut group_sizes = vec![0usize; num_groups];
        for g in sample_groups {
            group_sizes[*g] += 1;
        }

        let bins = self.mz_bins(peaks.peaks());
        let mut features = Vec::new();
        for bin in bins.iter() {
            for members in self.split_bin(peaks.peaks(), bin) {
                if let Some(feature) =
                    self.build_feature(peaks, &members, sample_groups, &group_sizes)
                {
                    features.push(feature);
                }
            }
        }

        features.sort_by(|a, b| a.mz.total_cmp(&b.mz).then(a.rt.total_cmp(&b.rt)));
        info!(
            "Grouped {} peaks from {} m/z bins into {} features",
            peaks.len(),
            bins.len(),
            features.len()
        );
        FeatureSet::new(features, num_samples)
    }

    /// Peak ids grouped by m/z, one vector per bin.
    ///
    /// A bin holds the peaks within tolerance of its lowest m/z, so no bin
    /// is wider than the tolerance.
    fn mz_bins(&self, peaks: &[ChromPeak]) -> Vec<Vec<PeakId>> {
        let mut order: Vec<PeakId> = (0..peaks.len()).collect();
        order.sort_by(|&a, &b| peaks[a].mz.total_cmp(&peaks[b].mz).then(a.cmp(&b)));

        let mut bins: Vec<Vec<PeakId>> = Vec::new();
        let mut bin_start_mz = f64::NEG_INFINITY;
        for id in order {
            let mz = peaks[id].mz;
            match bins.last_mut() {
                Some(bin) if self.params.mz_tolerance.matches(bin_start_mz, mz) => bin.push(id),
                _ => {
                    bins.push(vec![id]);
                    bin_start_mz = mz;
                }
            }
        }
        bins
    }

    /// Splits one m/z bin into the member lists of its feature centers.
    fn split_bin(&self, peaks: &[ChromPeak], bin: &[PeakId]) -> Vec<CenterMembers> {
        let bandwidth = self.params.bandwidth;
        let rts: Vec<f32> = bin.iter().map(|&id| peaks[id].rt).collect();
        let maxima = RtDensity::new(&rts, bandwidth).peaks();
        if maxima.is_empty() {
            return Vec::new();
        }

        let mut members: Vec<Vec<PeakId>> = vec![Vec::new(); maxima.len()];
        let max_distance = MAX_CENTER_DISTANCE_BANDWIDTHS * bandwidth;
        for (&id, &rt) in bin.iter().zip(rts.iter()) {
            let nearest = nearest_center(&maxima, rt);
            if (maxima[nearest].rt - rt).abs() <= max_distance {
                members[nearest].push(id);
            }
        }

        let mut centers: Vec<CenterMembers> = maxima
            .iter()
            .zip(members)
            .filter(|(_, m)| !m.is_empty() && m.len() >= self.params.min_samples)
            .map(|(peak, members)| CenterMembers {
                center_rt: peak.rt,
                density: peak.density,
                members,
            })
            .collect();
        if centers.len() > self.params.max_features_per_bin {
            debug!(
                "Bin with {} centers capped at {}",
                centers.len(),
                self.params.max_features_per_bin
            );
            centers.sort_by(|a, b| {
                b.density
                    .total_cmp(&a.density)
                    .then(a.center_rt.total_cmp(&b.center_rt))
            });
            centers.truncate(self.params.max_features_per_bin);
        }
        centers
    }

    fn build_feature(
        &self,
        peak_set: &PeakSet,
        center: &CenterMembers,
        sample_groups: &[usize],
        group_sizes: &[usize],
    ) -> Option<Feature> {
        let peaks = peak_set.peaks();
        let mut best: Vec<Option<PeakId>> = vec![None; sample_groups.len()];
        for &id in center.members.iter() {
            let sample = peaks[id].sample;
            best[sample] = Some(match best[sample] {
                Some(current) if !self.prefers(&peaks[id], id, &peaks[current], current, center) => {
                    current
                }
                _ => id,
            });
        }

        let mut samples_per_group = vec![0usize; group_sizes.len()];
        for (sample, kept) in best.iter().enumerate() {
            if kept.is_some() {
                samples_per_group[sample_groups[sample]] += 1;
            }
        }
        let passes = samples_per_group
            .iter()
            .zip(group_sizes.iter())
            .any(|(&count, &size)| {
                size > 0 && count > 0 && count as f64 >= self.params.min_fraction * size as f64
            });
        if !passes {
            return None;
        }

        let kept: Vec<&ChromPeak> = best.iter().flatten().map(|&id| &peaks[id]).collect();
        let mzs: Vec<f64> = kept.iter().map(|p| p.mz).collect();
        let rts: Vec<f64> = kept.iter().map(|p| p.rt as f64).collect();
        let mz_range = kept
            .iter()
            .map(|p| p.mz_range)
            .reduce(|a, b| a.union(b))?;
        let rt_range = kept
            .iter()
            .map(|p| p.rt_range)
            .reduce(|a, b| a.union(b))?;

        let values = best
            .iter()
            .map(|kept| {
                kept.map(|peak| SampleValue::Detected {
                    peak,
                    area: peaks[peak].area,
                })
            })
            .collect();

        Some(Feature {
            id: 0,
            mz: median(&mzs)?,
            mz_range,
            rt: median(&rts)? as f32,
            rt_range,
            npeaks: center.members.len(),
            samples_per_group,
            values,
        })
    }

    /// Whether peak `a` should replace `b` as its sample's representative.
    fn prefers(
        &self,
        a: &ChromPeak,
        a_id: PeakId,
        b: &ChromPeak,
        b_id: PeakId,
        center: &CenterMembers,
    ) -> bool {
        let da = (a.rt - center.center_rt).abs();
        let db = (b.rt - center.center_rt).abs();
        let ordering = match self.params.duplicate_peaks {
            DuplicatePeakPolicy::ClosestRt => {
                da.total_cmp(&db).then(b.area.total_cmp(&a.area))
            }
            DuplicatePeakPolicy::LargestArea => {
                b.area.total_cmp(&a.area).then(da.total_cmp(&db))
            }
        };
        ordering.then(a_id.cmp(&b_id)).is_lt()
    }
}

#[derive(Debug)]
struct CenterMembers {
    center_rt: f32,
    density: f64,
    members: Vec<PeakId>,
}

/// Index of the maximum closest to `rt`; ties go to the earlier maximum.
fn nearest_center(maxima: &[density::DensityPeak], rt: f32) -> usize {
    let mut best = 0;
    for (i, peak) in maxima.iter().enumerate() {
        if (peak.rt - rt).abs() < (maxima[best].rt - rt).abs() {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TupleRange;

    fn peak(sample: usize, mz: f64, rt: f32, area: f64) -> ChromPeak {
        ChromPeak {
            sample,
            mz,
            mz_range: TupleRange::try_new(mz - 0.0005, mz + 0.0005).unwrap(),
            rt,
            rt_range: TupleRange::try_new(rt - 5.0, rt + 5.0).unwrap(),
            area,
            area_baseline_corrected: area,
            max_intensity: 1000.0,
            baseline: 0.0,
            signal_to_noise: 100.0,
        }
    }

    fn peak_set(per_sample: Vec<Vec<ChromPeak>>) -> PeakSet {
        PeakSet::from_per_sample(per_sample)
    }

    #[test]
    fn test_two_samples_one_feature() {
        let peaks = peak_set(vec![
            vec![peak(0, 200.0, 105.0, 1e5)],
            vec![peak(1, 200.0004, 106.0, 2e5)],
        ]);
        let engine = CorrespondenceEngine::new(CorrespondenceParams::default());
        let features = engine.group(&peaks, &[0, 0]);
        assert_eq!(features.len(), 1);
        let f = &features.features()[0];
        assert_eq!(f.id, 1);
        assert!(f.is_complete());
        assert!(f.mz_range.contains(200.0) && f.mz_range.contains(200.0004));
        assert_eq!(f.rt_range.as_tuple(), (100.0, 111.0));
        assert_eq!(f.samples_per_group, vec![2]);
    }

    #[test]
    fn test_rt_disjoint_peaks_stay_apart() {
        let peaks = peak_set(vec![
            vec![peak(0, 200.0, 100.0, 1e5)],
            vec![peak(1, 200.0, 125.0, 1e5)],
        ]);
        let engine = CorrespondenceEngine::new(CorrespondenceParams {
            min_fraction: 0.0,
            ..Default::default()
        });
        let features = engine.group(&peaks, &[0, 0]);
        assert_eq!(features.len(), 2);
        for f in features.features() {
            assert_eq!(f.detected_peaks().count(), 1);
        }
        assert!(features.features()[0].rt < features.features()[1].rt);
    }

    #[test]
    fn test_min_fraction_filters_per_group() {
        // Only one of four samples has the peak, but it is the only sample
        // of its group.
        let peaks = peak_set(vec![
            vec![peak(0, 300.0, 50.0, 1e5)],
            vec![],
            vec![],
            vec![],
        ]);
        let strict = CorrespondenceEngine::new(CorrespondenceParams {
            min_fraction: 0.5,
            ..Default::default()
        });
        assert_eq!(strict.group(&peaks, &[0, 0, 0, 0]).len(), 0);
        assert_eq!(strict.group(&peaks, &[1, 0, 0, 0]).len(), 1);
    }

    #[test]
    fn test_duplicate_peaks_keep_closest_to_center() {
        let peaks = peak_set(vec![
            vec![peak(0, 200.0, 100.0, 1e5), peak(0, 200.0, 104.0, 9e5)],
            vec![peak(1, 200.0, 100.0, 1e5)],
            vec![peak(2, 200.0, 100.0, 1e5)],
        ]);
        let engine = CorrespondenceEngine::new(CorrespondenceParams::default());
        let features = engine.group(&peaks, &[0, 0, 0]);
        assert_eq!(features.len(), 1);
        let f = &features.features()[0];
        assert_eq!(f.npeaks, 4);
        assert_eq!(f.value(0).map(|v| v.area()), Some(1e5));

        let by_area = CorrespondenceEngine::new(CorrespondenceParams {
            duplicate_peaks: DuplicatePeakPolicy::LargestArea,
            ..Default::default()
        });
        let f = by_area.group(&peaks, &[0, 0, 0]).features()[0].clone();
        assert_eq!(f.value(0).map(|v| v.area()), Some(9e5));
    }

    #[test]
    fn test_mz_bins_split_on_gap() {
        let peaks = peak_set(vec![vec![
            peak(0, 200.0, 100.0, 1.0),
            peak(0, 200.001, 100.0, 1.0),
            peak(0, 200.1, 100.0, 1.0),
        ]]);
        let engine = CorrespondenceEngine::new(CorrespondenceParams::default());
        let bins = engine.mz_bins(peaks.peaks());
        assert_eq!(bins, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_mz_bins_do_not_drift() {
        // Each step is within 10 ppm of its neighbour, but the whole ladder
        // spans about 48 ppm.
        let ladder: Vec<Vec<ChromPeak>> = (0..6)
            .map(|k| vec![peak(k, 200.0 + k as f64 * 0.0019, 100.0, 1e5)])
            .collect();
        let peaks = peak_set(ladder);
        let engine = CorrespondenceEngine::new(CorrespondenceParams {
            min_fraction: 0.0,
            ..Default::default()
        });

        let bins = engine.mz_bins(peaks.peaks());
        assert!(bins.len() > 1);
        for bin in &bins {
            let first = peaks.peaks()[bin[0]].mz;
            let last = peaks.peaks()[*bin.last().unwrap()].mz;
            assert!(last - first <= MzTolerance::Ppm(10.0).delta(first));
        }

        let features = engine.group(&peaks, &[0; 6]);
        assert!(features.len() > 1);
        for f in features.features() {
            let lowest = f.mz_range.start() + 0.0005;
            let highest = f.mz_range.end() - 0.0005;
            assert!(highest - lowest <= MzTolerance::Ppm(10.0).delta(lowest) + 1e-9);
        }
    }

    #[test]
    fn test_tiny_bandwidth_is_rejected() {
        let params = CorrespondenceParams {
            bandwidth: 1e-4,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::OutOfRange {
                field: "correspondence.bandwidth",
                ..
            })
        ));
        let params = CorrespondenceParams {
            bandwidth: MIN_BANDWIDTH_SECONDS,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_ids_follow_mz_then_rt() {
        let peaks = peak_set(vec![vec![
            peak(0, 300.0, 10.0, 1.0),
            peak(0, 200.0, 200.0, 1.0),
            peak(0, 200.0, 50.0, 1.0),
        ]]);
        let engine = CorrespondenceEngine::new(CorrespondenceParams::default());
        let features = engine.group(&peaks, &[0]);
        let order: Vec<(f64, f32)> = features.features().iter().map(|f| (f.mz, f.rt)).collect();
        assert_eq!(order, vec![(200.0, 50.0), (200.0, 200.0), (300.0, 1e1)]);
        assert_eq!(features.get(3).map(|f| f.mz), Some(300.0));
    }
}
