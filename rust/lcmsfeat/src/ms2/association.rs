use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

use crate::errors::DataProcessingError;
use crate::models::{
    Feature,
    FeatureId,
    FeatureSet,
    Ms2Spectrum,
    ScanStore,
};
use crate::utils::binary_search_range_by_key;

/// Which feature a spectrum goes to when several contain its precursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverlapPolicy {
    /// Feature whose rt range center is closest; ties go to the lower id.
    #[default]
    #[serde(rename = "nearest_rt_center")]
    NearestRtCenter,
    #[serde(rename = "lowest_feature_id")]
    LowestFeatureId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AssociationParams {
    pub overlap: OverlapPolicy,
}

/// The spectra linked to one feature, in (sample, rt) order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpectra {
    pub feature: FeatureId,
    pub spectra: Vec<Ms2Spectrum>,
}

/// Output of [`Ms2Associator::associate`].
///
/// Only features with at least one spectrum are present, sorted by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssociatedSpectra {
    groups: Vec<FeatureSpectra>,
    pub num_unassigned: usize,
    pub num_dropped_empty: usize,
}

impl AssociatedSpectra {
    pub fn groups(&self) -> &[FeatureSpectra] {
        &self.groups
    }

    pub fn get(&self, feature: FeatureId) -> Option<&FeatureSpectra> {
        self.groups
            .binary_search_by_key(&feature, |g| g.feature)
            .ok()
            .map(|idx| &self.groups[idx])
    }

    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.groups.iter().map(|g| g.feature).collect()
    }

    pub fn num_features(&self) -> usize {
        self.groups.len()
    }

    pub fn num_spectra(&self) -> usize {
        self.groups.iter().map(|g| g.spectra.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Lookup of features by m/z, sorted by the lower end of their m/z range.
struct FeatureIndex<'a> {
    by_mzmin: Vec<&'a Feature>,
    max_width: f64,
}

impl<'a> FeatureIndex<'a> {
    fn new(features: &'a FeatureSet) -> Self {
        let mut by_mzmin: Vec<&Feature> = features.features().iter().collect();
        by_mzmin.sort_by(|a, b| {
            a.mz_range
                .start()
                .total_cmp(&b.mz_range.start())
                .then(a.id.cmp(&b.id))
        });
        let max_width = by_mzmin
            .iter()
            .map(|f| f.mz_range.width())
            .fold(0.0, f64::max);
        Self {
            by_mzmin,
            max_width,
        }
    }

    fn containing(&self, mz: f64, rt: f32) -> impl Iterator<Item = &'a Feature> + '_ {
        let range = binary_search_range_by_key(&self.by_mzmin, mz - self.max_width, mz, |f| {
            f.mz_range.start()
        });
        self.by_mzmin[range]
            .iter()
            .copied()
            .filter(move |f| f.contains(mz, rt))
    }
}

#[derive(Debug, Clone)]
pub struct Ms2Associator {
    params: AssociationParams,
}

impl Ms2Associator {
    pub fn new(params: AssociationParams) -> Self {
        Self { params }
    }

    /// Links every MS2 spectrum of every sample to at most one feature.
    ///
    /// Zero intensity peaks are removed first and spectra left without
    /// peaks are dropped. A spectrum whose precursor falls in no feature is
    /// counted and discarded.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "debug")
    )]
    pub fn associate(
        &self,
        features: &FeatureSet,
        store: &ScanStore,
    ) -> Result<AssociatedSpectra, DataProcessingError> {
        let index = FeatureIndex::new(features);

        let mut num_dropped_empty = 0;
        let mut spectra = Vec::new();
        for sample in store.samples() {
            for scan in sample.ms2() {
                let Some(mut spectrum) = Ms2Spectrum::from_scan(sample.id(), scan) else {
                    continue;
                };
                spectrum.clean_zero_peaks();
                if spectrum.is_empty() {
                    num_dropped_empty += 1;
                    continue;
                }
                spectra.push(spectrum);
            }
        }
        let num_candidates = spectra.len();

        let assign = |mut spectrum: Ms2Spectrum| {
            let candidates = index.containing(spectrum.precursor_mz, spectrum.rt_seconds);
            match self.choose(candidates, spectrum.rt_seconds) {
                Some(feature) => {
                    spectrum.assign_to(feature)?;
                    Ok(Some(spectrum))
                }
                None => Ok::<_, DataProcessingError>(None),
            }
        };
        #[cfg(not(feature = "serial"))]
        let assigned: Vec<Option<Ms2Spectrum>> = spectra
            .into_par_iter()
            .map(assign)
            .collect::<Result<_, _>>()?;
        #[cfg(feature = "serial")]
        let assigned: Vec<Option<Ms2Spectrum>> = spectra
            .into_iter()
            .map(assign)
            .collect::<Result<_, _>>()?;

        let mut groups: Vec<FeatureSpectra> = Vec::new();
        let mut assigned: Vec<Ms2Spectrum> = assigned.into_iter().flatten().collect();
        // Stable, so spectra of one feature keep their (sample, rt) order.
        assigned.sort_by_key(|s| s.feature_id());
        for spectrum in assigned {
            let Some(feature) = spectrum.feature_id() else {
                continue;
            };
            match groups.last_mut() {
                Some(group) if group.feature == feature => group.spectra.push(spectrum),
                _ => groups.push(FeatureSpectra {
                    feature,
                    spectra: vec![spectrum],
                }),
            }
        }

        let num_assigned: usize = groups.iter().map(|g| g.spectra.len()).sum();
        let num_unassigned = num_candidates - num_assigned;
        debug!("Dropped {} spectra without peaks", num_dropped_empty);
        info!(
            "Associated {} of {} MS2 spectra with {} features",
            num_assigned,
            num_candidates,
            groups.len()
        );
        Ok(AssociatedSpectra {
            groups,
            num_unassigned,
            num_dropped_empty,
        })
    }

    fn choose<'a>(
        &self,
        candidates: impl Iterator<Item = &'a Feature>,
        rt: f32,
    ) -> Option<&'a Feature> {
        match self.params.overlap {
            OverlapPolicy::LowestFeatureId => candidates.min_by_key(|f| f.id),
            OverlapPolicy::NearestRtCenter => candidates.min_by(|a, b| {
                let da = (a.rt_range.center() - rt).abs();
                let db = (b.rt_range.center() - rt).abs();
                da.total_cmp(&db).then(a.id.cmp(&b.id))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MsLevel,
        Precursor,
        SampleScans,
        Scan,
    };
    use crate::utils::TupleRange;

    fn feature(mz: (f64, f64), rt: (f32, f32)) -> Feature {
        Feature {
            id: 0,
            mz: (mz.0 + mz.1) / 2.0,
            mz_range: TupleRange::try_new(mz.0, mz.1).unwrap(),
            rt: (rt.0 + rt.1) / 2.0,
            rt_range: TupleRange::try_new(rt.0, rt.1).unwrap(),
            npeaks: 1,
            samples_per_group: vec![1],
            values: vec![None],
        }
    }

    fn ms2(index: usize, rt: f32, precursor_mz: f64, intensity: Vec<f32>) -> Scan {
        Scan {
            index,
            ms_level: MsLevel::MS2,
            rt_seconds: rt,
            mz: (0..intensity.len()).map(|i| 50.0 + i as f64).collect(),
            intensity,
            precursor: Some(Precursor {
                mz: precursor_mz,
                charge: None,
                isolation_window: None,
            }),
        }
    }

    fn store(scans: Vec<Scan>) -> ScanStore {
        let mut all = vec![Scan {
            index: 0,
            ms_level: MsLevel::MS1,
            rt_seconds: 0.0,
            mz: vec![],
            intensity: vec![],
            precursor: None,
        }];
        all.extend(scans);
        ScanStore::new(vec![SampleScans::try_new("a", "g", all).unwrap()])
    }

    #[test]
    fn test_spectra_follow_precursor_and_rt() {
        let features = FeatureSet::new(
            vec![
                feature((199.99, 200.01), (100.0, 110.0)),
                feature((299.99, 300.01), (100.0, 110.0)),
            ],
            1,
        );
        let store = store(vec![
            ms2(1, 105.0, 200.0, vec![1.0, 2.0]),
            ms2(2, 106.0, 200.005, vec![3.0]),
            ms2(3, 120.0, 200.0, vec![3.0]),
            ms2(4, 105.0, 250.0, vec![3.0]),
            ms2(5, 105.0, 200.0, vec![0.0, 0.0]),
        ]);
        let out = Ms2Associator::new(AssociationParams::default())
            .associate(&features, &store)
            .unwrap();
        assert_eq!(out.feature_ids(), vec![1]);
        let group = out.get(1).unwrap();
        assert_eq!(
            group
                .spectra
                .iter()
                .map(|s| s.scan_index)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(group.spectra.iter().all(|s| s.feature_id() == Some(1)));
        assert_eq!(out.num_unassigned, 2);
        assert_eq!(out.num_dropped_empty, 1);
        assert!(out.get(2).is_none());
    }

    #[test]
    fn test_overlap_goes_to_nearest_rt_center() {
        let features = FeatureSet::new(
            vec![
                feature((199.99, 200.01), (100.0, 120.0)),
                feature((199.99, 200.01), (112.0, 118.0)),
            ],
            1,
        );
        let store = store(vec![
            ms2(1, 114.0, 200.0, vec![1.0]),
            // Equidistant from both centers (110 and 115).
            ms2(2, 112.5, 200.0, vec![1.0]),
        ]);
        let nearest = Ms2Associator::new(AssociationParams::default())
            .associate(&features, &store)
            .unwrap();
        assert_eq!(nearest.get(2).unwrap().spectra[0].scan_index, 1);
        assert_eq!(nearest.get(1).unwrap().spectra[0].scan_index, 2);

        let lowest = Ms2Associator::new(AssociationParams {
            overlap: OverlapPolicy::LowestFeatureId,
        })
        .associate(&features, &store)
        .unwrap();
        assert_eq!(lowest.feature_ids(), vec![1]);
        assert_eq!(lowest.num_spectra(), 2);
    }
}
