//! Recovery of the signal of samples that have no peak for a feature.

use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    info,
    warn,
};

use crate::errors::ConfigError;
use crate::models::{
    FeatureSet,
    PeakSet,
    SampleValue,
    ScanStore,
};
use crate::utils::TupleRange;

/// Used when there are no peaks to take a median width from.
const FALLBACK_HALF_WIDTH_SECONDS: f32 = 5.0;

/// Half-width of the retention time window integrated around a feature apex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum GapFillWidth {
    /// Median rt width over every detected peak of the run.
    #[default]
    #[serde(rename = "median_peak_width")]
    MedianPeakWidth,
    /// Fixed half-width, in seconds.
    #[serde(rename = "fixed")]
    Fixed(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GapFillParams {
    pub half_width: GapFillWidth,
}

impl GapFillParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.half_width {
            GapFillWidth::Fixed(w) if !(w.is_finite() && w >= 0.0) => {
                Err(ConfigError::OutOfRange {
                    field: "gap_filling.half_width",
                    value: w as f64,
                    expected: "a finite, non-negative number of seconds",
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GapFiller {
    params: GapFillParams,
}

impl GapFiller {
    pub fn new(params: GapFillParams) -> Self {
        Self { params }
    }

    pub fn half_width(&self, peaks: &PeakSet) -> f32 {
        match self.params.half_width {
            GapFillWidth::Fixed(w) => w,
            GapFillWidth::MedianPeakWidth => peaks.median_rt_width().unwrap_or_else(|| {
                warn!(
                    "No peaks to derive a gap filling width from, using {}s",
                    FALLBACK_HALF_WIDTH_SECONDS
                );
                FALLBACK_HALF_WIDTH_SECONDS
            }),
        }
    }

    /// Fills every empty (feature, sample) slot with the summed MS1 signal
    /// in the feature's m/z range around its apex.
    ///
    /// Detected values are left untouched and no peaks are created. Zero is
    /// a valid filled value.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "debug")
    )]
    pub fn fill(&self, features: FeatureSet, peaks: &PeakSet, store: &ScanStore) -> FeatureSet {
        let half_width = self.half_width(peaks);
        let num_samples = features.num_samples();
        let windows: Vec<_> = features
            .features()
            .iter()
            .map(|f| (f.mz_range, TupleRange::spanning(f.rt - half_width, f.rt + half_width)))
            .collect();

        // Sample-major: one column of filled values per sample.
        let fill_column = |sample_idx: usize| -> Vec<Option<f64>> {
            let Some(sample) = store.sample(sample_idx) else {
                return vec![Some(0.0); windows.len()];
            };
            features
                .features()
                .iter()
                .zip(windows.iter())
                .map(|(feature, (mz_range, rt_range))| match feature.value(sample_idx) {
                    Some(_) => None,
                    None => Some(sample.summed_intensity_in(*mz_range, *rt_range)),
                })
                .collect()
        };
        #[cfg(not(feature = "serial"))]
        let columns: Vec<Vec<Option<f64>>> = (0..num_samples)
            .into_par_iter()
            .map(fill_column)
            .collect();
        #[cfg(feature = "serial")]
        let columns: Vec<Vec<Option<f64>>> = (0..num_samples).map(fill_column).collect();

        let mut num_filled = 0;
        let mut filled = features.features().to_vec();
        for (sample_idx, column) in columns.into_iter().enumerate() {
            for (feature, value) in filled.iter_mut().zip(column) {
                if let Some(area) = value {
                    feature.values[sample_idx] = Some(SampleValue::Filled { area });
                    num_filled += 1;
                }
            }
        }
        info!(
            "Gap filled {} values over {} features (half-width {:.2}s)",
            num_filled,
            filled.len(),
            half_width
        );
        FeatureSet::into_filled(filled, num_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChromPeak,
        Feature,
        MsLevel,
        SampleScans,
        Scan,
    };

    fn sample(name: &str, points: &[(f32, f64, f32)]) -> SampleScans {
        // One scan per second, with the given (rt, mz, intensity) points.
        let scans = (0..200)
            .map(|i| {
                let rt = i as f32;
                let mut mz = Vec::new();
                let mut intensity = Vec::new();
                for &(prt, pmz, pint) in points {
                    if prt == rt {
                        mz.push(pmz);
                        intensity.push(pint);
                    }
                }
                Scan {
                    index: i,
                    ms_level: MsLevel::MS1,
                    rt_seconds: rt,
                    mz,
                    intensity,
                    precursor: None,
                }
            })
            .collect();
        SampleScans::try_new(name, "g", scans).unwrap()
    }

    fn feature_set() -> FeatureSet {
        let feature = Feature {
            id: 0,
            mz: 200.0,
            mz_range: TupleRange::try_new(199.999, 200.001).unwrap(),
            rt: 105.0,
            rt_range: TupleRange::try_new(100.0, 110.0).unwrap(),
            npeaks: 1,
            samples_per_group: vec![1],
            values: vec![Some(SampleValue::Detected { peak: 0, area: 42.0 }), None],
        };
        FeatureSet::new(vec![feature], 2)
    }

    fn peaks() -> PeakSet {
        let peak = ChromPeak {
            sample: 0,
            mz: 200.0,
            mz_range: TupleRange::try_new(199.999, 200.001).unwrap(),
            rt: 105.0,
            rt_range: TupleRange::try_new(100.0, 110.0).unwrap(),
            area: 42.0,
            area_baseline_corrected: 42.0,
            max_intensity: 10.0,
            baseline: 0.0,
            signal_to_noise: 50.0,
        };
        PeakSet::from_per_sample(vec![vec![peak], vec![]])
    }

    #[test]
    fn test_missing_sample_gets_window_sum() {
        let store = ScanStore::new(vec![
            sample("a", &[(105.0, 200.0, 10.0)]),
            // 5000 inside the window, signal outside the window is ignored.
            sample(
                "b",
                &[
                    (103.0, 200.0, 2000.0),
                    (105.0, 200.0, 3000.0),
                    (105.0, 200.5, 9999.0),
                    (150.0, 200.0, 9999.0),
                ],
            ),
        ]);
        let filler = GapFiller::new(GapFillParams::default());
        let filled = filler.fill(feature_set(), &peaks(), &store);

        assert!(filled.is_gap_filled());
        let f = &filled.features()[0];
        assert!(f.is_complete());
        assert_eq!(f.value(1), Some(SampleValue::Filled { area: 5000.0 }));
        assert_eq!(
            f.value(0),
            Some(SampleValue::Detected {
                peak: 0,
                area: 42.0
            })
        );
    }

    #[test]
    fn test_no_signal_fills_zero() {
        let store = ScanStore::new(vec![sample("a", &[]), sample("b", &[])]);
        let filler = GapFiller::new(GapFillParams {
            half_width: GapFillWidth::Fixed(3.0),
        });
        let filled = filler.fill(feature_set(), &peaks(), &store);
        assert_eq!(
            filled.features()[0].value(1),
            Some(SampleValue::Filled { area: 0.0 })
        );
    }

    #[test]
    fn test_half_width_defaults_to_median_peak_width() {
        let filler = GapFiller::new(GapFillParams::default());
        assert_eq!(filler.half_width(&peaks()), 10.0);
        assert_eq!(filler.half_width(&PeakSet::default()), FALLBACK_HALF_WIDTH_SECONDS);
    }
}
