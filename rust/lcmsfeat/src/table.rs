//! Feature x sample quantification tables.

use serde::Serialize;
use tracing::info;

use crate::errors::DataProcessingError;
use crate::models::{
    FeatureId,
    FeatureSet,
    SampleInfo,
};
use crate::ms2::{
    ReducedSpectra,
    ReductionStrategy,
};
use crate::utils::TupleRange;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantificationRow {
    pub feature: FeatureId,
    pub label: String,
    pub mz: f64,
    pub mz_range: TupleRange<f64>,
    pub rt: f32,
    pub rt_range: TupleRange<f32>,
    pub npeaks: usize,
    /// One value per sample, in sample id order.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuantificationTable {
    samples: Vec<SampleInfo>,
    rows: Vec<QuantificationRow>,
}

impl QuantificationTable {
    /// Joins feature metadata with the per-sample values.
    ///
    /// Missing values are allowed until the features are gap filled; after
    /// that a missing value is an error.
    pub fn from_features(
        features: &FeatureSet,
        samples: &[SampleInfo],
    ) -> Result<Self, DataProcessingError> {
        let mut rows = Vec::with_capacity(features.len());
        for feature in features.features() {
            let mut values = Vec::with_capacity(samples.len());
            for sample in samples {
                let value = feature.value(sample.id).map(|v| v.area());
                if value.is_none() && features.is_gap_filled() {
                    return Err(DataProcessingError::MissingSampleValue {
                        feature: feature.id,
                        sample: sample.id,
                    });
                }
                values.push(value);
            }
            rows.push(QuantificationRow {
                feature: feature.id,
                label: feature.label(),
                mz: feature.mz,
                mz_range: feature.mz_range,
                rt: feature.rt,
                rt_range: feature.rt_range,
                npeaks: feature.npeaks,
                values,
            });
        }
        Ok(Self {
            samples: samples.to_vec(),
            rows,
        })
    }

    /// Rows of the given features only, keeping the table's row order.
    pub fn subset(&self, ids: &[FeatureId]) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|r| ids.contains(&r.feature))
            .cloned()
            .collect();
        Self {
            samples: self.samples.clone(),
            rows,
        }
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    pub fn rows(&self) -> &[QuantificationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A table restricted to the features one reduction strategy kept.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyView {
    pub strategy: ReductionStrategy,
    pub table: QuantificationTable,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableViews {
    pub full: QuantificationTable,
    pub by_strategy: Vec<StrategyView>,
}

impl TableViews {
    /// The full table plus one view per reduction.
    ///
    /// A view keeps the features that have an exportable spectrum for its
    /// strategy, so the max-intensity view holds every feature with MS2 data
    /// and the consensus view those with a non-empty consensus.
    pub fn build(
        features: &FeatureSet,
        samples: &[SampleInfo],
        reductions: &[ReducedSpectra],
    ) -> Result<Self, DataProcessingError> {
        let full = QuantificationTable::from_features(features, samples)?;
        let by_strategy: Vec<StrategyView> = reductions
            .iter()
            .map(|reduced| StrategyView {
                strategy: reduced.strategy,
                table: full.subset(&reduced.feature_ids()),
            })
            .collect();
        for view in by_strategy.iter() {
            info!(
                "Table view {}: {} of {} features",
                view.strategy.name(),
                view.table.len(),
                full.len()
            );
        }
        Ok(Self { full, by_strategy })
    }

    pub fn view(&self, strategy_name: &str) -> Option<&QuantificationTable> {
        self.by_strategy
            .iter()
            .find(|v| v.strategy.name() == strategy_name)
            .map(|v| &v.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Feature,
        SampleValue,
    };

    fn infos() -> Vec<SampleInfo> {
        vec![
            SampleInfo {
                id: 0,
                name: "a".into(),
                group: "g".into(),
            },
            SampleInfo {
                id: 1,
                name: "b".into(),
                group: "g".into(),
            },
        ]
    }

    fn feature(mz: f64, values: Vec<Option<SampleValue>>) -> Feature {
        Feature {
            id: 0,
            mz,
            mz_range: TupleRange::try_new(mz - 0.001, mz + 0.001).unwrap(),
            rt: 100.0,
            rt_range: TupleRange::try_new(95.0, 105.0).unwrap(),
            npeaks: 1,
            samples_per_group: vec![1],
            values,
        }
    }

    #[test]
    fn test_missing_values_allowed_before_gap_filling() {
        let features = FeatureSet::new(
            vec![feature(
                200.0,
                vec![Some(SampleValue::Detected { peak: 0, area: 3.0 }), None],
            )],
            2,
        );
        let table = QuantificationTable::from_features(&features, &infos()).unwrap();
        assert_eq!(table.rows()[0].values, vec![Some(3.0), None]);
        assert_eq!(table.rows()[0].label, "FT0001");

        let filled = FeatureSet::into_filled(features.features().to_vec(), 2);
        assert!(matches!(
            QuantificationTable::from_features(&filled, &infos()),
            Err(DataProcessingError::MissingSampleValue {
                feature: 1,
                sample: 1
            })
        ));
    }

    #[test]
    fn test_subset_keeps_order() {
        let value = Some(SampleValue::Filled { area: 1.0 });
        let features = FeatureSet::new(
            vec![
                feature(100.0, vec![value, value]),
                feature(200.0, vec![value, value]),
                feature(300.0, vec![value, value]),
            ],
            2,
        );
        let table = QuantificationTable::from_features(&features, &infos()).unwrap();
        let sub = table.subset(&[3, 1]);
        let ids: Vec<FeatureId> = sub.rows().iter().map(|r| r.feature).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(sub.samples().len(), 2);
    }
}
