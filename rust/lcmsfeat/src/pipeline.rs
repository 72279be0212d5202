//! End to end orchestration of a run.
//!
//! Stages hand immutable containers to each other:
//! scans -> peaks -> features -> gap filled features, and in parallel
//! scans -> associated spectra -> reduced spectra. The table views join the
//! two branches.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::{
    Duration,
    Instant,
};

use rayon::prelude::*;
use serde::{
    Serialize,
    Serializer,
};
use tracing::{
    info,
    warn,
};

use crate::config::{
    PipelineConfig,
    ValidatedConfig,
    validate_inputs,
};
use crate::correspondence::CorrespondenceEngine;
use crate::errors::{
    ConfigError,
    DataReadingError,
    Result,
};
use crate::gap_filling::GapFiller;
use crate::io::{
    SampleInput,
    ScanDecoder,
    load_sample,
};
use crate::models::{
    ChromPeak,
    FeatureSet,
    PeakSet,
    SampleScans,
    ScanStore,
};
use crate::ms2::{
    AssociatedSpectra,
    Ms2Associator,
    ReducedSpectra,
    SpectrumReducer,
};
use crate::peak_detection::PeakDetector;
use crate::table::TableViews;

fn serialize_display<S: Serializer, T: Display>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// A sample that could not be read. The run continues without it.
#[derive(Debug, Serialize)]
pub struct SampleFailure {
    pub sample: String,
    pub path: Option<PathBuf>,
    #[serde(serialize_with = "serialize_display")]
    pub error: DataReadingError,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleSummary {
    pub name: String,
    pub group: String,
    pub num_ms1_scans: usize,
    pub num_ms2_scans: usize,
    pub num_peaks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub name: String,
    pub num_features: usize,
    pub num_spectra: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub loading: Duration,
    pub peak_detection: Duration,
    pub correspondence: Duration,
    pub gap_filling: Duration,
    pub association: Duration,
    pub reduction: Duration,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub samples: Vec<SampleSummary>,
    pub failures: Vec<SampleFailure>,
    pub num_peaks: usize,
    pub num_features: usize,
    pub num_spectra_associated: usize,
    pub num_spectra_unassigned: usize,
    pub views: Vec<ViewSummary>,
    pub timings: StageTimings,
}

/// Everything a run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub store: ScanStore,
    pub peaks: PeakSet,
    /// Gap filled features.
    pub features: FeatureSet,
    pub associated: AssociatedSpectra,
    /// One entry per configured reduction, in configuration order.
    pub reduced: Vec<ReducedSpectra>,
    pub tables: TableViews,
    pub report: RunReport,
}

/// Samples that loaded, plus the ones that did not.
#[derive(Debug, Default)]
pub struct LoadedSamples {
    pub samples: Vec<SampleScans>,
    pub failures: Vec<SampleFailure>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ValidatedConfig,
}

impl Pipeline {
    /// Validates the configuration; nothing is read before this succeeds.
    pub fn new(config: PipelineConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config.config()
    }

    /// Decodes every input in parallel, keeping input order.
    ///
    /// A sample that fails to decode or validate is recorded as a failure.
    pub fn load_samples<D: ScanDecoder>(
        &self,
        inputs: &[SampleInput],
        decoder: &D,
    ) -> std::result::Result<LoadedSamples, ConfigError> {
        self.load_samples_with(inputs, decoder, |_| {})
    }

    /// Same as [`Pipeline::load_samples`], calling `on_loaded` once per
    /// input as soon as it has been read, successfully or not.
    ///
    /// Calls come from the worker threads in completion order.
    pub fn load_samples_with<D, F>(
        &self,
        inputs: &[SampleInput],
        decoder: &D,
        on_loaded: F,
    ) -> std::result::Result<LoadedSamples, ConfigError>
    where
        D: ScanDecoder,
        F: Fn(&SampleInput) + Sync,
    {
        validate_inputs(inputs)?;
        let results: Vec<_> = inputs
            .par_iter()
            .map(|input| {
                let result = load_sample(input, decoder);
                on_loaded(input);
                (input, result)
            })
            .collect();

        let mut loaded = LoadedSamples::default();
        for (input, result) in results {
            match result {
                Ok(sample) => loaded.samples.push(sample),
                Err(error) => {
                    warn!("Skipping sample {}: {}", input.name, error);
                    loaded.failures.push(SampleFailure {
                        sample: input.name.clone(),
                        path: Some(input.path.clone()),
                        error,
                    });
                }
            }
        }
        Ok(loaded)
    }

    pub fn run<D: ScanDecoder>(
        &self,
        inputs: &[SampleInput],
        decoder: &D,
    ) -> Result<PipelineOutput> {
        self.run_with(inputs, decoder, |_| {})
    }

    /// [`Pipeline::run`], reporting loading progress through `on_loaded`.
    pub fn run_with<D, F>(
        &self,
        inputs: &[SampleInput],
        decoder: &D,
        on_loaded: F,
    ) -> Result<PipelineOutput>
    where
        D: ScanDecoder,
        F: Fn(&SampleInput) + Sync,
    {
        let st = Instant::now();
        let loaded = self.load_samples_with(inputs, decoder, on_loaded)?;
        let loading = st.elapsed();
        info!(
            "Loaded {} of {} samples in {:?}",
            loaded.samples.len(),
            inputs.len(),
            loading
        );

        let mut output = self.run_loaded(loaded.samples)?;
        output.report.failures = loaded.failures;
        output.report.timings.loading = loading;
        Ok(output)
    }

    /// Runs every stage on samples that are already in memory.
    pub fn run_loaded(&self, samples: Vec<SampleScans>) -> Result<PipelineOutput> {
        let config = self.config.config();
        let mut timings = StageTimings::default();
        let store = ScanStore::new(samples);
        if store.is_empty() {
            warn!("No samples to process, all outputs will be empty");
        }

        let st = Instant::now();
        let peaks = self.detect_peaks(&store);
        timings.peak_detection = st.elapsed();
        info!("Detected {} peaks in {:?}", peaks.len(), timings.peak_detection);

        let st = Instant::now();
        let features = CorrespondenceEngine::new(config.correspondence.clone())
            .group(&peaks, &store.group_indices());
        timings.correspondence = st.elapsed();

        let st = Instant::now();
        let features = GapFiller::new(config.gap_filling.clone()).fill(features, &peaks, &store);
        timings.gap_filling = st.elapsed();

        let st = Instant::now();
        let associated =
            Ms2Associator::new(config.association.clone()).associate(&features, &store)?;
        timings.association = st.elapsed();

        let st = Instant::now();
        let reduced: Vec<ReducedSpectra> = self
            .config
            .strategies()
            .iter()
            .map(|strategy| SpectrumReducer::new(*strategy).reduce(&associated))
            .collect();
        timings.reduction = st.elapsed();

        let tables = TableViews::build(&features, &store.infos(), &reduced)?;

        let counts = peaks.counts_per_sample();
        let report = RunReport {
            samples: store
                .samples()
                .iter()
                .map(|s| SampleSummary {
                    name: s.info.name.clone(),
                    group: s.info.group.clone(),
                    num_ms1_scans: s.ms1().len(),
                    num_ms2_scans: s.ms2().len(),
                    num_peaks: counts.get(s.id()).copied().unwrap_or_default(),
                })
                .collect(),
            failures: Vec::new(),
            num_peaks: peaks.len(),
            num_features: features.len(),
            num_spectra_associated: associated.num_spectra(),
            num_spectra_unassigned: associated.num_unassigned,
            views: reduced
                .iter()
                .zip(tables.by_strategy.iter())
                .map(|(r, view)| ViewSummary {
                    name: r.strategy.name().to_string(),
                    num_features: view.table.len(),
                    num_spectra: r.exportable().count(),
                })
                .collect(),
            timings,
        };

        Ok(PipelineOutput {
            store,
            peaks,
            features,
            associated,
            reduced,
            tables,
            report,
        })
    }

    /// Peak detection on every sample, one sample per task.
    pub fn detect_peaks(&self, store: &ScanStore) -> PeakSet {
        let detector = PeakDetector::new(self.config.config().peak_detection.clone());
        let detect = |sample: &SampleScans| -> Vec<ChromPeak> {
            let peaks = detector.detect(sample);
            if peaks.is_empty() {
                warn!("No peaks found in sample {}", sample.info.name);
            }
            peaks
        };
        #[cfg(not(feature = "serial"))]
        let per_sample: Vec<Vec<ChromPeak>> = store.samples().par_iter().map(detect).collect();
        #[cfg(feature = "serial")]
        let per_sample: Vec<Vec<ChromPeak>> = store.samples().iter().map(detect).collect();
        PeakSet::from_per_sample(per_sample)
    }
}
