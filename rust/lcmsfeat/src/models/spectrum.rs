use serde::Serialize;

use super::{
    Feature,
    FeatureId,
    SampleId,
    Scan,
};
use crate::errors::DataProcessingError;

/// An MS2 spectrum lifted out of the scan store, with its feature link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ms2Spectrum {
    pub sample: SampleId,
    pub scan_index: usize,
    pub precursor_mz: f64,
    pub precursor_charge: Option<u8>,
    pub rt_seconds: f32,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
    feature: Option<FeatureId>,
}

impl Ms2Spectrum {
    /// Returns `None` for scans without precursor information.
    pub fn from_scan(sample: SampleId, scan: &Scan) -> Option<Self> {
        let precursor = scan.precursor.as_ref()?;
        Some(Self {
            sample,
            scan_index: scan.index,
            precursor_mz: precursor.mz,
            precursor_charge: precursor.charge,
            rt_seconds: scan.rt_seconds,
            mz: scan.mz.clone(),
            intensity: scan.intensity.clone(),
            feature: None,
        })
    }

    /// Drops every peak with zero intensity.
    pub fn clean_zero_peaks(&mut self) {
        let (mz, intensity): (Vec<f64>, Vec<f32>) = self
            .mz
            .iter()
            .zip(self.intensity.iter())
            .filter(|(_, int)| **int > 0.0)
            .map(|(mz, int)| (*mz, *int))
            .unzip();
        self.mz = mz;
        self.intensity = intensity;
    }

    pub fn num_peaks(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().map(|&x| x as f64).sum()
    }

    pub fn feature_id(&self) -> Option<FeatureId> {
        self.feature
    }

    /// Links the spectrum to `feature`, checking that the precursor actually
    /// falls inside the feature's m/z and retention time ranges.
    pub fn assign_to(&mut self, feature: &Feature) -> Result<(), DataProcessingError> {
        if !feature.contains(self.precursor_mz, self.rt_seconds) {
            return Err(DataProcessingError::SpectrumOutsideFeature {
                feature: feature.id,
                precursor_mz: self.precursor_mz,
                rt_seconds: self.rt_seconds,
            });
        }
        self.feature = Some(feature.id);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsensusPeak {
    pub mz: f64,
    pub intensity: f32,
    /// Fraction of the contributing spectra with a peak in this group.
    pub fraction: f64,
}

/// A representative spectrum merged from all spectra of one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusSpectrum {
    pub feature: FeatureId,
    pub precursor_mz: f64,
    pub precursor_charge: Option<u8>,
    pub rt_seconds: f32,
    /// Sample of the most intense contributing spectrum.
    pub sample: SampleId,
    pub num_contributing: usize,
    pub peaks: Vec<ConsensusPeak>,
}

impl ConsensusSpectrum {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}
