use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    DataReadingError,
    MalformedScanReason,
};
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};

/// Position of a sample in the [`ScanStore`], also used as its id.
pub type SampleId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MsLevel {
    MS1,
    MS2,
}

impl TryFrom<u8> for MsLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MsLevel::MS1),
            2 => Ok(MsLevel::MS2),
            other => Err(format!("unsupported MS level {}", other)),
        }
    }
}

impl From<MsLevel> for u8 {
    fn from(value: MsLevel) -> Self {
        match value {
            MsLevel::MS1 => 1,
            MsLevel::MS2 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precursor {
    pub mz: f64,
    #[serde(default)]
    pub charge: Option<u8>,
    #[serde(default)]
    pub isolation_window: Option<TupleRange<f64>>,
}

/// A single mass spectrum, as handed over by a decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// Native scan number / index within the file.
    pub index: usize,
    pub ms_level: MsLevel,
    pub rt_seconds: f32,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
    #[serde(default)]
    pub precursor: Option<Precursor>,
}

impl Scan {
    pub fn validate(&self) -> Result<(), MalformedScanReason> {
        if self.mz.len() != self.intensity.len() {
            return Err(MalformedScanReason::MismatchedArrayLengths {
                mz: self.mz.len(),
                intensity: self.intensity.len(),
            });
        }
        if !self.rt_seconds.is_finite()
            || self.mz.iter().any(|x| !x.is_finite())
            || self.intensity.iter().any(|x| !x.is_finite())
        {
            return Err(MalformedScanReason::NonFiniteValue);
        }
        if self.intensity.iter().any(|&x| x < 0.0) {
            return Err(MalformedScanReason::NegativeIntensity);
        }
        if let Some(position) = self.mz.windows(2).position(|w| w[1] <= w[0]) {
            return Err(MalformedScanReason::NonIncreasingMz {
                position: position + 1,
            });
        }
        match (self.ms_level, &self.precursor) {
            (MsLevel::MS2, None) => Err(MalformedScanReason::MissingPrecursor),
            (MsLevel::MS2, Some(p)) if !p.mz.is_finite() => Err(MalformedScanReason::NonFiniteValue),
            _ => Ok(()),
        }
    }

    /// Index range of the peaks whose m/z lies in `mz_range`.
    pub fn mz_slice(&self, mz_range: TupleRange<f64>) -> std::ops::Range<usize> {
        binary_search_range_by_key(&self.mz, mz_range.start(), mz_range.end(), |x| *x)
    }

    pub fn summed_intensity_in(&self, mz_range: TupleRange<f64>) -> f64 {
        self.intensity[self.mz_slice(mz_range)]
            .iter()
            .map(|&x| x as f64)
            .sum()
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().map(|&x| x as f64).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub id: SampleId,
    pub name: String,
    pub group: String,
}

/// All scans of one sample, validated and split by MS level.
///
/// Both scan vectors are sorted by retention time.
#[derive(Debug, Clone)]
pub struct SampleScans {
    pub info: SampleInfo,
    ms1: Vec<Scan>,
    ms2: Vec<Scan>,
}

impl SampleScans {
    /// Validates and sorts the scans of a sample.
    ///
    /// The id is provisional; [`ScanStore::new`] renumbers samples.
    pub fn try_new(
        name: impl Into<String>,
        group: impl Into<String>,
        scans: Vec<Scan>,
    ) -> Result<Self, DataReadingError> {
        let mut ms1 = Vec::new();
        let mut ms2 = Vec::new();
        for scan in scans {
            scan.validate()
                .map_err(|reason| DataReadingError::MalformedScan {
                    scan_index: scan.index,
                    reason,
                })?;
            match scan.ms_level {
                MsLevel::MS1 => ms1.push(scan),
                MsLevel::MS2 => ms2.push(scan),
            }
        }
        if ms1.is_empty() {
            return Err(DataReadingError::NoMs1Scans);
        }
        ms1.sort_by(|a, b| a.rt_seconds.total_cmp(&b.rt_seconds).then(a.index.cmp(&b.index)));
        ms2.sort_by(|a, b| a.rt_seconds.total_cmp(&b.rt_seconds).then(a.index.cmp(&b.index)));

        Ok(Self {
            info: SampleInfo {
                id: 0,
                name: name.into(),
                group: group.into(),
            },
            ms1,
            ms2,
        })
    }

    pub fn id(&self) -> SampleId {
        self.info.id
    }

    pub fn ms1(&self) -> &[Scan] {
        &self.ms1
    }

    pub fn ms2(&self) -> &[Scan] {
        &self.ms2
    }

    /// Median spacing between consecutive MS1 scans, in seconds.
    pub fn median_scan_interval(&self) -> Option<f32> {
        let diffs: Vec<f32> = self
            .ms1
            .windows(2)
            .map(|w| w[1].rt_seconds - w[0].rt_seconds)
            .filter(|d| *d > 0.0)
            .collect();
        crate::utils::stats::median_f32(&diffs)
    }

    /// MS1 scans with retention time inside `rt_range` (inclusive).
    pub fn ms1_in_rt(&self, rt_range: TupleRange<f32>) -> &[Scan] {
        let idx = binary_search_range_by_key(&self.ms1, rt_range.start(), rt_range.end(), |s| {
            s.rt_seconds
        });
        &self.ms1[idx]
    }

    /// Summed intensity of every MS1 data point inside the m/z x rt box.
    pub fn summed_intensity_in(&self, mz_range: TupleRange<f64>, rt_range: TupleRange<f32>) -> f64 {
        self.ms1_in_rt(rt_range)
            .iter()
            .map(|s| s.summed_intensity_in(mz_range))
            .sum()
    }

    /// Extracted ion chromatogram over the box: one `(rt, summed intensity)`
    /// point per MS1 scan in the rt range.
    pub fn extract_trace(
        &self,
        mz_range: TupleRange<f64>,
        rt_range: TupleRange<f32>,
    ) -> (Vec<f32>, Vec<f32>) {
        self.ms1_in_rt(rt_range)
            .iter()
            .map(|s| (s.rt_seconds, s.summed_intensity_in(mz_range) as f32))
            .unzip()
    }
}

/// Read-only collection of every ingested sample.
#[derive(Debug, Clone, Default)]
pub struct ScanStore {
    samples: Vec<SampleScans>,
    groups: Vec<String>,
}

impl ScanStore {
    /// Takes ownership of the samples, numbering them in the given order.
    pub fn new(mut samples: Vec<SampleScans>) -> Self {
        let mut groups: Vec<String> = Vec::new();
        for (i, sample) in samples.iter_mut().enumerate() {
            sample.info.id = i;
            if !groups.contains(&sample.info.group) {
                groups.push(sample.info.group.clone());
            }
        }
        Self { samples, groups }
    }

    pub fn samples(&self) -> &[SampleScans] {
        &self.samples
    }

    pub fn sample(&self, id: SampleId) -> Option<&SampleScans> {
        self.samples.get(id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn infos(&self) -> Vec<SampleInfo> {
        self.samples.iter().map(|s| s.info.clone()).collect()
    }

    /// Distinct group labels, in order of first appearance.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Index into [`Self::groups`] for every sample.
    pub fn group_indices(&self) -> Vec<usize> {
        self.samples
            .iter()
            .map(|s| {
                self.groups
                    .iter()
                    .position(|g| *g == s.info.group)
                    .unwrap_or_default()
            })
            .collect()
    }
}
