//! Synthetic LC-MS/MS samples: Gaussian elution profiles on a flat
//! background, one MS1 scan per second.

#![allow(dead_code)]

use lcmsfeat::models::{
    MsLevel,
    Precursor,
};
use lcmsfeat::{
    SampleScans,
    Scan,
};

pub const NUM_SCANS: usize = 300;
pub const BACKGROUND: f32 = 20.0;

#[derive(Debug, Clone, Copy)]
pub struct SyntheticPeak {
    pub mz: f64,
    pub rt: f32,
    pub sigma: f32,
    pub height: f32,
}

impl SyntheticPeak {
    pub fn new(mz: f64, rt: f32) -> Self {
        Self {
            mz,
            rt,
            sigma: 2.5,
            height: 1e5,
        }
    }

    fn intensity_at(&self, rt: f32) -> f32 {
        let z = (rt - self.rt) / self.sigma;
        self.height * (-0.5 * z * z).exp()
    }
}

/// MS1 scans carrying the background at every `background_mzs` value and
/// the peaks on top.
pub fn ms1_scans(peaks: &[SyntheticPeak], background_mzs: &[f64]) -> Vec<Scan> {
    let mut mzs: Vec<f64> = peaks
        .iter()
        .map(|p| p.mz)
        .chain(background_mzs.iter().copied())
        .collect();
    mzs.sort_by(f64::total_cmp);
    mzs.dedup();

    (0..NUM_SCANS)
        .map(|i| {
            let rt = i as f32;
            let intensity = mzs
                .iter()
                .map(|&mz| {
                    let signal: f32 = peaks
                        .iter()
                        .filter(|p| p.mz == mz)
                        .map(|p| p.intensity_at(rt))
                        .sum();
                    let background = if background_mzs.contains(&mz) { BACKGROUND } else { 0.0 };
                    signal + background
                })
                .collect();
            Scan {
                index: i * 10,
                ms_level: MsLevel::MS1,
                rt_seconds: rt,
                mz: mzs.clone(),
                intensity,
                precursor: None,
            }
        })
        .collect()
}

pub fn ms2_scan(index: usize, rt: f32, precursor_mz: f64, peaks: &[(f64, f32)]) -> Scan {
    Scan {
        index,
        ms_level: MsLevel::MS2,
        rt_seconds: rt,
        mz: peaks.iter().map(|p| p.0).collect(),
        intensity: peaks.iter().map(|p| p.1).collect(),
        precursor: Some(Precursor {
            mz: precursor_mz,
            charge: Some(1),
            isolation_window: None,
        }),
    }
}

pub fn sample(name: &str, group: &str, peaks: &[SyntheticPeak], ms2: Vec<Scan>) -> SampleScans {
    let background: Vec<f64> = peaks.iter().map(|p| p.mz).collect();
    sample_with_background(name, group, peaks, &background, ms2)
}

pub fn sample_with_background(
    name: &str,
    group: &str,
    peaks: &[SyntheticPeak],
    background_mzs: &[f64],
    ms2: Vec<Scan>,
) -> SampleScans {
    let mut scans = ms1_scans(peaks, background_mzs);
    scans.extend(ms2);
    SampleScans::try_new(name, group, scans).unwrap()
}
