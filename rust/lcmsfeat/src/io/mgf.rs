//! MGF export following the feature-based molecular networking conventions:
//! every record carries `FEATURE_ID` and `SCANS` set to the feature id, so
//! spectra can be joined back to the quantification table.

use std::io::Write;

use crate::models::{
    ConsensusSpectrum,
    FeatureId,
    Ms2Spectrum,
};
use crate::ms2::{
    AssociatedSpectra,
    ReducedSpectra,
    ReducedSpectrum,
};

/// What an MGF record needs from a spectrum.
pub trait MgfRecord {
    fn feature(&self) -> Option<FeatureId>;
    fn precursor_mz(&self) -> f64;
    fn precursor_charge(&self) -> Option<u8>;
    fn rt_seconds(&self) -> f32;
    fn peaks(&self) -> Vec<(f64, f32)>;
}

impl MgfRecord for Ms2Spectrum {
    fn feature(&self) -> Option<FeatureId> {
        self.feature_id()
    }

    fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }

    fn precursor_charge(&self) -> Option<u8> {
        self.precursor_charge
    }

    fn rt_seconds(&self) -> f32 {
        self.rt_seconds
    }

    fn peaks(&self) -> Vec<(f64, f32)> {
        self.mz
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
            .collect()
    }
}

impl MgfRecord for ConsensusSpectrum {
    fn feature(&self) -> Option<FeatureId> {
        Some(self.feature)
    }

    fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }

    fn precursor_charge(&self) -> Option<u8> {
        self.precursor_charge
    }

    fn rt_seconds(&self) -> f32 {
        self.rt_seconds
    }

    fn peaks(&self) -> Vec<(f64, f32)> {
        self.peaks.iter().map(|p| (p.mz, p.intensity)).collect()
    }
}

impl MgfRecord for ReducedSpectrum {
    fn feature(&self) -> Option<FeatureId> {
        ReducedSpectrum::feature(self)
    }

    fn precursor_mz(&self) -> f64 {
        match self {
            ReducedSpectrum::Selected(s) => s.precursor_mz,
            ReducedSpectrum::Consensus(c) => c.precursor_mz,
        }
    }

    fn precursor_charge(&self) -> Option<u8> {
        match self {
            ReducedSpectrum::Selected(s) => s.precursor_charge,
            ReducedSpectrum::Consensus(c) => c.precursor_charge,
        }
    }

    fn rt_seconds(&self) -> f32 {
        match self {
            ReducedSpectrum::Selected(s) => s.rt_seconds,
            ReducedSpectrum::Consensus(c) => c.rt_seconds,
        }
    }

    fn peaks(&self) -> Vec<(f64, f32)> {
        match self {
            ReducedSpectrum::Selected(s) => MgfRecord::peaks(s),
            ReducedSpectrum::Consensus(c) => MgfRecord::peaks(c),
        }
    }
}

/// Writes one `BEGIN IONS` / `END IONS` block.
///
/// Records without a feature are skipped, since they cannot be joined.
pub fn write_record(writer: &mut impl Write, record: &impl MgfRecord) -> std::io::Result<()> {
    let Some(feature) = record.feature() else {
        return Ok(());
    };
    writeln!(writer, "BEGIN IONS")?;
    writeln!(writer, "FEATURE_ID={}", feature)?;
    writeln!(writer, "PEPMASS={:.6}", record.precursor_mz())?;
    writeln!(writer, "SCANS={}", feature)?;
    writeln!(writer, "RTINSECONDS={:.3}", record.rt_seconds())?;
    if let Some(charge) = record.precursor_charge() {
        writeln!(writer, "CHARGE={}+", charge)?;
    }
    writeln!(writer, "MSLEVEL=2")?;
    for (mz, intensity) in record.peaks() {
        writeln!(writer, "{:.6} {}", mz, intensity)?;
    }
    writeln!(writer, "END IONS")?;
    writeln!(writer)?;
    Ok(())
}

/// Every associated spectrum, grouped by feature.
pub fn write_associated(
    writer: &mut impl Write,
    spectra: &AssociatedSpectra,
) -> std::io::Result<usize> {
    let mut count = 0;
    for group in spectra.groups() {
        for spectrum in group.spectra.iter() {
            write_record(writer, spectrum)?;
            count += 1;
        }
    }
    Ok(count)
}

/// One record per feature; empty reduced spectra are left out.
pub fn write_reduced(
    writer: &mut impl Write,
    reduced: &ReducedSpectra,
) -> std::io::Result<usize> {
    let mut count = 0;
    for spectrum in reduced.exportable() {
        write_record(writer, spectrum)?;
        count += 1;
    }
    Ok(count)
}
