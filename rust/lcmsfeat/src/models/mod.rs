mod chrom_peak;
mod feature;
mod scan;
mod spectrum;
pub mod tolerance;

pub use chrom_peak::{
    ChromPeak,
    PeakId,
    PeakSet,
};
pub use feature::{
    Feature,
    FeatureId,
    FeatureSet,
    SampleValue,
};
pub use scan::{
    MsLevel,
    Precursor,
    SampleId,
    SampleInfo,
    SampleScans,
    Scan,
    ScanStore,
};
pub use spectrum::{
    ConsensusPeak,
    ConsensusSpectrum,
    Ms2Spectrum,
};
pub use tolerance::MzTolerance;
