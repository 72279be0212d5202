//! MS2 spectra: linking them to features and reducing each feature's
//! spectra to a representative one.

mod association;
mod reduction;

pub use association::{
    AssociatedSpectra,
    AssociationParams,
    FeatureSpectra,
    Ms2Associator,
    OverlapPolicy,
};
pub use reduction::{
    ConsensusIntensity,
    ConsensusParams,
    ReducedSpectra,
    ReducedSpectrum,
    ReductionStrategy,
    SpectrumReducer,
    consensus,
    most_intense,
};
