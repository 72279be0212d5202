pub mod config;
pub mod correspondence;
pub mod errors;
pub mod gap_filling;
pub mod io;
pub mod models;
pub mod ms2;
pub mod peak_detection;
pub mod pipeline;
pub mod table;
pub mod utils;

pub use config::{
    PipelineConfig,
    ReductionKind,
    ValidatedConfig,
};
pub use errors::{
    LcmsFeatError,
    Result,
};
pub use io::{
    JsonScanDecoder,
    SampleInput,
    ScanDecoder,
};
pub use models::{
    ChromPeak,
    Feature,
    FeatureId,
    FeatureSet,
    MzTolerance,
    PeakSet,
    SampleScans,
    Scan,
    ScanStore,
};
pub use pipeline::{
    Pipeline,
    PipelineOutput,
    RunReport,
    SampleFailure,
};
