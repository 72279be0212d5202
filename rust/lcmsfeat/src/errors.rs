use std::fmt::Display;
use std::path::PathBuf;

use crate::models::{
    FeatureId,
    SampleId,
};

#[derive(Debug)]
pub enum LcmsFeatError {
    DataReading(DataReadingError),
    Config(ConfigError),
    DataProcessing(DataProcessingError),
}

impl Display for LcmsFeatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataReading(e) => write!(f, "Error reading data: {}", e),
            Self::Config(e) => write!(f, "Invalid configuration: {}", e),
            Self::DataProcessing(e) => write!(f, "Error processing data: {}", e),
        }
    }
}

impl std::error::Error for LcmsFeatError {}

pub type Result<T> = std::result::Result<T, LcmsFeatError>;

/// Problems with a single input file.
///
/// These are fatal for the sample they belong to, never for the run.
#[derive(Debug)]
pub enum DataReadingError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Parse {
        msg: String,
        path: Option<PathBuf>,
    },
    MalformedScan {
        scan_index: usize,
        reason: MalformedScanReason,
    },
    NoMs1Scans,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MalformedScanReason {
    MismatchedArrayLengths { mz: usize, intensity: usize },
    NonIncreasingMz { position: usize },
    NonFiniteValue,
    NegativeIntensity,
    MissingPrecursor,
}

impl Display for MalformedScanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MismatchedArrayLengths { mz, intensity } => write!(
                f,
                "m/z and intensity arrays differ in length ({} vs {})",
                mz, intensity
            ),
            Self::NonIncreasingMz { position } => {
                write!(f, "m/z values are not strictly increasing at {}", position)
            }
            Self::NonFiniteValue => write!(f, "found a NaN or infinite value"),
            Self::NegativeIntensity => write!(f, "found a negative intensity"),
            Self::MissingPrecursor => write!(f, "MS2 scan without precursor information"),
        }
    }
}

impl Display for DataReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "Error reading file {}: {}", path.display(), source),
                None => write!(f, "Error reading file: {}", source),
            },
            Self::Parse { msg, path } => match path {
                Some(path) => write!(f, "Error parsing {}: {}", path.display(), msg),
                None => write!(f, "Error parsing scans: {}", msg),
            },
            Self::MalformedScan { scan_index, reason } => {
                write!(f, "Malformed scan {}: {}", scan_index, reason)
            }
            Self::NoMs1Scans => write!(f, "No MS1 scans found"),
        }
    }
}

impl std::error::Error for DataReadingError {}

impl From<std::io::Error> for DataReadingError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<serde_json::Error> for DataReadingError {
    fn from(x: serde_json::Error) -> Self {
        Self::Parse {
            msg: x.to_string(),
            path: None,
        }
    }
}

impl DataReadingError {
    /// Attaches the file path to errors that can carry one.
    pub fn with_path(self, new_path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Io { source, .. } => Self::Io {
                source,
                path: Some(new_path.into()),
            },
            Self::Parse { msg, .. } => Self::Parse {
                msg,
                path: Some(new_path.into()),
            },
            other => other,
        }
    }
}

/// Parameter problems, rejected before any data is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    InvertedRange {
        field: &'static str,
        low: f64,
        high: f64,
    },
    NoSamples,
    DuplicateSampleName(String),
    NoReductionStrategies,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                value,
                expected,
            } => write!(f, "{} = {} but expected {}", field, value, expected),
            Self::InvertedRange { field, low, high } => {
                write!(f, "{} range is inverted ({} > {})", field, low, high)
            }
            Self::NoSamples => write!(f, "no samples were provided"),
            Self::DuplicateSampleName(name) => write!(f, "sample name {:?} is used twice", name),
            Self::NoReductionStrategies => write!(f, "at least one reduction strategy is needed"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum DataProcessingError {
    MissingSampleValue {
        feature: FeatureId,
        sample: SampleId,
    },
    SpectrumOutsideFeature {
        feature: FeatureId,
        precursor_mz: f64,
        rt_seconds: f32,
    },
    Csv(csv::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSampleValue { feature, sample } => write!(
                f,
                "feature {} has no value for sample {} after gap filling",
                feature, sample
            ),
            Self::SpectrumOutsideFeature {
                feature,
                precursor_mz,
                rt_seconds,
            } => write!(
                f,
                "spectrum (precursor {:.4}, rt {:.2}s) is outside feature {}",
                precursor_mz, rt_seconds, feature
            ),
            Self::Csv(e) => write!(f, "{}", e),
            Self::Json(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DataProcessingError {}

impl From<csv::Error> for DataProcessingError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

impl From<serde_json::Error> for DataProcessingError {
    fn from(x: serde_json::Error) -> Self {
        Self::Json(x)
    }
}

impl From<std::io::Error> for DataProcessingError {
    fn from(x: std::io::Error) -> Self {
        Self::Io(x)
    }
}

impl From<DataReadingError> for LcmsFeatError {
    fn from(x: DataReadingError) -> Self {
        Self::DataReading(x)
    }
}

impl From<ConfigError> for LcmsFeatError {
    fn from(x: ConfigError) -> Self {
        Self::Config(x)
    }
}

impl From<DataProcessingError> for LcmsFeatError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessing(x)
    }
}
