use std::fs::File;
use std::io::BufReader;
use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use crate::errors::DataReadingError;
use crate::models::{
    SampleScans,
    Scan,
};

/// One input file and the labels of the sample it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInput {
    pub path: PathBuf,
    pub name: String,
    pub group: String,
}

/// Source of the scans of one acquisition file.
///
/// Vendor formats live behind this trait; the pipeline only sees [`Scan`]s.
pub trait ScanDecoder: Sync {
    fn decode(&self, path: &Path) -> Result<Vec<Scan>, DataReadingError>;
}

/// Reads scans from a JSON document of the form `{"scans": [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonScanDecoder;

#[derive(Debug, Deserialize)]
struct ScanDocument {
    scans: Vec<Scan>,
}

impl JsonScanDecoder {
    pub fn decode_reader(
        &self,
        reader: impl std::io::Read,
    ) -> Result<Vec<Scan>, DataReadingError> {
        let doc: ScanDocument = serde_json::from_reader(reader)?;
        Ok(doc.scans)
    }
}

impl ScanDecoder for JsonScanDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<Scan>, DataReadingError> {
        let file = File::open(path).map_err(|e| DataReadingError::from(e).with_path(path))?;
        let scans = self
            .decode_reader(BufReader::new(file))
            .map_err(|e| e.with_path(path))?;
        debug!("Decoded {} scans from {}", scans.len(), path.display());
        Ok(scans)
    }
}

/// Decodes and validates one sample.
pub fn load_sample(
    input: &SampleInput,
    decoder: &impl ScanDecoder,
) -> Result<SampleScans, DataReadingError> {
    let scans = decoder.decode(&input.path)?;
    SampleScans::try_new(input.name.clone(), input.group.clone(), scans)
}
