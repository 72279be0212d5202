//! Reading scans and writing results.

pub mod mgf;
mod quant_table;
mod scans;

use std::io::Write;

pub use quant_table::write_quant_table;
pub use scans::{
    JsonScanDecoder,
    SampleInput,
    ScanDecoder,
    load_sample,
};

use crate::errors::DataProcessingError;
use crate::pipeline::RunReport;

/// Pretty printed JSON summary of a run.
pub fn write_summary(writer: impl Write, report: &RunReport) -> Result<(), DataProcessingError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
