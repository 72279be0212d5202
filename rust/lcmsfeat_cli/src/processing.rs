use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;

use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use lcmsfeat::io::mgf::{
    write_associated,
    write_reduced,
};
use lcmsfeat::io::{
    write_quant_table,
    write_summary,
};
use lcmsfeat::{
    JsonScanDecoder,
    Pipeline,
    PipelineOutput,
    SampleInput,
};
use tracing::info;

use crate::error::CliError;

pub const ASSOCIATED_MGF: &str = "ms2_associated.mgf";
pub const FULL_TABLE: &str = "quant_full.tsv";
pub const SUMMARY: &str = "summary.json";

/// Runs the pipeline with a progress bar over sample loading, then writes
/// every output file.
pub fn process(
    pipeline: &Pipeline,
    inputs: &[SampleInput],
    output_dir: &Path,
) -> Result<PipelineOutput, CliError> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config(e.to_string()))?;
    let bar = ProgressBar::new(inputs.len() as u64).with_style(style);

    let output = pipeline.run_with(inputs, &JsonScanDecoder, |_| bar.inc(1))?;
    bar.finish();

    write_outputs(&output, output_dir)?;
    Ok(output)
}

fn create(dir: &Path, name: &str) -> Result<BufWriter<File>, CliError> {
    Ok(BufWriter::new(File::create(dir.join(name))?))
}

/// One MGF and one table per reduction, plus the unreduced spectra, the
/// full table and the run summary.
pub fn write_outputs(output: &PipelineOutput, dir: &Path) -> Result<(), CliError> {
    let mut writer = create(dir, ASSOCIATED_MGF)?;
    let count = write_associated(&mut writer, &output.associated)?;
    writer.flush()?;
    info!("Wrote {} spectra to {}", count, ASSOCIATED_MGF);

    write_quant_table(create(dir, FULL_TABLE)?, &output.tables.full)?;
    info!(
        "Wrote {} features to {}",
        output.tables.full.len(),
        FULL_TABLE
    );

    for (reduced, view) in output.reduced.iter().zip(output.tables.by_strategy.iter()) {
        let name = reduced.strategy.name();

        let mgf_name = format!("ms2_{}.mgf", name);
        let mut writer = create(dir, &mgf_name)?;
        let count = write_reduced(&mut writer, reduced)?;
        writer.flush()?;

        let table_name = format!("quant_{}.tsv", name);
        write_quant_table(create(dir, &table_name)?, &view.table)?;
        info!(
            "Wrote {} spectra to {} and {} features to {}",
            count,
            mgf_name,
            view.table.len(),
            table_name
        );
    }

    let mut writer = create(dir, SUMMARY)?;
    write_summary(&mut writer, &output.report)?;
    writer.flush()?;
    Ok(())
}
