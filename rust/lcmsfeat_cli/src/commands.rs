use std::path::PathBuf;

use lcmsfeat::Pipeline;
use tracing::{
    info,
    instrument,
};

use crate::cli::{
    RunArgs,
    WriteTemplateArgs,
};
use crate::config::{
    Config,
    OutputConfig,
};
use crate::error::CliError;
use crate::processing::process;

/// Threads used when neither the flag nor the config sets a count.
fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

/// Main function for the 'run' subcommand.
#[instrument]
pub fn main_run(args: RunArgs) -> Result<(), CliError> {
    let mut config: Config = serde_json::from_str(&std::fs::read_to_string(&args.config)?)?;

    // Command line arguments win over the config file.
    if let Some(output_dir) = args.output_dir {
        config.output = Some(OutputConfig {
            directory: output_dir,
        });
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    let output = config.output.clone().ok_or_else(|| {
        CliError::Config(
            "No output directory provided, please provide one in either the config file or with the --output-dir flag"
                .to_string(),
        )
    })?;

    // Everything is validated before any data is read.
    let pipeline = Pipeline::new(config.pipeline.clone())?;
    let inputs = config.sample_inputs()?;
    info!("Parsed configuration: {:#?}", config);

    let threads = config.threads.unwrap_or_else(default_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    info!("Using {} threads", threads);

    std::fs::create_dir_all(&output.directory)?;
    let result = process(&pipeline, &inputs, &output.directory)?;

    let report = &result.report;
    info!(
        "Finished: {} features from {} samples ({} failed), {} spectra associated",
        report.num_features,
        report.samples.len(),
        report.failures.len(),
        report.num_spectra_associated
    );
    Ok(())
}

const CONFIG_TEMPLATE: &str = r#"{
  "samples": [
    { "path": "data/ctrl_01.json" },
    { "path": "data/ctrl_02.json" },
    { "path": "data/treated_01.json", "name": "treated_A", "group": "treated" }
  ],
  "group_pattern": "^([a-z]+)_\\d+$",
  "pipeline": {
    "peak_detection": {
      "ppm": 10.0,
      "peak_width": [5.0, 30.0],
      "snthresh": 10.0,
      "prefilter": [3, 100.0]
    },
    "correspondence": {
      "mz_tolerance": { "ppm": 10.0 },
      "bandwidth": 5.0,
      "min_fraction": 0.5
    },
    "gap_filling": {
      "half_width": "median_peak_width"
    },
    "consensus": {
      "min_prop": 0.5,
      "tolerance": { "either": { "da": 0.01, "ppm": 10.0 } }
    },
    "reductions": ["max_intensity", "consensus"]
  },
  "output": { "directory": "results" }
}"#;

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let output_path = args.output_path;
    std::fs::create_dir_all(&output_path)?;
    let path: PathBuf = output_path.join("lcmsfeat_config.json");
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    info!("Template written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_and_validates() {
        let config: Config = serde_json::from_str(CONFIG_TEMPLATE).unwrap();
        assert!(Pipeline::new(config.pipeline.clone()).is_ok());
        let inputs = config.sample_inputs().unwrap();
        assert_eq!(inputs[0].group, "ctrl");
        assert_eq!(inputs[2].group, "treated");
        assert_eq!(inputs[2].name, "treated_A");
    }
}
