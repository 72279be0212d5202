use std::path::{
    Path,
    PathBuf,
};

use lcmsfeat::{
    PipelineConfig,
    SampleInput,
};
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use crate::error::CliError;

/// Group assigned when neither the config nor the pattern names one.
pub const DEFAULT_GROUP: &str = "default";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub samples: Vec<SampleEntry>,
    /// Regex applied to the file stem; the first capture group is the
    /// sample group.
    #[serde(default)]
    pub group_pattern: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub threads: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SampleEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

fn file_stem(path: &Path) -> Result<String, CliError> {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| CliError::Config(format!("No file name in path {}", path.display())))
}

impl Config {
    /// Names default to the file stem, groups to the pattern capture.
    pub fn sample_inputs(&self) -> Result<Vec<SampleInput>, CliError> {
        let pattern = self.group_pattern.as_deref().map(Regex::new).transpose()?;

        self.samples
            .iter()
            .map(|entry| {
                let stem = file_stem(&entry.path)?;
                let group = match (&entry.group, &pattern) {
                    (Some(group), _) => group.clone(),
                    (None, Some(re)) => match re.captures(&stem).and_then(|c| c.get(1)) {
                        Some(m) => m.as_str().to_string(),
                        None => {
                            warn!(
                                "Group pattern does not match {}, using '{}'",
                                stem, DEFAULT_GROUP
                            );
                            DEFAULT_GROUP.to_string()
                        }
                    },
                    (None, None) => DEFAULT_GROUP.to_string(),
                };
                Ok(SampleInput {
                    path: entry.path.clone(),
                    name: entry.name.clone().unwrap_or(stem),
                    group,
                })
            })
            .collect()
    }
}
