use std::collections::HashSet;

use serde::{
    Deserialize,
    Serialize,
};

use crate::correspondence::CorrespondenceParams;
use crate::errors::ConfigError;
use crate::gap_filling::GapFillParams;
use crate::io::SampleInput;
use crate::ms2::{
    AssociationParams,
    ConsensusParams,
    ReductionStrategy,
};
use crate::peak_detection::PeakDetectionParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionKind {
    #[serde(rename = "max_intensity")]
    MaxIntensity,
    #[serde(rename = "consensus")]
    Consensus,
}

/// Every tunable of a run. Missing sections fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub peak_detection: PeakDetectionParams,
    pub correspondence: CorrespondenceParams,
    pub gap_filling: GapFillParams,
    pub association: AssociationParams,
    pub consensus: ConsensusParams,
    /// Reductions to run, in export order.
    pub reductions: Vec<ReductionKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            peak_detection: PeakDetectionParams::default(),
            correspondence: CorrespondenceParams::default(),
            gap_filling: GapFillParams::default(),
            association: AssociationParams::default(),
            consensus: ConsensusParams::default(),
            reductions: vec![ReductionKind::MaxIntensity, ReductionKind::Consensus],
        }
    }
}

/// A configuration that passed [`PipelineConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    config: PipelineConfig,
    strategies: Vec<ReductionStrategy>,
}

impl ValidatedConfig {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[ReductionStrategy] {
        &self.strategies
    }
}

impl PipelineConfig {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        self.peak_detection.validate()?;
        self.correspondence.validate()?;
        self.gap_filling.validate()?;
        if self.reductions.is_empty() {
            return Err(ConfigError::NoReductionStrategies);
        }

        let mut seen = HashSet::new();
        let mut strategies = Vec::new();
        for kind in self.reductions.iter() {
            if !seen.insert(*kind) {
                continue;
            }
            let strategy = match kind {
                ReductionKind::MaxIntensity => ReductionStrategy::MaxIntensity,
                ReductionKind::Consensus => ReductionStrategy::Consensus(self.consensus),
            };
            strategy.validate()?;
            strategies.push(strategy);
        }
        Ok(ValidatedConfig {
            config: self,
            strategies,
        })
    }
}

/// Rejects an empty sample list and duplicated sample names.
pub fn validate_inputs(inputs: &[SampleInput]) -> Result<(), ConfigError> {
    if inputs.is_empty() {
        return Err(ConfigError::NoSamples);
    }
    let mut names = HashSet::new();
    for input in inputs {
        if !names.insert(input.name.as_str()) {
            return Err(ConfigError::DuplicateSampleName(input.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "peak_detection": {"ppm": 5.0, "peak_width": [3.0, 20.0]},
                "consensus": {"min_prop": 0.8, "tolerance": {"da": 0.02}},
                "reductions": ["consensus"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.peak_detection.ppm, 5.0);
        assert_eq!(config.peak_detection.snthresh, 10.0);
        assert_eq!(config.correspondence, CorrespondenceParams::default());

        let validated = config.validate().unwrap();
        assert_eq!(validated.strategies().len(), 1);
        assert_eq!(validated.strategies()[0].name(), "consensus");
    }

    #[test]
    fn test_bad_values_are_rejected_eagerly() {
        let mut config = PipelineConfig::default();
        config.consensus.min_prop = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "consensus.min_prop",
                ..
            })
        ));

        let mut config = PipelineConfig::default();
        config.correspondence.min_fraction = 2.0;
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            reductions: vec![],
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::NoReductionStrategies
        );
    }

    #[test]
    fn test_duplicate_reductions_collapse() {
        let config = PipelineConfig {
            reductions: vec![ReductionKind::MaxIntensity, ReductionKind::MaxIntensity],
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().strategies().len(), 1);
    }

    #[test]
    fn test_inputs_need_unique_names() {
        let input = |name: &str| SampleInput {
            path: format!("{}.json", name).into(),
            name: name.to_string(),
            group: "g".to_string(),
        };
        assert_eq!(validate_inputs(&[]), Err(ConfigError::NoSamples));
        assert!(validate_inputs(&[input("a"), input("b")]).is_ok());
        assert_eq!(
            validate_inputs(&[input("a"), input("a")]),
            Err(ConfigError::DuplicateSampleName("a".into()))
        );
    }
}
