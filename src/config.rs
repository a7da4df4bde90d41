//! YAML-loadable solver settings.
//!
//! Every section and every field is optional; anything left out takes its
//! default.
//!
//! ```yaml
//! exact:
//!   max_cities: 18
//! tempering:
//!   cooling_rate: 0.995
//! experiment:
//!   cities: 12
//!   seeds: [1, 2, 3]
//!   pipelines:
//!     - construction: { method: beam, width: 8, branching: 3 }
//!       refinement: tempering
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::construct::Construction;
use crate::error::TspResult;
use crate::exact::HeldKarp;
use crate::harness::{ExperimentConfig, Pipeline, Refinement};
use crate::ils::IlsConfig;
use crate::multi_chain::MultiChainConfig;
use crate::tempering::TemperingConfig;
use crate::three_opt::ThreeOptConfig;
use crate::two_opt::TwoOptConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub exact: HeldKarp,
    pub two_opt: TwoOptConfig,
    pub three_opt: ThreeOptConfig,
    pub tempering: TemperingConfig,
    pub multi_chain: MultiChainConfig,
    pub ils: IlsConfig,
    pub experiment: ExperimentConfig,
    /// Used by `solve` when the instance exceeds the exact ceiling.
    pub fallback: Pipeline,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            exact: HeldKarp::default(),
            two_opt: TwoOptConfig::default(),
            three_opt: ThreeOptConfig::default(),
            tempering: TemperingConfig::default(),
            multi_chain: MultiChainConfig::default(),
            ils: IlsConfig::default(),
            experiment: ExperimentConfig::default(),
            fallback: Pipeline::new(Construction::MultiStartNearestNeighbor)
                .refined(Refinement::MultiChain),
        }
    }
}

impl SolverConfig {
    pub fn from_yaml_str(s: &str) -> TspResult<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> TspResult<Self> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    pub fn to_yaml(&self) -> TspResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> TspResult<()> {
        self.exact.validate()?;
        self.two_opt.validate()?;
        self.three_opt.validate()?;
        self.tempering.validate()?;
        self.multi_chain.validate()?;
        self.ils.validate()?;
        self.experiment.validate(&self.exact)?;
        self.fallback.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TspError;

    #[test]
    fn test_default_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        assert_eq!(SolverConfig::from_yaml_str("{}").unwrap(), SolverConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let c = SolverConfig::from_yaml_str(
            "exact:\n  max_cities: 12\ntempering:\n  cooling_rate: 0.9\nexperiment:\n  cities: 9\n",
        )
        .unwrap();
        assert_eq!(c.exact.max_cities, 12);
        assert_eq!(c.tempering.cooling_rate, 0.9);
        assert_eq!(c.tempering.max_iterations, 5000);
        assert_eq!(c.experiment.cities, 9);
        assert_eq!(c.experiment.seeds, (100..110).collect::<Vec<u64>>());
        assert_eq!(c.two_opt, TwoOptConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let c = SolverConfig::default();
        assert_eq!(SolverConfig::from_yaml_str(&c.to_yaml().unwrap()).unwrap(), c);
    }

    #[test]
    fn test_rejects_bad_values() {
        let r = SolverConfig::from_yaml_str("tempering:\n  cooling_rate: 1.5\n");
        assert!(matches!(r, Err(TspError::InvalidConfig { .. })));
        let r = SolverConfig::from_yaml_str("experiment:\n  cities: 15\nexact:\n  max_cities: 12\n");
        assert!(matches!(r, Err(TspError::InvalidConfig { .. })));
        let r = SolverConfig::from_yaml_str("exact: [1, 2]");
        assert!(matches!(r, Err(TspError::Yaml(_))));
    }

    #[test]
    fn test_missing_file() {
        let r = SolverConfig::from_path(Path::new("/nonexistent/tsp-lab.yaml"));
        assert!(matches!(r, Err(TspError::Io(_))));
    }
}
