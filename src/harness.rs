//! Pipelines and the optimality-gap experiment.
//!
//! ```text
//! gap = (cost - optimal) / optimal · 100
//! ```

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min};
use tracing::{debug, info};

use crate::config::SolverConfig;
use crate::construct::Construction;
use crate::error::{TspError, TspResult};
use crate::exact::HeldKarp;
use crate::ils::Solver;
use crate::instance::Instance;
use crate::multi_chain::{chain_seed, multi_chain};
use crate::tempering::temper;
use crate::three_opt::three_opt;
use crate::tour::Tour;
use crate::two_opt::two_opt;
use crate::NodeId;

/// Costs within this distance of the optimum count as optimal hits.
pub const OPTIMAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refinement {
    #[default]
    None,
    Tempering,
    MultiChain,
    Ils,
}

/// Construction, optional 2-opt and 3-opt, optional escape layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub construction: Construction,
    #[serde(default)]
    pub start: NodeId,
    #[serde(default = "default_two_opt")]
    pub two_opt: bool,
    #[serde(default)]
    pub three_opt: bool,
    #[serde(default)]
    pub refinement: Refinement,
}

fn default_two_opt() -> bool {
    true
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Construction::default())
    }
}

impl Pipeline {
    pub fn new(construction: Construction) -> Self {
        Self {
            name: None,
            construction,
            start: 0,
            two_opt: true,
            three_opt: false,
            refinement: Refinement::None,
        }
    }

    pub fn without_two_opt(mut self) -> Self {
        self.two_opt = false;
        self
    }

    pub fn with_three_opt(mut self) -> Self {
        self.three_opt = true;
        self
    }

    pub fn refined(mut self, refinement: Refinement) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let mut s = self.construction.name();
        if self.two_opt {
            s.push_str("+2opt");
        }
        if self.three_opt {
            s.push_str("+3opt");
        }
        match self.refinement {
            Refinement::None => {}
            Refinement::Tempering => s.push_str("+tempering"),
            Refinement::MultiChain => s.push_str("+chains"),
            Refinement::Ils => s.push_str("+ils"),
        }
        s
    }

    pub fn validate(&self) -> TspResult<()> {
        self.construction.validate()
    }

    pub fn run<'a>(&self, tsp: &'a Instance, config: &SolverConfig, seed: u64) -> TspResult<Tour<'a>> {
        let mut t = self.construction.build(tsp, self.start)?;
        if self.two_opt {
            t = two_opt(&t, &config.two_opt).0;
        }
        if self.three_opt {
            t = three_opt(&t, &config.three_opt).0;
        }
        t = match self.refinement {
            Refinement::None => t,
            Refinement::Tempering => {
                let mut rng = Pcg64::seed_from_u64(seed);
                temper(&t, &config.tempering, &config.two_opt, &mut rng)?.best
            }
            Refinement::MultiChain => multi_chain(&t, &config.multi_chain, &config.two_opt, seed)?.best,
            Refinement::Ils => {
                let mut s = Solver::with_config(t, &config.ils, &config.two_opt, seed)?;
                s.run();
                s.solution().clone()
            }
        };
        debug!(pipeline = %self.label(), cost = t.cost(), "pipeline finished");
        Ok(t)
    }
}

pub fn default_pipelines() -> Vec<Pipeline> {
    vec![
        Pipeline::new(Construction::NearestNeighbor).without_two_opt(),
        Pipeline::new(Construction::NearestNeighbor),
        Pipeline::new(Construction::MultiStartNearestNeighbor),
        Pipeline::new(Construction::Lookahead { weight: 0.5 }),
        Pipeline::new(Construction::AngularSweep),
        Pipeline::new(Construction::MultiAngleSweep { starts: 5 }),
        Pipeline::new(Construction::WeightedSpiral { angle_weight: 0.7 }),
        Pipeline::new(Construction::Grid { size: 4 }),
        Pipeline::new(Construction::MultiGrid {
            min_size: 3,
            max_size: 6,
        }),
        Pipeline::new(Construction::Beam {
            width: 5,
            branching: 3,
        }),
        Pipeline::new(Construction::NearestNeighbor).with_three_opt(),
        Pipeline::new(Construction::NearestNeighbor).refined(Refinement::Tempering),
        Pipeline::new(Construction::MultiStartNearestNeighbor).refined(Refinement::MultiChain),
        Pipeline::new(Construction::NearestNeighbor).refined(Refinement::Ils),
    ]
}

/// Percentage by which `cost` exceeds `optimal`.
pub fn gap(cost: f64, optimal: f64) -> f64 {
    if optimal > 0.0 {
        (cost - optimal) / optimal * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub pipeline: String,
    pub cost: f64,
    pub gap_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub seed: u64,
    pub cities: usize,
    pub optimal_cost: f64,
    pub states: usize,
    pub results: Vec<PipelineResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapSummary {
    pub pipeline: String,
    pub instances: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub optimal_hits: usize,
}

impl GapSummary {
    pub fn from_gaps(pipeline: String, gaps: Vec<f64>) -> Self {
        let optimal_hits = gaps.iter().filter(|&&g| g.abs() < OPTIMAL_TOLERANCE).count();
        let instances = gaps.len();
        if instances == 0 {
            return Self {
                pipeline,
                instances,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                std_dev: 0.0,
                optimal_hits,
            };
        }
        let data = Data::new(gaps);
        let std_dev = if instances > 1 {
            data.std_dev().unwrap_or(0.0)
        } else {
            0.0
        };
        Self {
            pipeline,
            instances,
            mean: data.mean().unwrap_or(0.0),
            min: data.min(),
            max: data.max(),
            std_dev,
            optimal_hits,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub instances: Vec<InstanceReport>,
    pub summaries: Vec<GapSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_cities")]
    pub cities: usize,
    /// Instance seeds for [`Instance::random`].
    #[serde(default = "default_seeds")]
    pub seeds: Vec<u64>,
    /// Master seed for the randomized refinements.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_pipelines")]
    pub pipelines: Vec<Pipeline>,
}

fn default_cities() -> usize {
    10
}

fn default_seeds() -> Vec<u64> {
    (100..110).collect()
}

fn default_seed() -> u64 {
    42
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            seeds: default_seeds(),
            seed: default_seed(),
            pipelines: default_pipelines(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self, exact: &HeldKarp) -> TspResult<()> {
        if self.cities < 2 || self.cities > exact.max_cities {
            return Err(TspError::invalid_config(format!(
                "experiment.cities must be in 2..={}, got {}",
                exact.max_cities, self.cities
            )));
        }
        if self.seeds.is_empty() {
            return Err(TspError::invalid_config("experiment.seeds is empty"));
        }
        if self.pipelines.is_empty() {
            return Err(TspError::invalid_config("experiment.pipelines is empty"));
        }
        self.pipelines.iter().try_for_each(Pipeline::validate)
    }
}

/// `count` consecutive seeds from `first`, stopping at `u64::MAX`.
pub fn seed_range(first: u64, count: u64) -> Vec<u64> {
    (first..first.saturating_add(count)).collect()
}

/// Solves every seeded instance exactly and with every pipeline.
pub fn run_experiment(config: &SolverConfig) -> TspResult<ExperimentReport> {
    config.validate()?;
    let exp = &config.experiment;
    let mut instances = Vec::with_capacity(exp.seeds.len());
    for (idx, &seed) in exp.seeds.iter().enumerate() {
        let tsp = Instance::random(exp.cities, seed)?;
        let exact = config.exact.solve(&tsp)?;
        let optimal = exact.tour.cost();
        let results = exp
            .pipelines
            .iter()
            .map(|p| {
                let t = p.run(&tsp, config, chain_seed(exp.seed, idx))?;
                Ok(PipelineResult {
                    pipeline: p.label(),
                    cost: t.cost(),
                    gap_percent: gap(t.cost(), optimal),
                })
            })
            .collect::<TspResult<Vec<_>>>()?;
        info!(seed, optimal, "instance finished");
        instances.push(InstanceReport {
            seed,
            cities: exp.cities,
            optimal_cost: optimal,
            states: exact.states,
            results,
        });
    }

    let summaries = exp
        .pipelines
        .iter()
        .enumerate()
        .map(|(k, p)| {
            let gaps = instances.iter().map(|r| r.results[k].gap_percent).collect();
            GapSummary::from_gaps(p.label(), gaps)
        })
        .collect();
    Ok(ExperimentReport {
        instances,
        summaries,
    })
}
