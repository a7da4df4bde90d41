use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::construct::nearest_neighbor;
use crate::error::{TspError, TspResult};
use crate::tempering::{temper, TemperingConfig, Termination};
use crate::tour::Tour;
use crate::two_opt::{two_opt, TwoOptConfig};

const STREAM_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiChainConfig {
    #[serde(default = "default_chains")]
    pub chains: usize,
    /// Each chain draws its initial temperature uniformly from this range.
    #[serde(default = "default_temperature_range")]
    pub initial_temperature: (f64, f64),
    /// Each chain draws its cooling rate uniformly from this range.
    #[serde(default = "default_cooling_range")]
    pub cooling_rate: (f64, f64),
    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
    #[serde(default = "default_chain_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_min_strength")]
    pub min_strength: usize,
    #[serde(default = "default_max_strength")]
    pub max_strength: usize,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

fn default_chains() -> usize {
    5
}

fn default_temperature_range() -> (f64, f64) {
    (500.0, 1500.0)
}

fn default_cooling_range() -> (f64, f64) {
    (0.95, 0.99)
}

fn default_min_temperature() -> f64 {
    0.01
}

fn default_chain_iterations() -> usize {
    1000
}

fn default_min_strength() -> usize {
    3
}

fn default_max_strength() -> usize {
    15
}

impl Default for MultiChainConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            initial_temperature: default_temperature_range(),
            cooling_rate: default_cooling_range(),
            min_temperature: default_min_temperature(),
            max_iterations: default_chain_iterations(),
            min_strength: default_min_strength(),
            max_strength: default_max_strength(),
            time_limit_ms: None,
        }
    }
}

impl MultiChainConfig {
    pub fn validate(&self) -> TspResult<()> {
        if self.chains == 0 {
            return Err(TspError::invalid_config("multi_chain.chains must be positive"));
        }
        let (t_lo, t_hi) = self.initial_temperature;
        let (a_lo, a_hi) = self.cooling_rate;
        if !(t_lo <= t_hi) || !(a_lo <= a_hi) {
            return Err(TspError::invalid_config(format!(
                "multi_chain ranges must be ordered, got temperature {:?} and cooling {:?}",
                self.initial_temperature, self.cooling_rate
            )));
        }
        // the range ends are themselves valid schedules
        self.schedule(t_lo, a_lo).validate()?;
        self.schedule(t_hi, a_hi).validate()
    }

    fn schedule(&self, initial_temperature: f64, cooling_rate: f64) -> TemperingConfig {
        TemperingConfig {
            initial_temperature,
            min_temperature: self.min_temperature,
            cooling_rate,
            max_iterations: self.max_iterations,
            min_strength: self.min_strength,
            max_strength: self.max_strength,
            time_limit_ms: self.time_limit_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub chain: usize,
    pub seed: u64,
    pub start_cost: f64,
    pub best_cost: f64,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone)]
pub struct MultiChainOutcome<'a> {
    pub best: Tour<'a>,
    /// Index of the chain that produced `best`.
    pub winner: usize,
    pub chains: Vec<ChainReport>,
}

/// Seed of chain `i`, spread over the 64-bit space.
pub fn chain_seed(master: u64, i: usize) -> u64 {
    master.wrapping_add((i as u64).wrapping_mul(STREAM_STRIDE))
}

/// Runs `config.chains` tempering chains and keeps the best result.
///
/// Chain 0 starts from `initial`; the others start from nearest neighbor at
/// a random city followed by 2-opt. The returned tour is never worse than
/// `initial`. Ties go to the lowest chain index.
pub fn multi_chain<'a>(
    initial: &Tour<'a>,
    config: &MultiChainConfig,
    two_opt_config: &TwoOptConfig,
    seed: u64,
) -> TspResult<MultiChainOutcome<'a>> {
    config.validate()?;
    let tsp = initial.instance();
    let results = (0..config.chains)
        .into_par_iter()
        .map(|i| -> TspResult<(Tour<'a>, ChainReport)> {
            let seed = chain_seed(seed, i);
            let mut rng = Pcg64::seed_from_u64(seed);
            let start = if i == 0 {
                initial.clone()
            } else {
                let city = rng.gen_range(0..tsp.n());
                two_opt(&nearest_neighbor(tsp, city), two_opt_config).0
            };
            let schedule = config.schedule(
                rng.gen_range(config.initial_temperature.0..=config.initial_temperature.1),
                rng.gen_range(config.cooling_rate.0..=config.cooling_rate.1),
            );
            let out = temper(&start, &schedule, two_opt_config, &mut rng)?;
            let report = ChainReport {
                chain: i,
                seed,
                start_cost: start.cost(),
                best_cost: out.best.cost(),
                initial_temperature: schedule.initial_temperature,
                cooling_rate: schedule.cooling_rate,
                iterations: out.iterations,
                termination: out.termination,
            };
            Ok((out.best, report))
        })
        .collect::<TspResult<Vec<_>>>()?;

    let mut best: Option<(usize, &Tour<'a>)> = None;
    for (i, (tour, _)) in results.iter().enumerate() {
        if best.map_or(true, |(_, b)| tour.cost() < b.cost()) {
            best = Some((i, tour));
        }
    }
    let (winner, tour) = match best.map(|(i, t)| (i, t.rotated_to(initial.start()))) {
        Some((i, t)) if t.cost() <= initial.cost() => (i, t),
        _ => (0, initial.clone()),
    };
    info!(
        chains = config.chains,
        winner,
        start = initial.cost(),
        best = tour.cost(),
        "multi-chain tempering finished"
    );
    Ok(MultiChainOutcome {
        best: tour,
        winner,
        chains: results.into_iter().map(|(_, r)| r).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn quick() -> MultiChainConfig {
        MultiChainConfig {
            chains: 4,
            max_iterations: 100,
            ..MultiChainConfig::default()
        }
    }

    #[test]
    fn test_chain_seeds_distinct() {
        let seeds: Vec<u64> = (0..8).map(|i| chain_seed(42, i)).collect();
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(chain_seed(42, 0), 42);
    }

    #[test]
    fn test_never_regresses_and_reports_each_chain() {
        let tsp = Instance::random(14, 109).unwrap();
        let start = nearest_neighbor(&tsp, 0);
        let out = multi_chain(&start, &quick(), &TwoOptConfig::default(), 7).unwrap();
        assert!(out.best.cost() <= start.cost());
        assert!(out.best.is_valid());
        assert_eq!(out.best.start(), 0);
        assert_eq!(out.chains.len(), 4);
        assert!((out.chains[out.winner].best_cost - out.best.cost()).abs() < 1e-9);
        for (i, c) in out.chains.iter().enumerate() {
            assert_eq!(c.chain, i);
            assert!(c.best_cost <= c.start_cost);
            assert!((500.0..=1500.0).contains(&c.initial_temperature));
            assert!((0.95..=0.99).contains(&c.cooling_rate));
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let tsp = Instance::random(12, 4).unwrap();
        let start = nearest_neighbor(&tsp, 0);
        let a = multi_chain(&start, &quick(), &TwoOptConfig::default(), 99).unwrap();
        let b = multi_chain(&start, &quick(), &TwoOptConfig::default(), 99).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.winner, b.winner);
    }

    #[test]
    fn test_validate() {
        let tsp = Instance::random(6, 4).unwrap();
        let start = nearest_neighbor(&tsp, 0);
        let bad = MultiChainConfig {
            chains: 0,
            ..quick()
        };
        assert!(multi_chain(&start, &bad, &TwoOptConfig::default(), 1).is_err());
        let bad = MultiChainConfig {
            cooling_rate: (0.99, 0.95),
            ..quick()
        };
        assert!(multi_chain(&start, &bad, &TwoOptConfig::default(), 1).is_err());
        let bad = MultiChainConfig {
            cooling_rate: (0.9, 1.0),
            ..quick()
        };
        assert!(multi_chain(&start, &bad, &TwoOptConfig::default(), 1).is_err());
    }
}
