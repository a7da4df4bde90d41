use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::construct::nearest_neighbor;
use crate::error::{TspError, TspResult};
use crate::instance::Instance;
use crate::tour::Tour;
use crate::two_opt::{two_opt, TwoOptConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlsConfig {
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Random position swaps per kick.
    #[serde(default = "default_kick_strength")]
    pub kick_strength: usize,
}

fn default_time_limit_ms() -> u64 {
    2000
}

fn default_max_iterations() -> usize {
    200
}

fn default_kick_strength() -> usize {
    4
}

impl Default for IlsConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: default_time_limit_ms(),
            max_iterations: default_max_iterations(),
            kick_strength: default_kick_strength(),
        }
    }
}

impl IlsConfig {
    pub fn validate(&self) -> TspResult<()> {
        if self.kick_strength == 0 {
            return Err(TspError::invalid_config("ils.kick_strength must be positive"));
        }
        Ok(())
    }
}

struct Timer {
    t: Instant,
    duration: Duration,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            t: Instant::now(),
            duration,
        }
    }

    pub fn ok(&self) -> bool {
        self.t.elapsed() < self.duration
    }
}

/// Swaps `strength` random pairs of positions, leaving position 0 alone.
pub fn swap_kick<'a, R: Rng + ?Sized>(tour: &Tour<'a>, strength: usize, rng: &mut R) -> Tour<'a> {
    let n = tour.len();
    let mut t = tour.clone();
    if n < 3 {
        return t;
    }
    for _ in 0..strength {
        let a = rng.gen_range(1..n);
        let b = rng.gen_range(1..n);
        t.swap(a, b);
    }
    t.refresh_cost();
    t
}

/// Kick, re-optimize, keep the result only if it beats the best so far.
pub struct Solver<'a> {
    timer: Timer,
    rng: Pcg64,
    max_iterations: usize,
    kick_strength: usize,
    two_opt: TwoOptConfig,
    cur: Tour<'a>,
    bst: Tour<'a>,
}

impl<'a> Solver<'a> {
    /// Starts from nearest neighbor at city 0, polished by 2-opt.
    pub fn new(tsp: &'a Instance, duration: Duration, seed: u64) -> Self {
        let two_opt_config = TwoOptConfig::default();
        let (t, _) = two_opt(&nearest_neighbor(tsp, 0), &two_opt_config);
        Self::from_tour(t, duration, seed)
    }

    pub fn from_tour(t: Tour<'a>, duration: Duration, seed: u64) -> Self {
        let defaults = IlsConfig::default();
        Self {
            timer: Timer::new(duration),
            rng: Pcg64::seed_from_u64(seed),
            max_iterations: usize::MAX,
            kick_strength: defaults.kick_strength,
            two_opt: TwoOptConfig::default(),
            cur: t.clone(),
            bst: t,
        }
    }

    pub fn with_config(
        t: Tour<'a>,
        config: &IlsConfig,
        two_opt_config: &TwoOptConfig,
        seed: u64,
    ) -> TspResult<Self> {
        config.validate()?;
        let mut s = Self::from_tour(t, Duration::from_millis(config.time_limit_ms), seed);
        s.max_iterations = config.max_iterations;
        s.kick_strength = config.kick_strength;
        s.two_opt = *two_opt_config;
        Ok(s)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Runs until the time budget or the iteration cap is spent and returns
    /// the number of iterations performed.
    pub fn run(&mut self) -> usize {
        let mut cnt = 0;
        while cnt < self.max_iterations && self.timer.ok() {
            cnt += 1;
            let kicked = swap_kick(&self.cur, self.kick_strength, &mut self.rng);
            self.cur = two_opt(&kicked, &self.two_opt).0;
            if self.cur.cost() < self.bst.cost() {
                self.bst = self.cur.clone();
                debug!(iteration = cnt, cost = self.bst.cost(), "ils improved");
            } else {
                self.cur = self.bst.clone();
            }
        }
        info!(iterations = cnt, best = self.bst.cost(), "ils finished");
        cnt
    }

    pub fn solution(&self) -> &Tour<'a> {
        &self.bst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_kick_valid() {
        let tsp = Instance::random(10, 8).unwrap();
        let t = nearest_neighbor(&tsp, 0);
        let mut rng = Pcg64::seed_from_u64(3);
        let k = swap_kick(&t, 4, &mut rng);
        assert!(k.is_valid());
        assert_eq!(k.start(), 0);
        assert!((k.cost() - tsp.path_cost(&k.closed())).abs() < 1e-9);
    }

    #[test]
    fn test_solver_never_regresses() {
        let tsp = Instance::random(16, 12).unwrap();
        let start = nearest_neighbor(&tsp, 0);
        let mut s = Solver::from_tour(start.clone(), Duration::from_secs(60), 1)
            .with_max_iterations(50);
        assert_eq!(s.run(), 50);
        assert!(s.solution().cost() <= start.cost());
        assert!(s.solution().is_valid());
    }

    #[test]
    fn test_solver_reproducible_with_iteration_cap() {
        let tsp = Instance::random(14, 5).unwrap();
        let run = || {
            let mut s = Solver::new(&tsp, Duration::from_secs(60), 4234).with_max_iterations(30);
            s.run();
            s.solution().clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_zero_budget() {
        let tsp = Instance::random(8, 5).unwrap();
        let mut s = Solver::new(&tsp, Duration::ZERO, 1);
        assert_eq!(s.run(), 0);
    }

    #[test]
    fn test_with_config_validates() {
        let tsp = Instance::random(8, 5).unwrap();
        let cfg = IlsConfig {
            kick_strength: 0,
            ..IlsConfig::default()
        };
        let r = Solver::with_config(
            nearest_neighbor(&tsp, 0),
            &cfg,
            &TwoOptConfig::default(),
            1,
        );
        assert!(r.is_err());
    }
}
