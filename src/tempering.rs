//! Macro-mutation plus simulated tempering.
//!
//! ```text
//! k(T)        = ceil(k_min + (k_max - k_min) · T / T0)
//! P(accept)   = 1                      if C' < C
//!             = exp(-(C' - C) / T)     otherwise
//! T           <- α · T
//! ```
//!
//! The candidate at each step is the 2-opt local optimum of a `k`-reversal
//! mutation of the current tour, so the walk moves between local optima.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TspError, TspResult};
use crate::tour::Tour;
use crate::two_opt::{two_opt, TwoOptConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperingConfig {
    #[serde(default = "default_initial_temperature")]
    pub initial_temperature: f64,
    /// Stop once the temperature drops below this floor.
    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
    /// Geometric cooling factor α in (0, 1).
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Segment reversals per mutation at the coldest temperature.
    #[serde(default = "default_min_strength")]
    pub min_strength: usize,
    /// Segment reversals per mutation at the initial temperature.
    #[serde(default = "default_max_strength")]
    pub max_strength: usize,
    /// Optional wall-clock cap in milliseconds.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

fn default_initial_temperature() -> f64 {
    1000.0
}

fn default_min_temperature() -> f64 {
    0.01
}

fn default_cooling_rate() -> f64 {
    0.99
}

fn default_max_iterations() -> usize {
    5000
}

fn default_min_strength() -> usize {
    3
}

fn default_max_strength() -> usize {
    15
}

impl Default for TemperingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: default_initial_temperature(),
            min_temperature: default_min_temperature(),
            cooling_rate: default_cooling_rate(),
            max_iterations: default_max_iterations(),
            min_strength: default_min_strength(),
            max_strength: default_max_strength(),
            time_limit_ms: None,
        }
    }
}

impl TemperingConfig {
    pub fn validate(&self) -> TspResult<()> {
        if !(self.initial_temperature > 0.0 && self.initial_temperature.is_finite()) {
            return Err(TspError::invalid_config(format!(
                "initial_temperature must be positive, got {}",
                self.initial_temperature
            )));
        }
        if !(self.min_temperature >= 0.0) {
            return Err(TspError::invalid_config(format!(
                "min_temperature must be non-negative, got {}",
                self.min_temperature
            )));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(TspError::invalid_config(format!(
                "cooling_rate must be in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        if self.min_strength == 0 || self.min_strength > self.max_strength {
            return Err(TspError::invalid_config(format!(
                "mutation strength range {}..={} is empty or zero",
                self.min_strength, self.max_strength
            )));
        }
        Ok(())
    }

    /// Mutation strength for temperature `t`, stronger while hot.
    pub fn strength(&self, t: f64) -> usize {
        let span = (self.max_strength - self.min_strength) as f64;
        let k = (self.min_strength as f64 + span * t / self.initial_temperature).ceil();
        (k as usize).clamp(self.min_strength, self.max_strength)
    }
}

/// Why a tempering run stopped. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The iteration budget ran out.
    BudgetExhausted,
    /// Temperature fell below the configured floor.
    Frozen,
    /// The wall-clock limit passed.
    DeadlineReached,
}

#[derive(Debug, Clone)]
pub struct TemperingOutcome<'a> {
    /// Best tour seen, the input included.
    pub best: Tour<'a>,
    pub iterations: usize,
    /// Accepted candidates strictly longer than the current tour.
    pub accepted_worse: usize,
    pub improvements: usize,
    pub final_temperature: f64,
    pub termination: Termination,
}

/// Applies `k` random reversals of positions `i..=j`, `1 <= i < j <= n - 1`.
/// Tours under four cities have no room for a non-trivial reversal and are
/// returned as is.
pub fn macro_mutation<'a, R: Rng + ?Sized>(tour: &Tour<'a>, k: usize, rng: &mut R) -> Tour<'a> {
    let n = tour.len();
    let mut t = tour.clone();
    if n < 4 {
        return t;
    }
    for _ in 0..k {
        let i = rng.gen_range(1..n - 1);
        let j = rng.gen_range(i + 1..n);
        t.reverse(i, j);
    }
    t.refresh_cost();
    t
}

pub fn temper<'a, R: Rng + ?Sized>(
    initial: &Tour<'a>,
    config: &TemperingConfig,
    two_opt_config: &TwoOptConfig,
    rng: &mut R,
) -> TspResult<TemperingOutcome<'a>> {
    config.validate()?;
    let deadline = config
        .time_limit_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let mut cur = initial.clone();
    let mut best = initial.clone();
    let mut t = config.initial_temperature;
    let mut accepted_worse = 0;
    let mut improvements = 0;
    let mut iterations = 0;
    let mut termination = Termination::BudgetExhausted;

    while iterations < config.max_iterations {
        if t < config.min_temperature {
            termination = Termination::Frozen;
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            termination = Termination::DeadlineReached;
            break;
        }
        iterations += 1;

        let k = config.strength(t);
        let (cand, _) = two_opt(&macro_mutation(&cur, k, rng), two_opt_config);
        let delta = cand.cost() - cur.cost();
        if delta < 0.0 || rng.gen::<f64>() < (-delta / t).exp() {
            if delta > 0.0 {
                accepted_worse += 1;
            }
            cur = cand;
            if cur.cost() < best.cost() {
                best = cur.clone();
                improvements += 1;
                debug!(iteration = iterations, cost = best.cost(), temperature = t, k, "new best");
            }
        }
        t *= config.cooling_rate;
    }

    info!(
        iterations,
        accepted_worse,
        improvements,
        start = initial.cost(),
        best = best.cost(),
        ?termination,
        "tempering finished"
    );
    Ok(TemperingOutcome {
        best,
        iterations,
        accepted_worse,
        improvements,
        final_temperature: t,
        termination,
    })
}
