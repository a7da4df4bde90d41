use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TspError, TspResult};
use crate::tour::Tour;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoOptConfig {
    /// Upper bound on improving scans before giving up on convergence.
    #[serde(default = "default_max_scans")]
    pub max_scans: usize,
    /// Gains at or below this are ignored.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_max_scans() -> usize {
    1000
}

fn default_epsilon() -> f64 {
    1e-4
}

impl Default for TwoOptConfig {
    fn default() -> Self {
        Self {
            max_scans: default_max_scans(),
            epsilon: default_epsilon(),
        }
    }
}

impl TwoOptConfig {
    pub fn validate(&self) -> TspResult<()> {
        if !(self.epsilon >= 0.0 && self.epsilon.is_finite()) {
            return Err(TspError::invalid_config(format!(
                "two_opt.epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalSearchStats {
    pub moves: usize,
    /// Whether the last scan found no improving move.
    pub converged: bool,
}

/// Yields the gain of the first improving reversal per scan; position 0
/// never moves.
pub struct Opt2<'a, 'b> {
    tour: &'b mut Tour<'a>,
    epsilon: f64,
}

impl<'a, 'b> Opt2<'a, 'b> {
    pub fn new(tour: &'b mut Tour<'a>, epsilon: f64) -> Self {
        Self { tour, epsilon }
    }
}

impl<'a, 'b> Iterator for Opt2<'a, 'b> {
    type Item = f64;
    fn next(&mut self) -> Option<Self::Item> {
        let tour = &mut self.tour;
        let tsp = tour.instance();
        let d = |i, j| tsp.d_ix(i, j);
        let n = tour.len();

        for i in 1..n.saturating_sub(1) {
            let (a, b) = (tour.seq()[i - 1], tour.seq()[i]);
            for j in i + 1..n {
                let (c, e) = (tour.seq()[j], tour.seq()[tour.inc(j)]);
                let gain = d(a, b) + d(c, e) - d(a, c) - d(b, e);
                if gain > self.epsilon {
                    tour.reverse(i, j);
                    tour.sub_cost(gain);
                    return Some(gain);
                }
            }
        }
        None
    }
}

/// Runs 2-opt to a local optimum (or `max_scans` moves) on a copy of `tour`.
/// The returned cost is never above the input cost.
pub fn two_opt<'a>(tour: &Tour<'a>, config: &TwoOptConfig) -> (Tour<'a>, LocalSearchStats) {
    let mut cur = tour.clone();
    let mut stats = LocalSearchStats::default();
    {
        let mut it = Opt2::new(&mut cur, config.epsilon);
        while stats.moves < config.max_scans {
            match it.next() {
                Some(_) => stats.moves += 1,
                None => {
                    stats.converged = true;
                    break;
                }
            }
        }
    }
    if stats.moves > 0 {
        cur.refresh_cost();
    }
    debug!(
        moves = stats.moves,
        converged = stats.converged,
        before = tour.cost(),
        after = cur.cost(),
        "2-opt finished"
    );
    (cur, stats)
}
