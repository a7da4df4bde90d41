//! Held-Karp dynamic programming.
//!
//! `g(S, j)` is the cheapest path that leaves city 0, visits exactly the
//! cities in `S` and ends at `j ∈ S`:
//!
//! ```text
//! g({j}, j) = d(0, j)
//! g(S, j)   = min_{k ∈ S\{j}} g(S\{j}, k) + d(k, j)
//! opt       = min_j g(All, j) + d(j, 0)
//! ```
//!
//! Subsets are bitmasks over cities `1..n` (bit `b` is city `b + 1`). The
//! table is filled in increasing mask order, so every entry is written once
//! and only after all of its predecessors. Time is `O(n² · 2ⁿ)`, memory
//! `O(n · 2ⁿ)`.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TspError, TspResult};
use crate::instance::Instance;
use crate::tour::Tour;

/// Largest ceiling accepted; the table for 24 cities is about 1.5 GiB.
pub const HARD_MAX_CITIES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldKarp {
    /// Instances above this size fail with [`TspError::InstanceTooLarge`].
    #[serde(default = "default_max_cities")]
    pub max_cities: usize,
}

fn default_max_cities() -> usize {
    20
}

impl Default for HeldKarp {
    fn default() -> Self {
        Self {
            max_cities: default_max_cities(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExactSolution<'a> {
    pub tour: Tour<'a>,
    /// Number of `(mask, last)` states evaluated.
    pub states: usize,
}

impl HeldKarp {
    pub fn new(max_cities: usize) -> Self {
        Self { max_cities }
    }

    pub fn validate(&self) -> TspResult<()> {
        if !(2..=HARD_MAX_CITIES).contains(&self.max_cities) {
            return Err(TspError::invalid_config(format!(
                "exact.max_cities must be in 2..={HARD_MAX_CITIES}, got {}",
                self.max_cities
            )));
        }
        Ok(())
    }

    pub fn solve<'a>(&self, tsp: &'a Instance) -> TspResult<ExactSolution<'a>> {
        let n = tsp.n();
        let max = self.max_cities.min(HARD_MAX_CITIES);
        if n > max {
            return Err(TspError::InstanceTooLarge { cities: n, max });
        }
        let started = Instant::now();
        let table = Table::fill(tsp);
        let seq = table.reconstruct(tsp);
        let tour = Tour::from_seq(tsp, seq);
        info!(
            cities = n,
            states = table.states,
            cost = tour.cost(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "held-karp solved"
        );
        Ok(ExactSolution {
            tour,
            states: table.states,
        })
    }
}

struct Table {
    m: usize,
    g: Vec<f64>,
    states: usize,
}

impl Table {
    fn fill(tsp: &Instance) -> Self {
        let m = tsp.n() - 1;
        let size = 1usize << m;
        let d = |a: usize, b: usize| tsp.d_ix(a + 1, b + 1);
        let mut t = Self {
            m,
            g: vec![f64::INFINITY; size * m],
            states: 0,
        };
        for j in 0..m {
            let at = t.at(1 << j, j);
            t.g[at] = tsp.d_ix(0, j + 1);
            t.states += 1;
        }
        for mask in 1..size {
            if mask.count_ones() < 2 {
                continue;
            }
            for j in bits(mask) {
                let prev = mask ^ (1 << j);
                let mut best = f64::INFINITY;
                for k in bits(prev) {
                    let v = t.g[t.at(prev, k)] + d(k, j);
                    if v < best {
                        best = v;
                    }
                }
                let at = t.at(mask, j);
                t.g[at] = best;
                t.states += 1;
            }
            if mask & 0xffff == 0 {
                debug!(mask, states = t.states, "held-karp progress");
            }
        }
        t
    }

    fn at(&self, mask: usize, j: usize) -> usize {
        mask * self.m + j
    }

    /// Replays the arg-min choices from the full set back to the base case.
    fn reconstruct(&self, tsp: &Instance) -> Vec<usize> {
        let full = (1usize << self.m) - 1;
        let mut last = 0;
        let mut best = f64::INFINITY;
        for j in 0..self.m {
            let v = self.g[self.at(full, j)] + tsp.d_ix(j + 1, 0);
            if v < best {
                best = v;
                last = j;
            }
        }

        let mut path = Vec::with_capacity(self.m + 1);
        let mut mask = full;
        let mut j = last;
        loop {
            path.push(j + 1);
            let prev = mask ^ (1 << j);
            if prev == 0 {
                break;
            }
            let mut pick = 0;
            let mut best = f64::INFINITY;
            for k in bits(prev) {
                let v = self.g[self.at(prev, k)] + tsp.d_ix(k + 1, j + 1);
                if v < best {
                    best = v;
                    pick = k;
                }
            }
            mask = prev;
            j = pick;
        }
        path.push(0);
        path.reverse();
        path
    }
}

/// Set bit positions of `mask`, lowest first.
fn bits(mask: usize) -> impl Iterator<Item = usize> {
    let mut rest = mask;
    std::iter::from_fn(move || {
        if rest == 0 {
            None
        } else {
            let b = rest.trailing_zeros() as usize;
            rest &= rest - 1;
            Some(b)
        }
    })
}
