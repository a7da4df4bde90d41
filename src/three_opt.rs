use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TspError, TspResult};
use crate::tour::Tour;
use crate::two_opt::LocalSearchStats;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreeOptConfig {
    #[serde(default = "default_max_scans")]
    pub max_scans: usize,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_max_scans() -> usize {
    1000
}

fn default_epsilon() -> f64 {
    1e-4
}

impl Default for ThreeOptConfig {
    fn default() -> Self {
        Self {
            max_scans: default_max_scans(),
            epsilon: default_epsilon(),
        }
    }
}

impl ThreeOptConfig {
    pub fn validate(&self) -> TspResult<()> {
        if !(self.epsilon >= 0.0 && self.epsilon.is_finite()) {
            return Err(TspError::invalid_config(format!(
                "three_opt.epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Ways to put `s2 = i..j` and `s3 = j..k` back between `s1` and `s4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconnect {
    /// s2' s3
    ReverseFirst,
    /// s2 s3'
    ReverseSecond,
    /// s2' s3'
    ReverseBoth,
    /// s3 s2
    Exchange,
    /// s3' s2
    ExchangeReverseSecond,
    /// s3 s2'
    ExchangeReverseFirst,
    /// s3' s2'
    ExchangeReverseBoth,
}

impl Reconnect {
    fn apply(self, tour: &mut Tour<'_>, i: usize, j: usize, k: usize) {
        // after an exchange s3 sits at i..m and s2 at m..k
        let m = i + (k - j);
        match self {
            Self::ReverseFirst => tour.reverse(i, j - 1),
            Self::ReverseSecond => tour.reverse(j, k - 1),
            Self::ReverseBoth => {
                tour.reverse(i, j - 1);
                tour.reverse(j, k - 1);
            }
            Self::Exchange => tour.exchange(i, j, k),
            Self::ExchangeReverseSecond => {
                tour.exchange(i, j, k);
                tour.reverse(i, m - 1);
            }
            Self::ExchangeReverseFirst => {
                tour.exchange(i, j, k);
                tour.reverse(m, k - 1);
            }
            Self::ExchangeReverseBoth => {
                tour.exchange(i, j, k);
                tour.reverse(i, m - 1);
                tour.reverse(m, k - 1);
            }
        }
    }
}

/// Three-edge analogue of [`crate::two_opt::Opt2`]: each `next` applies the
/// best reconnection of the first improving triple and yields its gain.
pub struct Opt3<'a, 'b> {
    tour: &'b mut Tour<'a>,
    epsilon: f64,
}

impl<'a, 'b> Opt3<'a, 'b> {
    pub fn new(tour: &'b mut Tour<'a>, epsilon: f64) -> Self {
        Self { tour, epsilon }
    }
}

impl<'a, 'b> Iterator for Opt3<'a, 'b> {
    type Item = f64;
    fn next(&mut self) -> Option<Self::Item> {
        let tour = &mut self.tour;
        let tsp = tour.instance();
        let d = |i, j| tsp.d_ix(i, j);
        let n = tour.len();

        for i in 1..n.saturating_sub(2) {
            for j in i + 1..n - 1 {
                for k in j + 1..n {
                    let s = tour.seq();
                    let (a, b) = (s[i - 1], s[i]);
                    let (c, e) = (s[j - 1], s[j]);
                    let (f, g) = (s[k - 1], s[k]);
                    let old = d(a, b) + d(c, e) + d(f, g);
                    let options = [
                        (Reconnect::ReverseFirst, d(a, c) + d(b, e) + d(f, g)),
                        (Reconnect::ReverseSecond, d(a, b) + d(c, f) + d(e, g)),
                        (Reconnect::Exchange, d(a, e) + d(f, b) + d(c, g)),
                        (Reconnect::ExchangeReverseSecond, d(a, f) + d(e, b) + d(c, g)),
                        (Reconnect::ReverseBoth, d(a, c) + d(b, f) + d(e, g)),
                        (Reconnect::ExchangeReverseFirst, d(a, e) + d(f, c) + d(b, g)),
                        (Reconnect::ExchangeReverseBoth, d(a, f) + d(e, c) + d(b, g)),
                    ];
                    let mut best: Option<(Reconnect, f64)> = None;
                    for (r, cost) in options {
                        if best.map_or(true, |(_, c)| cost < c) {
                            best = Some((r, cost));
                        }
                    }
                    if let Some((r, cost)) = best {
                        let gain = old - cost;
                        if gain > self.epsilon {
                            r.apply(tour, i, j, k);
                            tour.sub_cost(gain);
                            return Some(gain);
                        }
                    }
                }
            }
        }
        None
    }
}

/// Runs 3-opt to a local optimum (or `max_scans` moves) on a copy of `tour`.
pub fn three_opt<'a>(tour: &Tour<'a>, config: &ThreeOptConfig) -> (Tour<'a>, LocalSearchStats) {
    let mut cur = tour.clone();
    let mut stats = LocalSearchStats::default();
    {
        let mut it = Opt3::new(&mut cur, config.epsilon);
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
        "3-opt finished"
    );
    (cur, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::nearest_neighbor;
    use crate::instance::Instance;
    use crate::two_opt::{two_opt, TwoOptConfig};

    #[test]
    fn test_every_reconnection_is_costed_correctly() {
        let tsp = Instance::random(9, 31).unwrap();
        let base = Tour::new(&tsp, (0..9).collect()).unwrap();
        let (i, j, k) = (2, 4, 7);
        let s = base.seq();
        let d = |x, y| tsp.d_ix(x, y);
        let (a, b, c, e, f, g) = (s[i - 1], s[i], s[j - 1], s[j], s[k - 1], s[k]);
        let old = d(a, b) + d(c, e) + d(f, g);
        let cases = [
            (Reconnect::ReverseFirst, d(a, c) + d(b, e) + d(f, g)),
            (Reconnect::ReverseSecond, d(a, b) + d(c, f) + d(e, g)),
            (Reconnect::Exchange, d(a, e) + d(f, b) + d(c, g)),
            (Reconnect::ExchangeReverseSecond, d(a, f) + d(e, b) + d(c, g)),
            (Reconnect::ReverseBoth, d(a, c) + d(b, f) + d(e, g)),
            (Reconnect::ExchangeReverseFirst, d(a, e) + d(f, c) + d(b, g)),
            (Reconnect::ExchangeReverseBoth, d(a, f) + d(e, c) + d(b, g)),
        ];
        for (r, new) in cases {
            let mut t = base.clone();
            r.apply(&mut t, i, j, k);
            t.refresh_cost();
            assert!(t.is_valid(), "{r:?}");
            assert_eq!(t.start(), 0);
            assert!((t.cost() - (base.cost() - old + new)).abs() < 1e-9, "{r:?}");
        }
    }

    #[test]
    fn test_uncrosses_square() {
        let tsp = Instance::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap();
        let t = Tour::new(&tsp, vec![0, 2, 1, 3]).unwrap();
        let (t2, stats) = three_opt(&t, &ThreeOptConfig::default());
        assert_eq!(t2.cost(), 4.0);
        assert!(stats.converged);
        assert_eq!(t2.start(), 0);
    }

    #[test]
    fn test_monotone_and_idempotent() {
        let cfg = ThreeOptConfig::default();
        for seed in 0..8 {
            let tsp = Instance::random(14, seed).unwrap();
            let seq: Vec<usize> = (0..14).map(|i| (i * 5) % 14).collect();
            let t = Tour::new(&tsp, seq).unwrap();
            let (once, s1) = three_opt(&t, &cfg);
            assert!(s1.converged);
            assert!(once.is_valid());
            assert!(once.cost() <= t.cost());
            assert!((once.cost() - tsp.path_cost(&once.closed())).abs() < 1e-9);
            let (twice, s2) = three_opt(&once, &cfg);
            assert_eq!(s2.moves, 0);
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn test_polishes_two_opt_output() {
        for seed in 100..105 {
            let tsp = Instance::random(15, seed).unwrap();
            let (t2, _) = two_opt(&nearest_neighbor(&tsp, 0), &TwoOptConfig::default());
            let (t3, _) = three_opt(&t2, &ThreeOptConfig::default());
            assert!(t3.cost() <= t2.cost());
            assert!(t3.is_valid());
        }
    }

    #[test]
    fn test_scan_cap_and_tiny_tours() {
        let tsp = Instance::random(20, 8).unwrap();
        let seq: Vec<usize> = (0..20).map(|i| (i * 7) % 20).collect();
        let t = Tour::new(&tsp, seq).unwrap();
        let cfg = ThreeOptConfig {
            max_scans: 1,
            ..ThreeOptConfig::default()
        };
        let (t2, stats) = three_opt(&t, &cfg);
        assert_eq!(stats.moves, 1);
        assert!(!stats.converged);
        assert!(t2.cost() < t.cost());

        let tsp = Instance::random(3, 8).unwrap();
        let t = nearest_neighbor(&tsp, 0);
        let (t2, stats) = three_opt(&t, &ThreeOptConfig::default());
        assert_eq!(stats.moves, 0);
        assert_eq!(t2, t);
    }

    #[test]
    fn test_validate() {
        assert!(ThreeOptConfig::default().validate().is_ok());
        let bad = ThreeOptConfig {
            epsilon: -1.0,
            ..ThreeOptConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
