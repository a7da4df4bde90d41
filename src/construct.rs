//! Tour construction strategies.
//!
//! Every strategy produces a complete tour listed from the requested start
//! city. They are deterministic: equal candidates are resolved towards the
//! lower city index.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TspError, TspResult};
use crate::instance::Instance;
use crate::tour::Tour;
use crate::two_opt::{two_opt, TwoOptConfig};
use crate::NodeId;

/// Distance at which the weighted spiral's proximity score halves.
const SPIRAL_DISTANCE_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Construction {
    /// Repeatedly move to the closest unvisited city.
    #[default]
    NearestNeighbor,
    /// Nearest neighbor from every city, keeping the shortest.
    MultiStartNearestNeighbor,
    /// Nearest neighbor scored by the step plus `weight` times the shortest
    /// onward edge from the candidate.
    Lookahead {
        #[serde(default = "default_lookahead_weight")]
        weight: f64,
    },
    /// Visit cities in order of their angle around the centroid.
    AngularSweep,
    /// Angular sweep begun at each of the first `starts` cities' angles,
    /// keeping the one that polishes best under 2-opt.
    MultiAngleSweep {
        #[serde(default = "default_angle_starts")]
        starts: usize,
    },
    /// Greedy step scored by angular progress and proximity.
    WeightedSpiral {
        #[serde(default = "default_angle_weight")]
        angle_weight: f64,
    },
    /// Nearest neighbor inside cells of a `size` x `size` grid, cells chained
    /// tail to nearest head.
    Grid {
        #[serde(default = "default_grid_size")]
        size: usize,
    },
    /// Grid construction for every size in `min_size..=max_size`, keeping
    /// the shortest.
    MultiGrid {
        #[serde(default = "default_min_grid")]
        min_size: usize,
        #[serde(default = "default_max_grid")]
        max_size: usize,
    },
    /// Keep the `width` cheapest partial paths, each extended by its
    /// `branching` nearest unvisited cities.
    Beam {
        #[serde(default = "default_beam_width")]
        width: usize,
        #[serde(default = "default_branching")]
        branching: usize,
    },
}

fn default_angle_weight() -> f64 {
    0.7
}

fn default_grid_size() -> usize {
    4
}

fn default_lookahead_weight() -> f64 {
    0.5
}

fn default_angle_starts() -> usize {
    5
}

fn default_min_grid() -> usize {
    3
}

fn default_max_grid() -> usize {
    6
}

fn default_beam_width() -> usize {
    5
}

fn default_branching() -> usize {
    3
}

impl Construction {
    pub fn name(&self) -> String {
        match self {
            Self::NearestNeighbor => "nearest-neighbor".to_string(),
            Self::MultiStartNearestNeighbor => "multi-start-nn".to_string(),
            Self::Lookahead { weight } => format!("nn-lookahead(w={weight})"),
            Self::AngularSweep => "angular-sweep".to_string(),
            Self::MultiAngleSweep { starts } => format!("multi-angle-sweep({starts})"),
            Self::WeightedSpiral { angle_weight } => format!("spiral(w={angle_weight})"),
            Self::Grid { size } => format!("grid({size}x{size})"),
            Self::MultiGrid { min_size, max_size } => format!("multi-grid({min_size}..{max_size})"),
            Self::Beam { width, branching } => format!("beam(B={width},K={branching})"),
        }
    }

    pub fn validate(&self) -> TspResult<()> {
        match *self {
            Self::WeightedSpiral { angle_weight } if !(0.0..=1.0).contains(&angle_weight) => {
                Err(TspError::invalid_config(format!(
                    "spiral angle_weight must be in [0, 1], got {angle_weight}"
                )))
            }
            Self::Lookahead { weight } if !(weight >= 0.0 && weight.is_finite()) => Err(
                TspError::invalid_config(format!("lookahead weight must be finite and non-negative, got {weight}")),
            ),
            Self::MultiAngleSweep { starts: 0 } => {
                Err(TspError::invalid_config("multi-angle sweep needs at least one start"))
            }
            Self::Grid { size: 0 } => Err(TspError::invalid_config("grid size must be positive")),
            Self::MultiGrid { min_size, max_size } if min_size == 0 || min_size > max_size => {
                Err(TspError::invalid_config(format!(
                    "multi-grid sizes {min_size}..={max_size} are empty or zero"
                )))
            }
            Self::Beam { width, branching } if width == 0 || branching == 0 => {
                Err(TspError::invalid_config(format!(
                    "beam width and branching must be positive, got {width} and {branching}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn build<'a>(&self, tsp: &'a Instance, start: NodeId) -> TspResult<Tour<'a>> {
        self.validate()?;
        if start >= tsp.n() {
            return Err(TspError::invalid_config(format!(
                "start city {start} out of range for {} cities",
                tsp.n()
            )));
        }
        let tour = match *self {
            Self::NearestNeighbor => nearest_neighbor(tsp, start),
            Self::MultiStartNearestNeighbor => multi_start_nearest_neighbor(tsp).rotated_to(start),
            Self::Lookahead { weight } => nearest_neighbor_lookahead(tsp, start, weight),
            Self::AngularSweep => angular_sweep(tsp).rotated_to(start),
            Self::MultiAngleSweep { starts } => multi_angle_sweep(tsp, starts).rotated_to(start),
            Self::WeightedSpiral { angle_weight } => weighted_spiral(tsp, start, angle_weight),
            Self::Grid { size } => grid(tsp, size).rotated_to(start),
            Self::MultiGrid { min_size, max_size } => {
                multi_grid(tsp, min_size, max_size).rotated_to(start)
            }
            Self::Beam { width, branching } => beam(tsp, start, width, branching),
        };
        debug!(strategy = %self.name(), cost = tour.cost(), "constructed tour");
        Ok(tour)
    }
}

pub fn nearest_neighbor(tsp: &Instance, start: NodeId) -> Tour<'_> {
    let n = tsp.n();
    let mut seq: Vec<NodeId> = Vec::with_capacity(n);
    let mut used = vec![false; n];
    seq.push(start);
    used[start] = true;
    while let Some(&a) = seq.last() {
        // neighbor lists are sorted by distance then index
        match tsp.neighbors(a).iter().find(|&&i| !used[i]) {
            Some(&x) => {
                seq.push(x);
                used[x] = true;
            }
            None => break,
        }
    }
    Tour::from_seq(tsp, seq)
}

pub fn multi_start_nearest_neighbor(tsp: &Instance) -> Tour<'_> {
    let mut best = nearest_neighbor(tsp, 0);
    for s in 1..tsp.n() {
        let t = nearest_neighbor(tsp, s);
        if t.cost() < best.cost() {
            best = t;
        }
    }
    best
}

pub fn nearest_neighbor_lookahead(tsp: &Instance, start: NodeId, weight: f64) -> Tour<'_> {
    let n = tsp.n();
    let mut seq: Vec<NodeId> = Vec::with_capacity(n);
    let mut used = vec![false; n];
    seq.push(start);
    used[start] = true;
    let mut cur = start;
    while seq.len() < n {
        let mut best: Option<(NodeId, f64)> = None;
        for next in (0..n).filter(|&i| !used[i]) {
            let onward = tsp
                .neighbors(next)
                .iter()
                .find(|&&f| !used[f])
                .map_or(0.0, |&f| tsp.d_ix(next, f));
            let score = tsp.d_ix(cur, next) + weight * onward;
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((next, score));
            }
        }
        let Some((next, _)) = best else { break };
        seq.push(next);
        used[next] = true;
        cur = next;
    }
    Tour::from_seq(tsp, seq)
}

fn angle(tsp: &Instance, i: NodeId, center: (f64, f64)) -> f64 {
    let p = tsp.points()[i];
    (p.1 - center.1).atan2(p.0 - center.0)
}

pub fn angular_sweep(tsp: &Instance) -> Tour<'_> {
    let center = tsp.centroid();
    let mut seq: Vec<NodeId> = (0..tsp.n()).collect();
    // stable sort keeps index order among equal angles
    seq.sort_by(|&a, &b| angle(tsp, a, center).total_cmp(&angle(tsp, b, center)));
    Tour::from_seq(tsp, seq)
}

/// Angular sweep that begins at `start`'s own angle and proceeds
/// counter-clockwise; cities sharing an angle keep index order.
pub fn angular_sweep_from(tsp: &Instance, start: NodeId) -> Tour<'_> {
    let center = tsp.centroid();
    let base = angle(tsp, start, center);
    let rel = |i| {
        let mut a = angle(tsp, i, center) - base;
        if a < 0.0 {
            a += TAU;
        }
        a
    };
    let mut seq: Vec<NodeId> = (0..tsp.n()).collect();
    seq.sort_by(|&a, &b| rel(a).total_cmp(&rel(b)));
    Tour::from_seq(tsp, seq)
}

/// Tries [`angular_sweep_from`] at each of the first `starts` cities and
/// returns the best 2-opt polished result; ties go to the lower start.
pub fn multi_angle_sweep(tsp: &Instance, starts: usize) -> Tour<'_> {
    let config = TwoOptConfig::default();
    let mut best = two_opt(&angular_sweep_from(tsp, 0), &config).0;
    for s in 1..starts.min(tsp.n()) {
        let t = two_opt(&angular_sweep_from(tsp, s), &config).0;
        if t.cost() < best.cost() {
            best = t;
        }
    }
    best
}

pub fn weighted_spiral(tsp: &Instance, start: NodeId, angle_weight: f64) -> Tour<'_> {
    let n = tsp.n();
    let center = tsp.centroid();
    let mut seq = Vec::with_capacity(n);
    let mut used = vec![false; n];
    seq.push(start);
    used[start] = true;
    let mut cur = start;
    while seq.len() < n {
        let cur_angle = angle(tsp, cur, center);
        let mut best: Option<(NodeId, f64)> = None;
        for i in (0..n).filter(|&i| !used[i]) {
            let mut delta = angle(tsp, i, center) - cur_angle;
            if delta < 0.0 {
                delta += TAU;
            }
            let angle_score = 1.0 - delta / TAU;
            let dist_score = 1.0 / (1.0 + tsp.d_ix(cur, i) / SPIRAL_DISTANCE_SCALE);
            let score = angle_weight * angle_score + (1.0 - angle_weight) * dist_score;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((next, _)) = best else { break };
        seq.push(next);
        used[next] = true;
        cur = next;
    }
    Tour::from_seq(tsp, seq)
}

/// Cell index per axis; a zero-width extent collapses into cell 0.
fn cell_of(v: f64, lo: f64, width: f64, k: usize) -> usize {
    if width > 0.0 {
        (((v - lo) / width) as usize).min(k - 1)
    } else {
        0
    }
}

fn nearest_neighbor_within(tsp: &Instance, cities: &[NodeId]) -> Vec<NodeId> {
    let mut seq = Vec::with_capacity(cities.len());
    let mut used = vec![false; cities.len()];
    let mut cur = cities[0];
    seq.push(cur);
    used[0] = true;
    while seq.len() < cities.len() {
        let mut best: Option<(usize, f64)> = None;
        for (slot, &c) in cities.iter().enumerate() {
            if !used[slot] && best.map_or(true, |(_, d)| tsp.d_ix(cur, c) < d) {
                best = Some((slot, tsp.d_ix(cur, c)));
            }
        }
        let Some((slot, _)) = best else { break };
        used[slot] = true;
        cur = cities[slot];
        seq.push(cur);
    }
    seq
}

/// Sizes above the city count are treated as the city count.
pub fn grid(tsp: &Instance, k: usize) -> Tour<'_> {
    let k = k.clamp(1, tsp.n());
    let p = tsp.points();
    let (min_x, max_x, min_y, max_y) = p.iter().fold(
        (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ),
        |(min_x, max_x, min_y, max_y), c| {
            (min_x.min(c.0), max_x.max(c.0), min_y.min(c.1), max_y.max(c.1))
        },
    );
    let cell_w = (max_x - min_x) / k as f64;
    let cell_h = (max_y - min_y) / k as f64;

    // row-major, cities in index order within a cell
    let mut cells: Vec<Vec<NodeId>> = vec![Vec::new(); k * k];
    for (i, c) in p.iter().enumerate() {
        let cx = cell_of(c.0, min_x, cell_w, k);
        let cy = cell_of(c.1, min_y, cell_h, k);
        cells[cy * k + cx].push(i);
    }
    let sub_tours: Vec<Vec<NodeId>> = cells
        .iter()
        .filter(|cell| !cell.is_empty())
        .map(|cell| nearest_neighbor_within(tsp, cell))
        .collect();
    debug!(grid = k, occupied = sub_tours.len(), "grid cells solved");

    let mut done = vec![false; sub_tours.len()];
    let mut seq = Vec::with_capacity(tsp.n());
    let mut cur = 0;
    loop {
        done[cur] = true;
        seq.extend_from_slice(&sub_tours[cur]);
        let tail = seq[seq.len() - 1];
        let mut next: Option<(usize, f64)> = None;
        for (i, sub) in sub_tours.iter().enumerate() {
            let d = tsp.d_ix(tail, sub[0]);
            if !done[i] && next.map_or(true, |(_, best)| d < best) {
                next = Some((i, d));
            }
        }
        match next {
            Some((i, _)) => cur = i,
            None => break,
        }
    }
    Tour::from_seq(tsp, seq)
}

pub fn multi_grid(tsp: &Instance, min_size: usize, max_size: usize) -> Tour<'_> {
    let lo = min_size.clamp(1, tsp.n());
    let hi = max_size.clamp(lo, tsp.n());
    let mut best = grid(tsp, lo);
    for k in lo + 1..=hi {
        let t = grid(tsp, k);
        if t.cost() < best.cost() {
            best = t;
        }
    }
    debug!(sizes = ?(lo..=hi), cost = best.cost(), "multi-grid finished");
    best
}

#[derive(Clone)]
struct Partial {
    seq: Vec<NodeId>,
    used: Vec<bool>,
    cost: f64,
}

pub fn beam(tsp: &Instance, start: NodeId, width: usize, branching: usize) -> Tour<'_> {
    let n = tsp.n();
    let mut used = vec![false; n];
    used[start] = true;
    let mut frontier = vec![Partial {
        seq: vec![start],
        used,
        cost: 0.0,
    }];
    for _ in 1..n {
        let mut candidates = Vec::new();
        for p in &frontier {
            let tail = p.seq[p.seq.len() - 1];
            for &x in tsp
                .neighbors(tail)
                .iter()
                .filter(|&&x| !p.used[x])
                .take(branching)
            {
                let mut q = p.clone();
                q.seq.push(x);
                q.used[x] = true;
                q.cost += tsp.d_ix(tail, x);
                candidates.push(q);
            }
        }
        candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        candidates.truncate(width);
        frontier = candidates;
    }
    // rank complete paths by their closed length
    let closed = |p: &Partial| p.cost + tsp.d_ix(p.seq[p.seq.len() - 1], start);
    let best = frontier
        .into_iter()
        .min_by(|a, b| closed(a).total_cmp(&closed(b)))
        .map(|p| p.seq)
        .unwrap_or_else(|| vec![start]);
    Tour::from_seq(tsp, best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_strategies() -> Vec<Construction> {
        vec![
            Construction::NearestNeighbor,
            Construction::MultiStartNearestNeighbor,
            Construction::AngularSweep,
            Construction::WeightedSpiral { angle_weight: 0.7 },
            Construction::Grid { size: 4 },
            Construction::Grid { size: 1 },
            Construction::Lookahead { weight: 0.5 },
            Construction::MultiAngleSweep { starts: 5 },
            Construction::MultiGrid {
                min_size: 3,
                max_size: 6,
            },
            Construction::Beam {
                width: 5,
                branching: 3,
            },
        ]
    }

    #[test]
    fn test_tour_new() {
        let tsp = Instance::new(&[
            (95.0129, 61.5432),
            (23.1139, 79.1937),
            (60.6843, 92.1813),
            (48.5982, 73.8207),
            (89.1299, 17.6266),
            (76.2097, 40.5706),
            (45.6468, 93.5470),
            (1.8504, 91.6904),
            (82.1407, 41.0270),
            (44.4703, 89.3650),
        ])
        .unwrap();
        let t = nearest_neighbor(&tsp, 0);
        assert_eq!(t.seq(), &[0, 8, 5, 4, 3, 9, 6, 2, 1, 7]);
    }

    #[test]
    fn test_all_valid_and_start() {
        for seed in [1, 42, 109] {
            let tsp = Instance::random(15, seed).unwrap();
            for c in all_strategies() {
                for start in [0, 7, 14] {
                    let t = c.build(&tsp, start).unwrap();
                    assert!(t.is_valid(), "{} from {start}", c.name());
                    assert_eq!(t.start(), start);
                    let closed = t.closed();
                    assert_eq!(closed[0], closed[15]);
                    assert!((t.cost() - tsp.path_cost(&closed)).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_beam_one_is_nearest_neighbor() {
        for seed in 100..110 {
            let tsp = Instance::random(12, seed).unwrap();
            let nn = nearest_neighbor(&tsp, 3);
            let b = beam(&tsp, 3, 1, 1);
            assert_eq!(nn, b);
            assert_eq!(nn.cost(), b.cost());
        }
    }

    #[test]
    fn test_wider_beam_not_worse_than_nn() {
        // wide enough to keep every path from city 0
        let tsp = Instance::random(8, 5).unwrap();
        let nn = nearest_neighbor(&tsp, 0);
        let b = beam(&tsp, 0, 10_000, 7);
        assert!(b.cost() <= nn.cost() + 1e-9);
    }

    #[test]
    fn test_angular_sweep_square() {
        // Angles around (0.5, 0.5): 3 -> 2.36, 2 -> 0.79, 1 -> -0.79, 0 -> -2.36
        let tsp = Instance::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap();
        let t = angular_sweep(&tsp);
        assert_eq!(t.seq(), &[0, 1, 2, 3]);
        assert_eq!(t.cost(), 4.0);
    }

    #[test]
    fn test_multi_start_not_worse() {
        let tsp = Instance::random(14, 3).unwrap();
        let best = multi_start_nearest_neighbor(&tsp);
        for s in 0..tsp.n() {
            assert!(best.cost() <= nearest_neighbor(&tsp, s).cost());
        }
    }

    #[test]
    fn test_grid_degenerate_extent() {
        let pts: Vec<_> = (0..6).map(|i| (i as f64, 0.0)).collect();
        let tsp = Instance::new(&pts).unwrap();
        let t = grid(&tsp, 3);
        assert!(t.is_valid());
        assert_eq!(t.cost(), 10.0);
    }

    #[test]
    fn test_weighted_spiral_pure_distance_is_nn() {
        let tsp = Instance::random(10, 77).unwrap();
        let s = weighted_spiral(&tsp, 0, 0.0);
        assert_eq!(s, nearest_neighbor(&tsp, 0));
    }

    #[test]
    fn test_lookahead_without_weight_is_nn() {
        for seed in 100..105 {
            let tsp = Instance::random(12, seed).unwrap();
            assert_eq!(nearest_neighbor_lookahead(&tsp, 4, 0.0), nearest_neighbor(&tsp, 4));
        }
    }

    #[test]
    fn test_sweep_from_start_angle() {
        let tsp = Instance::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap();
        let t = angular_sweep_from(&tsp, 2);
        assert_eq!(t.seq(), &[2, 3, 0, 1]);
        assert_eq!(t.cost(), 4.0);
    }

    #[test]
    fn test_multi_angle_not_worse_than_each_start() {
        let tsp = Instance::random(14, 21).unwrap();
        let cfg = TwoOptConfig::default();
        let best = multi_angle_sweep(&tsp, 5);
        assert!(best.is_valid());
        for s in 0..5 {
            assert!(best.cost() <= two_opt(&angular_sweep_from(&tsp, s), &cfg).0.cost());
        }
    }

    #[test]
    fn test_multi_grid_not_worse_than_each_size() {
        let tsp = Instance::random(18, 6).unwrap();
        let best = multi_grid(&tsp, 3, 6);
        assert!(best.is_valid());
        for k in 3..=6 {
            assert!(best.cost() <= grid(&tsp, k).cost());
        }
    }

    #[test]
    fn test_oversized_parameters_are_clamped() {
        let tsp = Instance::random(6, 1).unwrap();
        for c in [
            Construction::Beam {
                width: 2,
                branching: usize::MAX,
            },
            Construction::Beam {
                width: usize::MAX,
                branching: usize::MAX,
            },
            Construction::Grid { size: usize::MAX },
            Construction::MultiGrid {
                min_size: 1,
                max_size: usize::MAX,
            },
            Construction::MultiGrid {
                min_size: usize::MAX,
                max_size: usize::MAX,
            },
            Construction::MultiAngleSweep { starts: usize::MAX },
        ] {
            let t = c.build(&tsp, 2).unwrap();
            assert!(t.is_valid(), "{}", c.name());
            assert_eq!(t.start(), 2);
        }
    }

    #[test]
    fn test_validate() {
        let tsp = Instance::random(5, 1).unwrap();
        assert!(Construction::Beam {
            width: 0,
            branching: 1
        }
        .build(&tsp, 0)
        .is_err());
        assert!(Construction::Grid { size: 0 }.build(&tsp, 0).is_err());
        assert!(Construction::WeightedSpiral { angle_weight: 1.5 }
            .build(&tsp, 0)
            .is_err());
        assert!(Construction::Lookahead { weight: f64::NAN }
            .build(&tsp, 0)
            .is_err());
        assert!(Construction::MultiAngleSweep { starts: 0 }
            .build(&tsp, 0)
            .is_err());
        assert!(Construction::MultiGrid {
            min_size: 5,
            max_size: 4
        }
        .build(&tsp, 0)
        .is_err());
        assert!(matches!(
            Construction::NearestNeighbor.build(&tsp, 5),
            Err(TspError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_yaml_tagging() {
        let c: Construction = serde_yaml::from_str("method: beam\nwidth: 8\n").unwrap();
        assert_eq!(
            c,
            Construction::Beam {
                width: 8,
                branching: 3
            }
        );
        let c: Construction = serde_yaml::from_str("method: weighted_spiral").unwrap();
        assert_eq!(c, Construction::WeightedSpiral { angle_weight: 0.7 });
        let c: Construction = serde_yaml::from_str("method: multi_grid").unwrap();
        assert_eq!(
            c,
            Construction::MultiGrid {
                min_size: 3,
                max_size: 6
            }
        );
    }
}
