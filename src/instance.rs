use std::io::{self, BufRead};

use crate::error::{TspError, TspResult};
use crate::{NodeId, Point};

pub fn d_pt(s: &Point, t: &Point) -> f64 {
    let dx = s.0 - t.0;
    let dy = s.1 - t.1;
    (dx * dx + dy * dy).sqrt()
}

/// Symmetric Euclidean distances, row-major.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    m: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(p: &[Point]) -> TspResult<Self> {
        let n = p.len();
        if n < 2 {
            return Err(TspError::invalid_instance(format!(
                "need at least 2 cities, got {n}"
            )));
        }
        if let Some(i) = p.iter().position(|c| !c.0.is_finite() || !c.1.is_finite()) {
            return Err(TspError::invalid_instance(format!(
                "city {i} has a non-finite coordinate {:?}",
                p[i]
            )));
        }
        let m = p
            .iter()
            .flat_map(|s| p.iter().map(|t| d_pt(s, t)))
            .collect();
        Ok(Self { n, m })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn d_ix(&self, i: NodeId, j: NodeId) -> f64 {
        self.m[i * self.n + j]
    }
}

/// Seeded pseudo-random sequence used to generate reproducible instances.
///
/// Each draw maps `x <- sin(x) * 10000` and yields the fractional part of
/// `x`, starting from `x = sin(seed) * 10000`.
pub struct SineRng {
    x: f64,
}

impl SineRng {
    pub fn new(seed: u64) -> Self {
        Self {
            x: (seed as f64).sin() * 10000.0,
        }
    }

    pub fn gen(&mut self) -> f64 {
        self.x = self.x.sin() * 10000.0;
        self.x - self.x.floor()
    }
}

/// An immutable problem instance: points, their distances, and per-city
/// neighbor lists sorted by distance (ties broken by lower index).
#[derive(Debug, Clone)]
pub struct Instance {
    points: Vec<Point>,
    dist: DistanceMatrix,
    c: Vec<Vec<NodeId>>,
}

impl Instance {
    pub fn new(p: &[Point]) -> TspResult<Self> {
        let dist = DistanceMatrix::new(p)?;
        let n = p.len();
        let c = (0..n)
            .map(|i| {
                let mut v: Vec<NodeId> = (0..n).filter(|&j| j != i).collect();
                v.sort_by(|&a, &b| dist.d_ix(i, a).total_cmp(&dist.d_ix(i, b)));
                v
            })
            .collect();
        Ok(Self {
            points: p.to_vec(),
            dist,
            c,
        })
    }

    /// `n` points uniform in `[0, 100) x [0, 100)` from the sine sequence.
    /// The same `(n, seed)` always produces the same instance.
    pub fn random(n: usize, seed: u64) -> TspResult<Self> {
        Self::new(&random_points(n, seed))
    }

    pub fn from_reader<R: BufRead>(r: R) -> TspResult<Self> {
        let p = parse_points(r)?;
        Self::new(&p)
    }

    pub fn n(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.dist
    }

    pub fn d_ix(&self, i: NodeId, j: NodeId) -> f64 {
        self.dist.d_ix(i, j)
    }

    /// Every other city ordered by distance from `i`.
    pub fn neighbors(&self, i: NodeId) -> &[NodeId] {
        &self.c[i]
    }

    pub fn centroid(&self) -> Point {
        let n = self.n() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.0, sy + p.1));
        (sx / n, sy / n)
    }

    /// Cost of a closed sequence (first element repeated at the end).
    pub fn path_cost(&self, closed: &[NodeId]) -> f64 {
        closed.windows(2).map(|w| self.d_ix(w[0], w[1])).sum()
    }
}

pub fn random_points(n: usize, seed: u64) -> Vec<Point> {
    let mut rng = SineRng::new(seed);
    (0..n)
        .map(|_| {
            let x = rng.gen() * 100.0;
            let y = rng.gen() * 100.0;
            (x, y)
        })
        .collect()
}

/// Reads `id x y` rows, skipping anything that does not parse as one
/// (TSPLIB headers, `EOF` markers, blank lines).
pub fn parse_points<R: BufRead>(r: R) -> io::Result<Vec<Point>> {
    let v: Vec<Option<Point>> = r
        .lines()
        .map(|line| {
            line.map(|s| {
                let mut r = s.split_whitespace().skip(1).map(|x| x.parse::<f64>());
                Some((r.next()?.ok()?, r.next()?.ok()?))
            })
        })
        .collect::<io::Result<_>>()?;
    Ok(v.into_iter().flatten().collect())
}
