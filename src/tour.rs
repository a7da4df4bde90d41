use serde::Serialize;

use crate::error::{TspError, TspResult};
use crate::instance::Instance;
use crate::NodeId;

/// A closed tour over every city of an instance, together with its length.
///
/// The sequence is stored open (`n` entries, the return edge is implied);
/// [`Tour::closed`] gives the `n + 1` form with the first city repeated.
#[derive(Clone, Debug)]
pub struct Tour<'a> {
    tsp: &'a Instance,
    seq: Vec<NodeId>,
    cost: f64,
}

impl<'a> Tour<'a> {
    /// Builds a tour from an open sequence, checking that it is a permutation
    /// of `0..n`.
    pub fn new(tsp: &'a Instance, seq: Vec<NodeId>) -> TspResult<Self> {
        let n = tsp.n();
        if seq.len() != n {
            return Err(TspError::invalid_instance(format!(
                "tour visits {} cities, instance has {n}",
                seq.len()
            )));
        }
        let mut seen = vec![false; n];
        for &x in &seq {
            if x >= n || seen[x] {
                return Err(TspError::invalid_instance(format!(
                    "city {x} is out of range or repeated"
                )));
            }
            seen[x] = true;
        }
        Ok(Self::from_seq(tsp, seq))
    }

    /// Accepts a closed sequence (`first == last`) as produced by [`Tour::closed`].
    pub fn from_closed(tsp: &'a Instance, closed: &[NodeId]) -> TspResult<Self> {
        match closed {
            [first, .., last] if first == last => {
                Self::new(tsp, closed[..closed.len() - 1].to_vec())
            }
            _ => Err(TspError::invalid_instance(
                "closed tour must start and end at the same city",
            )),
        }
    }

    pub(crate) fn from_seq(tsp: &'a Instance, seq: Vec<NodeId>) -> Self {
        let mut t = Self { tsp, seq, cost: 0.0 };
        t.refresh_cost();
        t
    }

    pub fn instance(&self) -> &'a Instance {
        self.tsp
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn seq(&self) -> &[NodeId] {
        &self.seq
    }

    pub fn closed(&self) -> Vec<NodeId> {
        let mut v = self.seq.clone();
        if let Some(&first) = self.seq.first() {
            v.push(first);
        }
        v
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn start(&self) -> NodeId {
        self.seq[0]
    }

    pub fn inc(&self, i: usize) -> usize {
        let n = self.seq.len();
        let j = i + 1;
        if j >= n {
            j - n
        } else {
            j
        }
    }

    /// Edge length leaving position `i`.
    pub fn edge(&self, i: usize) -> f64 {
        self.tsp.d_ix(self.seq[i], self.seq[self.inc(i)])
    }

    /// Re-sums the edge lengths, discarding drift from incremental updates.
    pub(crate) fn refresh_cost(&mut self) {
        self.cost = (0..self.seq.len()).map(|i| self.edge(i)).sum();
    }

    pub(crate) fn sub_cost(&mut self, gain: f64) {
        self.cost -= gain;
    }

    /// Reverses positions `i..=j` in place; cost is left for the caller.
    pub(crate) fn reverse(&mut self, i: usize, j: usize) {
        self.seq[i..=j].reverse();
    }

    /// Exchanges the adjacent segments `i..j` and `j..k`.
    pub(crate) fn exchange(&mut self, i: usize, j: usize, k: usize) {
        self.seq[i..k].rotate_left(j - i);
    }

    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        self.seq.swap(i, j);
    }

    /// Same cycle, listed from `city`.
    pub fn rotated_to(&self, city: NodeId) -> Self {
        match self.seq.iter().position(|&x| x == city) {
            Some(0) | None => self.clone(),
            Some(p) => {
                let mut seq = self.seq.clone();
                seq.rotate_left(p);
                Self::from_seq(self.tsp, seq)
            }
        }
    }

    /// Checks the permutation invariant against the owning instance.
    pub fn is_valid(&self) -> bool {
        let n = self.tsp.n();
        let mut seen = vec![false; n];
        self.seq.len() == n
            && self.seq.iter().all(|&x| x < n && !std::mem::replace(&mut seen[x], true))
    }

    pub fn summary(&self) -> TourSummary {
        TourSummary {
            tour: self.closed(),
            cost: self.cost,
        }
    }
}

impl PartialEq for Tour<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

/// Owned, serializable view of a tour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourSummary {
    pub tour: Vec<NodeId>,
    pub cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::new(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_closed_and_cost() {
        let tsp = square();
        let t = Tour::new(&tsp, vec![0, 1, 2, 3]).unwrap();
        assert_eq!(t.closed(), vec![0, 1, 2, 3, 0]);
        assert_eq!(t.cost(), 4.0);
        assert_eq!(t.cost(), tsp.path_cost(&t.closed()));
    }

    #[test]
    fn test_crossing_cost() {
        let tsp = square();
        let t = Tour::new(&tsp, vec![0, 2, 1, 3]).unwrap();
        assert!((t.cost() - (2.0 + 2.0 * 2f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_bad_sequences() {
        let tsp = square();
        assert!(Tour::new(&tsp, vec![0, 1, 2]).is_err());
        assert!(Tour::new(&tsp, vec![0, 1, 1, 3]).is_err());
        assert!(Tour::new(&tsp, vec![0, 1, 2, 4]).is_err());
    }

    #[test]
    fn test_from_closed() {
        let tsp = square();
        let t = Tour::from_closed(&tsp, &[0, 3, 2, 1, 0]).unwrap();
        assert_eq!(t.seq(), &[0, 3, 2, 1]);
        assert!(Tour::from_closed(&tsp, &[0, 3, 2, 1, 2]).is_err());
        assert!(Tour::from_closed(&tsp, &[]).is_err());
    }

    #[test]
    fn test_rotated_to() {
        let tsp = square();
        let t = Tour::new(&tsp, vec![0, 1, 2, 3]).unwrap();
        let r = t.rotated_to(2);
        assert_eq!(r.seq(), &[2, 3, 0, 1]);
        assert_eq!(r.cost(), t.cost());
        assert!(r.is_valid());
    }

    #[test]
    fn test_reverse_keeps_validity() {
        let tsp = square();
        let mut t = Tour::new(&tsp, vec![0, 2, 1, 3]).unwrap();
        t.reverse(1, 2);
        t.refresh_cost();
        assert_eq!(t.seq(), &[0, 1, 2, 3]);
        assert!(t.is_valid());
        assert_eq!(t.cost(), 4.0);
    }

    #[test]
    fn test_exchange() {
        let tsp = Instance::random(6, 2).unwrap();
        let mut t = Tour::new(&tsp, vec![0, 1, 2, 3, 4, 5]).unwrap();
        t.exchange(1, 3, 5);
        assert_eq!(t.seq(), &[0, 3, 4, 1, 2, 5]);
        assert!(t.is_valid());
    }
}
