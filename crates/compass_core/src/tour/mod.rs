//! Tour construction heuristics over the k-d tree.
//!
//! Every builder accepts an optional externally built [`KdTree`]; when none
//! is given a throwaway tree is built for the call. An external tree is
//! handed back with every point live again, whatever deletions the
//! heuristic performed.
//!
//! The greedy-style builders grow a set of paths and track, for each
//! endpoint, the other end of its path. That `tail` chain is what prevents
//! an edge from closing a subtour early.

mod boruvka;
mod greedy;
mod insertion;
mod nearest;
mod spanning;

pub use boruvka::{boruvka_tour, qboruvka_tour};
pub use greedy::greedy_tour;
pub use insertion::farthest_addition_tour;
pub use nearest::{Matching, nearest_neighbor_2match, nearest_neighbor_tour};
pub use spanning::{SpanningTree, prim_spanning_tree};

use rand::Rng;

use crate::data::DataSet;
use crate::kdtree::KdTree;
use crate::{Error, Result};

/// A closed tour: `cycle` visits every node once, `len` is the sum of the
/// edge lengths around the cycle.
#[derive(Clone, Debug)]
pub struct Tour {
    pub cycle: Vec<usize>,
    pub len: f64,
}

/// Recomputes the length of a cycle from scratch.
pub fn cycle_length(data: &DataSet, cycle: &[usize]) -> f64 {
    if cycle.len() < 2 {
        return 0.0;
    }
    let mut len = f64::from(data.edge_len(cycle[cycle.len() - 1], cycle[0]));
    for pair in cycle.windows(2) {
        len += f64::from(data.edge_len(pair[0], pair[1]));
    }
    len
}

/// Borrows the caller's tree or builds a throwaway one, runs `work`, and
/// restores an external tree to fully-live before handing back the result.
pub(crate) fn with_tree<R, T>(
    kt: Option<&mut KdTree>,
    data: &DataSet,
    rng: &mut R,
    work: impl FnOnce(&mut KdTree) -> Result<T>,
) -> Result<T>
where
    R: Rng,
{
    let external = kt.is_some();
    let mut local;
    let tree = match kt {
        Some(tree) => tree,
        None => {
            local = KdTree::build(data, None, rng)?;
            &mut local
        }
    };
    let result = work(tree);
    if external {
        tree.undelete_all();
    }
    result
}

/// Joins the path ending at `x` with the path ending at `y`, updating the
/// far-end links. A `None` tail means the node is still a bare singleton.
pub(crate) fn join_chains(tail: &mut [Option<usize>], x: usize, y: usize) {
    match (tail[x], tail[y]) {
        (None, None) => {
            tail[x] = Some(y);
            tail[y] = Some(x);
        }
        (None, Some(ty)) => {
            tail[x] = Some(ty);
            tail[ty] = Some(x);
        }
        (Some(tx), None) => {
            tail[tx] = Some(y);
            tail[y] = Some(tx);
        }
        (Some(tx), Some(ty)) => {
            tail[tx] = Some(ty);
            tail[ty] = Some(tx);
        }
    }
}

/// Finds the two remaining path ends once `ncount - 1` edges are in place.
pub(crate) fn open_ends(degree: &[u8]) -> Result<(usize, usize)> {
    let mut ends = degree.iter().enumerate().filter(|&(_, &d)| d == 1);
    match (ends.next(), ends.next()) {
        (Some((x, _)), Some((y, _))) => Ok((x, y)),
        _ => Err(Error::internal("expected exactly two open path ends")),
    }
}

/// Converts an edge set into a cycle in visiting order. Fails when the
/// edges do not form a single closed tour over all `ncount` nodes.
pub(crate) fn edge_to_cycle(ncount: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>> {
    if edges.len() != ncount {
        return Err(Error::internal(format!(
            "{} edges cannot close a {ncount}-node tour",
            edges.len()
        )));
    }
    const UNSET: usize = usize::MAX;
    let mut adj = vec![[UNSET; 2]; ncount];
    for &(a, b) in edges {
        for (from, to) in [(a, b), (b, a)] {
            if adj[from][0] == UNSET {
                adj[from][0] = to;
            } else if adj[from][1] == UNSET {
                adj[from][1] = to;
            } else {
                return Err(Error::internal(format!("node {from} has degree over 2")));
            }
        }
    }

    let mut cycle = Vec::with_capacity(ncount);
    let mut seen = vec![false; ncount];
    let mut prev = UNSET;
    let mut current = 0;
    for _ in 0..ncount {
        if seen[current] {
            return Err(Error::internal("edge set is not a single cycle"));
        }
        seen[current] = true;
        cycle.push(current);
        let [a, b] = adj[current];
        if a == UNSET || b == UNSET {
            return Err(Error::internal(format!("node {current} has degree under 2")));
        }
        let next = if a != prev { a } else { b };
        prev = current;
        current = next;
    }
    if current != 0 {
        return Err(Error::internal("edge set is not a single cycle"));
    }
    Ok(cycle)
}

#[cfg(test)]
pub(crate) fn assert_valid_tour(data: &DataSet, tour: &Tour) {
    let mut seen = vec![false; data.len()];
    assert_eq!(tour.cycle.len(), data.len());
    for &n in &tour.cycle {
        assert!(!seen[n], "node {n} visited twice");
        seen[n] = true;
    }
    let recomputed = cycle_length(data, &tour.cycle);
    assert!(
        (tour.len - recomputed).abs() < 1e-6,
        "reported {} but edges sum to {recomputed}",
        tour.len
    );
}
