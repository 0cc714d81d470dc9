//! Prim-style minimum spanning tree over the k-d tree.
//!
//! Tree members are soft-deleted from the point set, so a nearest query
//! from a member answers "cheapest edge leaving the tree through me". The
//! heap holds the members, keyed by that edge; stale entries are re-keyed
//! when popped.

use log::{debug, info};
use rand::Rng;

use crate::data::DataSet;
use crate::dheap::DHeap;
use crate::kdtree::KdTree;
use crate::{Error, Result};

/// A spanning tree in end-end edge format plus its total length. With node
/// weights the length is Held-Karp style: each edge counts both endpoint
/// weights.
#[derive(Clone, Debug)]
pub struct SpanningTree {
    pub edges: Vec<(usize, usize)>,
    pub len: f64,
}

fn rekey(
    heap: &mut DHeap,
    tree: &KdTree,
    data: &DataSet,
    neighbor: &mut [Option<usize>],
    n: usize,
) {
    let nb = tree.node_nearest(data, n);
    neighbor[n] = Some(nb);
    heap.insert(n, data.weighted_edge_len(n, nb, tree.weights.as_deref()));
}

/// Finds a minimum weight spanning tree.
///
/// `weights` only matters when no external tree is given; an external tree
/// brings its own weights.
pub fn prim_spanning_tree<R: Rng>(
    kt: Option<&mut KdTree>,
    data: &DataSet,
    weights: Option<&[f64]>,
    rng: &mut R,
) -> Result<SpanningTree> {
    let ncount = data.len();
    if ncount < 2 {
        return Err(Error::invalid_data(format!(
            "cannot span a {ncount}-node graph"
        )));
    }
    info!("tour: find a minimum weight spanning tree over {ncount} nodes");

    let external = kt.is_some();
    let mut local;
    let tree = match kt {
        Some(tree) => tree,
        None => {
            local = KdTree::build(data, weights, rng)?;
            &mut local
        }
    };
    let result = run_prim(tree, data);
    if external {
        tree.undelete_all();
    }
    result
}

fn run_prim(tree: &mut KdTree, data: &DataSet) -> Result<SpanningTree> {
    let ncount = data.len();
    // neighbor[n] is Some once n has joined the tree.
    let mut neighbor: Vec<Option<usize>> = vec![None; ncount];
    let mut edges = Vec::with_capacity(ncount - 1);
    let mut heap = DHeap::new(ncount);
    let mut len = 0.0;

    tree.delete(0);
    rekey(&mut heap, tree, data, &mut neighbor, 0);

    for _ in 1..ncount {
        let n = loop {
            let Some(n) = heap.delete_min() else {
                return Err(Error::internal("spanning tree queue drained early"));
            };
            let Some(nb) = neighbor[n] else {
                return Err(Error::internal("heap held a node outside the tree"));
            };
            if neighbor[nb].is_none() {
                break n;
            }
            // The cached endpoint joined the tree in the meantime.
            rekey(&mut heap, tree, data, &mut neighbor, n);
        };
        let Some(nb) = neighbor[n] else {
            return Err(Error::internal("selected edge lost its endpoint"));
        };
        edges.push((n, nb));
        len += heap.key(n);
        tree.delete(nb);
        rekey(&mut heap, tree, data, &mut neighbor, nb);
        rekey(&mut heap, tree, data, &mut neighbor, n);
    }

    if let Some(weights) = tree.weights.as_deref() {
        let wsum: f64 = weights.iter().sum();
        debug!("tour: held-karp bound {:.2}", len - 2.0 * wsum);
    }
    Ok(SpanningTree { edges, len })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng};

    use super::prim_spanning_tree;
    use crate::data::DataSet;
    use crate::kdtree::KdTree;

    fn random_data(n: usize, seed: u64) -> DataSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let xs = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        let ys = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        DataSet::new(xs, ys)
    }

    fn brute_mst_len(data: &DataSet) -> f64 {
        let n = data.len();
        let mut in_tree = vec![false; n];
        let mut dist = vec![i32::MAX; n];
        in_tree[0] = true;
        for j in 1..n {
            dist[j] = data.edge_len(0, j);
        }
        let mut total = 0.0;
        for _ in 1..n {
            let next = (0..n)
                .filter(|&j| !in_tree[j])
                .min_by_key(|&j| dist[j])
                .unwrap();
            total += f64::from(dist[next]);
            in_tree[next] = true;
            for j in 0..n {
                if !in_tree[j] {
                    dist[j] = dist[j].min(data.edge_len(next, j));
                }
            }
        }
        total
    }

    #[test]
    fn spanning_tree_has_n_minus_one_edges_and_connects() {
        let data = random_data(80, 45);
        let mut rng = StdRng::seed_from_u64(45);
        let st = prim_spanning_tree(None, &data, None, &mut rng).expect("tree");
        assert_eq!(st.edges.len(), data.len() - 1);

        // Union-find connectivity check.
        let mut parent: Vec<usize> = (0..data.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for &(a, b) in &st.edges {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            assert_ne!(ra, rb, "edge ({a}, {b}) closes a cycle");
            parent[ra] = rb;
        }
    }

    #[test]
    fn spanning_tree_length_matches_prim_on_the_full_graph() {
        let data = random_data(60, 19);
        let mut rng = StdRng::seed_from_u64(19);
        let st = prim_spanning_tree(None, &data, None, &mut rng).expect("tree");
        assert!((st.len - brute_mst_len(&data)).abs() < 1e-6);
    }

    #[test]
    fn weighted_tree_counts_both_endpoint_weights() {
        let data = random_data(30, 8);
        let weights: Vec<f64> = (0..30).map(|i| f64::from(i % 5)).collect();
        let mut rng = StdRng::seed_from_u64(8);
        let mut tree = KdTree::build(&data, Some(&weights), &mut rng).expect("build");
        let st = prim_spanning_tree(Some(&mut tree), &data, None, &mut rng).expect("tree");
        let recomputed: f64 = st
            .edges
            .iter()
            .map(|&(a, b)| f64::from(data.edge_len(a, b)) + weights[a] + weights[b])
            .sum();
        assert!((st.len - recomputed).abs() < 1e-6);
        for k in 0..data.len() {
            assert!(tree.is_live(k));
        }
    }

    #[test]
    fn local_weighted_build_is_supported() {
        let data = random_data(25, 3);
        let weights = vec![1.5; 25];
        let mut rng = StdRng::seed_from_u64(3);
        let st = prim_spanning_tree(None, &data, Some(&weights), &mut rng).expect("tree");
        // Every edge carries 3.0 of weight on top of its length.
        let unweighted: f64 = st
            .edges
            .iter()
            .map(|&(a, b)| f64::from(data.edge_len(a, b)))
            .sum();
        assert!((st.len - unweighted - 3.0 * 24.0).abs() < 1e-6);
    }
}
