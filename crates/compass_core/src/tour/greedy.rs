//! Greedy tour construction.
//!
//! Based on Bentley's "Fast algorithms for geometric traveling salesman
//! problems": every node sits in a priority queue keyed by the distance to
//! its nearest eligible neighbor, and the cheapest edge that neither closes
//! a subtour nor exceeds degree two is added. Queue entries go stale as
//! nodes fill up; they are re-keyed lazily when popped.

use log::info;
use rand::Rng;

use crate::data::DataSet;
use crate::dheap::DHeap;
use crate::kdtree::KdTree;
use crate::tour::{Tour, edge_to_cycle, join_chains, open_ends, with_tree};
use crate::{Error, Result};

/// Re-keys `n`: its nearest live neighbor with the node itself (and its
/// chain tail, handled by the caller) out of the way.
fn rekey(
    heap: &mut DHeap,
    tree: &mut KdTree,
    data: &DataSet,
    neighbor: &mut [usize],
    n: usize,
) {
    tree.delete(n);
    let nb = tree.node_nearest(data, n);
    tree.undelete(n);
    neighbor[n] = nb;
    heap.insert(n, f64::from(data.edge_len(n, nb)));
}

pub fn greedy_tour<R: Rng>(
    kt: Option<&mut KdTree>,
    data: &DataSet,
    rng: &mut R,
) -> Result<Tour> {
    let ncount = data.len();
    if ncount < 3 {
        return Err(Error::invalid_data(format!(
            "cannot find a tour in a {ncount}-node graph"
        )));
    }
    info!("tour: grow a greedy tour");

    with_tree(kt, data, rng, |tree| {
        let mut neighbor = vec![0usize; ncount];
        let mut degree = vec![0u8; ncount];
        let mut tail: Vec<Option<usize>> = vec![None; ncount];
        let mut edges = Vec::with_capacity(ncount);
        let mut heap = DHeap::new(ncount);

        for n in 0..ncount {
            rekey(&mut heap, tree, data, &mut neighbor, n);
        }

        let mut len = 0.0;
        for _ in 1..ncount {
            let (x, y) = loop {
                let Some(x) = heap.delete_min() else {
                    return Err(Error::internal("greedy queue drained before the tour closed"));
                };
                if degree[x] == 2 {
                    continue;
                }
                let y = neighbor[x];
                if degree[y] < 2 && tail[x] != Some(y) {
                    break (x, y);
                }
                // The cached neighbor is no longer usable; recompute with
                // the chain tail hidden so the new edge cannot close a
                // subtour.
                if let Some(tx) = tail[x] {
                    tree.delete(tx);
                    rekey(&mut heap, tree, data, &mut neighbor, x);
                    tree.undelete(tx);
                } else {
                    rekey(&mut heap, tree, data, &mut neighbor, x);
                }
            };

            edges.push((x, y));
            len += heap.key(x);
            degree[x] += 1;
            if degree[x] == 2 {
                tree.delete(x);
            }
            degree[y] += 1;
            if degree[y] == 2 {
                tree.delete(y);
            }
            join_chains(&mut tail, x, y);
            if degree[x] == 1 {
                if let Some(tx) = tail[x] {
                    tree.delete(tx);
                    rekey(&mut heap, tree, data, &mut neighbor, x);
                    tree.undelete(tx);
                }
            }
        }

        let (x, y) = open_ends(&degree)?;
        edges.push((x, y));
        len += f64::from(data.edge_len(x, y));

        let cycle = edge_to_cycle(ncount, &edges)?;
        Ok(Tour { cycle, len })
    })
}
