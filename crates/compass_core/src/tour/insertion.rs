//! Farthest-addition tour construction.
//!
//! The tour starts as a single node; at every step the unvisited node
//! farthest from the tour is spliced in next to its nearest tour node, on
//! whichever side costs less. The priority queue holds negated distances so
//! the farthest node pops first, and entries are refreshed lazily as the
//! tour grows.

use log::info;
use rand::Rng;

use crate::data::DataSet;
use crate::dheap::DHeap;
use crate::kdtree::KdTree;
use crate::tour::{Tour, with_tree};
use crate::{Error, Result};

pub fn farthest_addition_tour<R: Rng>(
    kt: Option<&mut KdTree>,
    data: &DataSet,
    start: usize,
    rng: &mut R,
) -> Result<Tour> {
    let ncount = data.len();
    if ncount < 3 {
        return Err(Error::invalid_data(format!(
            "cannot find a tour in a {ncount}-node graph"
        )));
    }
    info!("tour: grow a farthest addition tour from node {start}");

    with_tree(kt, data, rng, |tree| {
        let mut neighbor = vec![0usize; ncount];
        let mut next = vec![0usize; ncount];
        let mut prev = vec![0usize; ncount];
        let mut heap = DHeap::new(ncount);

        // Only tour members stay live, so nearest queries answer "nearest
        // tour node".
        tree.delete_all();
        tree.undelete(start);

        for i in 0..ncount {
            if i != start {
                neighbor[i] = start;
                heap.insert(i, -f64::from(data.edge_len(i, start)));
            }
        }
        next[start] = start;
        prev[start] = start;

        let Some(second) = heap.delete_min() else {
            return Err(Error::internal("farthest addition queue started empty"));
        };
        tree.undelete(second);
        next[second] = start;
        prev[second] = start;
        next[start] = second;
        prev[start] = second;

        for _ in 2..ncount {
            let (x, y) = loop {
                let Some(y) = heap.delete_min() else {
                    return Err(Error::internal(
                        "farthest addition queue drained before the tour closed",
                    ));
                };
                let x = tree.node_nearest(data, y);
                if x == neighbor[y] {
                    break (x, y);
                }
                // The tour grew since y was keyed; its nearest tour node
                // moved closer.
                heap.insert(y, -f64::from(data.edge_len(x, y)));
                neighbor[y] = x;
            };
            tree.undelete(y);

            let after = next[x];
            let before = prev[x];
            let delta_after = data.edge_len(y, after) - data.edge_len(x, after);
            let delta_before = data.edge_len(y, before) - data.edge_len(x, before);
            if delta_after <= delta_before {
                prev[y] = x;
                next[y] = after;
                prev[after] = y;
                next[x] = y;
            } else {
                next[y] = x;
                prev[y] = before;
                next[before] = y;
                prev[x] = y;
            }
        }

        let mut cycle = Vec::with_capacity(ncount);
        let mut len = 0.0;
        let mut at = start;
        loop {
            cycle.push(at);
            len += f64::from(data.edge_len(at, next[at]));
            at = next[at];
            if at == start {
                break;
            }
        }
        Ok(Tour { cycle, len })
    })
}
