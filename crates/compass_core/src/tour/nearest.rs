//! Nearest-neighbor tour and 2-matching.

use log::{debug, info};
use rand::Rng;

use crate::data::DataSet;
use crate::kdtree::KdTree;
use crate::tour::{Tour, with_tree};
use crate::{Error, Result};

/// A 2-matching: every node meets exactly two edges, but the edges may form
/// several disjoint cycles.
#[derive(Clone, Debug)]
pub struct Matching {
    pub edges: Vec<(usize, usize)>,
    pub len: f64,
    pub cycles: usize,
}

/// Grows a tour by repeatedly walking to the nearest unvisited node.
pub fn nearest_neighbor_tour<R: Rng>(
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
    info!("tour: grow nearest neighbor tour from node {start}");

    with_tree(kt, data, rng, |tree| {
        let mut cycle = Vec::with_capacity(ncount);
        let mut len = 0.0;
        let mut current = start;
        cycle.push(start);
        for _ in 1..ncount {
            tree.delete(current);
            let next = tree.node_nearest(data, current);
            cycle.push(next);
            len += f64::from(data.edge_len(current, next));
            current = next;
        }
        len += f64::from(data.edge_len(current, start));
        Ok(Tour { cycle, len })
    })
}

/// Builds a nearest-neighbor 2-matching: chains are grown greedily and each
/// closes back onto its own start, so the result may contain several
/// cycles.
pub fn nearest_neighbor_2match<R: Rng>(
    kt: Option<&mut KdTree>,
    data: &DataSet,
    start: usize,
    rng: &mut R,
) -> Result<Matching> {
    let ncount = data.len();
    if ncount < 3 {
        return Err(Error::invalid_data(format!(
            "cannot find a 2-matching in a {ncount}-node graph"
        )));
    }
    info!("tour: grow nearest neighbor 2-matching from node {start}");

    with_tree(kt, data, rng, |tree| {
        let mut mark = vec![false; ncount];
        let mut edges = Vec::with_capacity(ncount);
        let mut len = 0.0;
        let mut count = 0;
        let mut cycles = 0;
        let mut start = start;

        while count < ncount {
            // The next circuit starts at the first unmarked node at or
            // after the previous start.
            let open = (start..ncount)
                .chain(0..start)
                .find(|&j| !mark[j])
                .ok_or_else(|| Error::internal("2-matching ran out of open nodes early"))?;
            start = open;
            mark[start] = true;
            tree.delete(start);
            let next = tree.node_nearest(data, start);
            mark[next] = true;
            len += f64::from(data.edge_len(start, next));
            edges.push((start, next));
            count += 1;

            tree.delete(next);
            let mut cur = tree.node_nearest(data, next);
            len += f64::from(data.edge_len(next, cur));
            edges.push((next, cur));
            count += 1;

            // Leave the start live so the chain can close back onto it.
            tree.undelete(start);
            while cur != start && count < ncount - 3 {
                mark[cur] = true;
                tree.delete(cur);
                let next = tree.node_nearest(data, cur);
                len += f64::from(data.edge_len(cur, next));
                edges.push((cur, next));
                count += 1;
                cur = next;
            }
            tree.delete(start);

            if cur != start {
                // Too few nodes remain for another circuit; run the chain
                // out and close it by hand.
                while count < ncount - 1 {
                    mark[cur] = true;
                    tree.delete(cur);
                    let next = tree.node_nearest(data, cur);
                    len += f64::from(data.edge_len(cur, next));
                    edges.push((cur, next));
                    count += 1;
                    cur = next;
                }
                len += f64::from(data.edge_len(cur, start));
                edges.push((cur, start));
                count += 1;
            }
            cycles += 1;
        }

        debug!("tour: 2-matching has {cycles} cycles, length {len}");
        Ok(Matching { edges, len, cycles })
    })
}
