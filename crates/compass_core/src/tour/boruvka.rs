//! Boruvka-style tour construction.
//!
//! Both variants grow paths by repeatedly matching open path ends with
//! their nearest eligible neighbor. Quick-Boruvka sweeps the nodes in
//! x-order and commits each edge immediately; full Boruvka collects the
//! candidate edge of every open end, sorts the round by length, and applies
//! the still-valid ones before starting the next round.

use log::{debug, info};
use rand::Rng;

use crate::data::DataSet;
use crate::kdtree::KdTree;
use crate::tour::{Tour, edge_to_cycle, join_chains, open_ends, with_tree};
use crate::{Error, Result};

/// Nearest live neighbor of `x` with its own chain tail hidden, so the
/// returned edge cannot close a subtour.
fn nearest_avoiding_tail(
    tree: &mut KdTree,
    data: &DataSet,
    tail: &[Option<usize>],
    x: usize,
) -> usize {
    match tail[x] {
        Some(tx) => {
            tree.delete(tx);
            let y = tree.node_nearest(data, x);
            tree.undelete(tx);
            y
        }
        None => tree.node_nearest(data, x),
    }
}

pub fn qboruvka_tour<R: Rng>(
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
    info!("tour: grow a quick-boruvka tour");

    with_tree(kt, data, rng, |tree| {
        let mut degree = vec![0u8; ncount];
        let mut tail: Vec<Option<usize>> = vec![None; ncount];
        let mut edges = Vec::with_capacity(ncount);
        let mut len = 0.0;

        let mut perm: Vec<usize> = (0..ncount).collect();
        perm.sort_by(|&a, &b| data.x(a).total_cmp(&data.x(b)));

        let mut count = 1;
        while count < ncount {
            for i in 0..ncount {
                if count == ncount {
                    break;
                }
                let x = perm[i];
                if degree[x] == 2 {
                    continue;
                }
                let y = nearest_avoiding_tail(tree, data, &tail, x);
                if degree[x] != 0 {
                    tree.delete(x);
                }
                if degree[y] != 0 {
                    tree.delete(y);
                }
                len += f64::from(data.edge_len(x, y));
                degree[x] += 1;
                degree[y] += 1;
                edges.push((x, y));
                join_chains(&mut tail, x, y);
                count += 1;
            }
        }

        let (x, y) = open_ends(&degree)?;
        edges.push((x, y));
        len += f64::from(data.edge_len(x, y));

        let cycle = edge_to_cycle(ncount, &edges)?;
        Ok(Tour { cycle, len })
    })
}

pub fn boruvka_tour<R: Rng>(
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
    info!("tour: grow a boruvka tour");

    with_tree(kt, data, rng, |tree| {
        let mut degree = vec![0u8; ncount];
        let mut tail: Vec<Option<usize>> = vec![None; ncount];
        let mut neighbor = vec![0usize; ncount];
        let mut lens = vec![0i32; ncount];
        let mut edges = Vec::with_capacity(ncount);
        let mut len = 0.0;

        // `open` holds the nodes still wanting edges; `order` doubles as
        // the sort permutation of the round and the next round's open set.
        let mut open: Vec<usize> = (0..ncount).collect();
        let mut order: Vec<usize> = vec![0; ncount];

        let mut count = 1;
        let mut rounds = 0;
        while count < ncount {
            rounds += 1;

            // Collect the candidate edge of every still-open node.
            let mut open_count = open.len();
            let mut i = 0;
            while i < open_count {
                let x = open[i];
                if degree[x] != 2 {
                    neighbor[i] = nearest_avoiding_tail(tree, data, &tail, x);
                    lens[i] = data.edge_len(x, neighbor[i]);
                    order[i] = i;
                    i += 1;
                } else {
                    open_count -= 1;
                    open[i] = open[open_count];
                }
            }
            order[..open_count].sort_by_key(|&slot| lens[slot]);

            let mut carried = 0;
            for i in 0..open_count {
                if count == ncount {
                    break;
                }
                let x = open[order[i]];
                if degree[x] == 2 {
                    continue;
                }
                let y = neighbor[order[i]];
                if degree[y] != 2 && tail[x] != Some(y) {
                    if degree[x] != 0 {
                        tree.delete(x);
                    } else {
                        order[carried] = x;
                        carried += 1;
                    }
                    if degree[y] != 0 {
                        tree.delete(y);
                    }
                    len += f64::from(data.edge_len(x, y));
                    degree[x] += 1;
                    degree[y] += 1;
                    edges.push((x, y));
                    join_chains(&mut tail, x, y);
                    count += 1;
                } else {
                    order[carried] = x;
                    carried += 1;
                }
            }
            open.truncate(open_count);
            std::mem::swap(&mut open, &mut order);
            open.truncate(carried);
            order.resize(ncount, 0);
        }
        debug!("tour: boruvka finished in {rounds} rounds");

        let (x, y) = open_ends(&degree)?;
        edges.push((x, y));
        len += f64::from(data.edge_len(x, y));

        let cycle = edge_to_cycle(ncount, &edges)?;
        Ok(Tour { cycle, len })
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng};

    use super::{boruvka_tour, qboruvka_tour};
    use crate::data::DataSet;
    use crate::kdtree::KdTree;
    use crate::tour::assert_valid_tour;

    fn random_data(n: usize, seed: u64) -> DataSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let xs = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        let ys = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        DataSet::new(xs, ys)
    }

    #[test]
    fn qboruvka_produces_a_valid_tour() {
        let data = random_data(140, 52);
        let mut rng = StdRng::seed_from_u64(52);
        let tour = qboruvka_tour(None, &data, &mut rng).expect("tour");
        assert_valid_tour(&data, &tour);
    }

    #[test]
    fn boruvka_produces_a_valid_tour() {
        let data = random_data(140, 53);
        let mut rng = StdRng::seed_from_u64(53);
        let tour = boruvka_tour(None, &data, &mut rng).expect("tour");
        assert_valid_tour(&data, &tour);
    }

    #[test]
    fn boruvka_restores_an_external_tree() {
        let data = random_data(65, 23);
        let mut rng = StdRng::seed_from_u64(23);
        let mut tree = KdTree::build(&data, None, &mut rng).expect("build");
        boruvka_tour(Some(&mut tree), &data, &mut rng).expect("tour");
        qboruvka_tour(Some(&mut tree), &data, &mut rng).expect("tour");
        for k in 0..data.len() {
            assert!(tree.is_live(k));
        }
    }

    #[test]
    fn both_variants_handle_small_instances() {
        let data = random_data(3, 2);
        let mut rng = StdRng::seed_from_u64(2);
        let tour = qboruvka_tour(None, &data, &mut rng).expect("tour");
        assert_eq!(tour.cycle.len(), 3);
        let tour = boruvka_tour(None, &data, &mut rng).expect("tour");
        assert_eq!(tour.cycle.len(), 3);
    }
}
