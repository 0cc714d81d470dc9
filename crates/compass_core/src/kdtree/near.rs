//! Nearest-neighbor queries over the semidynamic tree.
//!
//! Every query starts at the target's own bucket and climbs toward the root,
//! descending into a sibling subtree only when the current worst candidate
//! distance cannot rule it out. The climb stops early once a recorded
//! bounding box fully contains the search ball.
//!
//! Distances use the active norm of the data set, so pruning relies on the
//! norm being bounded below by the truncated per-axis coordinate difference.
//! That holds for the four planar norms the tree accepts.

use std::sync::Once;

use log::{debug, warn};
use rand::Rng;

use crate::data::DataSet;
use crate::dheap::DHeap;
use crate::kdtree::{BIGDOUBLE, Bounds, CutDim, KdTree};
use crate::{Error, Result};

/// When to switch the k-nearest candidate set from a sorted list to a heap.
const NEAR_HEAP_CUTOFF: usize = 100;

static SHORT_NEIGHBORS: Once = Once::new();

/// Truncation toward zero, matching the integer rounding floor of the
/// coordinate norms.
fn dtrunc(x: f64) -> f64 {
    x.trunc()
}

fn ball_in_bounds(data: &DataSet, bnds: &Bounds, n: usize, dist: f64) -> bool {
    !(dtrunc(data.x(n) - bnds.x[0]) < dist
        || dtrunc(bnds.x[1] - data.x(n)) < dist
        || dtrunc(data.y(n) - bnds.y[0]) < dist
        || dtrunc(bnds.y[1] - data.y(n)) < dist)
}

/// Candidate set for a k-nearest query. A descending sorted list wins for
/// small k; past the cutoff a heap keyed on negated distance takes over.
enum Candidates {
    List {
        // lens[0] is the worst candidate; lens[num] is a low sentinel so
        // insertion never walks off the end.
        lens: Vec<f64>,
        ends: Vec<usize>,
    },
    Heap {
        heap: DHeap,
        names: Vec<usize>,
        count: usize,
        worst: f64,
    },
}

impl Candidates {
    fn new(num: usize) -> Self {
        if num >= NEAR_HEAP_CUTOFF {
            Self::Heap {
                heap: DHeap::new(num),
                names: vec![0; num],
                count: 0,
                worst: BIGDOUBLE,
            }
        } else {
            let mut lens = vec![BIGDOUBLE; num + 1];
            lens[num] = -BIGDOUBLE;
            Self::List {
                lens,
                ends: vec![0; num],
            }
        }
    }

    fn worst(&self) -> f64 {
        match self {
            Self::List { lens, .. } => lens[0],
            Self::Heap { worst, .. } => *worst,
        }
    }

    fn offer(&mut self, end: usize, dist: f64) {
        match self {
            Self::List { lens, ends } => {
                if lens[0] > dist {
                    let mut k = 0;
                    while lens[k + 1] > dist {
                        lens[k] = lens[k + 1];
                        ends[k] = ends[k + 1];
                        k += 1;
                    }
                    lens[k] = dist;
                    ends[k] = end;
                }
            }
            Self::Heap {
                heap,
                names,
                count,
                worst,
            } => {
                if *count < names.len() {
                    names[*count] = end;
                    heap.insert(*count, -dist);
                    *count += 1;
                } else if *worst > dist {
                    let Some(slot) = heap.delete_min() else {
                        return;
                    };
                    names[slot] = end;
                    heap.insert(slot, -dist);
                    if let Some(min) = heap.peek_min() {
                        *worst = -heap.key(min);
                    }
                }
            }
        }
    }

    /// Drains into a fixed-length list, `None`-padded when fewer neighbors
    /// exist than were asked for.
    fn into_list(self, num: usize) -> Vec<Option<usize>> {
        let mut list = Vec::with_capacity(num);
        match self {
            Self::List { lens, ends } => {
                for i in 0..num {
                    if lens[i] < BIGDOUBLE {
                        list.push(Some(ends[i]));
                    }
                }
            }
            Self::Heap { names, count, .. } => {
                list.extend(names[..count].iter().copied().map(Some));
            }
        }
        list.resize(num, None);
        list
    }

    fn is_short(&self, num: usize) -> bool {
        match self {
            Self::List { lens, .. } => lens.iter().take(num).any(|&l| l >= BIGDOUBLE),
            Self::Heap { count, .. } => *count < num,
        }
    }
}

struct KnnSearch<'a> {
    tree: &'a KdTree,
    data: &'a DataSet,
    datw: Option<&'a [f64]>,
    target: usize,
    bounds: Option<Bounds>,
    cand: Candidates,
}

impl KnnSearch<'_> {
    fn in_bounds(&self, c: usize) -> bool {
        match &self.bounds {
            None => true,
            Some(b) => {
                self.data.x(c) >= b.x[0]
                    && self.data.x(c) <= b.x[1]
                    && self.data.y(c) >= b.y[0]
                    && self.data.y(c) <= b.y[1]
            }
        }
    }

    fn visit(&mut self, p: usize) {
        let node = &self.tree.nodes[p];
        if node.empty {
            return;
        }
        if node.bucket {
            for i in node.lopt..node.hiend {
                let c = self.tree.perm[i];
                if c != self.target && self.in_bounds(c) {
                    let dist = self.data.weighted_edge_len(c, self.target, self.datw);
                    self.cand.offer(c, dist);
                }
            }
            return;
        }
        let val = node.cutval;
        let (loson, hison) = (node.loson, node.hison);
        match node.cutdim {
            CutDim::X => {
                let thisx = self.data.x(self.target);
                if thisx < val {
                    self.visit(loson);
                    if self.cand.worst() > dtrunc(val - thisx)
                        && self.bounds.is_none_or(|b| val >= b.x[0])
                    {
                        self.visit(hison);
                    }
                } else {
                    self.visit(hison);
                    if self.cand.worst() > dtrunc(thisx - val)
                        && self.bounds.is_none_or(|b| val <= b.x[1])
                    {
                        self.visit(loson);
                    }
                }
            }
            CutDim::Y => {
                let thisy = self.data.y(self.target);
                if thisy < val {
                    self.visit(loson);
                    if self.cand.worst() > dtrunc(val - thisy)
                        && self.bounds.is_none_or(|b| val >= b.y[0])
                    {
                        self.visit(hison);
                    }
                } else {
                    self.visit(hison);
                    if self.cand.worst() > dtrunc(thisy - val)
                        && self.bounds.is_none_or(|b| val <= b.y[1])
                    {
                        self.visit(loson);
                    }
                }
            }
            CutDim::W => {
                // The low side holds the lighter points and is always worth
                // a look; the heavy side only if the cut weight alone cannot
                // beat the worst candidate.
                let w = self.datw.map_or(0.0, |w| w[self.target]);
                self.visit(loson);
                if self.cand.worst() > val + w {
                    self.visit(hison);
                }
            }
        }
    }
}

impl KdTree {
    /// Returns the live point nearest to `target` (itself excluded), or
    /// `target` when no other live point exists.
    pub fn node_nearest(&self, data: &DataSet, target: usize) -> usize {
        let datw = self.weights.as_deref();
        let mut ndist = BIGDOUBLE;
        let mut nnode = target;
        let mut p = self.bucketptr[target];
        self.nearest_work(data, datw, p, target, &mut ndist, &mut nnode);
        loop {
            let last = p;
            let Some(father) = self.father_of(p) else {
                break;
            };
            p = father;
            let node = &self.nodes[p];
            match node.cutdim {
                CutDim::X => {
                    let diff = node.cutval - data.x(target);
                    if last == node.loson {
                        if ndist > dtrunc(diff) {
                            self.nearest_work(data, datw, node.hison, target, &mut ndist, &mut nnode);
                        }
                    } else if ndist > dtrunc(-diff) {
                        self.nearest_work(data, datw, node.loson, target, &mut ndist, &mut nnode);
                    }
                }
                CutDim::Y => {
                    let diff = node.cutval - data.y(target);
                    if last == node.loson {
                        if ndist > dtrunc(diff) {
                            self.nearest_work(data, datw, node.hison, target, &mut ndist, &mut nnode);
                        }
                    } else if ndist > dtrunc(-diff) {
                        self.nearest_work(data, datw, node.loson, target, &mut ndist, &mut nnode);
                    }
                }
                CutDim::W => {
                    if last == node.loson {
                        let w = datw.map_or(0.0, |w| w[target]);
                        if ndist > node.cutval + w {
                            self.nearest_work(data, datw, node.hison, target, &mut ndist, &mut nnode);
                        }
                    } else {
                        self.nearest_work(data, datw, node.loson, target, &mut ndist, &mut nnode);
                    }
                }
            }
            if datw.is_none()
                && let Some(bnds) = &self.nodes[p].bnds
                && ball_in_bounds(data, bnds, target, ndist)
            {
                break;
            }
        }
        nnode
    }

    fn nearest_work(
        &self,
        data: &DataSet,
        datw: Option<&[f64]>,
        p: usize,
        target: usize,
        ndist: &mut f64,
        nnode: &mut usize,
    ) {
        let node = &self.nodes[p];
        if node.empty {
            return;
        }
        if node.bucket {
            for i in node.lopt..node.hiend {
                let c = self.perm[i];
                if c != target {
                    let dist = data.weighted_edge_len(c, target, datw);
                    if *ndist > dist {
                        *ndist = dist;
                        *nnode = c;
                    }
                }
            }
            return;
        }
        let val = node.cutval;
        let (loson, hison) = (node.loson, node.hison);
        match node.cutdim {
            CutDim::X => {
                let thisx = data.x(target);
                if thisx < val {
                    self.nearest_work(data, datw, loson, target, ndist, nnode);
                    if *ndist > dtrunc(val - thisx) {
                        self.nearest_work(data, datw, hison, target, ndist, nnode);
                    }
                } else {
                    self.nearest_work(data, datw, hison, target, ndist, nnode);
                    if *ndist > dtrunc(thisx - val) {
                        self.nearest_work(data, datw, loson, target, ndist, nnode);
                    }
                }
            }
            CutDim::Y => {
                let thisy = data.y(target);
                if thisy < val {
                    self.nearest_work(data, datw, loson, target, ndist, nnode);
                    if *ndist > dtrunc(val - thisy) {
                        self.nearest_work(data, datw, hison, target, ndist, nnode);
                    }
                } else {
                    self.nearest_work(data, datw, hison, target, ndist, nnode);
                    if *ndist > dtrunc(thisy - val) {
                        self.nearest_work(data, datw, loson, target, ndist, nnode);
                    }
                }
            }
            CutDim::W => {
                let w = datw.map_or(0.0, |w| w[target]);
                self.nearest_work(data, datw, loson, target, ndist, nnode);
                if *ndist > val + w {
                    self.nearest_work(data, datw, hison, target, ndist, nnode);
                }
            }
        }
    }

    /// Returns the `k` live points nearest to `target`, in no particular
    /// order, `None`-padded when the tree holds fewer live points.
    pub fn node_k_nearest(&self, data: &DataSet, target: usize, k: usize) -> Vec<Option<usize>> {
        self.run_node_k_nearest(data, target, k, None)
    }

    /// Returns up to `k` nearest live points in each of the four axis
    /// quadrants around `target`, deduplicated across the shared quadrant
    /// boundaries and `None`-padded to length `4 * k`.
    pub fn node_quadrant_k_nearest(
        &self,
        data: &DataSet,
        target: usize,
        k: usize,
    ) -> Vec<Option<usize>> {
        let x = data.x(target);
        let y = data.y(target);
        let quadrants = [
            Bounds { x: [x, BIGDOUBLE], y: [y, BIGDOUBLE] },
            Bounds { x: [x, BIGDOUBLE], y: [-BIGDOUBLE, y] },
            Bounds { x: [-BIGDOUBLE, x], y: [-BIGDOUBLE, y] },
            Bounds { x: [-BIGDOUBLE, x], y: [y, BIGDOUBLE] },
        ];
        let mut list: Vec<Option<usize>> = Vec::with_capacity(4 * k);
        for bounds in quadrants {
            let sub = self.run_node_k_nearest(data, target, k, Some(bounds));
            for c in sub.into_iter().flatten() {
                if !list.contains(&Some(c)) {
                    list.push(Some(c));
                }
            }
        }
        list.resize(4 * k, None);
        list
    }

    fn run_node_k_nearest(
        &self,
        data: &DataSet,
        target: usize,
        num: usize,
        bounds: Option<Bounds>,
    ) -> Vec<Option<usize>> {
        if num == 0 {
            return Vec::new();
        }
        let datw = self.weights.as_deref();
        let boxed = bounds.is_some();
        let mut search = KnnSearch {
            tree: self,
            data,
            datw,
            target,
            bounds,
            cand: Candidates::new(num),
        };

        let mut p = self.bucketptr[target];
        search.visit(p);
        loop {
            let last = p;
            let Some(father) = self.father_of(p) else {
                break;
            };
            p = father;
            let node = &self.nodes[p];
            match node.cutdim {
                CutDim::X => {
                    let diff = node.cutval - data.x(target);
                    if last == node.loson {
                        if search.cand.worst() > dtrunc(diff)
                            && search.bounds.is_none_or(|b| node.cutval <= b.x[1])
                        {
                            search.visit(node.hison);
                        }
                    } else if search.cand.worst() > dtrunc(-diff)
                        && search.bounds.is_none_or(|b| node.cutval >= b.x[0])
                    {
                        search.visit(node.loson);
                    }
                }
                CutDim::Y => {
                    let diff = node.cutval - data.y(target);
                    if last == node.loson {
                        if search.cand.worst() > dtrunc(diff)
                            && search.bounds.is_none_or(|b| node.cutval <= b.y[1])
                        {
                            search.visit(node.hison);
                        }
                    } else if search.cand.worst() > dtrunc(-diff)
                        && search.bounds.is_none_or(|b| node.cutval >= b.y[0])
                    {
                        search.visit(node.loson);
                    }
                }
                CutDim::W => {
                    if last == node.loson {
                        let w = datw.map_or(0.0, |w| w[target]);
                        if search.cand.worst() > node.cutval + w {
                            search.visit(node.hison);
                        }
                    } else {
                        search.visit(node.loson);
                    }
                }
            }
            // The extra box check against the recorded bounds does not pay
            // off for quadrant queries, so only the unboxed walk stops
            // early.
            if datw.is_none()
                && !boxed
                && let Some(bnds) = &self.nodes[p].bnds
                && ball_in_bounds(data, bnds, target, search.cand.worst())
            {
                break;
            }
        }

        if !boxed && search.cand.is_short(num) {
            SHORT_NEIGHBORS.call_once(|| {
                warn!("knn: fewer than {num} live neighbors exist, padding the list");
            });
        }
        search.cand.into_list(num)
    }

    fn run_k_nearest_graph(
        &self,
        data: &DataSet,
        k: usize,
        doquad: bool,
    ) -> Result<Vec<(usize, usize)>> {
        let ncount = data.len();
        if ncount != self.len() {
            return Err(Error::invalid_data(format!(
                "tree over {} points asked for a {ncount}-point graph",
                self.len()
            )));
        }
        let mut table: Vec<Vec<usize>> = vec![Vec::new(); ncount];
        let mut ntotal = 0usize;
        for n in 0..ncount {
            let list = if doquad {
                self.node_quadrant_k_nearest(data, n, k)
            } else {
                self.node_k_nearest(data, n, k)
            };
            for other in list.into_iter().flatten() {
                let (a, b) = if other < n { (other, n) } else { (n, other) };
                if !table[a].contains(&b) {
                    table[a].push(b);
                    ntotal += 1;
                }
            }
        }
        debug!(
            "knn: {} graph has {ntotal} edges for k={k}",
            if doquad { "quadrant" } else { "nearest" }
        );

        let mut edges = Vec::with_capacity(ntotal);
        for (a, adj) in table.into_iter().enumerate() {
            for b in adj {
                edges.push((a, b));
            }
        }
        Ok(edges)
    }

    /// Calls `doit` for every live point within `radius` of `target`. The
    /// callback returns `true` to stop the search; the function returns
    /// whether it was stopped.
    pub fn fixed_radius_nearest<F>(
        &self,
        data: &DataSet,
        target: usize,
        radius: f64,
        doit: &mut F,
    ) -> bool
    where
        F: FnMut(usize, usize) -> bool,
    {
        let datw = self.weights.as_deref();
        let xtarget = data.x(target);
        let ytarget = data.y(target);
        // With weights the radius shrinks by the target's own weight before
        // any geometric pruning.
        let walk_dist = match datw {
            Some(w) => radius - w[target],
            None => radius,
        };

        let mut p = self.bucketptr[target];
        if self.fixed_radius_work(data, datw, p, target, radius, xtarget, ytarget, doit) {
            return true;
        }
        loop {
            let last = p;
            let Some(father) = self.father_of(p) else {
                return false;
            };
            p = father;
            let node = &self.nodes[p];
            let diff = match node.cutdim {
                CutDim::X => node.cutval - xtarget,
                CutDim::Y => node.cutval - ytarget,
                CutDim::W => node.cutval,
            };
            if last == node.loson {
                if walk_dist > dtrunc(diff)
                    && self.fixed_radius_work(
                        data, datw, node.hison, target, radius, xtarget, ytarget, doit,
                    )
                {
                    return true;
                }
            } else if (walk_dist > dtrunc(-diff) || node.cutdim == CutDim::W)
                && self.fixed_radius_work(
                    data, datw, node.loson, target, radius, xtarget, ytarget, doit,
                )
            {
                return true;
            }
            if let Some(bnds) = &node.bnds
                && ball_in_bounds(data, bnds, target, walk_dist)
            {
                return false;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fixed_radius_work<F>(
        &self,
        data: &DataSet,
        datw: Option<&[f64]>,
        p: usize,
        target: usize,
        dist: f64,
        xtarget: f64,
        ytarget: f64,
        doit: &mut F,
    ) -> bool
    where
        F: FnMut(usize, usize) -> bool,
    {
        let node = &self.nodes[p];
        if node.empty {
            return false;
        }
        if node.bucket {
            for i in node.lopt..node.hiend {
                let c = self.perm[i];
                if c != target
                    && data.weighted_edge_len(c, target, datw) < dist
                    && doit(target, c)
                {
                    return true;
                }
            }
            return false;
        }

        let wdist = match datw {
            Some(w) => dist - w[target],
            None => dist,
        };
        let val = node.cutval;
        let (loson, hison) = (node.loson, node.hison);
        let thisx = match node.cutdim {
            CutDim::X => xtarget,
            CutDim::Y => ytarget,
            CutDim::W => {
                if self.fixed_radius_work(data, datw, loson, target, dist, xtarget, ytarget, doit)
                {
                    return true;
                }
                return val <= wdist
                    && self.fixed_radius_work(
                        data, datw, hison, target, dist, xtarget, ytarget, doit,
                    );
            }
        };
        if thisx < val {
            if self.fixed_radius_work(data, datw, loson, target, dist, xtarget, ytarget, doit) {
                return true;
            }
            wdist > dtrunc(val - thisx)
                && self.fixed_radius_work(data, datw, hison, target, dist, xtarget, ytarget, doit)
        } else {
            if self.fixed_radius_work(data, datw, hison, target, dist, xtarget, ytarget, doit) {
                return true;
            }
            wdist > dtrunc(thisx - val)
                && self.fixed_radius_work(data, datw, loson, target, dist, xtarget, ytarget, doit)
        }
    }
}

/// Builds the k-nearest-neighbor edge set over all live points, with
/// duplicate edges removed and every edge stored as `(low, high)`. A
/// throwaway tree is built when none is given.
pub fn k_nearest_graph<R: Rng>(
    kt: Option<&KdTree>,
    data: &DataSet,
    k: usize,
    rng: &mut R,
) -> Result<Vec<(usize, usize)>> {
    with_graph_tree(kt, data, rng, |tree| tree.run_k_nearest_graph(data, k, false))
}

/// Builds the quadrant variant of the neighbor edge set.
pub fn quadrant_k_nearest_graph<R: Rng>(
    kt: Option<&KdTree>,
    data: &DataSet,
    k: usize,
    rng: &mut R,
) -> Result<Vec<(usize, usize)>> {
    with_graph_tree(kt, data, rng, |tree| tree.run_k_nearest_graph(data, k, true))
}

fn with_graph_tree<R, T>(
    kt: Option<&KdTree>,
    data: &DataSet,
    rng: &mut R,
    work: impl FnOnce(&KdTree) -> Result<T>,
) -> Result<T>
where
    R: Rng,
{
    let local;
    let tree = match kt {
        Some(tree) => tree,
        None => {
            local = KdTree::build(data, None, rng)?;
            &local
        }
    };
    work(tree)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::{k_nearest_graph, quadrant_k_nearest_graph};
    use crate::data::{DataSet, Norm};
    use crate::kdtree::KdTree;

    fn random_data(n: usize, seed: u64) -> DataSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let xs = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        let ys = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        DataSet::new(xs, ys)
    }

    fn brute_nearest(data: &DataSet, target: usize, dead: &[usize]) -> usize {
        let mut best = target;
        let mut best_len = i32::MAX;
        for c in 0..data.len() {
            if c == target || dead.contains(&c) {
                continue;
            }
            let len = data.edge_len(c, target);
            if len < best_len {
                best_len = len;
                best = c;
            }
        }
        best
    }

    #[test]
    fn nearest_matches_brute_force_on_random_points() {
        let data = random_data(200, 42);
        let mut rng = StdRng::seed_from_u64(7);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        for target in 0..data.len() {
            let got = tree.node_nearest(&data, target);
            let want = brute_nearest(&data, target, &[]);
            assert_eq!(
                data.edge_len(got, target),
                data.edge_len(want, target),
                "target {target}"
            );
        }
    }

    #[test]
    fn nearest_skips_deleted_points() {
        let data = random_data(80, 5);
        let mut rng = StdRng::seed_from_u64(13);
        let mut tree = KdTree::build(&data, None, &mut rng).expect("build");
        let target = 10;
        let first = tree.node_nearest(&data, target);
        tree.delete(first);
        let second = tree.node_nearest(&data, target);
        assert_ne!(second, first);
        assert_eq!(
            data.edge_len(second, target),
            data.edge_len(brute_nearest(&data, target, &[first]), target)
        );
        tree.undelete(first);
        let again = tree.node_nearest(&data, target);
        assert_eq!(data.edge_len(again, target), data.edge_len(first, target));
    }

    #[test]
    fn nearest_from_square_center_is_a_corner() {
        let data = DataSet::new(
            vec![0.0, 0.0, 1000.0, 1000.0, 500.0],
            vec![0.0, 1000.0, 1000.0, 0.0, 500.0],
        );
        let mut rng = StdRng::seed_from_u64(1);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let got = tree.node_nearest(&data, 4);
        assert!(got < 4);
        assert_eq!(data.edge_len(got, 4), data.edge_len(0, 4));
    }

    #[test]
    fn k_nearest_from_square_center_finds_all_corners() {
        let data = DataSet::new(
            vec![0.0, 0.0, 1000.0, 1000.0, 500.0],
            vec![0.0, 1000.0, 1000.0, 0.0, 500.0],
        );
        let mut rng = StdRng::seed_from_u64(1);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let mut list: Vec<usize> = tree.node_k_nearest(&data, 4, 4).into_iter().flatten().collect();
        list.sort_unstable();
        assert_eq!(list, vec![0, 1, 2, 3]);
    }

    #[test]
    fn k_nearest_matches_brute_force_distances() {
        let data = random_data(150, 99);
        let mut rng = StdRng::seed_from_u64(3);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let k = 8;
        for target in [0, 17, 63, 149] {
            let got: Vec<usize> = tree
                .node_k_nearest(&data, target, k)
                .into_iter()
                .flatten()
                .collect();
            assert_eq!(got.len(), k);

            let mut lens: Vec<i32> = (0..data.len())
                .filter(|&c| c != target)
                .map(|c| data.edge_len(c, target))
                .collect();
            lens.sort_unstable();
            let mut got_lens: Vec<i32> =
                got.iter().map(|&c| data.edge_len(c, target)).collect();
            got_lens.sort_unstable();
            assert_eq!(got_lens, lens[..k].to_vec(), "target {target}");
        }
    }

    #[test]
    fn k_nearest_pads_when_tree_runs_dry() {
        let data = random_data(6, 2);
        let mut rng = StdRng::seed_from_u64(2);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let list = tree.node_k_nearest(&data, 0, 10);
        assert_eq!(list.len(), 10);
        assert_eq!(list.iter().flatten().count(), 5);
        assert!(list[5..].iter().all(Option::is_none));
    }

    #[test]
    fn quadrant_k_nearest_covers_all_four_quadrants() {
        // One point deep in each quadrant around the center, plus nearer
        // fillers in the first quadrant that a plain 4-nearest would take.
        let data = DataSet::new(
            vec![500.0, 510.0, 520.0, 900.0, 900.0, 100.0, 100.0],
            vec![500.0, 510.0, 520.0, 900.0, 100.0, 100.0, 900.0],
        );
        let mut rng = StdRng::seed_from_u64(4);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let list: Vec<usize> = tree
            .node_quadrant_k_nearest(&data, 0, 1)
            .into_iter()
            .flatten()
            .collect();
        for corner in [4, 5, 6] {
            assert!(list.contains(&corner), "missing quadrant point {corner}");
        }
        assert!(list.contains(&1));
    }

    #[test]
    fn quadrant_list_is_padded_and_duplicate_free() {
        let data = random_data(40, 8);
        let mut rng = StdRng::seed_from_u64(8);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let list = tree.node_quadrant_k_nearest(&data, 5, 3);
        assert_eq!(list.len(), 12);
        let found: Vec<usize> = list.iter().copied().flatten().collect();
        let mut dedup = found.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(found.len(), dedup.len());
    }

    #[test]
    fn k_nearest_graph_has_no_duplicate_edges() {
        let data = random_data(60, 77);
        let mut rng = StdRng::seed_from_u64(77);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let edges = k_nearest_graph(Some(&tree), &data, 5, &mut rng).expect("graph");
        let mut seen = edges.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), edges.len());
        for &(a, b) in &edges {
            assert!(a < b);
        }
        // Every node keeps at least its own k neighbors in the graph.
        for n in 0..data.len() {
            let deg = edges.iter().filter(|&&(a, b)| a == n || b == n).count();
            assert!(deg >= 5, "node {n} has degree {deg}");
        }
    }

    #[test]
    fn quadrant_graph_deduplicates_and_keeps_nearest_edges() {
        let data = random_data(50, 21);
        let mut rng = StdRng::seed_from_u64(21);
        // No tree passed in, so a throwaway one is built for the call.
        let edges = quadrant_k_nearest_graph(None, &data, 2, &mut rng).expect("graph");
        let mut seen = edges.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), edges.len());
        for &(a, b) in &edges {
            assert!(a < b);
        }
        // The overall nearest neighbor sits in one of the four quadrants,
        // so every node keeps an edge at least that short.
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        for n in 0..data.len() {
            let d = data.edge_len(n, tree.node_nearest(&data, n));
            assert!(
                edges
                    .iter()
                    .any(|&(a, b)| (a == n || b == n) && data.edge_len(a, b) <= d),
                "node {n} lost its nearest edge"
            );
        }
    }

    #[test]
    fn fixed_radius_visits_exactly_the_ball() {
        let data = random_data(120, 31);
        let mut rng = StdRng::seed_from_u64(31);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let target = 44;
        let radius = 200.0;
        let mut got = Vec::new();
        let stopped = tree.fixed_radius_nearest(&data, target, radius, &mut |_, c| {
            got.push(c);
            false
        });
        assert!(!stopped);
        got.sort_unstable();
        let mut want: Vec<usize> = (0..data.len())
            .filter(|&c| c != target && f64::from(data.edge_len(c, target)) < radius)
            .collect();
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn fixed_radius_stops_when_callback_asks() {
        let data = random_data(50, 64);
        let mut rng = StdRng::seed_from_u64(64);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        let mut calls = 0;
        let stopped = tree.fixed_radius_nearest(&data, 0, 1e6, &mut |_, _| {
            calls += 1;
            true
        });
        assert!(stopped);
        assert_eq!(calls, 1);
    }

    #[test]
    fn weighted_nearest_prefers_light_points() {
        let data = DataSet::new(vec![0.0, 10.0, 12.0], vec![0.0, 0.0, 0.0]);
        // Point 1 is closer but carries a heavy weight.
        let weights = [0.0, 50.0, 0.0];
        let mut rng = StdRng::seed_from_u64(6);
        let tree = KdTree::build(&data, Some(&weights), &mut rng).expect("build");
        assert_eq!(tree.node_nearest(&data, 0), 2);
    }

    #[test]
    fn manhattan_norm_queries_stay_exact() {
        let mut data = random_data(100, 55);
        data.set_norm(Norm::Manhattan).expect("set norm");
        let mut rng = StdRng::seed_from_u64(55);
        let tree = KdTree::build(&data, None, &mut rng).expect("build");
        for target in 0..data.len() {
            let got = tree.node_nearest(&data, target);
            let want = brute_nearest(&data, target, &[]);
            assert_eq!(data.edge_len(got, target), data.edge_len(want, target));
        }
    }
}
