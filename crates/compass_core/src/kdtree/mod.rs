//! Semidynamic balanced k-d tree over a fixed point set.
//!
//! Follows Bentley's semidynamic design: the tree is built once over all
//! points, and points are afterwards only soft-deleted and undeleted. Leaves
//! are buckets of a few points stored in a permutation array; deletion swaps
//! a point to the dead end of its bucket span, so membership changes never
//! restructure the tree.
//!
//! With node weights supplied, the tree may also cut on the weight dimension.
//! The low side of a weight cut holds the lighter points, which lets nearest
//! queries that account for weights prune the heavy side.

mod near;

pub use near::{k_nearest_graph, quadrant_k_nearest_graph};

use log::debug;
use rand::Rng;

use crate::data::DataSet;
use crate::{Error, Result};

/// Maximum number of points in a leaf bucket.
const BUCKET_CUTOFF: usize = 5;

/// Bounding boxes are recorded every this many levels; queries use them to
/// stop walking toward the root once the search ball is enclosed.
const BNDS_DEPTH: usize = 5;

pub(crate) const BIGDOUBLE: f64 = 1e30;

const NO_NODE: usize = usize::MAX;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CutDim {
    X,
    Y,
    /// Node-weight dimension; only present when the tree was built with
    /// weights.
    W,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Bounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

/// One arena slot. Interior nodes use `cutdim`/`cutval`/`loson`/`hison`;
/// buckets use `lopt`/`hiend` as a half-open span into the permutation
/// array.
#[derive(Debug)]
pub(crate) struct KdNode {
    pub father: usize,
    pub loson: usize,
    pub hison: usize,
    pub cutdim: CutDim,
    pub cutval: f64,
    pub bucket: bool,
    pub empty: bool,
    pub lopt: usize,
    pub hiend: usize,
    pub bnds: Option<Bounds>,
}

#[derive(Debug)]
pub struct KdTree {
    pub(crate) nodes: Vec<KdNode>,
    /// Permutation of node indices; each bucket owns a contiguous span.
    pub(crate) perm: Vec<usize>,
    /// Inverse of `perm`.
    locate: Vec<usize>,
    /// Bucket arena index for each point.
    pub(crate) bucketptr: Vec<usize>,
    /// Full span ends, for restoring buckets wholesale.
    full_hiend: Vec<usize>,
    pub(crate) weights: Option<Vec<f64>>,
}

struct Builder<'a, R: Rng> {
    data: &'a DataSet,
    weights: Option<&'a [f64]>,
    rng: &'a mut R,
    nodes: Vec<KdNode>,
    perm: Vec<usize>,
    locate: Vec<usize>,
    bucketptr: Vec<usize>,
    depth: usize,
    bnds_x: [f64; 2],
    bnds_y: [f64; 2],
}

impl KdTree {
    /// Builds a balanced tree over every point of `data`.
    ///
    /// `weights` are optional nonnegative Held-Karp node weights; when
    /// present the tree may cut on them and weighted queries become exact.
    pub fn build<R: Rng>(
        data: &DataSet,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) -> Result<Self> {
        let n = data.len();
        if n == 0 {
            return Err(Error::invalid_data("cannot build a tree over 0 points"));
        }
        if !data.norm().is_kd_norm() {
            return Err(Error::config(format!(
                "norm {:?} is not usable with a coordinate tree",
                data.norm()
            )));
        }
        if let Some(w) = weights {
            if w.len() != n {
                return Err(Error::invalid_data(format!(
                    "{} weights for {n} points",
                    w.len()
                )));
            }
            if w.iter().any(|&wi| wi < -1e-8) {
                return Err(Error::invalid_data("node weights must be nonnegative"));
            }
        }

        let mut builder = Builder {
            data,
            weights,
            rng,
            nodes: Vec::with_capacity(2 * n / BUCKET_CUTOFF + 1),
            perm: (0..n).collect(),
            locate: vec![0; n],
            bucketptr: vec![NO_NODE; n],
            depth: 0,
            bnds_x: [-BIGDOUBLE, BIGDOUBLE],
            bnds_y: [-BIGDOUBLE, BIGDOUBLE],
        };
        builder.build_span(0, n, NO_NODE);
        debug!(
            "kdtree: built over {n} points, {} nodes, weighted={}",
            builder.nodes.len(),
            weights.is_some()
        );

        let mut tree = Self {
            nodes: builder.nodes,
            perm: builder.perm,
            locate: builder.locate,
            bucketptr: builder.bucketptr,
            full_hiend: vec![0; n],
            weights: weights.map(<[f64]>::to_vec),
        };
        for i in 0..n {
            tree.full_hiend[i] = tree.nodes[tree.bucketptr[i]].hiend;
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    /// Whether point `k` is currently live (not deleted).
    pub fn is_live(&self, k: usize) -> bool {
        self.locate[k] < self.nodes[self.bucketptr[k]].hiend
    }

    /// Soft-deletes point `k`. Deleting an already deleted point is a
    /// no-op.
    pub fn delete(&mut self, k: usize) {
        let b = self.bucketptr[k];
        let j = self.locate[k];
        if j >= self.nodes[b].hiend {
            return;
        }
        let last = self.nodes[b].hiend - 1;
        let moved = self.perm[last];
        self.perm[last] = k;
        self.perm[j] = moved;
        self.locate[moved] = j;
        self.locate[k] = last;
        self.nodes[b].hiend = last;
        if self.nodes[b].hiend == self.nodes[b].lopt {
            self.mark_empty_upward(b);
        }
    }

    /// Restores a deleted point. Undeleting a live point is a no-op.
    pub fn undelete(&mut self, k: usize) {
        let b = self.bucketptr[k];
        let j = self.locate[k];
        if j < self.nodes[b].hiend {
            return;
        }
        let end = self.nodes[b].hiend;
        let moved = self.perm[end];
        self.perm[end] = k;
        self.perm[j] = moved;
        self.locate[moved] = j;
        self.locate[k] = end;
        self.nodes[b].hiend = end + 1;
        if self.nodes[b].empty {
            self.mark_live_upward(b);
        }
    }

    /// Deletes every point in one pass.
    pub fn delete_all(&mut self) {
        for node in &mut self.nodes {
            node.empty = true;
            if node.bucket {
                node.hiend = node.lopt;
            }
        }
    }

    /// Restores every point in one pass.
    pub fn undelete_all(&mut self) {
        for node in &mut self.nodes {
            node.empty = false;
        }
        for k in 0..self.perm.len() {
            let b = self.bucketptr[k];
            self.nodes[b].hiend = self.full_hiend[k];
        }
    }

    fn mark_empty_upward(&mut self, mut node: usize) {
        self.nodes[node].empty = true;
        loop {
            let father = self.nodes[node].father;
            if father == NO_NODE {
                return;
            }
            let lo = self.nodes[father].loson;
            let hi = self.nodes[father].hison;
            if !(self.nodes[lo].empty && self.nodes[hi].empty) {
                return;
            }
            self.nodes[father].empty = true;
            node = father;
        }
    }

    fn mark_live_upward(&mut self, mut node: usize) {
        self.nodes[node].empty = false;
        loop {
            let father = self.nodes[node].father;
            if father == NO_NODE || !self.nodes[father].empty {
                return;
            }
            self.nodes[father].empty = false;
            node = father;
        }
    }

    pub(crate) fn father_of(&self, node: usize) -> Option<usize> {
        let f = self.nodes[node].father;
        (f != NO_NODE).then_some(f)
    }
}

impl<R: Rng> Builder<'_, R> {
    /// Builds the subtree over `perm[l..u]` and returns its arena index.
    fn build_span(&mut self, l: usize, u: usize, father: usize) -> usize {
        self.depth += 1;
        let slot = self.nodes.len();
        self.nodes.push(KdNode {
            father,
            loson: NO_NODE,
            hison: NO_NODE,
            cutdim: CutDim::X,
            cutval: 0.0,
            bucket: false,
            empty: false,
            lopt: 0,
            hiend: 0,
            bnds: None,
        });

        if u - l <= BUCKET_CUTOFF {
            let node = &mut self.nodes[slot];
            node.bucket = true;
            node.lopt = l;
            node.hiend = u;
            for i in l..u {
                self.locate[self.perm[i]] = i;
                self.bucketptr[self.perm[i]] = slot;
            }
        } else {
            if self.depth.is_multiple_of(BNDS_DEPTH) {
                self.nodes[slot].bnds = Some(Bounds {
                    x: self.bnds_x,
                    y: self.bnds_y,
                });
            }
            let m = (l + u) / 2;
            let cutdim = self.max_spread_dim(l, u);
            self.partition_around_median(l, u, m, cutdim);
            let cutval = self.coord(self.perm[m], cutdim);
            self.nodes[slot].cutdim = cutdim;
            self.nodes[slot].cutval = cutval;

            let loson = match cutdim {
                CutDim::X => {
                    let saved = self.bnds_x[1];
                    self.bnds_x[1] = cutval;
                    let son = self.build_span(l, m + 1, slot);
                    self.bnds_x[1] = saved;
                    son
                }
                CutDim::Y => {
                    let saved = self.bnds_y[1];
                    self.bnds_y[1] = cutval;
                    let son = self.build_span(l, m + 1, slot);
                    self.bnds_y[1] = saved;
                    son
                }
                CutDim::W => self.build_span(l, m + 1, slot),
            };
            let hison = match cutdim {
                CutDim::X => {
                    let saved = self.bnds_x[0];
                    self.bnds_x[0] = cutval;
                    let son = self.build_span(m + 1, u, slot);
                    self.bnds_x[0] = saved;
                    son
                }
                CutDim::Y => {
                    let saved = self.bnds_y[0];
                    self.bnds_y[0] = cutval;
                    let son = self.build_span(m + 1, u, slot);
                    self.bnds_y[0] = saved;
                    son
                }
                CutDim::W => self.build_span(m + 1, u, slot),
            };
            self.nodes[slot].loson = loson;
            self.nodes[slot].hison = hison;
        }
        self.depth -= 1;
        slot
    }

    fn coord(&self, point: usize, dim: CutDim) -> f64 {
        match dim {
            CutDim::X => self.data.x(point),
            CutDim::Y => self.data.y(point),
            CutDim::W => match self.weights {
                Some(w) => w[point],
                None => 0.0,
            },
        }
    }

    fn max_spread_dim(&self, l: usize, u: usize) -> CutDim {
        let spread = |dim: CutDim| {
            let mut min = BIGDOUBLE;
            let mut max = -BIGDOUBLE;
            for &p in &self.perm[l..u] {
                let v = self.coord(p, dim);
                min = min.min(v);
                max = max.max(v);
            }
            max - min
        };
        let sx = spread(CutDim::X);
        let sy = spread(CutDim::Y);
        let mut best = if sx >= sy { CutDim::X } else { CutDim::Y };
        if self.weights.is_some() && spread(CutDim::W) > sx.max(sy) {
            best = CutDim::W;
        }
        best
    }

    /// Randomized quickselect: rearranges `perm[l..u]` so that the point at
    /// `m` is the median of the cut dimension, everything below is `<=` it
    /// and everything above is `>=` it.
    fn partition_around_median(&mut self, l: usize, u: usize, m: usize, dim: CutDim) {
        let mut lo = l;
        let mut hi = u;
        while hi - lo > 1 {
            let pivot_idx = self.rng.random_range(lo..hi);
            let pivot = self.coord(self.perm[pivot_idx], dim);
            // Three-way partition: [lo..lt) < pivot, [lt..gt) == pivot,
            // [gt..hi) > pivot.
            let mut lt = lo;
            let mut gt = hi;
            let mut i = lo;
            while i < gt {
                let c = self.coord(self.perm[i], dim);
                if c < pivot {
                    self.perm.swap(lt, i);
                    lt += 1;
                    i += 1;
                } else if c > pivot {
                    gt -= 1;
                    self.perm.swap(i, gt);
                } else {
                    i += 1;
                }
            }
            if m < lt {
                hi = lt;
            } else if m >= gt {
                lo = gt;
            } else {
                return;
            }
        }
    }
}
