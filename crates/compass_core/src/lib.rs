//! Tour construction for geometric TSP instances over a semidynamic
//! k-d tree: pluggable distance norms, soft delete/undelete point
//! membership, nearest-neighbor queries, and a family of classic
//! construction heuristics.

pub mod data;
mod dheap;
mod error;
mod io;
mod kdtree;
pub mod logging;
pub mod tour;

pub use data::{DataSet, Norm};
pub use dheap::DHeap;
pub use error::{Error, Result};
pub use io::input::{Point, SolverInput};
pub use io::options::{Algorithm, LogLevel, NormKind, SolverOptions};
pub use kdtree::{KdTree, k_nearest_graph, quadrant_k_nearest_graph};
pub use logging::LogFormat;
pub use tour::{
    Matching, SpanningTree, Tour, boruvka_tour, cycle_length, farthest_addition_tour,
    greedy_tour, nearest_neighbor_2match, nearest_neighbor_tour, prim_spanning_tree,
    qboruvka_tour,
};
