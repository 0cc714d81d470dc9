//! Point-set storage and the pluggable edge-length metric.
//!
//! A [`DataSet`] owns the coordinate arrays for a problem instance and the
//! selected [`Norm`]. Every edge length in the solver flows through
//! [`DataSet::edge_len`], which applies the TSPLIB rounding convention of the
//! active norm so that tour lengths are reproducible across runs.

use crate::{Error, Result};

const GEOGRAPHIC_PI: f64 = 3.141592;
const GEOGRAPHIC_RADIUS: f64 = 6378.388;
const GEOM_RADIUS: f64 = 6378388.0;
const DEFAULT_SPARSE_LEN: i32 = 100_000;

/// Edge-length norm selector.
///
/// The `User`, `DsjRand`, and `RhMap*` variants exist because problem files
/// may name them, but no distance function is provided for them here;
/// selecting one is a configuration error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Norm {
    Max,
    Manhattan,
    Euclidean,
    EuclideanCeil,
    Euclidean3d,
    Geographic,
    Geom,
    Att,
    Matrix,
    Sparse,
    Toroidal,
    User,
    DsjRand,
    RhMap1,
    RhMap2,
    RhMap3,
    RhMap4,
    RhMap5,
}

impl Norm {
    /// Norms the k-d tree can index: planar norms whose edge length is
    /// bounded below by the truncated per-axis coordinate difference.
    pub fn is_kd_norm(self) -> bool {
        matches!(
            self,
            Self::Max | Self::Manhattan | Self::Euclidean | Self::EuclideanCeil
        )
    }

    fn is_implemented(self) -> bool {
        !matches!(
            self,
            Self::User
                | Self::DsjRand
                | Self::RhMap1
                | Self::RhMap2
                | Self::RhMap3
                | Self::RhMap4
                | Self::RhMap5
        )
    }
}

/// Coordinates plus metric configuration for one problem instance.
///
/// The coordinate arrays are immutable once built; the k-d tree and the tour
/// builders reference them through `&DataSet` and never copy them.
#[derive(Debug)]
pub struct DataSet {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    /// Lower-triangular explicit lengths: row `i` holds lengths for `j <= i`.
    matrix: Vec<Vec<i32>>,
    /// Sparse explicit lengths keyed by the smaller endpoint.
    sparse: Vec<Vec<(usize, i32)>>,
    default_len: i32,
    grid_size: f64,
    norm: Norm,
}

impl DataSet {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self {
            x,
            y,
            z: Vec::new(),
            matrix: Vec::new(),
            sparse: Vec::new(),
            default_len: DEFAULT_SPARSE_LEN,
            grid_size: 0.0,
            norm: Norm::Euclidean,
        }
    }

    pub fn with_z(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), z.len());
        let mut data = Self::new(x, y);
        data.z = z;
        data
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    pub fn x(&self, i: usize) -> f64 {
        self.x[i]
    }

    pub fn y(&self, i: usize) -> f64 {
        self.y[i]
    }

    pub fn xs(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[f64] {
        &self.y
    }

    /// Installs the lower-triangular explicit length matrix; row `i` must
    /// have `i + 1` entries.
    pub fn set_matrix(&mut self, matrix: Vec<Vec<i32>>) -> Result<()> {
        if matrix.len() != self.len() {
            return Err(Error::invalid_data(format!(
                "matrix has {} rows for {} nodes",
                matrix.len(),
                self.len()
            )));
        }
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != i + 1 {
                return Err(Error::invalid_data(format!(
                    "matrix row {i} has {} entries, expected {}",
                    row.len(),
                    i + 1
                )));
            }
        }
        self.matrix = matrix;
        Ok(())
    }

    /// Installs explicit lengths for a sparse edge set; any pair not listed
    /// falls back to `default_len`.
    pub fn set_sparse(&mut self, edges: &[(usize, usize, i32)], default_len: i32) -> Result<()> {
        let n = self.len();
        let mut adj: Vec<Vec<(usize, i32)>> = vec![Vec::new(); n];
        for &(a, b, len) in edges {
            if a >= n || b >= n || a == b {
                return Err(Error::invalid_data(format!(
                    "sparse edge ({a}, {b}) out of range for {n} nodes"
                )));
            }
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            adj[lo].push((hi, len));
        }
        self.sparse = adj;
        self.default_len = default_len;
        Ok(())
    }

    pub fn set_grid_size(&mut self, grid_size: f64) {
        self.grid_size = grid_size;
    }

    /// Selects the active norm, failing fast when the norm is unimplemented
    /// or its required data has not been supplied.
    pub fn set_norm(&mut self, norm: Norm) -> Result<()> {
        if !norm.is_implemented() {
            return Err(Error::config(format!(
                "norm {norm:?} has no distance function"
            )));
        }
        match norm {
            Norm::Euclidean3d if self.z.len() != self.len() => {
                return Err(Error::config("3d norm selected without z coordinates"));
            }
            Norm::Matrix if self.matrix.is_empty() => {
                return Err(Error::config("matrix norm selected without a matrix"));
            }
            Norm::Sparse if self.sparse.is_empty() => {
                return Err(Error::config("sparse norm selected without an edge set"));
            }
            Norm::Toroidal if self.grid_size <= 0.0 => {
                return Err(Error::config("toroidal norm selected without a grid size"));
            }
            _ => {}
        }
        self.norm = norm;
        Ok(())
    }

    /// Edge length between nodes `i` and `j` under the active norm.
    ///
    /// Symmetric for all coordinate norms; the explicit norms read only the
    /// lower triangle, so symmetry holds by construction.
    pub fn edge_len(&self, i: usize, j: usize) -> i32 {
        match self.norm {
            Norm::Max => self.max_len(i, j),
            Norm::Manhattan => self.manhattan_len(i, j),
            Norm::Euclidean => self.euclid_len(i, j),
            Norm::EuclideanCeil => self.euclid_ceil_len(i, j),
            Norm::Euclidean3d => self.euclid3d_len(i, j),
            Norm::Geographic => self.geographic_len(i, j),
            Norm::Geom => self.geom_len(i, j),
            Norm::Att => self.att_len(i, j),
            Norm::Matrix => self.matrix_len(i, j),
            Norm::Sparse => self.sparse_len(i, j),
            Norm::Toroidal => self.toroidal_len(i, j),
            // set_norm rejects these before any traversal can run.
            Norm::User
            | Norm::DsjRand
            | Norm::RhMap1
            | Norm::RhMap2
            | Norm::RhMap3
            | Norm::RhMap4
            | Norm::RhMap5 => unreachable!("unimplemented norm selected"),
        }
    }

    /// Edge length plus the Held-Karp node weights of both endpoints.
    pub fn weighted_edge_len(&self, i: usize, j: usize, weights: Option<&[f64]>) -> f64 {
        match weights {
            Some(w) => f64::from(self.edge_len(i, j)) + w[i] + w[j],
            None => f64::from(self.edge_len(i, j)),
        }
    }

    fn max_len(&self, i: usize, j: usize) -> i32 {
        let t1 = (self.x[i] - self.x[j]).abs() + 0.5;
        let t2 = (self.y[i] - self.y[j]).abs() + 0.5;
        t1.max(t2) as i32
    }

    fn manhattan_len(&self, i: usize, j: usize) -> i32 {
        let t1 = (self.x[i] - self.x[j]).abs();
        let t2 = (self.y[i] - self.y[j]).abs();
        (t1 + t2 + 0.5) as i32
    }

    fn euclid_len(&self, i: usize, j: usize) -> i32 {
        let t1 = self.x[i] - self.x[j];
        let t2 = self.y[i] - self.y[j];
        ((t1 * t1 + t2 * t2).sqrt() + 0.5) as i32
    }

    fn euclid_ceil_len(&self, i: usize, j: usize) -> i32 {
        let t1 = self.x[i] - self.x[j];
        let t2 = self.y[i] - self.y[j];
        (t1 * t1 + t2 * t2).sqrt().ceil() as i32
    }

    fn euclid3d_len(&self, i: usize, j: usize) -> i32 {
        let t1 = self.x[i] - self.x[j];
        let t2 = self.y[i] - self.y[j];
        let t3 = self.z[i] - self.z[j];
        ((t1 * t1 + t2 * t2 + t3 * t3).sqrt() + 0.5) as i32
    }

    fn toroidal_len(&self, i: usize, j: usize) -> i32 {
        let mut t1 = (self.x[i] - self.x[j]).abs();
        let mut t2 = (self.y[i] - self.y[j]).abs();
        if self.grid_size - t1 < t1 {
            t1 = self.grid_size - t1;
        }
        if self.grid_size - t2 < t2 {
            t2 = self.grid_size - t2;
        }
        ((t1 * t1 + t2 * t2).sqrt() + 0.5) as i32
    }

    /// TSPLIB GEO convention: the integer part of a coordinate is degrees,
    /// the fractional part is minutes.
    fn geographic_len(&self, i: usize, j: usize) -> i32 {
        let lat_i = geo_radians(self.x[i]);
        let lat_j = geo_radians(self.x[j]);
        let long_i = geo_radians(self.y[i]);
        let long_j = geo_radians(self.y[j]);

        let q1 = (long_i - long_j).cos();
        let q2 = (lat_i - lat_j).cos();
        let q3 = (lat_i + lat_j).cos();
        (GEOGRAPHIC_RADIUS * (0.5 * ((1.0 + q1) * q2 - (1.0 - q1) * q3)).acos() + 1.0) as i32
    }

    fn geom_len(&self, i: usize, j: usize) -> i32 {
        let lat_i = std::f64::consts::PI * self.x[i] / 180.0;
        let lat_j = std::f64::consts::PI * self.x[j] / 180.0;
        let long_i = std::f64::consts::PI * self.y[i] / 180.0;
        let long_j = std::f64::consts::PI * self.y[j] / 180.0;

        let q1 = lat_j.cos() * (long_i - long_j).sin();
        let q3 = ((long_i - long_j) / 2.0).sin();
        let q4 = ((long_i - long_j) / 2.0).cos();
        let q2 = (lat_i + lat_j).sin() * q3 * q3 - (lat_i - lat_j).sin() * q4 * q4;
        let q5 = (lat_i - lat_j).cos() * q4 * q4 - (lat_i + lat_j).cos() * q3 * q3;
        (GEOM_RADIUS * (q1 * q1 + q2 * q2).sqrt().atan2(q5) + 1.0) as i32
    }

    fn att_len(&self, i: usize, j: usize) -> i32 {
        let xd = self.x[i] - self.x[j];
        let yd = self.y[i] - self.y[j];
        let rij = ((xd * xd + yd * yd) / 10.0).sqrt();
        let tij = rij.trunc();
        if tij < rij { tij as i32 + 1 } else { tij as i32 }
    }

    fn matrix_len(&self, i: usize, j: usize) -> i32 {
        if i > j {
            self.matrix[i][j]
        } else {
            self.matrix[j][i]
        }
    }

    fn sparse_len(&self, i: usize, j: usize) -> i32 {
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        for &(end, len) in &self.sparse[lo] {
            if end == hi {
                return len;
            }
        }
        self.default_len
    }
}

fn geo_radians(coord: f64) -> f64 {
    let deg = coord.trunc();
    let min = coord - deg;
    GEOGRAPHIC_PI * (deg + 5.0 * min / 3.0) / 180.0
}

#[cfg(test)]
mod tests {
    use super::{DataSet, Norm};

    fn unit_square_with_center() -> DataSet {
        DataSet::new(
            vec![0.0, 0.0, 1.0, 1.0, 0.5],
            vec![0.0, 1.0, 1.0, 0.0, 0.5],
        )
    }

    #[test]
    fn euclidean_rounds_to_nearest_integer() {
        let data = unit_square_with_center();
        // sqrt(0.5) = 0.707.. rounds to 1; side length 1 stays 1.
        assert_eq!(data.edge_len(4, 0), 1);
        assert_eq!(data.edge_len(0, 1), 1);
        // diagonal sqrt(2) = 1.414.. rounds to 1.
        assert_eq!(data.edge_len(0, 2), 1);
    }

    #[test]
    fn euclidean_ceiling_always_rounds_up() {
        let mut data = unit_square_with_center();
        data.set_norm(Norm::EuclideanCeil).expect("set norm");
        assert_eq!(data.edge_len(0, 2), 2);
        assert_eq!(data.edge_len(4, 0), 1);
    }

    #[test]
    fn manhattan_sums_axis_distances() {
        let mut data = DataSet::new(vec![0.0, 3.0], vec![0.0, 4.0]);
        data.set_norm(Norm::Manhattan).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 7);
    }

    #[test]
    fn max_norm_takes_larger_axis_distance() {
        let mut data = DataSet::new(vec![0.0, 3.0], vec![0.0, 4.0]);
        data.set_norm(Norm::Max).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 4);
    }

    #[test]
    fn coordinate_norms_are_symmetric() {
        let data = unit_square_with_center();
        for i in 0..data.len() {
            for j in 0..data.len() {
                assert_eq!(data.edge_len(i, j), data.edge_len(j, i));
            }
        }
    }

    #[test]
    fn att_applies_scaled_truncated_formula() {
        let mut data = DataSet::new(vec![0.0, 10.0], vec![0.0, 0.0]);
        data.set_norm(Norm::Att).expect("set norm");
        // sqrt(100 / 10) = 3.162.. truncates to 3, then rounds up to 4.
        assert_eq!(data.edge_len(0, 1), 4);
    }

    #[test]
    fn toroidal_wraps_around_the_grid() {
        let mut data = DataSet::new(vec![0.0, 9.0], vec![0.0, 0.0]);
        data.set_grid_size(10.0);
        data.set_norm(Norm::Toroidal).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 1);
    }

    #[test]
    fn euclid3d_uses_z_coordinates() {
        let mut data = DataSet::with_z(vec![0.0, 1.0], vec![0.0, 2.0], vec![0.0, 2.0]);
        data.set_norm(Norm::Euclidean3d).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 3);
    }

    #[test]
    fn matrix_norm_reads_lower_triangle() {
        let mut data = DataSet::new(vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]);
        data.set_matrix(vec![vec![0], vec![7, 0], vec![3, 9, 0]])
            .expect("set matrix");
        data.set_norm(Norm::Matrix).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 7);
        assert_eq!(data.edge_len(1, 0), 7);
        assert_eq!(data.edge_len(2, 1), 9);
    }

    #[test]
    fn sparse_norm_falls_back_to_default_length() {
        let mut data = DataSet::new(vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]);
        data.set_sparse(&[(0, 1, 5)], 100).expect("set sparse");
        data.set_norm(Norm::Sparse).expect("set norm");
        assert_eq!(data.edge_len(0, 1), 5);
        assert_eq!(data.edge_len(1, 0), 5);
        assert_eq!(data.edge_len(0, 2), 100);
    }

    #[test]
    fn unimplemented_norms_are_rejected_at_configuration() {
        let mut data = unit_square_with_center();
        for norm in [
            Norm::User,
            Norm::DsjRand,
            Norm::RhMap1,
            Norm::RhMap2,
            Norm::RhMap3,
            Norm::RhMap4,
            Norm::RhMap5,
        ] {
            data.set_norm(norm).expect_err("unimplemented norm");
        }
        assert_eq!(data.norm(), Norm::Euclidean);
    }

    #[test]
    fn norms_with_missing_data_are_rejected() {
        let mut data = unit_square_with_center();
        data.set_norm(Norm::Matrix).expect_err("no matrix");
        data.set_norm(Norm::Sparse).expect_err("no sparse edges");
        data.set_norm(Norm::Toroidal).expect_err("no grid size");
        data.set_norm(Norm::Euclidean3d).expect_err("no z");
    }

    #[test]
    fn weighted_edge_len_adds_node_weights() {
        let data = unit_square_with_center();
        let weights = vec![2.0, 3.0, 0.0, 0.0, 0.0];
        assert_eq!(data.weighted_edge_len(0, 1, Some(&weights)), 6.0);
        assert_eq!(data.weighted_edge_len(0, 1, None), 1.0);
    }

    #[test]
    fn geographic_matches_tsplib_reference_scale() {
        // Two points one degree of latitude apart, roughly 111 km.
        let mut data = DataSet::new(vec![50.0, 51.0], vec![10.0, 10.0]);
        data.set_norm(Norm::Geographic).expect("set norm");
        let d = data.edge_len(0, 1);
        assert!((110..=113).contains(&d), "got {d}");
        assert_eq!(data.edge_len(0, 0), 1);
    }
}
