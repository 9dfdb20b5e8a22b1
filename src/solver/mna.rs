//! MNA matrix assembly.

use super::dense::{LinearSolveError, LuFactors};

/// MNA matrix system Ax = z.
///
/// Rows `0..num_nodes-1` hold node equations (ground excluded), rows after that
/// hold one auxiliary equation per device that needs an extra unknown.
#[derive(Debug, Clone)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// Number of electrical nodes including ground
    pub num_nodes: usize,
}

impl MnaMatrix {
    /// Create a zeroed system for `num_nodes` nodes and `num_aux` auxiliary equations.
    pub fn new(num_nodes: usize, num_aux: usize) -> Self {
        let size = num_nodes.saturating_sub(1) + num_aux;
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            size,
            num_nodes,
        }
    }

    /// Clear the matrix and vectors to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Row of auxiliary equation `aux`.
    pub fn aux_row(&self, aux: usize) -> usize {
        self.num_nodes.saturating_sub(1) + aux
    }

    /// Stamp a conductance between two rows (`None` is ground).
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a voltage source between two rows with its branch current at row `br`.
    /// V[n+] - V[n-] = E
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: f64,
    ) {
        if let Some(i) = n_pos {
            self.add(br, i, 1.0);
            self.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -1.0);
            self.add(j, br, -1.0);
        }
        self.z[br] += voltage;
    }

    /// Stamp a current source; current flows from n+ through the source to n-.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }

    /// Add a leakage conductance from every node row to ground.
    pub fn stamp_gmin(&mut self, gmin: f64) {
        for i in 0..self.num_nodes.saturating_sub(1) {
            self.add(i, i, gmin);
        }
    }

    /// Factor the assembled matrix.
    pub fn factor(&self) -> Result<LuFactors, LinearSolveError> {
        LuFactors::factor(&self.a, self.size)
    }
}
