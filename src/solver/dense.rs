//! Dense LU factorization with partial pivoting.
//!
//! Circuits built in the editor are classroom-sized (tens of nodes), so the
//! system is stored as a row-major dense matrix and factored in place.

use thiserror::Error;

use super::PIVOT_EPSILON;

/// Failure of the dense linear solver.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LinearSolveError {
    /// No usable pivot in a column during factorization
    #[error("Singular matrix: no usable pivot in column {column}")]
    Singular { column: usize },

    /// Near-zero diagonal during back substitution
    #[error("Zero pivot in row {row} during back substitution")]
    ZeroPivot { row: usize },

    /// Right-hand side length does not match the factorization
    #[error("Dimension mismatch: factorization is {expected}x{expected}, rhs has {actual} entries")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Packed LU factors of a square matrix (unit-lower L below the diagonal, U on and above).
#[derive(Debug, Clone, PartialEq)]
pub struct LuFactors {
    lu: Vec<f64>,
    pivots: Vec<usize>,
    size: usize,
}

impl LuFactors {
    /// Factor a row-major `size` x `size` matrix.
    pub fn factor(a: &[f64], size: usize) -> Result<Self, LinearSolveError> {
        if a.len() != size * size {
            return Err(LinearSolveError::DimensionMismatch {
                expected: size,
                actual: a.len(),
            });
        }

        let n = size;
        let mut lu = a.to_vec();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Find pivot
            let mut max_val = lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < PIVOT_EPSILON || max_val.is_nan() {
                return Err(LinearSolveError::Singular { column: k });
            }

            // Swap rows if needed
            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                if factor == 0.0 {
                    continue;
                }
                for j in (k + 1)..n {
                    lu[i * n + j] -= factor * lu[k * n + j];
                }
            }
        }

        Ok(Self { lu, pivots, size })
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Solve `A x = b` with the stored factors.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
        let n = self.size;
        if b.len() != n {
            return Err(LinearSolveError::DimensionMismatch {
                expected: n,
                actual: b.len(),
            });
        }

        // Apply pivot permutation to b
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| b[p]).collect();

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum;
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_EPSILON || diag.is_nan() {
                return Err(LinearSolveError::ZeroPivot { row: i });
            }
            x[i] = sum / diag;
        }

        Ok(x)
    }
}
