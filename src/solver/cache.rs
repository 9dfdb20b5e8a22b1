//! Single-slot LU factorization cache.
//!
//! A solve hashes everything that shapes the matrix A (not the right-hand
//! side) into a [`Fingerprint`]. While the key matches, the stored factors
//! are reused and only the substitution runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use super::dense::{LinearSolveError, LuFactors};
use super::mna::MnaMatrix;
use crate::circuit::NodeId;

/// Hash of every input that shapes the system matrix.
#[derive(Debug, Default)]
pub struct Fingerprint {
    hasher: DefaultHasher,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Floats are hashed by bit pattern.
    pub fn write_f64(&mut self, value: f64) {
        self.hasher.write_u64(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.hasher.write_u8(value as u8);
    }

    pub fn write_usize(&mut self, value: usize) {
        self.hasher.write_usize(value);
    }

    pub fn write_str(&mut self, value: &str) {
        self.hasher.write(value.as_bytes());
        self.hasher.write_u8(0xff);
    }

    pub fn write_node(&mut self, node: Option<NodeId>) {
        match node {
            Some(n) => self.hasher.write_usize(n.0 + 1),
            None => self.hasher.write_usize(0),
        }
    }

    pub fn finish(&self) -> u64 {
        self.hasher.finish()
    }
}

#[derive(Debug, Default)]
pub struct FactorizationCache {
    key: Option<u64>,
    factors: Option<LuFactors>,
    hits: u64,
    misses: u64,
}

impl FactorizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve `matrix`, refactoring only when `key` differs from the stored one.
    pub fn solve(&mut self, key: u64, matrix: &MnaMatrix) -> Result<Vec<f64>, LinearSolveError> {
        match &self.factors {
            Some(lu) if self.key == Some(key) => {
                self.hits += 1;
                log::debug!("factorization cache hit ({key:016x})");
                lu.solve(&matrix.z)
            }
            _ => {
                self.misses += 1;
                log::debug!("factorization cache miss ({key:016x})");
                self.key = None;
                self.factors = None;
                let lu = matrix.factor()?;
                let x = lu.solve(&matrix.z);
                self.key = Some(key);
                self.factors = Some(lu);
                x
            }
        }
    }

    /// Forget the stored factors.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.factors = None;
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_none()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
