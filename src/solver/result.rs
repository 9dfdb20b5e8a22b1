//! Outcome of one solve.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::dense::LinearSolveError;
use crate::circuit::ComponentId;

/// Why a solve was flagged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// No usable pivot while factoring
    FactorizationFailed,
    /// Near-zero pivot during substitution
    SolveFailed,
    /// Nonlinear iteration exhausted its budget
    NotConverged,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::FactorizationFailed => "factorization_failed",
            InvalidReason::SolveFailed => "solve_failed",
            InvalidReason::NotConverged => "not_converged",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LinearSolveError> for InvalidReason {
    fn from(err: LinearSolveError) -> Self {
        match err {
            LinearSolveError::Singular { .. } | LinearSolveError::DimensionMismatch { .. } => {
                InvalidReason::FactorizationFailed
            }
            LinearSolveError::ZeroPivot { .. } => InvalidReason::SolveFailed,
        }
    }
}

/// Diagnostics attached to a [`SolveResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveMeta {
    pub converged: bool,
    pub iterations: usize,
    pub max_iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<InvalidReason>,
    /// Finite-resistance sources delivering close to their short-circuit current.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub short_circuits: Vec<ComponentId>,
}

/// Node voltages and device currents for one timestep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    /// Voltage per node, index 0 is ground
    pub voltages: Vec<f64>,
    /// Current per component, by the device's readback convention
    pub currents: BTreeMap<ComponentId, f64>,
    pub valid: bool,
    pub meta: SolveMeta,
}

impl SolveResult {
    /// All-zero valid solution for a circuit with nothing to solve.
    pub fn trivial(num_nodes: usize, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            voltages: vec![0.0; num_nodes.max(1)],
            currents: ids.into_iter().map(|id| (id, 0.0)).collect(),
            valid: true,
            meta: SolveMeta {
                converged: true,
                ..SolveMeta::default()
            },
        }
    }

    /// Voltage at `node`, 0 when out of range.
    pub fn voltage(&self, node: usize) -> f64 {
        self.voltages.get(node).copied().unwrap_or(0.0)
    }

    /// Current of component `id`, 0 when unknown.
    pub fn current(&self, id: ComponentId) -> f64 {
        self.currents.get(&id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(InvalidReason::FactorizationFailed.to_string(), "factorization_failed");
        assert_eq!(
            serde_json::to_string(&InvalidReason::NotConverged).unwrap(),
            "\"not_converged\""
        );
        assert_eq!(
            InvalidReason::from(LinearSolveError::ZeroPivot { row: 2 }),
            InvalidReason::SolveFailed
        );
    }

    #[test]
    fn test_trivial_result() {
        let r = SolveResult::trivial(1, [ComponentId(3)]);
        assert!(r.valid);
        assert_eq!(r.voltages, vec![0.0]);
        assert_eq!(r.current(ComponentId(3)), 0.0);
    }
}
