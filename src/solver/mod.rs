//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations, ground row removed)
//! - B, C connect auxiliary unknowns to nodes
//! - D is 0 for ideal sources and ammeters, -R for a motor armature
//! - v is the vector of node voltages
//! - j is the vector of auxiliary branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of source voltages
//!
//! Nonlinear and stateful devices (diodes, LEDs, relays) are handled by
//! fixed-point iteration on their linearization point, with the LU factors
//! reused from [`FactorizationCache`] whenever the matrix is unchanged.

mod cache;
mod context;
mod dense;
mod integrator;
mod mna;
mod newton;
mod result;
mod simulator;
mod state;

use serde::{Deserialize, Serialize};

pub use cache::{FactorizationCache, Fingerprint};
pub use context::{ReadContext, StampContext};
pub use dense::{LinearSolveError, LuFactors};
pub use integrator::{capacitor_companion, inductor_companion, resolve_method, Companion};
pub use mna::MnaMatrix;
pub use newton::{Annotation, MnaSolver};
pub use result::{InvalidReason, SolveMeta, SolveResult};
pub use simulator::Simulator;
pub use state::{
    CapacitorState, DeviceState, FuseState, InductorState, JunctionState, MotorState, RelayState,
    SimulationState,
};

/// Floor applied to every stamped resistance.
pub const MIN_RESISTANCE: f64 = 1e-9;

/// Resistance of a closed contact.
pub const CLOSED_RESISTANCE: f64 = 1e-9;

/// Resistance of an open contact.
pub const OPEN_RESISTANCE: f64 = 1e12;

/// Leakage conductance from every node to ground.
pub const GMIN: f64 = 1e-12;

/// Smallest usable LU pivot.
pub const PIVOT_EPSILON: f64 = 1e-15;

/// Maximum fixed-point iterations per timestep.
pub const MAX_ITERATIONS: usize = 40;

/// Largest junction-voltage change accepted as converged, in volts.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Newton steps of the series-resistance junction solve.
pub const JUNCTION_NEWTON_STEPS: usize = 8;

/// Floor applied to capacitances.
pub const MIN_CAPACITANCE: f64 = 1e-15;

/// Floor applied to inductances.
pub const MIN_INDUCTANCE: f64 = 1e-12;

/// Floor applied to the timestep.
pub const MIN_TIMESTEP: f64 = 1e-12;

/// Junction current above which a diode counts as conducting.
pub const CONDUCTION_CURRENT: f64 = 1e-6;

/// Integration rule for capacitor and inductor companion models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum IntegrationMethod {
    /// First order, strongly damped. Always used on the first step and
    /// while a switch is connected.
    #[cfg_attr(feature = "cli", value(name = "be"))]
    BackwardEuler,
    /// Second order once history is available.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "trap"))]
    Trapezoidal,
}

/// Configuration for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum fixed-point iterations for nonlinear devices.
    pub max_iterations: usize,
    /// Convergence tolerance on junction voltages (volts).
    pub tolerance: f64,
    /// Leakage conductance added to every node (siemens).
    pub gmin: f64,
    /// Preferred integration rule. `BackwardEuler` forces it on every step.
    pub integration: IntegrationMethod,
    /// Fraction of V/r above which a source counts as short-circuited.
    pub short_circuit_current_ratio: f64,
    /// Fraction of |V| below which a source's terminal voltage counts as collapsed.
    pub short_circuit_voltage_ratio: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            tolerance: CONVERGENCE_TOLERANCE,
            gmin: GMIN,
            integration: IntegrationMethod::Trapezoidal,
            short_circuit_current_ratio: 0.95,
            short_circuit_voltage_ratio: 0.05,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum fixed-point iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (in volts).
    ///
    /// Higher tolerance = fewer iterations but a less exact operating point.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the node leakage conductance.
    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    /// Set the integration rule.
    pub fn with_integration(mut self, integration: IntegrationMethod) -> Self {
        self.integration = integration;
        self
    }

    /// Set the short-circuit detector thresholds.
    pub fn with_short_circuit_ratios(mut self, current_ratio: f64, voltage_ratio: f64) -> Self {
        self.short_circuit_current_ratio = current_ratio;
        self.short_circuit_voltage_ratio = voltage_ratio;
        self
    }
}
