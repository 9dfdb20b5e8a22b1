//! # Breadboard Core
//!
//! The electrical core of an educational circuit builder.
//!
//! This library provides:
//! - Topology extraction from components and wires drawn on a canvas
//! - Wire compaction and closed-path connectivity queries
//! - Modified Nodal Analysis (MNA) based transient simulation
//! - Linear, reactive and nonlinear devices (diodes, LEDs, motors, relays, fuses)
//!
//! ## Architecture
//!
//! - [`circuit`] - Canvas geometry, node graph and the editable [`Circuit`]
//! - [`components`] - Device models and their matrix stamps
//! - [`solver`] - MNA assembly, companion models and the time-stepping loop
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! breadboard circuit.json --dt 1e-3 --steps 100 --format json
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmCircuitSim } from 'breadboard_core';
//!
//! const sim = new WasmCircuitSim(circuitJson, 0.001);
//! const result = JSON.parse(sim.step());
//! ```
//!
//! ## Circuit Simulation Method
//!
//! For each time step:
//!
//! 1. Assemble the system matrix A and source vector z from every device stamp
//! 2. Solve Ax = z, reusing the LU factors while the matrix is unchanged
//! 3. For nonlinear elements, iterate using Newton-Raphson until convergence
//! 4. Commit capacitor, inductor, motor and fuse state from the accepted solution
//!
//! Reactive elements (C, L) are discretized with the trapezoidal rule, falling
//! back to backward Euler on the first step and around switching events.

pub mod circuit;
pub mod components;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{BreadboardError, Result};
pub use solver::{MnaSolver, SimulationState, Simulator, SolveResult, SolverConfig};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuitSim;

/// Default time step in seconds
pub const DEFAULT_TIMESTEP: f64 = 1e-3;

/// Thermal voltage kT/q at 300 K
pub const THERMAL_VOLTAGE: f64 = 0.025865;
