//! WASM bindings for Breadboard Core.
//!
//! This module provides JavaScript-friendly bindings for the browser editor.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuitSim } from 'breadboard_core';
//!
//! await init();
//!
//! const sim = new WasmCircuitSim(JSON.stringify(doc), 0.001);
//!
//! // Once per animation frame:
//! const { voltages, currents, valid } = JSON.parse(sim.step());
//! sim.set_switch(3, true);
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::{CircuitDocument, ComponentId};
use crate::error::BreadboardError;
use crate::solver::{Simulator, SolverConfig};
use crate::Circuit;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(err: BreadboardError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// WASM-compatible circuit simulator.
///
/// Wraps the native `Simulator`; results cross the boundary as JSON strings.
#[wasm_bindgen]
pub struct WasmCircuitSim {
    simulator: Simulator,
}

#[wasm_bindgen]
impl WasmCircuitSim {
    /// Create a new simulator from a circuit document.
    ///
    /// # Arguments
    /// * `circuit_json` - The saved circuit document
    /// * `dt` - Time step in seconds
    #[wasm_bindgen(constructor)]
    pub fn new(circuit_json: &str, dt: f64) -> Result<WasmCircuitSim, JsValue> {
        Self::with_config(
            circuit_json,
            dt,
            crate::solver::MAX_ITERATIONS,
            crate::solver::CONVERGENCE_TOLERANCE,
        )
    }

    /// Create a new simulator with a custom iteration budget and tolerance.
    #[wasm_bindgen]
    pub fn with_config(
        circuit_json: &str,
        dt: f64,
        max_iterations: usize,
        tolerance: f64,
    ) -> Result<WasmCircuitSim, JsValue> {
        let doc = CircuitDocument::from_json(circuit_json).map_err(to_js)?;
        let circuit = Circuit::from_document(&doc).map_err(to_js)?;

        let config = SolverConfig::new()
            .with_max_iterations(max_iterations)
            .with_tolerance(tolerance);
        let simulator = Simulator::with_config(circuit, dt, config).map_err(to_js)?;

        Ok(WasmCircuitSim { simulator })
    }

    /// Advance one timestep and return the solve result as JSON.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsValue> {
        let result = self.simulator.step();
        serde_json::to_string(&result).map_err(|e| to_js(e.into()))
    }

    /// Restore every device to its initial state.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.simulator.reset();
    }

    /// Open or close a switch, push button or changeover switch.
    #[wasm_bindgen]
    pub fn set_switch(&mut self, id: u32, closed: bool) -> Result<(), JsValue> {
        self.simulator
            .set_switch(ComponentId(id), closed)
            .map_err(to_js)
    }

    /// Replace the circuit with an edited document, keeping device state of
    /// components that survive.
    #[wasm_bindgen]
    pub fn load(&mut self, circuit_json: &str) -> Result<(), JsValue> {
        let doc = CircuitDocument::from_json(circuit_json).map_err(to_js)?;
        let circuit = Circuit::from_document(&doc).map_err(to_js)?;
        self.simulator.replace_circuit(circuit);
        Ok(())
    }

    /// Brightness in 0..=1 of a bulb or LED.
    #[wasm_bindgen]
    pub fn brightness(&self, id: u32) -> Option<f64> {
        self.simulator.brightness(ComponentId(id))
    }

    /// Simulated time in seconds.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.simulator.time()
    }

    #[wasm_bindgen(getter)]
    pub fn dt(&self) -> f64 {
        self.simulator.dt()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get the default time step.
#[wasm_bindgen]
pub fn default_timestep() -> f64 {
    crate::DEFAULT_TIMESTEP
}
