//! Main simulator interface.

use crate::circuit::{Circuit, ComponentId};
use crate::components::Device;
use crate::error::{BreadboardError, Result};

use super::newton::MnaSolver;
use super::result::SolveResult;
use super::state::DeviceState;
use super::SolverConfig;

/// The time-stepping simulator.
///
/// Owns the circuit being edited and the solver state. Each [`step`](Self::step)
/// picks up any edit made through [`circuit_mut`](Self::circuit_mut) since the
/// previous step.
#[derive(Debug)]
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    /// MNA orchestrator and simulation state
    solver: MnaSolver,
    /// Closed-path memo used to blank disconnected readouts
    connectivity: crate::circuit::ConnectivityCache,
    /// Time step in seconds
    dt: f64,
    /// Simulated time in seconds
    time: f64,
    /// Circuit revision the solver was last given
    synced_revision: Option<u64>,
    last: Option<SolveResult>,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit, dt: f64) -> Result<Self> {
        Self::with_config(circuit, dt, SolverConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(circuit: Circuit, dt: f64, config: SolverConfig) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(BreadboardError::invalid_simulation(format!(
                "timestep must be positive, got {dt}"
            )));
        }
        if config.max_iterations == 0 {
            return Err(BreadboardError::invalid_simulation(
                "max_iterations must be at least 1",
            ));
        }
        Ok(Self {
            circuit,
            solver: MnaSolver::new(config),
            connectivity: crate::circuit::ConnectivityCache::new(),
            dt,
            time: 0.0,
            synced_revision: None,
            last: None,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Mutable access for edits between steps.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Swap in a different circuit. Device state is kept for ids that survive.
    pub fn replace_circuit(&mut self, circuit: Circuit) -> Circuit {
        self.synced_revision = None;
        self.connectivity.invalidate();
        self.last = None;
        std::mem::replace(&mut self.circuit, circuit)
    }

    pub fn solver(&self) -> &MnaSolver {
        &self.solver
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn last_result(&self) -> Option<&SolveResult> {
        self.last.as_ref()
    }

    /// Open or close a switch between steps.
    pub fn set_switch(&mut self, id: ComponentId, closed: bool) -> Result<()> {
        self.circuit.set_switch(id, closed)
    }

    /// Advance one timestep.
    pub fn step(&mut self) -> SolveResult {
        self.sync();
        let mut result = self.solver.solve(self.dt, self.time);
        if result.valid {
            self.solver
                .update_dynamic_components(&result.voltages, Some(&result.currents));
        }

        self.connectivity.refresh(
            self.circuit.version(),
            self.circuit.components(),
            self.circuit.node_count(),
        );
        for (id, current) in result.currents.iter_mut() {
            if !self.connectivity.is_connected(*id) {
                *current = 0.0;
            }
        }
        self.time += self.dt;
        self.last = Some(result.clone());
        result
    }

    /// Advance `steps` timesteps, returning every result.
    pub fn run(&mut self, steps: usize) -> Vec<SolveResult> {
        (0..steps).map(|_| self.step()).collect()
    }

    /// Restore every device to its initial state and rewind time.
    pub fn reset(&mut self) {
        self.sync();
        self.solver.reset_state();
        self.time = 0.0;
        self.last = None;
    }

    fn sync(&mut self) {
        let revision = self.circuit.revision();
        if self.synced_revision != Some(revision) {
            self.solver
                .set_circuit(self.circuit.components(), self.circuit.node_count());
            self.synced_revision = Some(revision);
        }
    }

    fn device_state(&self, id: ComponentId) -> Option<DeviceState> {
        self.solver.state().get(id).copied()
    }

    /// Current of a component from the last step.
    pub fn current(&self, id: ComponentId) -> f64 {
        self.last.as_ref().map_or(0.0, |r| r.current(id))
    }

    /// Voltage of a node from the last step.
    pub fn node_voltage(&self, node: usize) -> f64 {
        self.last.as_ref().map_or(0.0, |r| r.voltage(node))
    }

    /// Brightness in 0..=1 of a bulb or LED.
    pub fn brightness(&self, id: ComponentId) -> Option<f64> {
        let current = self.current(id);
        match &self.circuit.component(id)?.device {
            Device::Bulb(b) => Some(b.brightness(current)),
            Device::Led(l) => Some(l.brightness(current)),
            _ => None,
        }
    }

    /// Whether a diode or LED conducted on the last step.
    pub fn is_conducting(&self, id: ComponentId) -> bool {
        self.device_state(id)
            .and_then(|s| s.junction())
            .is_some_and(|j| j.conducting)
    }

    pub fn relay_energized(&self, id: ComponentId) -> bool {
        self.device_state(id)
            .and_then(|s| s.relay())
            .is_some_and(|r| r.energized)
    }

    pub fn fuse_blown(&self, id: ComponentId) -> bool {
        self.device_state(id)
            .and_then(|s| s.fuse())
            .is_some_and(|f| f.blown)
    }

    /// Rotor speed in rad/s.
    pub fn motor_speed(&self, id: ComponentId) -> f64 {
        self.device_state(id)
            .and_then(|s| s.motor())
            .map_or(0.0, |m| m.speed)
    }

    /// Voltage across a capacitor at the end of the last step.
    pub fn capacitor_voltage(&self, id: ComponentId) -> f64 {
        self.device_state(id)
            .and_then(|s| s.capacitor())
            .map_or(0.0, |c| c.prev_voltage)
    }

    /// Reading of a voltmeter on the last step.
    pub fn voltmeter_reading(&self, id: ComponentId) -> Option<f64> {
        let component = self.circuit.component(id)?;
        let Device::Voltmeter(meter) = &component.device else {
            return None;
        };
        let result = self.last.as_ref()?;
        Some(meter.reading(&result.voltages, &component.nodes))
    }
}
