//! Fixed-point iteration over nonlinear and stateful devices.
//!
//! Every iteration rebuilds the system from scratch with each diode, LED and
//! relay linearized at its current operating point, solves it, and moves the
//! operating points. The loop ends once no junction voltage moves by more than
//! the tolerance and no relay changes state.

use std::collections::BTreeMap;

use crate::circuit::{ComponentId, NodeId};
use crate::components::{Component, Device};

use super::cache::{FactorizationCache, Fingerprint};
use super::context::{ReadContext, StampContext};
use super::integrator::{advance_capacitor, advance_inductor, capacitor_companion, inductor_companion, resolve_method};
use super::mna::MnaMatrix;
use super::result::{InvalidReason, SolveMeta, SolveResult};
use super::state::{DeviceState, FuseState, JunctionState, RelayState, SimulationState};
use super::{IntegrationMethod, SolverConfig, CONDUCTION_CURRENT};

/// Per-component solver bookkeeping, recomputed by [`MnaSolver::set_circuit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Auxiliary equation index, for devices that need one
    pub aux_index: Option<usize>,
    /// Every wired terminal sits on the same node
    pub shorted: bool,
    /// Source stamped as conductance plus current
    pub norton: bool,
    /// Device takes part in the solve
    pub active: bool,
}

/// MNA orchestrator: assembles, iterates, solves and reads back.
#[derive(Debug)]
pub struct MnaSolver {
    config: SolverConfig,
    components: Vec<Component>,
    annotations: Vec<Annotation>,
    num_nodes: usize,
    num_aux: usize,
    matrix: MnaMatrix,
    cache: FactorizationCache,
    state: SimulationState,
    switch_connected: bool,
    last_method: IntegrationMethod,
    last_dt: f64,
    last_currents: BTreeMap<ComponentId, f64>,
}

impl Default for MnaSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl MnaSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            components: Vec::new(),
            annotations: Vec::new(),
            num_nodes: 0,
            num_aux: 0,
            matrix: MnaMatrix::new(0, 0),
            cache: FactorizationCache::new(),
            state: SimulationState::new(),
            switch_connected: false,
            last_method: IntegrationMethod::BackwardEuler,
            last_dt: 0.0,
            last_currents: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
        self.cache.invalidate();
    }

    /// Take a new circuit: annotate components, allocate auxiliary equations
    /// and drop the cached factorization.
    ///
    /// Components whose node array does not match their kind, or that reference
    /// nodes past `num_nodes`, are logged and left out of the solve.
    pub fn set_circuit(&mut self, components: &[Component], num_nodes: usize) {
        let mut num_aux = 0;
        let annotations = components
            .iter()
            .map(|c| {
                let well_formed = c.is_well_formed()
                    && c.nodes.iter().flatten().all(|n| n.0 < num_nodes);
                if !well_formed {
                    log::error!(
                        "{} ({}) is malformed: {} node entries for {} terminals; skipped",
                        c.id,
                        c.device.kind(),
                        c.nodes.len(),
                        c.device.terminal_count()
                    );
                    return Annotation::default();
                }
                let shorted = c.device.is_shorted(&c.nodes);
                let active = !matches!(c.device, Device::Ground)
                    && !shorted
                    && c.device.is_wired(&c.nodes);
                let aux_index = if active && c.device.needs_aux() {
                    num_aux += 1;
                    Some(num_aux - 1)
                } else {
                    None
                };
                Annotation {
                    aux_index,
                    shorted,
                    norton: c.device.is_norton(),
                    active,
                }
            })
            .collect::<Vec<_>>();

        self.switch_connected = components
            .iter()
            .zip(&annotations)
            .any(|(c, a)| a.active && c.device.is_switch());
        self.components = components.to_vec();
        self.annotations = annotations;
        self.num_nodes = num_nodes;
        self.num_aux = num_aux;
        if self.matrix.num_nodes != num_nodes || self.matrix.size != num_nodes.saturating_sub(1) + num_aux {
            self.matrix = MnaMatrix::new(num_nodes, num_aux);
        }
        self.state.retain_components(components);
        self.cache.invalidate();
        log::debug!(
            "circuit set: {} components, {} nodes, {} auxiliary equations",
            self.components.len(),
            num_nodes,
            num_aux
        );
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: ComponentId) -> Option<&Annotation> {
        self.components
            .iter()
            .position(|c| c.id == id)
            .map(|i| &self.annotations[i])
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_aux(&self) -> usize {
        self.num_aux
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn cache(&self) -> &FactorizationCache {
        &self.cache
    }

    /// Restore every device to its initial state.
    pub fn reset_state(&mut self) {
        self.state.reset(&self.components);
        self.last_currents.clear();
        self.cache.invalidate();
    }

    /// Solve one timestep at `time` with step `dt`.
    ///
    /// Never fails: singular systems and non-convergence come back with
    /// `valid == false` and a reason.
    pub fn solve(&mut self, dt: f64, time: f64) -> SolveResult {
        let size = self.matrix.size;
        if self.num_nodes < 2 || size == 0 {
            return SolveResult::trivial(self.num_nodes, self.components.iter().map(|c| c.id));
        }

        let method = resolve_method(
            self.config.integration,
            self.state.history_ready(),
            self.switch_connected,
        );
        self.last_method = method;
        self.last_dt = dt;

        let nonlinear = self
            .components
            .iter()
            .zip(&self.annotations)
            .any(|(c, a)| a.active && c.device.is_nonlinear());
        let max_iterations = if nonlinear {
            self.config.max_iterations.max(1)
        } else {
            1
        };

        let mut working = self.state.clone();
        let mut result = SolveResult {
            meta: SolveMeta {
                max_iterations,
                ..SolveMeta::default()
            },
            ..SolveResult::default()
        };

        for iteration in 1..=max_iterations {
            result.meta.iterations = iteration;
            self.assemble(dt, time, method, &working);
            let key = self.fingerprint(dt, method, &working);

            let solution = match self.cache.solve(key, &self.matrix) {
                Ok(x) => x,
                Err(err) => {
                    let reason = InvalidReason::from(err);
                    log::warn!("solve failed at t={time:.6}: {err} ({reason})");
                    self.cache.invalidate();
                    result.valid = false;
                    result.meta.invalid_reason = Some(reason);
                    if result.voltages.is_empty() {
                        result.voltages = vec![0.0; self.num_nodes];
                    }
                    for c in &self.components {
                        result.currents.entry(c.id).or_insert(0.0);
                    }
                    return result;
                }
            };

            let mut voltages = Vec::with_capacity(self.num_nodes);
            voltages.push(0.0);
            voltages.extend_from_slice(&solution[..self.num_nodes - 1]);
            let currents = self.read_currents(&solution, &voltages, dt, time, method, &working);
            result.voltages = voltages;
            result.currents = currents;

            if !nonlinear {
                result.meta.converged = true;
                break;
            }
            if self.update_operating_points(&result, &mut working) {
                result.meta.converged = true;
                break;
            }
            self.cache.invalidate();
        }

        if result.meta.converged {
            result.valid = true;
            log::debug!(
                "solved t={time:.6} in {} iteration(s)",
                result.meta.iterations
            );
        } else {
            result.valid = false;
            result.meta.invalid_reason = Some(InvalidReason::NotConverged);
            log::warn!(
                "no convergence at t={time:.6} after {} iterations",
                result.meta.iterations
            );
        }

        if result.valid {
            self.state = working;
        }
        result.meta.short_circuits = self.detect_short_circuits(&result, time);
        self.last_currents = result.currents.clone();
        result
    }

    /// Advance capacitor, inductor, motor and fuse state after an accepted solve.
    ///
    /// Without `currents`, the readback of the last solve is used.
    pub fn update_dynamic_components(
        &mut self,
        voltages: &[f64],
        currents: Option<&BTreeMap<ComponentId, f64>>,
    ) {
        let currents = currents.unwrap_or(&self.last_currents);
        let dt = self.last_dt;
        let method = self.last_method;
        let node_voltage =
            |n: Option<NodeId>| n.and_then(|n| voltages.get(n.0).copied()).unwrap_or(0.0);

        for (c, a) in self.components.iter().zip(&self.annotations) {
            if !a.active {
                continue;
            }
            let v = node_voltage(c.nodes[0]) - node_voltage(c.nodes.get(1).copied().flatten());
            let current = currents.get(&c.id).copied();
            let entry = self.state.entry(c.id, &c.device);
            match &c.device {
                Device::Capacitor(cap) => {
                    let history = entry.capacitor().unwrap_or_else(|| cap.initial_state());
                    let i = current.unwrap_or_else(|| {
                        capacitor_companion(cap.capacitance, dt, method, &history).current(v)
                    });
                    *entry = DeviceState::Capacitor(advance_capacitor(cap.capacitance, v, i));
                }
                Device::Inductor(ind) => {
                    let history = entry.inductor().unwrap_or_else(|| ind.initial_state());
                    let i = current.unwrap_or_else(|| {
                        inductor_companion(ind.inductance, dt, method, &history).current(v)
                    });
                    *entry = DeviceState::Inductor(advance_inductor(v, i));
                }
                Device::Motor(m) => {
                    let prev = entry.motor().unwrap_or_default();
                    *entry = DeviceState::Motor(m.advance(&prev, current.unwrap_or(0.0), dt));
                }
                Device::Fuse(f) => {
                    let blown = entry.fuse().is_some_and(|s| s.blown);
                    let i = current.unwrap_or(0.0);
                    if !blown && f.blows_at(i) {
                        log::warn!("{} blown at {:.3} A (rated {:.3} A)", c.id, i.abs(), f.rated_current);
                        *entry = DeviceState::Fuse(FuseState { blown: true });
                    }
                }
                _ => {}
            }
        }
        self.state.mark_history_ready();
    }

    fn assemble(&mut self, dt: f64, time: f64, method: IntegrationMethod, working: &SimulationState) {
        self.matrix.clear();
        for (c, a) in self.components.iter().zip(&self.annotations) {
            if !a.active {
                continue;
            }
            let mut ctx = StampContext::new(
                &mut self.matrix,
                c.id,
                dt,
                time,
                method,
                self.config.gmin,
                a.aux_index,
                working.get_or_default(c.id, &c.device),
            );
            c.device.handler().stamp(&mut ctx, &c.nodes);
        }
        self.matrix.stamp_gmin(self.config.gmin);
    }

    /// Hash of everything that shapes the system matrix this iteration.
    fn fingerprint(&self, dt: f64, method: IntegrationMethod, working: &SimulationState) -> u64 {
        let mut fp = Fingerprint::new();
        fp.write_usize(self.num_nodes);
        fp.write_usize(self.num_aux);
        for (c, a) in self.components.iter().zip(&self.annotations) {
            fp.write_str(c.device.kind());
            fp.write_bool(a.shorted);
            fp.write_bool(a.active);
            for &n in &c.nodes {
                fp.write_node(n);
            }
            fp.write_usize(a.aux_index.map_or(0, |i| i + 1));
            if !a.active {
                continue;
            }
            c.device.handler().fingerprint(&mut fp);
            match working.get_or_default(c.id, &c.device) {
                DeviceState::Junction(j) => fp.write_f64(j.voltage),
                DeviceState::Relay(r) => fp.write_bool(r.energized),
                DeviceState::Fuse(f) => fp.write_bool(f.blown),
                _ => {}
            }
        }
        fp.write_f64(dt);
        fp.write_f64(self.config.gmin);
        fp.write_bool(self.switch_connected);
        // The rule only shapes companion conductances
        let reactive = self
            .components
            .iter()
            .zip(&self.annotations)
            .any(|(c, a)| a.active && matches!(c.device, Device::Capacitor(_) | Device::Inductor(_)));
        fp.write_bool(reactive && method == IntegrationMethod::Trapezoidal);
        fp.finish()
    }

    fn read_currents(
        &self,
        solution: &[f64],
        voltages: &[f64],
        dt: f64,
        time: f64,
        method: IntegrationMethod,
        working: &SimulationState,
    ) -> BTreeMap<ComponentId, f64> {
        self.components
            .iter()
            .zip(&self.annotations)
            .map(|(c, a)| {
                if !a.active {
                    return (c.id, 0.0);
                }
                let ctx = ReadContext {
                    voltages,
                    solution,
                    num_nodes: self.num_nodes,
                    id: c.id,
                    dt,
                    time,
                    method,
                    aux: a.aux_index,
                    state: working.get_or_default(c.id, &c.device),
                };
                (c.id, c.device.handler().current(&ctx, &c.nodes))
            })
            .collect()
    }

    /// Move junction linearization points and relay contacts. Returns whether
    /// the iteration has settled.
    fn update_operating_points(&self, result: &SolveResult, working: &mut SimulationState) -> bool {
        let mut max_delta = 0.0f64;
        let mut relay_flipped = false;

        for (c, a) in self.components.iter().zip(&self.annotations) {
            if !a.active {
                continue;
            }
            let current = result.current(c.id);
            match &c.device {
                Device::Diode(_) | Device::Led(_) => {
                    let model = match &c.device {
                        Device::Led(led) => led.model(),
                        Device::Diode(d) => d.model(),
                        _ => continue,
                    };
                    let old = working
                        .get_or_default(c.id, &c.device)
                        .junction()
                        .unwrap_or_default();
                    let v_ext = terminal_voltage(&result.voltages, c.nodes[0])
                        - terminal_voltage(&result.voltages, c.nodes[1]);
                    let i_lin = model.terminal_companion(old.voltage, self.config.gmin).current(v_ext);
                    let target = v_ext - i_lin * model.series_resistance;
                    let v_new = model.limit_junction_step(target, old.voltage);
                    max_delta = max_delta.max((v_new - old.voltage).abs());
                    working.set(
                        c.id,
                        DeviceState::Junction(JunctionState {
                            voltage: v_new,
                            current,
                            conducting: current >= CONDUCTION_CURRENT,
                        }),
                    );
                }
                Device::Relay(relay) => {
                    let energized = working
                        .get_or_default(c.id, &c.device)
                        .relay()
                        .is_some_and(|r| r.energized);
                    let next = relay.next_energized(energized, current);
                    if next != energized {
                        relay_flipped = true;
                        log::debug!("{} {}", c.id, if next { "energized" } else { "released" });
                    }
                    working.set(c.id, DeviceState::Relay(RelayState { energized: next }));
                }
                _ => {}
            }
        }

        log::trace!("max junction delta {max_delta:.3e} V, relay flip: {relay_flipped}");
        max_delta <= self.config.tolerance && !relay_flipped
    }

    /// Finite-resistance sources delivering nearly their short-circuit current.
    fn detect_short_circuits(&self, result: &SolveResult, time: f64) -> Vec<ComponentId> {
        let mut shorts = Vec::new();
        for (c, a) in self.components.iter().zip(&self.annotations) {
            if !a.active || !a.norton {
                continue;
            }
            let Some((emf, r)) = c.device.norton_source(time) else {
                continue;
            };
            if emf == 0.0 || r <= 0.0 {
                continue;
            }
            let i_short = (emf / r).abs();
            let delivered = result.current(c.id).abs();
            let v_term = (terminal_voltage(&result.voltages, c.nodes[0])
                - terminal_voltage(&result.voltages, c.nodes[1]))
            .abs();
            if delivered >= self.config.short_circuit_current_ratio * i_short
                || v_term <= self.config.short_circuit_voltage_ratio * emf.abs()
            {
                log::warn!(
                    "{} is short-circuited: delivering {:.3} A of {:.3} A",
                    c.id,
                    delivered,
                    i_short
                );
                shorts.push(c.id);
            }
        }
        shorts
    }
}

fn terminal_voltage(voltages: &[f64], node: Option<NodeId>) -> f64 {
    node.and_then(|n| voltages.get(n.0).copied()).unwrap_or(0.0)
}
