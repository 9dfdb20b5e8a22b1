//! Views handed to devices while stamping and reading back currents.

use crate::circuit::{ComponentId, NodeId};

use super::integrator::Companion;
use super::mna::MnaMatrix;
use super::state::DeviceState;
use super::{IntegrationMethod, MIN_RESISTANCE};

/// Write access to the system for one device during one iteration.
///
/// Terminal arguments are `None` when the terminal is not wired. Any element
/// with an unwired end carries no current and is skipped.
pub struct StampContext<'a> {
    matrix: &'a mut MnaMatrix,
    pub id: ComponentId,
    pub dt: f64,
    pub time: f64,
    pub method: IntegrationMethod,
    pub gmin: f64,
    /// Auxiliary equation owned by this device
    pub aux: Option<usize>,
    /// Persisted state of this device for the current iteration
    pub state: DeviceState,
}

impl<'a> StampContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        matrix: &'a mut MnaMatrix,
        id: ComponentId,
        dt: f64,
        time: f64,
        method: IntegrationMethod,
        gmin: f64,
        aux: Option<usize>,
        state: DeviceState,
    ) -> Self {
        Self {
            matrix,
            id,
            dt,
            time,
            method,
            gmin,
            aux,
            state,
        }
    }

    fn rows(n1: Option<NodeId>, n2: Option<NodeId>) -> Option<(Option<usize>, Option<usize>)> {
        match (n1, n2) {
            (Some(a), Some(b)) if a != b => Some((a.matrix_row(), b.matrix_row())),
            _ => None,
        }
    }

    /// Stamp a resistance, floored at [`MIN_RESISTANCE`].
    pub fn stamp_resistor(&mut self, n1: Option<NodeId>, n2: Option<NodeId>, resistance: f64) {
        let r = if resistance.is_nan() {
            MIN_RESISTANCE
        } else {
            resistance.max(MIN_RESISTANCE)
        };
        self.stamp_conductance(n1, n2, 1.0 / r);
    }

    pub fn stamp_conductance(&mut self, n1: Option<NodeId>, n2: Option<NodeId>, g: f64) {
        if let Some((r1, r2)) = Self::rows(n1, n2) {
            self.matrix.stamp_conductance(r1, r2, g);
        }
    }

    /// Stamp a constant current flowing from `from` through the element to `to`.
    pub fn stamp_current_source(&mut self, from: Option<NodeId>, to: Option<NodeId>, current: f64) {
        if let Some((r1, r2)) = Self::rows(from, to) {
            self.matrix.stamp_current_source(r1, r2, current);
        }
    }

    /// Stamp a companion model between terminal 0 (`n1`) and terminal 1 (`n2`).
    pub fn stamp_companion(&mut self, n1: Option<NodeId>, n2: Option<NodeId>, companion: Companion) {
        self.stamp_conductance(n1, n2, companion.conductance);
        self.stamp_current_source(n1, n2, companion.history);
    }

    /// Enforce V(pos) - V(neg) = voltage on this device's auxiliary equation.
    pub fn stamp_voltage_source(&mut self, pos: Option<NodeId>, neg: Option<NodeId>, voltage: f64) {
        let Some(aux) = self.aux else {
            log::error!("{} stamps a voltage source without an auxiliary equation", self.id);
            return;
        };
        let (Some(p), Some(n)) = (pos, neg) else {
            return;
        };
        let br = self.matrix.aux_row(aux);
        self.matrix
            .stamp_voltage_source(p.matrix_row(), n.matrix_row(), br, voltage);
    }

    /// Add a resistance in series with the auxiliary branch current.
    pub fn stamp_series_resistance(&mut self, resistance: f64) {
        if let Some(aux) = self.aux {
            let br = self.matrix.aux_row(aux);
            self.matrix.add(br, br, -resistance.max(MIN_RESISTANCE));
        }
    }
}

/// Read access to a solved system for one device.
pub struct ReadContext<'a> {
    /// Node voltages, index 0 is ground
    pub voltages: &'a [f64],
    /// Raw solution vector (node rows then auxiliary rows)
    pub solution: &'a [f64],
    pub num_nodes: usize,
    pub id: ComponentId,
    pub dt: f64,
    pub time: f64,
    pub method: IntegrationMethod,
    pub aux: Option<usize>,
    pub state: DeviceState,
}

impl ReadContext<'_> {
    /// Voltage at `node`; unwired terminals read 0.
    pub fn voltage(&self, node: Option<NodeId>) -> f64 {
        node.and_then(|n| self.voltages.get(n.0).copied())
            .unwrap_or(0.0)
    }

    /// V(a) - V(b).
    pub fn voltage_across(&self, a: Option<NodeId>, b: Option<NodeId>) -> f64 {
        self.voltage(a) - self.voltage(b)
    }

    /// Current through this device's auxiliary branch, from + to -.
    pub fn branch_current(&self) -> f64 {
        self.aux
            .and_then(|aux| self.solution.get(self.num_nodes.saturating_sub(1) + aux))
            .copied()
            .unwrap_or(0.0)
    }
}
