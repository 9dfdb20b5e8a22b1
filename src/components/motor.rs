//! Permanent-magnet DC motor.
//!
//! The armature is an auxiliary equation with a series resistance:
//!   V+ - V- - R_a * I = E_b
//!
//! where the back-EMF E_b = Ke * ω comes from the previous timestep's speed.
//! The mechanical side is advanced explicitly after each accepted solve.

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{Fingerprint, MotorState, ReadContext, StampContext, MIN_RESISTANCE};

/// Smallest rotor inertia used in the mechanical update.
const MIN_INERTIA: f64 = 1e-9;

/// A DC motor. Terminals: `[+, -]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Motor {
    /// Armature resistance in ohms
    pub armature_resistance: f64,
    /// Torque constant Kt in N·m/A
    pub torque_constant: f64,
    /// Back-EMF constant Ke in V·s/rad
    pub back_emf_constant: f64,
    /// Rotor inertia in kg·m²
    pub inertia: f64,
    /// Opposing load torque in N·m
    pub load_torque: f64,
}

impl Default for Motor {
    fn default() -> Self {
        Self {
            armature_resistance: 2.0,
            torque_constant: 0.01,
            back_emf_constant: 0.01,
            inertia: 1e-5,
            load_torque: 0.0,
        }
    }
}

impl Motor {
    /// Advance the rotor by one timestep with armature current `current`.
    ///
    /// Speed never goes negative: the load only brakes the rotor.
    pub fn advance(&self, state: &MotorState, current: f64, dt: f64) -> MotorState {
        let torque = self.torque_constant * current;
        let alpha = (torque - self.load_torque) / self.inertia.max(MIN_INERTIA);
        let speed = (state.speed + alpha * dt).max(0.0);
        MotorState {
            speed,
            back_emf: self.back_emf_constant * speed,
        }
    }
}

impl Stamp for Motor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let back_emf = ctx.state.motor().map(|m| m.back_emf).unwrap_or(0.0);
        ctx.stamp_voltage_source(nodes[0], nodes[1], back_emf);
        ctx.stamp_series_resistance(self.armature_resistance.max(MIN_RESISTANCE));
    }

    fn current(&self, ctx: &ReadContext<'_>, _nodes: &[Option<NodeId>]) -> f64 {
        ctx.branch_current()
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.armature_resistance.max(MIN_RESISTANCE));
    }
}
