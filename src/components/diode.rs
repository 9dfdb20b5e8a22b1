//! P-N junction devices: diode and LED.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! Instead of a datasheet saturation current, each device is described by a
//! reference operating point (forward voltage at a reference current), and Is
//! is derived so the curve passes through that point.
//!
//! For the fixed-point iteration we linearize around the stored junction voltage:
//!   I ≈ I0 + G_d * (V - V0)
//!
//! where G_d = dI/dV = Is/(n*Vt) * exp(V0/(n*Vt)).

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{Companion, Fingerprint, ReadContext, StampContext, JUNCTION_NEWTON_STEPS, MIN_RESISTANCE};
use crate::THERMAL_VOLTAGE;

/// Exponent above which the Shockley curve continues as a straight line.
const MAX_EXP_ARG: f64 = 80.0;

/// Physics of a single p-n junction with optional series resistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionModel {
    /// Saturation current (Is)
    pub is: f64,
    /// Ideality factor times thermal voltage
    pub n_vt: f64,
    /// Critical voltage for step limiting
    pub v_crit: f64,
    /// Ohmic resistance in series with the junction
    pub series_resistance: f64,
}

impl JunctionModel {
    /// Derive a junction that conducts `reference_current` at `forward_voltage`.
    pub fn from_reference(
        forward_voltage: f64,
        reference_current: f64,
        ideality: f64,
        series_resistance: f64,
    ) -> Self {
        let n_vt = ideality.max(0.1) * THERMAL_VOLTAGE;
        let i_ref = reference_current.abs().max(1e-12);
        // At least one n*Vt so Is stays finite
        let v_f = forward_voltage.max(n_vt);
        // Shockley relation solved for Is at the reference point
        let is = (i_ref / (v_f / n_vt).exp_m1()).max(f64::MIN_POSITIVE);
        let v_crit = n_vt * (n_vt / (SQRT_2 * is)).ln();
        Self {
            is,
            n_vt,
            v_crit,
            series_resistance: series_resistance.max(0.0),
        }
    }

    /// Junction current at junction voltage `v`.
    pub fn current(&self, v: f64) -> f64 {
        let arg = v / self.n_vt;
        if arg > MAX_EXP_ARG {
            // Linear extrapolation past the exponent cap
            let e = MAX_EXP_ARG.exp();
            self.is * (e - 1.0) + self.is / self.n_vt * e * (v - MAX_EXP_ARG * self.n_vt)
        } else {
            self.is * arg.exp_m1()
        }
    }

    /// Small-signal conductance dI/dV at junction voltage `v`.
    pub fn conductance(&self, v: f64) -> f64 {
        let arg = (v / self.n_vt).min(MAX_EXP_ARG);
        self.is / self.n_vt * arg.exp()
    }

    /// Linear companion `(G, I_eq)` at junction voltage `v`, so that
    /// I ≈ G * V + I_eq. G includes the `gmin` leakage.
    pub fn linearize_at(&self, v: f64, gmin: f64) -> (f64, f64) {
        let g = self.conductance(v);
        let i = self.current(v);
        (g + gmin, i - g * v)
    }

    /// Linearized junction in series with the series resistance, folded into
    /// one terminal-to-terminal companion.
    pub fn terminal_companion(&self, v_junction: f64, gmin: f64) -> Companion {
        let (g, i_eq) = self.linearize_at(v_junction, gmin);
        let k = 1.0 + g * self.series_resistance;
        Companion {
            conductance: g / k,
            history: i_eq / k,
        }
    }

    /// Standard SPICE `pnjlim` step limiting against the critical voltage.
    pub fn limit_junction_step(&self, v_new: f64, v_old: f64) -> f64 {
        if v_new > self.v_crit && (v_new - v_old).abs() > 2.0 * self.n_vt {
            if v_old > 0.0 {
                let arg = (v_new - v_old) / self.n_vt;
                if arg > 0.0 {
                    v_old + self.n_vt * (1.0 + arg).ln()
                } else {
                    v_new
                }
            } else {
                self.n_vt * (v_new / self.n_vt).ln()
            }
        } else {
            v_new
        }
    }

    /// Solve the series-resistance-limited junction against an external
    /// terminal voltage. Returns `(junction voltage, current)`.
    ///
    /// Bounded Newton iteration starting from `v_guess`.
    pub fn solve_junction_current(&self, v_terminal: f64, v_guess: f64) -> (f64, f64) {
        if self.series_resistance < MIN_RESISTANCE {
            return (v_terminal, self.current(v_terminal));
        }
        let g_s = 1.0 / self.series_resistance;
        let mut v = v_guess.min(v_terminal.max(0.0));
        for _ in 0..JUNCTION_NEWTON_STEPS {
            // f(v) = I_d(v) - (V_t - v)/Rs
            let f = self.current(v) - (v_terminal - v) * g_s;
            let df = self.conductance(v) + g_s;
            let step = f / df;
            let next = self.limit_junction_step(v - step, v);
            if (next - v).abs() < 1e-12 {
                v = next;
                break;
            }
            v = next;
        }
        (v, (v_terminal - v) * g_s)
    }
}

/// Stamp a junction device at its stored linearization point.
fn stamp_junction(model: &JunctionModel, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
    let v_j = ctx.state.junction().map(|j| j.voltage).unwrap_or(0.0);
    let companion = model.terminal_companion(v_j, ctx.gmin);
    ctx.stamp_companion(nodes[0], nodes[1], companion);
}

/// Read back junction current from the solved terminal voltage.
fn junction_current(model: &JunctionModel, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
    let v_j = ctx.state.junction().map(|j| j.voltage).unwrap_or(0.0);
    let (_, i) = model.solve_junction_current(ctx.voltage_across(nodes[0], nodes[1]), v_j);
    i
}

fn fingerprint_junction(model: &JunctionModel, fp: &mut Fingerprint) {
    fp.write_f64(model.is);
    fp.write_f64(model.n_vt);
    fp.write_f64(model.series_resistance);
}

/// A rectifier diode. Terminals: `[anode, cathode]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diode {
    /// Forward voltage at the reference current, in volts
    pub forward_voltage: f64,
    /// Reference current in amperes
    pub reference_current: f64,
    /// Ideality factor (n)
    pub ideality: f64,
    /// On-resistance in series with the junction, in ohms
    pub series_resistance: f64,
}

impl Default for Diode {
    fn default() -> Self {
        Self {
            forward_voltage: 0.7,
            reference_current: 1e-3,
            ideality: 1.0,
            series_resistance: 0.0,
        }
    }
}

impl Diode {
    /// Junction physics for these parameters.
    pub fn model(&self) -> JunctionModel {
        JunctionModel::from_reference(
            self.forward_voltage,
            self.reference_current,
            self.ideality,
            self.series_resistance,
        )
    }
}

impl Stamp for Diode {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        stamp_junction(&self.model(), ctx, nodes);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        junction_current(&self.model(), ctx, nodes)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fingerprint_junction(&self.model(), fp);
    }
}

/// A light-emitting diode. Terminals: `[anode, cathode]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Led {
    /// Forward voltage at the reference current, in volts (red ~1.8, blue ~3.2)
    pub forward_voltage: f64,
    /// Reference current in amperes
    pub reference_current: f64,
    /// Ideality factor (n)
    pub ideality: f64,
    /// On-resistance in series with the junction, in ohms
    pub series_resistance: f64,
    /// Current at full brightness in amperes
    pub max_current: f64,
}

impl Default for Led {
    fn default() -> Self {
        Self {
            forward_voltage: 2.0,
            reference_current: 10e-3,
            ideality: 2.0,
            series_resistance: 5.0,
            max_current: 20e-3,
        }
    }
}

impl Led {
    /// Junction physics for these parameters.
    pub fn model(&self) -> JunctionModel {
        JunctionModel::from_reference(
            self.forward_voltage,
            self.reference_current,
            self.ideality,
            self.series_resistance,
        )
    }

    /// Brightness in 0..=1 for a given forward current.
    pub fn brightness(&self, current: f64) -> f64 {
        if self.max_current <= 0.0 {
            return 0.0;
        }
        (current / self.max_current).clamp(0.0, 1.0)
    }
}

impl Stamp for Led {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        stamp_junction(&self.model(), ctx, nodes);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        junction_current(&self.model(), ctx, nodes)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fingerprint_junction(&self.model(), fp);
    }
}
