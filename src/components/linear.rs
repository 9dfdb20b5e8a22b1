//! Passive two-terminal devices: resistive loads and energy-storage elements.

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{
    capacitor_companion, inductor_companion, CapacitorState, Fingerprint, InductorState, ReadContext,
    StampContext, MIN_RESISTANCE,
};

/// Kelvin offset of the Celsius scale.
const KELVIN: f64 = 273.15;

/// Reference temperature of a thermistor's nominal resistance (25 °C).
const THERMISTOR_REFERENCE_K: f64 = 298.15;

/// Current through a plain resistance between terminals 0 and 1.
fn resistive_current(ctx: &ReadContext<'_>, nodes: &[Option<NodeId>], resistance: f64) -> f64 {
    ctx.voltage_across(nodes[0], nodes[1]) / resistance.max(MIN_RESISTANCE)
}

/// A resistor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resistor {
    /// Resistance in ohms
    pub resistance: f64,
}

impl Default for Resistor {
    fn default() -> Self {
        Self { resistance: 1000.0 }
    }
}

impl Resistor {
    pub fn new(resistance: f64) -> Self {
        Self { resistance }
    }
}

impl Stamp for Resistor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        resistive_current(ctx, nodes, self.resistance)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance);
    }
}

/// An incandescent bulb, modeled as a fixed resistance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bulb {
    /// Filament resistance in ohms
    pub resistance: f64,
    /// Power at full brightness in watts
    pub rated_power: f64,
}

impl Default for Bulb {
    fn default() -> Self {
        Self {
            resistance: 10.0,
            rated_power: 1.0,
        }
    }
}

impl Bulb {
    /// Brightness in 0..=1 for a given filament current.
    pub fn brightness(&self, current: f64) -> f64 {
        if self.rated_power <= 0.0 {
            return 0.0;
        }
        let power = current * current * self.resistance.max(MIN_RESISTANCE);
        (power / self.rated_power).clamp(0.0, 1.0)
    }
}

impl Stamp for Bulb {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        resistive_current(ctx, nodes, self.resistance)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance);
    }
}

/// An NTC thermistor following the Beta model:
///   R(T) = R25 * exp(B * (1/T - 1/298.15))
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thermistor {
    /// Resistance at 25 °C in ohms
    pub nominal_resistance: f64,
    /// Beta constant in kelvin
    pub beta: f64,
    /// Ambient temperature in °C
    pub temperature: f64,
}

impl Default for Thermistor {
    fn default() -> Self {
        Self {
            nominal_resistance: 10_000.0,
            beta: 3950.0,
            temperature: 25.0,
        }
    }
}

impl Thermistor {
    /// Resistance at the configured temperature.
    pub fn resistance(&self) -> f64 {
        let t = (self.temperature + KELVIN).max(1.0);
        let r = self.nominal_resistance * (self.beta * (1.0 / t - 1.0 / THERMISTOR_REFERENCE_K)).exp();
        if r.is_finite() {
            r.max(MIN_RESISTANCE)
        } else {
            f64::MAX
        }
    }
}

impl Stamp for Thermistor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance());
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        resistive_current(ctx, nodes, self.resistance())
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance());
    }
}

/// A light-dependent resistor with a linear light response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photoresistor {
    /// Resistance in darkness in ohms
    pub dark_resistance: f64,
    /// Resistance in full light in ohms
    pub light_resistance: f64,
    /// Illumination in 0..=1
    pub light_level: f64,
}

impl Default for Photoresistor {
    fn default() -> Self {
        Self {
            dark_resistance: 1_000_000.0,
            light_resistance: 1_000.0,
            light_level: 0.5,
        }
    }
}

impl Photoresistor {
    /// Resistance at the configured light level.
    pub fn resistance(&self) -> f64 {
        let light = self.light_level.clamp(0.0, 1.0);
        (self.dark_resistance + (self.light_resistance - self.dark_resistance) * light).max(MIN_RESISTANCE)
    }
}

impl Stamp for Photoresistor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance());
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        resistive_current(ctx, nodes, self.resistance())
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance());
    }
}

/// A capacitor, replaced each timestep by its companion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacitor {
    /// Capacitance in farads
    pub capacitance: f64,
    /// Voltage across the capacitor when the simulation starts
    pub initial_voltage: f64,
}

impl Default for Capacitor {
    fn default() -> Self {
        Self {
            capacitance: 100e-6,
            initial_voltage: 0.0,
        }
    }
}

impl Capacitor {
    pub fn new(capacitance: f64) -> Self {
        Self {
            capacitance,
            initial_voltage: 0.0,
        }
    }

    /// History at simulation start.
    pub fn initial_state(&self) -> CapacitorState {
        CapacitorState {
            prev_voltage: self.initial_voltage,
            prev_charge: self.capacitance * self.initial_voltage,
            prev_current: 0.0,
        }
    }
}

impl Stamp for Capacitor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let history = ctx.state.capacitor().unwrap_or_else(|| self.initial_state());
        let companion = capacitor_companion(self.capacitance, ctx.dt, ctx.method, &history);
        ctx.stamp_companion(nodes[0], nodes[1], companion);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        let history = ctx.state.capacitor().unwrap_or_else(|| self.initial_state());
        let companion = capacitor_companion(self.capacitance, ctx.dt, ctx.method, &history);
        companion.current(ctx.voltage_across(nodes[0], nodes[1]))
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.capacitance);
    }
}

/// An inductor, replaced each timestep by its companion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inductor {
    /// Inductance in henries
    pub inductance: f64,
    /// Current through the inductor when the simulation starts
    pub initial_current: f64,
}

impl Default for Inductor {
    fn default() -> Self {
        Self {
            inductance: 10e-3,
            initial_current: 0.0,
        }
    }
}

impl Inductor {
    pub fn new(inductance: f64) -> Self {
        Self {
            inductance,
            initial_current: 0.0,
        }
    }

    /// History at simulation start.
    pub fn initial_state(&self) -> InductorState {
        InductorState {
            prev_current: self.initial_current,
            prev_voltage: 0.0,
        }
    }
}

impl Stamp for Inductor {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let history = ctx.state.inductor().unwrap_or_else(|| self.initial_state());
        let companion = inductor_companion(self.inductance, ctx.dt, ctx.method, &history);
        ctx.stamp_companion(nodes[0], nodes[1], companion);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        let history = ctx.state.inductor().unwrap_or_else(|| self.initial_state());
        let companion = inductor_companion(self.inductance, ctx.dt, ctx.method, &history);
        companion.current(ctx.voltage_across(nodes[0], nodes[1]))
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.inductance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_thermistor_nominal_at_25c() {
        let t = Thermistor::default();
        assert_relative_eq!(t.resistance(), 10_000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_thermistor_is_ntc() {
        let warm = Thermistor {
            temperature: 50.0,
            ..Thermistor::default()
        };
        let cold = Thermistor {
            temperature: 0.0,
            ..Thermistor::default()
        };
        assert!(warm.resistance() < 10_000.0);
        assert!(cold.resistance() > 10_000.0);
    }

    #[test]
    fn test_photoresistor_light_response() {
        let mut p = Photoresistor::default();
        p.light_level = 0.0;
        assert_relative_eq!(p.resistance(), 1_000_000.0);
        p.light_level = 1.0;
        assert_relative_eq!(p.resistance(), 1_000.0);
        p.light_level = 0.5;
        assert_relative_eq!(p.resistance(), 500_500.0);
    }

    #[test]
    fn test_bulb_brightness_saturates() {
        let b = Bulb::default();
        // 10 ohm at 0.1 A is 0.1 W of a 1 W rating
        assert_relative_eq!(b.brightness(0.1), 0.1, max_relative = 1e-12);
        assert_eq!(b.brightness(10.0), 1.0);
        assert_eq!(b.brightness(0.0), 0.0);
    }

    #[test]
    fn test_capacitor_initial_state() {
        let c = Capacitor {
            capacitance: 2e-6,
            initial_voltage: 3.0,
        };
        let s = c.initial_state();
        assert_eq!(s.prev_voltage, 3.0);
        assert_relative_eq!(s.prev_charge, 6e-6);
    }
}
