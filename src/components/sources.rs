//! Voltage sources and meters.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{Fingerprint, ReadContext, StampContext, MIN_RESISTANCE};

/// Stamp a source with electromotive force `emf` and internal resistance `r`.
///
/// An ideal source (r = 0) writes an auxiliary equation. A finite internal
/// resistance uses the Norton equivalent instead: conductance 1/r in parallel
/// with a constant current emf/r pushed into the positive terminal.
fn stamp_source(ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>], emf: f64, r: f64) {
    if r <= 0.0 {
        ctx.stamp_voltage_source(nodes[0], nodes[1], emf);
    } else {
        let r = r.max(MIN_RESISTANCE);
        ctx.stamp_resistor(nodes[0], nodes[1], r);
        ctx.stamp_current_source(nodes[1], nodes[0], emf / r);
    }
}

/// Current delivered out of the positive terminal.
fn source_current(ctx: &ReadContext<'_>, nodes: &[Option<NodeId>], emf: f64, r: f64) -> f64 {
    if r <= 0.0 {
        // Branch current flows from + to - through the source; delivered current is its negation.
        -ctx.branch_current()
    } else {
        (emf - ctx.voltage_across(nodes[0], nodes[1])) / r.max(MIN_RESISTANCE)
    }
}

/// A DC battery with optional internal resistance.
///
/// Terminal 0 is positive, terminal 1 negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    /// Electromotive force in volts
    pub voltage: f64,
    /// Internal resistance in ohms; 0 makes the source ideal
    pub internal_resistance: f64,
}

impl Default for Battery {
    fn default() -> Self {
        Self {
            voltage: 9.0,
            internal_resistance: 0.0,
        }
    }
}

impl Battery {
    pub fn new(voltage: f64, internal_resistance: f64) -> Self {
        Self {
            voltage,
            internal_resistance,
        }
    }

    /// An ideal source with no internal resistance.
    pub fn ideal(voltage: f64) -> Self {
        Self::new(voltage, 0.0)
    }

    /// Whether the battery needs an auxiliary equation.
    pub fn is_ideal(&self) -> bool {
        self.internal_resistance <= 0.0
    }
}

impl Stamp for Battery {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        stamp_source(ctx, nodes, self.voltage, self.internal_resistance);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        source_current(ctx, nodes, self.voltage, self.internal_resistance)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.internal_resistance);
    }
}

/// A fixed-frequency sinusoidal source:
///   v(t) = offset + amplitude * sin(2π f t + phase)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcSource {
    /// Peak amplitude in volts
    pub amplitude: f64,
    /// Frequency in hertz
    pub frequency: f64,
    /// Phase in radians
    pub phase: f64,
    /// DC offset in volts
    pub offset: f64,
    /// Internal resistance in ohms; 0 makes the source ideal
    pub internal_resistance: f64,
}

impl Default for AcSource {
    fn default() -> Self {
        Self {
            amplitude: 5.0,
            frequency: 50.0,
            phase: 0.0,
            offset: 0.0,
            internal_resistance: 0.0,
        }
    }
}

impl AcSource {
    /// Instantaneous electromotive force at `time` seconds.
    pub fn voltage_at(&self, time: f64) -> f64 {
        self.offset + self.amplitude * (TAU * self.frequency * time + self.phase).sin()
    }

    /// Whether the source needs an auxiliary equation.
    pub fn is_ideal(&self) -> bool {
        self.internal_resistance <= 0.0
    }
}

impl Stamp for AcSource {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let emf = self.voltage_at(ctx.time);
        stamp_source(ctx, nodes, emf, self.internal_resistance);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        source_current(ctx, nodes, self.voltage_at(ctx.time), self.internal_resistance)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.internal_resistance);
    }
}

/// An ammeter. Ideal (zero burden) meters add an auxiliary equation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ammeter {
    /// Burden resistance in ohms; 0 makes the meter ideal
    pub resistance: f64,
}

impl Ammeter {
    /// Whether the meter needs an auxiliary equation.
    pub fn is_ideal(&self) -> bool {
        self.resistance <= 0.0
    }
}

impl Stamp for Ammeter {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        if self.is_ideal() {
            ctx.stamp_voltage_source(nodes[0], nodes[1], 0.0);
        } else {
            ctx.stamp_resistor(nodes[0], nodes[1], self.resistance);
        }
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        if self.is_ideal() {
            ctx.branch_current()
        } else {
            ctx.voltage_across(nodes[0], nodes[1]) / self.resistance.max(MIN_RESISTANCE)
        }
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance);
    }
}

/// A voltmeter with a large but finite input resistance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voltmeter {
    /// Input resistance in ohms
    pub resistance: f64,
}

impl Default for Voltmeter {
    fn default() -> Self {
        Self { resistance: 10e6 }
    }
}

impl Voltmeter {
    /// Reading for a solved set of node voltages.
    pub fn reading(&self, voltages: &[f64], nodes: &[Option<NodeId>]) -> f64 {
        let v = |n: Option<NodeId>| n.and_then(|n| voltages.get(n.0).copied()).unwrap_or(0.0);
        v(nodes[0]) - v(nodes[1])
    }
}

impl Stamp for Voltmeter {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance);
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        ctx.voltage_across(nodes[0], nodes[1]) / self.resistance.max(MIN_RESISTANCE)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ac_source_waveform() {
        let s = AcSource {
            amplitude: 2.0,
            frequency: 1.0,
            phase: 0.0,
            offset: 1.0,
            internal_resistance: 0.0,
        };
        assert_abs_diff_eq!(s.voltage_at(0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.voltage_at(0.25), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.voltage_at(0.75), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_voltmeter_reading() {
        let m = Voltmeter::default();
        let reading = m.reading(&[0.0, 5.0, 2.0], &[Some(NodeId(1)), Some(NodeId(2))]);
        assert_abs_diff_eq!(reading, 3.0);
        let floating = m.reading(&[0.0, 5.0], &[Some(NodeId(1)), None]);
        assert_abs_diff_eq!(floating, 5.0);
    }
}
