//! Control devices: switches, rheostat and fuse.
//!
//! Switching devices never stamp a literal short or a literal open. They
//! alternate between [`CLOSED_RESISTANCE`] and [`OPEN_RESISTANCE`] so the
//! matrix stays non-singular in both states.

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{
    Fingerprint, ReadContext, StampContext, CLOSED_RESISTANCE, MIN_RESISTANCE, OPEN_RESISTANCE,
};

fn contact_resistance(closed: bool) -> f64 {
    if closed {
        CLOSED_RESISTANCE
    } else {
        OPEN_RESISTANCE
    }
}

/// A single-pole single-throw switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Switch {
    pub closed: bool,
}

impl Switch {
    pub fn new(closed: bool) -> Self {
        Self { closed }
    }

    /// Get the current resistance.
    pub fn resistance(&self) -> f64 {
        contact_resistance(self.closed)
    }

    /// Toggle the switch state.
    pub fn toggle(&mut self) {
        self.closed = !self.closed;
    }
}

impl Stamp for Switch {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance());
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        ctx.voltage_across(nodes[0], nodes[1]) / self.resistance()
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_bool(self.closed);
    }
}

/// A momentary push button, closed only while pressed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushButton {
    pub pressed: bool,
}

impl PushButton {
    /// Get the current resistance.
    pub fn resistance(&self) -> f64 {
        contact_resistance(self.pressed)
    }
}

impl Stamp for PushButton {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance());
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        ctx.voltage_across(nodes[0], nodes[1]) / self.resistance()
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_bool(self.pressed);
    }
}

/// Selected throw of a changeover switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Throw {
    #[default]
    A,
    B,
}

/// A single-pole double-throw switch.
///
/// Terminals: `[common, throw A, throw B]`. The selected throw is connected
/// to common through the closed resistance, the other through the open one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpdtSwitch {
    pub throw: Throw,
}

impl SpdtSwitch {
    /// Resistances common→A and common→B.
    pub fn resistances(&self) -> (f64, f64) {
        match self.throw {
            Throw::A => (CLOSED_RESISTANCE, OPEN_RESISTANCE),
            Throw::B => (OPEN_RESISTANCE, CLOSED_RESISTANCE),
        }
    }

    /// Flip to the other throw.
    pub fn toggle(&mut self) {
        self.throw = match self.throw {
            Throw::A => Throw::B,
            Throw::B => Throw::A,
        };
    }
}

impl Stamp for SpdtSwitch {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let (r_a, r_b) = self.resistances();
        if nodes[0].is_none() {
            return;
        }
        if nodes[1].is_some() {
            ctx.stamp_resistor(nodes[0], nodes[1], r_a);
        }
        if nodes[2].is_some() {
            ctx.stamp_resistor(nodes[0], nodes[2], r_b);
        }
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        let (r_a, r_b) = self.resistances();
        let (throw_node, r) = match self.throw {
            Throw::A => (nodes[1], r_a),
            Throw::B => (nodes[2], r_b),
        };
        if nodes[0].is_none() || throw_node.is_none() {
            return 0.0;
        }
        ctx.voltage_across(nodes[0], throw_node) / r
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_bool(self.throw == Throw::B);
    }
}

/// A three-terminal rheostat (variable resistor with wiper).
///
/// Terminals: `[end A, wiper, end B]`:
///   A ----[p·R]---- wiper ----[(1-p)·R]---- B
///
/// Works as a potentiometer with all three wired, or as a two-terminal
/// variable resistor with any two wired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rheostat {
    /// Total track resistance in ohms
    pub resistance: f64,
    /// Wiper position from 0.0 (at A) to 1.0 (at B)
    pub position: f64,
}

impl Default for Rheostat {
    fn default() -> Self {
        Self {
            resistance: 10_000.0,
            position: 0.5,
        }
    }
}

impl Rheostat {
    /// Resistance from end A to the wiper.
    pub fn r_aw(&self) -> f64 {
        (self.position.clamp(0.0, 1.0) * self.resistance).max(MIN_RESISTANCE)
    }

    /// Resistance from the wiper to end B.
    pub fn r_wb(&self) -> f64 {
        ((1.0 - self.position.clamp(0.0, 1.0)) * self.resistance).max(MIN_RESISTANCE)
    }

    /// Resistance of the whole track.
    pub fn r_ab(&self) -> f64 {
        self.resistance.max(MIN_RESISTANCE)
    }

    /// Resistive segments stamped for the given wiring, as `(from, to, ohms)`.
    ///
    /// Terminals sharing a node short out the segment between them, so that
    /// segment is dropped.
    fn segments(&self, nodes: &[Option<NodeId>]) -> Vec<(usize, usize, f64)> {
        let wired = [nodes[0].is_some(), nodes[1].is_some(), nodes[2].is_some()];
        let candidates = match wired {
            [true, true, true] => vec![(0, 1, self.r_aw()), (1, 2, self.r_wb())],
            [true, true, false] => vec![(0, 1, self.r_aw())],
            [false, true, true] => vec![(1, 2, self.r_wb())],
            [true, false, true] => vec![(0, 2, self.r_ab())],
            _ => Vec::new(),
        };
        candidates
            .into_iter()
            .filter(|&(a, b, _)| nodes[a] != nodes[b])
            .collect()
    }
}

impl Stamp for Rheostat {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        for (a, b, r) in self.segments(nodes) {
            ctx.stamp_resistor(nodes[a], nodes[b], r);
        }
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        // Current entering the node of the lowest-numbered wired terminal,
        // so coincident terminals contribute their segments too.
        let Some(entry) = nodes.iter().take(3).copied().find(Option::is_some) else {
            return 0.0;
        };
        self.segments(nodes)
            .into_iter()
            .map(|(a, b, r)| {
                let i = ctx.voltage_across(nodes[a], nodes[b]) / r;
                if nodes[a] == entry {
                    i
                } else if nodes[b] == entry {
                    -i
                } else {
                    0.0
                }
            })
            .sum()
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.r_aw());
        fp.write_f64(self.r_wb());
        fp.write_f64(self.r_ab());
    }
}

/// A fuse that opens permanently once its rated current is exceeded.
///
/// Whether it has blown is simulation state, not a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fuse {
    /// Current above which the fuse blows, in amperes
    pub rated_current: f64,
    /// Resistance while intact, in ohms
    pub resistance: f64,
}

impl Default for Fuse {
    fn default() -> Self {
        Self {
            rated_current: 1.0,
            resistance: 0.01,
        }
    }
}

impl Fuse {
    /// Resistance for the given blown state.
    pub fn resistance_for(&self, blown: bool) -> f64 {
        if blown {
            OPEN_RESISTANCE
        } else {
            self.resistance.max(MIN_RESISTANCE)
        }
    }

    /// Whether `current` blows the fuse.
    pub fn blows_at(&self, current: f64) -> bool {
        current.abs() > self.rated_current
    }
}

impl Stamp for Fuse {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let blown = ctx.state.fuse().is_some_and(|f| f.blown);
        ctx.stamp_resistor(nodes[0], nodes[1], self.resistance_for(blown));
    }

    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        let blown = ctx.state.fuse().is_some_and(|f| f.blown);
        ctx.voltage_across(nodes[0], nodes[1]) / self.resistance_for(blown)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.resistance);
    }
}
