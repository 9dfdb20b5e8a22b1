//! Electromechanical relay.
//!
//! The coil is a plain resistor. The contact is a switch whose position
//! follows the coil current with hysteresis: it pulls in at
//! `pull_in_current` and releases only once the current falls below
//! `drop_out_current`.

use serde::{Deserialize, Serialize};

use super::Stamp;
use crate::circuit::NodeId;
use crate::solver::{
    Fingerprint, ReadContext, StampContext, CLOSED_RESISTANCE, MIN_RESISTANCE, OPEN_RESISTANCE,
};

/// A relay. Terminals: `[coil+, coil-, contact A, contact B]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relay {
    /// Coil resistance in ohms
    pub coil_resistance: f64,
    /// Coil current that energizes the relay, in amperes
    pub pull_in_current: f64,
    /// Coil current below which an energized relay releases, in amperes
    pub drop_out_current: f64,
    /// Contact closed while de-energized
    pub normally_closed: bool,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            coil_resistance: 100.0,
            pull_in_current: 30e-3,
            drop_out_current: 15e-3,
            normally_closed: false,
        }
    }
}

impl Relay {
    /// Whether the contact conducts for the given coil state.
    pub fn contact_closed(&self, energized: bool) -> bool {
        energized != self.normally_closed
    }

    /// Contact resistance for the given coil state.
    pub fn contact_resistance(&self, energized: bool) -> f64 {
        if self.contact_closed(energized) {
            CLOSED_RESISTANCE
        } else {
            OPEN_RESISTANCE
        }
    }

    /// Coil state after observing `coil_current`.
    pub fn next_energized(&self, energized: bool, coil_current: f64) -> bool {
        let i = coil_current.abs();
        if energized {
            i >= self.drop_out_current
        } else {
            i >= self.pull_in_current
        }
    }
}

impl Stamp for Relay {
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]) {
        let energized = ctx.state.relay().is_some_and(|r| r.energized);
        ctx.stamp_resistor(nodes[0], nodes[1], self.coil_resistance);
        ctx.stamp_resistor(nodes[2], nodes[3], self.contact_resistance(energized));
    }

    /// Coil current.
    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64 {
        if nodes[0].is_none() || nodes[1].is_none() {
            return 0.0;
        }
        ctx.voltage_across(nodes[0], nodes[1]) / self.coil_resistance.max(MIN_RESISTANCE)
    }

    fn fingerprint(&self, fp: &mut Fingerprint) {
        fp.write_f64(self.coil_resistance.max(MIN_RESISTANCE));
        fp.write_bool(self.normally_closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hysteresis() {
        let r = Relay::default();
        assert!(!r.next_energized(false, 20e-3));
        assert!(r.next_energized(false, 30e-3));
        // Between drop-out and pull-in the state holds
        assert!(r.next_energized(true, 20e-3));
        assert!(!r.next_energized(true, 10e-3));
        assert!(r.next_energized(false, -40e-3));
    }

    #[test]
    fn test_contact_polarity() {
        let no = Relay::default();
        assert_eq!(no.contact_resistance(false), OPEN_RESISTANCE);
        assert_eq!(no.contact_resistance(true), CLOSED_RESISTANCE);

        let nc = Relay {
            normally_closed: true,
            ..Relay::default()
        };
        assert_eq!(nc.contact_resistance(false), CLOSED_RESISTANCE);
        assert_eq!(nc.contact_resistance(true), OPEN_RESISTANCE);
    }
}
