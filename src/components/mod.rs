//! Device models for circuit simulation.
//!
//! This module provides models for every device kind the editor can place:
//! - Passive: Resistor, Bulb, Thermistor, Photoresistor, Capacitor, Inductor
//! - Sources and meters: Battery, AC Source, Ammeter, Voltmeter
//! - Controls: Switch, Push Button, SPDT Switch, Rheostat, Fuse
//! - Semiconductors: Diode, LED
//! - Electromechanical: Motor, Relay
//!
//! Each device implements [`Stamp`]: its contribution to the MNA system and
//! the readback of its branch current after a solve. [`Device::handler`] is
//! the single dispatch table the solver goes through.

mod controls;
mod diode;
mod linear;
mod motor;
mod relay;
mod sources;

pub use controls::{Fuse, PushButton, Rheostat, SpdtSwitch, Switch, Throw};
pub use diode::{Diode, JunctionModel, Led};
pub use linear::{Bulb, Capacitor, Inductor, Photoresistor, Resistor, Thermistor};
pub use motor::Motor;
pub use relay::Relay;
pub use sources::{AcSource, Ammeter, Battery, Voltmeter};

use serde::{Deserialize, Serialize};

use crate::circuit::{ComponentId, NodeId};
use crate::solver::{DeviceState, Fingerprint, ReadContext, StampContext};

/// Matrix contribution and current readback of one device kind.
pub trait Stamp {
    /// Add this device's contribution for one solve iteration.
    fn stamp(&self, ctx: &mut StampContext<'_>, nodes: &[Option<NodeId>]);

    /// Current through the device after a solve.
    fn current(&self, ctx: &ReadContext<'_>, nodes: &[Option<NodeId>]) -> f64;

    /// Feed every parameter that shapes the matrix into the fingerprint.
    fn fingerprint(&self, fp: &mut Fingerprint);
}

/// Earth reference. Its terminal defines node 0; it stamps nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ground;

impl Stamp for Ground {
    fn stamp(&self, _ctx: &mut StampContext<'_>, _nodes: &[Option<NodeId>]) {}

    fn current(&self, _ctx: &ReadContext<'_>, _nodes: &[Option<NodeId>]) -> f64 {
        0.0
    }

    fn fingerprint(&self, _fp: &mut Fingerprint) {}
}

/// The closed set of device kinds with their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Device {
    Ground,
    Resistor(Resistor),
    Bulb(Bulb),
    Thermistor(Thermistor),
    Photoresistor(Photoresistor),
    Switch(Switch),
    PushButton(PushButton),
    SpdtSwitch(SpdtSwitch),
    Rheostat(Rheostat),
    Fuse(Fuse),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Battery(Battery),
    AcSource(AcSource),
    Ammeter(Ammeter),
    Voltmeter(Voltmeter),
    Diode(Diode),
    Led(Led),
    Motor(Motor),
    Relay(Relay),
}

impl Device {
    /// The stamp/current handler for this device.
    pub fn handler(&self) -> &dyn Stamp {
        match self {
            Device::Ground => &Ground,
            Device::Resistor(d) => d,
            Device::Bulb(d) => d,
            Device::Thermistor(d) => d,
            Device::Photoresistor(d) => d,
            Device::Switch(d) => d,
            Device::PushButton(d) => d,
            Device::SpdtSwitch(d) => d,
            Device::Rheostat(d) => d,
            Device::Fuse(d) => d,
            Device::Capacitor(d) => d,
            Device::Inductor(d) => d,
            Device::Battery(d) => d,
            Device::AcSource(d) => d,
            Device::Ammeter(d) => d,
            Device::Voltmeter(d) => d,
            Device::Diode(d) => d,
            Device::Led(d) => d,
            Device::Motor(d) => d,
            Device::Relay(d) => d,
        }
    }

    /// Device kind name as it appears in circuit documents.
    pub fn kind(&self) -> &'static str {
        match self {
            Device::Ground => "Ground",
            Device::Resistor(_) => "Resistor",
            Device::Bulb(_) => "Bulb",
            Device::Thermistor(_) => "Thermistor",
            Device::Photoresistor(_) => "Photoresistor",
            Device::Switch(_) => "Switch",
            Device::PushButton(_) => "PushButton",
            Device::SpdtSwitch(_) => "SpdtSwitch",
            Device::Rheostat(_) => "Rheostat",
            Device::Fuse(_) => "Fuse",
            Device::Capacitor(_) => "Capacitor",
            Device::Inductor(_) => "Inductor",
            Device::Battery(_) => "Battery",
            Device::AcSource(_) => "AcSource",
            Device::Ammeter(_) => "Ammeter",
            Device::Voltmeter(_) => "Voltmeter",
            Device::Diode(_) => "Diode",
            Device::Led(_) => "Led",
            Device::Motor(_) => "Motor",
            Device::Relay(_) => "Relay",
        }
    }

    /// Number of terminals for this kind.
    pub fn terminal_count(&self) -> usize {
        match self {
            Device::Ground => 1,
            Device::SpdtSwitch(_) | Device::Rheostat(_) => 3,
            Device::Relay(_) => 4,
            _ => 2,
        }
    }

    /// Whether the device needs its own auxiliary MNA equation.
    pub fn needs_aux(&self) -> bool {
        match self {
            Device::Battery(b) => b.is_ideal(),
            Device::AcSource(s) => s.is_ideal(),
            Device::Ammeter(a) => a.is_ideal(),
            Device::Motor(_) => true,
            _ => false,
        }
    }

    /// Whether the device is stamped as a conductance plus constant current
    /// instead of an ideal source.
    pub fn is_norton(&self) -> bool {
        match self {
            Device::Battery(b) => !b.is_ideal(),
            Device::AcSource(s) => !s.is_ideal(),
            _ => false,
        }
    }

    /// Electromotive force and internal resistance of a finite-resistance
    /// source at `time`.
    pub fn norton_source(&self, time: f64) -> Option<(f64, f64)> {
        match self {
            Device::Battery(b) if !b.is_ideal() => Some((b.voltage, b.internal_resistance)),
            Device::AcSource(s) if !s.is_ideal() => Some((s.voltage_at(time), s.internal_resistance)),
            _ => None,
        }
    }

    /// Whether the device is a voltage source for ground selection.
    pub fn is_voltage_source(&self) -> bool {
        matches!(self, Device::Battery(_) | Device::AcSource(_))
    }

    /// Whether solving requires fixed-point iteration on device state.
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Device::Diode(_) | Device::Led(_) | Device::Relay(_))
    }

    /// Whether the device switches abruptly between extreme resistances.
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Device::Switch(_) | Device::PushButton(_) | Device::SpdtSwitch(_) | Device::Relay(_)
        )
    }

    /// Terminal pairs the device conducts between.
    pub fn conduction_pairs(&self) -> &'static [(usize, usize)] {
        match self {
            Device::Ground => &[],
            Device::SpdtSwitch(_) => &[(0, 1), (0, 2)],
            Device::Rheostat(_) => &[(0, 1), (1, 2), (0, 2)],
            Device::Relay(_) => &[(0, 1), (2, 3)],
            _ => &[(0, 1)],
        }
    }

    /// Whether enough terminals are wired for the device to carry current.
    pub fn is_wired(&self, nodes: &[Option<NodeId>]) -> bool {
        match self {
            Device::Ground => nodes.first().is_some_and(|n| n.is_some()),
            _ => self
                .conduction_pairs()
                .iter()
                .any(|&(a, b)| wired(nodes, a) && wired(nodes, b)),
        }
    }

    /// Whether every wired terminal collapses onto a single node.
    pub fn is_shorted(&self, nodes: &[Option<NodeId>]) -> bool {
        if matches!(self, Device::Ground) {
            return false;
        }
        let mut wired_nodes = nodes.iter().flatten();
        match wired_nodes.next() {
            Some(first) => nodes.iter().flatten().count() >= 2 && wired_nodes.all(|n| n == first),
            None => false,
        }
    }

    /// State a freshly started simulation gives this device.
    pub fn initial_state(&self) -> DeviceState {
        match self {
            Device::Capacitor(c) => DeviceState::Capacitor(c.initial_state()),
            Device::Inductor(l) => DeviceState::Inductor(l.initial_state()),
            Device::Motor(_) => DeviceState::Motor(Default::default()),
            Device::Diode(_) | Device::Led(_) => DeviceState::Junction(Default::default()),
            Device::Relay(_) => DeviceState::Relay(Default::default()),
            Device::Fuse(_) => DeviceState::Fuse(Default::default()),
            _ => DeviceState::Stateless,
        }
    }

    /// Check parameters that cannot be clamped into a meaningful value.
    pub fn check_parameters(&self) -> std::result::Result<(), (&'static str, String)> {
        let unit = |name: &'static str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err((name, format!("must be within 0..=1, got {v}")))
            }
        };
        match self {
            Device::Rheostat(r) => unit("position", r.position),
            Device::Photoresistor(p) => unit("light_level", p.light_level),
            Device::Relay(r) if r.drop_out_current > r.pull_in_current => Err((
                "drop_out_current",
                format!(
                    "must not exceed pull_in_current ({} > {})",
                    r.drop_out_current, r.pull_in_current
                ),
            )),
            _ => Ok(()),
        }
    }
}

fn wired(nodes: &[Option<NodeId>], terminal: usize) -> bool {
    nodes.get(terminal).is_some_and(|n| n.is_some())
}

/// A placed device with its terminal-to-node assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub device: Device,
    /// Node per terminal; `None` when the terminal is not wired.
    #[serde(default)]
    pub nodes: Vec<Option<NodeId>>,
}

impl Component {
    /// Create a component with all terminals unwired.
    pub fn new(id: ComponentId, device: Device) -> Self {
        let nodes = vec![None; device.terminal_count()];
        Self { id, device, nodes }
    }

    /// Assign nodes to the terminals.
    pub fn with_nodes(mut self, nodes: Vec<Option<NodeId>>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Convenience for tests and programmatic circuits: every terminal wired.
    pub fn wired(id: ComponentId, device: Device, nodes: &[usize]) -> Self {
        Self {
            id,
            device,
            nodes: nodes.iter().map(|&n| Some(NodeId(n))).collect(),
        }
    }

    /// Whether the node array matches the device's terminal count.
    pub fn is_well_formed(&self) -> bool {
        self.nodes.len() == self.device.terminal_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_counts() {
        assert_eq!(Device::Ground.terminal_count(), 1);
        assert_eq!(Device::Resistor(Resistor::new(10.0)).terminal_count(), 2);
        assert_eq!(Device::Rheostat(Rheostat::default()).terminal_count(), 3);
        assert_eq!(Device::Relay(Relay::default()).terminal_count(), 4);
    }

    #[test]
    fn test_aux_allocation_rules() {
        assert!(Device::Battery(Battery::ideal(9.0)).needs_aux());
        assert!(!Device::Battery(Battery::new(9.0, 0.5)).needs_aux());
        assert!(Device::Battery(Battery::new(9.0, 0.5)).is_norton());
        assert!(Device::Ammeter(Ammeter::default()).needs_aux());
        assert!(Device::Motor(Motor::default()).needs_aux());
        assert!(!Device::Resistor(Resistor::new(1.0)).needs_aux());
    }

    #[test]
    fn test_wired_and_shorted() {
        let r = Device::Resistor(Resistor::new(1.0));
        assert!(r.is_wired(&[Some(NodeId(1)), Some(NodeId(0))]));
        assert!(!r.is_wired(&[Some(NodeId(1)), None]));
        assert!(r.is_shorted(&[Some(NodeId(2)), Some(NodeId(2))]));
        assert!(!r.is_shorted(&[Some(NodeId(2)), None]));

        let rheo = Device::Rheostat(Rheostat::default());
        assert!(rheo.is_wired(&[Some(NodeId(1)), None, Some(NodeId(2))]));
        assert!(!rheo.is_wired(&[Some(NodeId(1)), None, None]));
    }

    #[test]
    fn test_device_json_shape() {
        let c = Component::wired(
            ComponentId(7),
            Device::Resistor(Resistor::new(220.0)),
            &[1, 0],
        );
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"Resistor\""));
        let back: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);

        let ground: Device = serde_json::from_str(r#"{"type":"Ground"}"#).unwrap();
        assert_eq!(ground, Device::Ground);
    }

    #[test]
    fn test_parameter_checks() {
        let mut rheo = Rheostat::default();
        rheo.position = 1.5;
        assert!(Device::Rheostat(rheo).check_parameters().is_err());
        assert!(Device::Resistor(Resistor::new(-5.0)).check_parameters().is_ok());
    }
}
