//! Integration tests for topology extraction and transient simulation.

use std::collections::HashSet;

use approx::assert_relative_eq;
use breadboard_core::circuit::{CircuitDocument, ComponentId, Point, Wire, WireId};
use breadboard_core::components::{
    AcSource, Ammeter, Battery, Bulb, Capacitor, Component, Device, Diode, Inductor, Led, Motor,
    Relay, Resistor, Rheostat, SpdtSwitch, Switch, Throw, Voltmeter,
};
use breadboard_core::solver::IntegrationMethod;
use breadboard_core::{Circuit, Simulator, SolverConfig, THERMAL_VOLTAGE};

/// Helper: place parts so that terminals on the same net coincide.
///
/// Net `n` is drawn at `(n, 0)`, so no wires are needed.
struct Netlist(Circuit);

impl Netlist {
    fn new() -> Self {
        let mut circuit = Circuit::new();
        circuit.begin_batch();
        Self(circuit)
    }

    fn part(mut self, id: u32, device: Device, nets: &[i32]) -> Self {
        let terminals = nets.iter().map(|&n| Point::new(n as f64, 0.0)).collect();
        self.0
            .add_component(Component::new(ComponentId(id), device), terminals)
            .expect("add component failed");
        self
    }

    fn build(mut self) -> Circuit {
        self.0.end_batch();
        self.0
    }
}

fn id(n: u32) -> ComponentId {
    ComponentId(n)
}

/// Node voltage at terminal `t` of component `c`.
fn terminal_voltage(sim: &Simulator, c: u32, t: usize) -> f64 {
    let node = sim
        .circuit()
        .component(id(c))
        .and_then(|c| c.nodes[t])
        .map_or(0, |n| n.0);
    sim.node_voltage(node)
}

#[test]
fn test_ohms_law() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(9.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(450.0)), &[1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert!(result.meta.converged);
    assert!((result.current(id(2)) - 0.02).abs() < 1e-6);
    // Source current is reported as delivered out of the positive terminal
    assert!((result.current(id(1)) - 0.02).abs() < 1e-6);
    assert!((terminal_voltage(&sim, 2, 0) - 9.0).abs() < 1e-6);
}

#[test]
fn test_series_parallel_network() {
    // 12 V -> R1(100) -> (R2(200) || R3(200)) -> ground
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(12.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(100.0)), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(200.0)), &[2, 0])
        .part(4, Device::Resistor(Resistor::new(200.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert_relative_eq!(result.current(id(2)), 0.06, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(3)), 0.03, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(4)), 0.03, max_relative = 1e-6);
    assert_relative_eq!(terminal_voltage(&sim, 3, 0), 6.0, max_relative = 1e-6);
}

#[test]
fn test_meters() {
    // 10 V -> ammeter -> R1(1k) -> R2(1k) -> ground, voltmeter across R2
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(10.0)), &[1, 0])
        .part(2, Device::Ammeter(Ammeter::default()), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(1000.0)), &[2, 3])
        .part(4, Device::Resistor(Resistor::new(1000.0)), &[3, 0])
        .part(5, Device::Voltmeter(Voltmeter::default()), &[3, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert_relative_eq!(result.current(id(2)), 5e-3, max_relative = 1e-3);
    assert_relative_eq!(sim.voltmeter_reading(id(5)).unwrap(), 5.0, max_relative = 1e-3);
}

#[test]
fn test_internal_resistance() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::new(6.0, 1.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(5.0)), &[1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert_relative_eq!(result.current(id(2)), 1.0, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(1)), 1.0, max_relative = 1e-6);
    assert!(result.meta.short_circuits.is_empty());
}

#[test]
fn test_switch_open_and_closed() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Switch(Switch::new(false)), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(100.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();

    let open = sim.step();
    assert!(open.current(id(3)).abs() < 1e-9);

    sim.set_switch(id(2), true).unwrap();
    let closed = sim.step();
    assert_relative_eq!(closed.current(id(3)), 0.05, max_relative = 1e-6);

    sim.set_switch(id(2), false).unwrap();
    assert!(sim.step().current(id(3)).abs() < 1e-9);
}

#[test]
fn test_rc_charging() {
    // V(out) = V0 * (1 - exp(-t/RC)), RC = 1 ms
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(1000.0)), &[1, 2])
        .part(3, Device::Capacitor(Capacitor::new(1e-6)), &[2, 0])
        .build();
    let dt = 1e-4;
    let mut sim = Simulator::new(circuit, dt).unwrap();
    let rc = 1e-3;
    let v0 = 5.0;

    for _ in 0..200 {
        let result = sim.step();
        assert!(result.valid);
        let t = sim.time();
        let expected = v0 * (1.0 - (-t / rc).exp());
        let actual = sim.capacitor_voltage(id(3));
        // Allow 2% error for numerical integration
        assert!(
            (actual - expected).abs() < 0.02 * v0,
            "RC charging: at t={t:.2e}, expected={expected:.4}, actual={actual:.4}"
        );
    }

    // 20 time constants later the capacitor is fully charged
    assert!((sim.capacitor_voltage(id(3)) - v0).abs() < 1e-3);
    assert!(sim.current(id(3)).abs() < 1e-6);
}

#[test]
fn test_rl_backward_euler_recurrence() {
    let (v, r, l, dt) = (10.0, 10.0, 0.1, 1e-3);
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(v)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(r)), &[1, 2])
        .part(3, Device::Inductor(Inductor::new(l)), &[2, 0])
        .build();
    let config = SolverConfig::new().with_integration(IntegrationMethod::BackwardEuler);
    let mut sim = Simulator::with_config(circuit, dt, config).unwrap();

    let mut expected = 0.0;
    for _ in 0..100 {
        expected = (v + (l / dt) * expected) / (r + l / dt);
        let result = sim.step();
        assert_relative_eq!(result.current(id(3)), expected, max_relative = 1e-6);
    }
    // Heading to V/R
    assert!(expected > 0.6 && expected < 1.0);
}

/// Solve i = (V - Vd(i)) / R by fixed point on the Shockley curve through
/// `(vf, i_ref)`. `r` includes the junction's series resistance.
fn junction_operating_point(v: f64, r: f64, vf: f64, i_ref: f64, n_vt: f64) -> f64 {
    let is = i_ref / ((vf / n_vt).exp() - 1.0);
    let mut i = (v - vf) / r;
    for _ in 0..50 {
        let vd = n_vt * (i / is + 1.0).ln();
        i = (v - vd) / r;
    }
    i
}

#[test]
fn test_diode_forward_bias() {
    let diode = Diode {
        series_resistance: 10.0,
        ..Diode::default()
    };
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Diode(diode), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(1000.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let results = sim.run(5);

    let last = results.last().unwrap();
    assert!(last.valid);
    assert!(last.meta.converged);
    let expected = junction_operating_point(5.0, 1010.0, 0.7, 1e-3, THERMAL_VOLTAGE);
    assert_relative_eq!(last.current(id(3)), expected, max_relative = 1e-3);
    assert_relative_eq!(last.current(id(2)), expected, max_relative = 1e-3);
    assert!(sim.is_conducting(id(2)));
}

#[test]
fn test_diode_reverse_bias() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Diode(Diode::default()), &[2, 1])
        .part(3, Device::Resistor(Resistor::new(1000.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert!(result.current(id(3)).abs() < 1e-6);
    assert!(!sim.is_conducting(id(2)));
}

#[test]
fn test_degenerate_forward_voltage_still_solves() {
    let diode = Diode {
        forward_voltage: 0.0,
        ..Diode::default()
    };
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Diode(diode), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(1000.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert!(result.voltages.iter().all(|v| v.is_finite()));
    // A very leaky junction drops well under a tenth of a volt here
    let i = result.current(id(3));
    assert!(i > 4.9e-3 && i < 5e-3, "current {i}");
}

#[test]
fn test_led_lights_through_iteration() {
    let led = Led::default();
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Led(led.clone()), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(150.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert!(result.meta.converged);
    assert!(result.meta.iterations > 1);
    let expected = junction_operating_point(
        5.0,
        150.0 + led.series_resistance,
        led.forward_voltage,
        led.reference_current,
        led.ideality * THERMAL_VOLTAGE,
    );
    assert_relative_eq!(result.current(id(2)), expected, max_relative = 1e-3);
    assert!(sim.is_conducting(id(2)));
    assert_relative_eq!(
        sim.brightness(id(2)).unwrap(),
        expected / led.max_current,
        max_relative = 1e-3
    );
}

#[test]
fn test_ac_source_follows_simulated_time() {
    // 5 V peak at 50 Hz, sampled every millisecond
    let circuit = Netlist::new()
        .part(1, Device::AcSource(AcSource::default()), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(1000.0)), &[1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let results = sim.run(6);

    assert!(results.iter().all(|r| r.valid));
    assert!(results[0].current(id(2)).abs() < 1e-12);
    // Quarter period at t = 5 ms
    assert_relative_eq!(results[5].current(id(2)), 5e-3, max_relative = 1e-6);
    assert_relative_eq!(results[5].current(id(1)), 5e-3, max_relative = 1e-6);
    // The source voltage only moves the right-hand side
    let (_, misses) = sim.solver().cache().stats();
    assert_eq!(misses, 1);
}

#[test]
fn test_spdt_routes_through_selected_throw() {
    // Common on the supply, throw A into 100 ohms, throw B into 200 ohms
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(10.0)), &[1, 0])
        .part(2, Device::SpdtSwitch(SpdtSwitch { throw: Throw::B }), &[1, 2, 3])
        .part(3, Device::Resistor(Resistor::new(100.0)), &[2, 0])
        .part(4, Device::Resistor(Resistor::new(200.0)), &[3, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();

    let on_b = sim.step();
    assert!(on_b.valid);
    assert!(on_b.current(id(3)).abs() < 1e-9);
    assert_relative_eq!(on_b.current(id(4)), 0.05, max_relative = 1e-6);
    assert_relative_eq!(on_b.current(id(2)), 0.05, max_relative = 1e-3);

    sim.set_switch(id(2), false).unwrap();
    let on_a = sim.step();
    assert_relative_eq!(on_a.current(id(3)), 0.1, max_relative = 1e-6);
    assert!(on_a.current(id(4)).abs() < 1e-9);
    assert_relative_eq!(on_a.current(id(2)), 0.1, max_relative = 1e-3);
}

fn rheostat(resistance: f64, position: f64) -> Device {
    Device::Rheostat(Rheostat {
        resistance,
        position,
    })
}

#[test]
fn test_rheostat_as_divider() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(10.0)), &[1, 0])
        .part(2, rheostat(1000.0, 0.25), &[1, 2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert_relative_eq!(terminal_voltage(&sim, 2, 1), 7.5, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(2)), 0.01, max_relative = 1e-6);
}

#[test]
fn test_rheostat_with_ends_joined() {
    // Both ends on the supply, wiper to ground: the two halves in parallel
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(10.0)), &[1, 0])
        .part(2, rheostat(1000.0, 0.5), &[1, 0, 1])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert_relative_eq!(result.current(id(2)), 0.04, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(1)), 0.04, max_relative = 1e-6);
}

#[test]
fn test_rheostat_with_wiper_on_end() {
    // Wiper shorts out the A side, leaving only the wiper-to-B track
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(10.0)), &[1, 0])
        .part(2, rheostat(1000.0, 0.2), &[1, 1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert_relative_eq!(result.current(id(2)), 10.0 / 800.0, max_relative = 1e-6);
    assert_relative_eq!(result.current(id(1)), 10.0 / 800.0, max_relative = 1e-6);
}

#[test]
fn test_motor_spins_up() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(6.0)), &[1, 0])
        .part(2, Device::Motor(Motor::default()), &[1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();

    let first = sim.step();
    // Stalled rotor: only the armature resistance limits the current
    assert_relative_eq!(first.current(id(2)), 3.0, max_relative = 1e-6);
    assert_relative_eq!(sim.motor_speed(id(2)), 3.0, max_relative = 1e-6);

    let results = sim.run(100);
    let later = results.last().unwrap();
    assert!(later.current(id(2)) < first.current(id(2)));
    assert!(sim.motor_speed(id(2)) > 3.0);
}

#[test]
fn test_relay_switches_load() {
    // Coil across the battery, contact feeding a bulb
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Relay(Relay::default()), &[1, 0, 1, 2])
        .part(3, Device::Bulb(Bulb::default()), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(result.valid);
    assert!(sim.relay_energized(id(2)));
    assert_relative_eq!(result.current(id(3)), 0.5, max_relative = 1e-6);
    assert_relative_eq!(sim.brightness(id(3)).unwrap(), 1.0);
}

#[test]
fn test_fuse_blows_and_stays_open() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Fuse(Default::default()), &[1, 2])
        .part(3, Device::Resistor(Resistor::new(2.0)), &[2, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();

    let first = sim.step();
    assert!(first.current(id(3)) > 1.0);
    assert!(sim.fuse_blown(id(2)));

    let after = sim.step();
    assert!(after.current(id(3)).abs() < 1e-9);

    sim.reset();
    assert!(!sim.fuse_blown(id(2)));
}

#[test]
fn test_unconnected_terminal() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(100.0)), &[1, 0])
        .part(3, Device::Resistor(Resistor::new(100.0)), &[1, 7])
        .build();
    let dangling = circuit.component(id(3)).unwrap();
    assert!(dangling.nodes[0].is_some());
    assert!(dangling.nodes[1].is_none());

    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();
    assert!(result.valid);
    assert_eq!(result.current(id(3)), 0.0);
    assert_relative_eq!(result.current(id(2)), 0.05, max_relative = 1e-6);
}

#[test]
fn test_dead_end_branch_reads_zero() {
    // R3 hangs off node 1 through R4 into a node nothing else touches
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Resistor(Resistor::new(100.0)), &[1, 0])
        .part(3, Device::Resistor(Resistor::new(100.0)), &[1, 5])
        .part(4, Device::Resistor(Resistor::new(100.0)), &[5, 6])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert_eq!(result.current(id(3)), 0.0);
    assert_eq!(result.current(id(4)), 0.0);
    assert!(result.current(id(2)) > 0.0);
}

#[test]
fn test_parallel_ideal_sources_are_invalid() {
    let circuit = Netlist::new()
        .part(1, Device::Battery(Battery::ideal(5.0)), &[1, 0])
        .part(2, Device::Battery(Battery::ideal(3.0)), &[1, 0])
        .part(3, Device::Resistor(Resistor::new(100.0)), &[1, 0])
        .build();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    let result = sim.step();

    assert!(!result.valid);
    assert!(result.meta.invalid_reason.is_some());
}

#[test]
fn test_linear_solve_is_repeatable() {
    let build = || {
        Netlist::new()
            .part(1, Device::Battery(Battery::ideal(9.0)), &[1, 0])
            .part(2, Device::Resistor(Resistor::new(330.0)), &[1, 2])
            .part(3, Device::Resistor(Resistor::new(470.0)), &[2, 0])
            .build()
    };
    let mut a = Simulator::new(build(), 1e-3).unwrap();
    let mut b = Simulator::new(build(), 1e-3).unwrap();

    let first = a.step();
    let second = a.step();
    assert_eq!(first.voltages, second.voltages);
    assert_eq!(first.currents, second.currents);
    assert_eq!(first, b.step());

    // The second step reused the factorization
    let (hits, misses) = a.solver().cache().stats();
    assert_eq!(misses, 1);
    assert!(hits >= 1);
}

const WIRED_DOC: &str = r#"{
    "components": [
        { "id": 1, "device": { "type": "Battery", "voltage": 5.0 },
          "terminals": [ { "x": 0, "y": 0 }, { "x": 0, "y": 2 } ] },
        { "id": 2, "device": { "type": "Resistor", "resistance": 100.0 },
          "terminals": [ { "x": 4, "y": 0 }, { "x": 4, "y": 2 } ] }
    ],
    "wires": [
        { "id": 1, "a": { "x": 0, "y": 0 }, "b": { "x": 2, "y": 0 } },
        { "id": 2, "a": { "x": 2, "y": 0 }, "b": { "x": 4, "y": 0 } },
        { "id": 3, "a": { "x": 0, "y": 2 }, "b": { "x": 4, "y": 2 } }
    ]
}"#;

#[test]
fn test_document_driven_circuit() {
    let doc = CircuitDocument::from_json(WIRED_DOC).unwrap();
    let circuit = Circuit::from_document(&doc).unwrap();
    assert_eq!(circuit.node_count(), 2);

    let mut sim = Simulator::new(circuit, 1e-3).unwrap();
    assert_relative_eq!(sim.step().current(id(2)), 0.05, max_relative = 1e-6);
}

#[test]
fn test_compaction_preserves_connectivity() {
    let doc = CircuitDocument::from_json(WIRED_DOC).unwrap();
    let mut circuit = Circuit::from_document(&doc).unwrap();
    let before = circuit.component(id(2)).unwrap().nodes.clone();

    let result = circuit.compact_wires(None);
    assert!(result.changed);
    assert_eq!(result.removed_ids.len(), 1);
    assert_eq!(circuit.wires().len(), 2);
    let removed = result.removed_ids[0];
    let survivor = result.replacement_by_removed_id[&removed];
    assert!(circuit.wires().iter().any(|w| w.id == survivor));

    // Same electrical graph after the merge
    assert_eq!(circuit.node_count(), 2);
    assert_eq!(circuit.component(id(2)).unwrap().nodes, before);

    // Compaction is idempotent
    assert!(!circuit.compact_wires(None).changed);
}

#[test]
fn test_compaction_respects_scope() {
    let doc = CircuitDocument::from_json(WIRED_DOC).unwrap();
    let mut circuit = Circuit::from_document(&doc).unwrap();

    let scope: HashSet<WireId> = [WireId(1)].into_iter().collect();
    let result = circuit.compact_wires(Some(&scope));
    assert!(!result.changed);
    assert_eq!(circuit.wires().len(), 3);
}

#[test]
fn test_edit_between_steps() {
    let mut circuit = Circuit::new();
    circuit
        .add_component(
            Component::new(id(1), Device::Battery(Battery::ideal(5.0))),
            vec![Point::new(0.0, 0.0), Point::new(0.0, 2.0)],
        )
        .unwrap();
    circuit
        .add_component(
            Component::new(id(2), Device::Resistor(Resistor::new(50.0))),
            vec![Point::new(2.0, 0.0), Point::new(2.0, 2.0)],
        )
        .unwrap();
    let mut sim = Simulator::new(circuit, 1e-3).unwrap();

    // Nothing wired yet
    assert_eq!(sim.step().current(id(2)), 0.0);

    sim.circuit_mut()
        .add_wire(Wire::new(WireId(1), Point::new(0.0, 0.0), Point::new(2.0, 0.0)))
        .unwrap();
    sim.circuit_mut()
        .add_wire(Wire::new(WireId(2), Point::new(0.0, 2.0), Point::new(2.0, 2.0)))
        .unwrap();
    assert_relative_eq!(sim.step().current(id(2)), 0.1, max_relative = 1e-6);

    sim.circuit_mut().remove_wire(WireId(2)).unwrap();
    assert_eq!(sim.step().current(id(2)), 0.0);
}
