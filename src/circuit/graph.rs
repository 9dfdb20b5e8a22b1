//! Editable circuit: components, wires and the derived node graph.

use std::collections::HashSet;

use super::compact::{compact_wires, CompactResult};
use super::document::{CircuitDocument, PlacedComponent};
use super::topology::{build_topology, TerminalLayout, Topology};
use super::types::{ComponentId, Point, Wire, WireId};
use super::validate::validate_document;
use crate::components::{Component, Device, Throw};
use crate::error::{BreadboardError, Result};

/// A circuit being edited and simulated.
///
/// Structural edits (adding, removing or moving components and wires)
/// rebuild the node graph immediately, unless made inside
/// [`begin_batch`](Circuit::begin_batch)/[`end_batch`](Circuit::end_batch),
/// in which case the graph is rebuilt once when the outermost batch ends.
/// Parameter edits never rebuild.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    /// All components, with node assignments from the last rebuild
    components: Vec<Component>,
    /// Terminal coordinates per component
    layout: TerminalLayout,
    wires: Vec<Wire>,
    topology: Topology,
    /// Bumped on every topology rebuild
    version: u64,
    /// Bumped on every edit, structural or not
    revision: u64,
    batch_depth: usize,
    dirty: bool,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a circuit from a validated document.
    pub fn from_document(doc: &CircuitDocument) -> Result<Self> {
        validate_document(doc)?;
        let mut circuit = Self::new();
        circuit.begin_batch();
        for placed in &doc.components {
            circuit.add_component(
                Component::new(placed.id, placed.device.clone()),
                placed.terminals.clone(),
            )?;
        }
        for wire in &doc.wires {
            circuit.add_wire(wire.clone())?;
        }
        circuit.end_batch();
        Ok(circuit)
    }

    /// Snapshot as a document.
    pub fn to_document(&self) -> CircuitDocument {
        CircuitDocument {
            components: self
                .components
                .iter()
                .map(|c| PlacedComponent {
                    id: c.id,
                    device: c.device.clone(),
                    terminals: self.layout.get(&c.id).cloned().unwrap_or_default(),
                })
                .collect(),
            wires: self.wires.clone(),
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Number of electrical nodes including ground.
    pub fn node_count(&self) -> usize {
        self.topology.node_count
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn terminal_positions(&self, id: ComponentId) -> Option<&[Point]> {
        self.layout.get(&id).map(Vec::as_slice)
    }

    /// Place a component with one coordinate per terminal.
    pub fn add_component(&mut self, component: Component, terminals: Vec<Point>) -> Result<()> {
        if self.component(component.id).is_some() {
            return Err(BreadboardError::DuplicateComponent { id: component.id });
        }
        check_terminals(&component.id, &component.device, &terminals)?;
        self.layout.insert(component.id, terminals);
        self.components.push(component);
        self.structural_edit();
        Ok(())
    }

    /// Remove a component and unbind wire endpoints that referenced it.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        let index = self.index_of(id)?;
        let removed = self.components.remove(index);
        self.layout.remove(&id);
        for w in &mut self.wires {
            if w.a_ref.is_some_and(|r| r.component == id) {
                w.a_ref = None;
            }
            if w.b_ref.is_some_and(|r| r.component == id) {
                w.b_ref = None;
            }
        }
        self.structural_edit();
        Ok(removed)
    }

    /// Move a component's terminals. Bound wire endpoints follow.
    pub fn move_component(&mut self, id: ComponentId, terminals: Vec<Point>) -> Result<()> {
        let index = self.index_of(id)?;
        check_terminals(&id, &self.components[index].device, &terminals)?;
        for w in &mut self.wires {
            if let Some(r) = w.a_ref.filter(|r| r.component == id) {
                if let Some(p) = terminals.get(r.terminal) {
                    w.a = *p;
                }
            }
            if let Some(r) = w.b_ref.filter(|r| r.component == id) {
                if let Some(p) = terminals.get(r.terminal) {
                    w.b = *p;
                }
            }
        }
        self.layout.insert(id, terminals);
        self.structural_edit();
        Ok(())
    }

    /// Mutable parameters of a component. Does not rebuild the node graph.
    pub fn device_mut(&mut self, id: ComponentId) -> Result<&mut Device> {
        let index = self.index_of(id)?;
        self.revision += 1;
        Ok(&mut self.components[index].device)
    }

    /// Open or close a switch, push button or changeover switch.
    pub fn set_switch(&mut self, id: ComponentId, closed: bool) -> Result<()> {
        match self.device_mut(id)? {
            Device::Switch(s) => s.closed = closed,
            Device::PushButton(b) => b.pressed = closed,
            Device::SpdtSwitch(s) => s.throw = if closed { Throw::B } else { Throw::A },
            other => {
                return Err(BreadboardError::invalid_parameter(
                    id,
                    "closed",
                    format!("{} is not a switch", other.kind()),
                ))
            }
        }
        Ok(())
    }

    pub fn add_wire(&mut self, wire: Wire) -> Result<()> {
        if self.wires.iter().any(|w| w.id == wire.id) {
            return Err(BreadboardError::DuplicateWire { id: wire.id });
        }
        self.wires.push(wire);
        self.structural_edit();
        Ok(())
    }

    pub fn remove_wire(&mut self, id: WireId) -> Result<Wire> {
        let index = self
            .wires
            .iter()
            .position(|w| w.id == id)
            .ok_or(BreadboardError::WireNotFound { id })?;
        let removed = self.wires.remove(index);
        self.structural_edit();
        Ok(removed)
    }

    /// Merge and drop redundant wires, limited to `scope` when given.
    pub fn compact_wires(&mut self, scope: Option<&HashSet<WireId>>) -> CompactResult {
        let result = compact_wires(&self.components, &mut self.wires, &self.layout, scope);
        if result.changed {
            self.structural_edit();
        }
        result
    }

    /// Defer rebuilds until the matching [`end_batch`](Circuit::end_batch).
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch; the outermost close rebuilds if anything changed.
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log::warn!("end_batch without matching begin_batch");
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 && self.dirty {
            self.rebuild();
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    fn index_of(&self, id: ComponentId) -> Result<usize> {
        self.components
            .iter()
            .position(|c| c.id == id)
            .ok_or(BreadboardError::ComponentNotFound { id })
    }

    fn structural_edit(&mut self) {
        self.revision += 1;
        if self.batch_depth > 0 {
            self.dirty = true;
        } else {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.topology = build_topology(&self.components, &self.wires, &self.layout);
        self.topology.apply(&mut self.components);
        self.version += 1;
        self.dirty = false;
    }
}

fn check_terminals(id: &ComponentId, device: &Device, terminals: &[Point]) -> Result<()> {
    let expected = device.terminal_count();
    if terminals.len() != expected {
        return Err(BreadboardError::MalformedComponent {
            id: *id,
            kind: device.kind(),
            expected,
            actual: terminals.len(),
        });
    }
    Ok(())
}
