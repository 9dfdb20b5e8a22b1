//! Core types for circuit representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unique identifier for an electrical node.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }

    /// Row of this node's voltage in the MNA matrix, `None` for ground.
    pub fn matrix_row(&self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0 - 1)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// A stable identifier for a component, assigned by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A stable identifier for a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub u32);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Coordinates are compared on a fixed grid of this many steps per unit.
pub const COORDINATE_QUANTUM: f64 = 1000.0;

/// A point on the editor canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Quantized integer key; two points touch iff their keys are equal.
    pub fn key(&self) -> GridKey {
        GridKey(
            (self.x * COORDINATE_QUANTUM).round() as i64,
            (self.y * COORDINATE_QUANTUM).round() as i64,
        )
    }

    /// Check whether two points land on the same grid cell.
    pub fn coincides(&self, other: &Point) -> bool {
        self.key() == other.key()
    }
}

/// Quantized coordinate used for exact-coincidence tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridKey(pub i64, pub i64);

/// Reference to one terminal of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalRef {
    pub component: ComponentId,
    pub terminal: usize,
}

impl TerminalRef {
    pub fn new(component: ComponentId, terminal: usize) -> Self {
        Self { component, terminal }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.terminal)
    }
}

/// An ideal (zero-resistance) conductor between two canvas points.
///
/// The optional terminal references pin an endpoint to a component terminal
/// so that geometry and topology stay consistent after edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    pub a: Point,
    pub b: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_ref: Option<TerminalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_ref: Option<TerminalRef>,
}

impl Wire {
    /// Create an unbound wire between two points.
    pub fn new(id: WireId, a: Point, b: Point) -> Self {
        Self {
            id,
            a,
            b,
            a_ref: None,
            b_ref: None,
        }
    }

    /// Bind the endpoints to component terminals.
    pub fn with_refs(mut self, a_ref: Option<TerminalRef>, b_ref: Option<TerminalRef>) -> Self {
        self.a_ref = a_ref;
        self.b_ref = b_ref;
        self
    }

    /// Endpoint by index (0 = `a`, 1 = `b`).
    pub fn endpoint(&self, end: usize) -> Point {
        if end == 0 {
            self.a
        } else {
            self.b
        }
    }

    /// Terminal reference of an endpoint by index.
    pub fn endpoint_ref(&self, end: usize) -> Option<TerminalRef> {
        if end == 0 {
            self.a_ref
        } else {
            self.b_ref
        }
    }

    /// Check whether both endpoints land on the same grid cell.
    pub fn is_zero_length(&self) -> bool {
        self.a.coincides(&self.b)
    }
}
