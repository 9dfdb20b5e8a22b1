//! Circuit representation and topology.
//!
//! This module turns what the editor draws (components with terminal
//! coordinates, and wires between points) into the electrical node graph the
//! solver works on:
//!
//! - [`build_topology`] - union-find over terminals and wire endpoints
//! - [`compact_wires`] - merges wire segments that meet at free junctions
//! - [`ConnectivityCache`] - which components sit on a closed path
//! - [`Circuit`] - the editable document with batched rebuilds

mod compact;
mod connectivity;
mod document;
mod graph;
mod topology;
mod types;
mod validate;

pub use compact::{compact_wires, CompactResult};
pub use connectivity::ConnectivityCache;
pub use document::{CircuitDocument, PlacedComponent};
pub use graph::Circuit;
pub use topology::{build_topology, TerminalLayout, TerminalResolver, Topology};
pub use types::*;
pub use validate::validate_document;
