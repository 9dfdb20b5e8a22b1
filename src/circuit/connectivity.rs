//! Closed-path detection for readouts.
//!
//! A component only carries current when one of its conduction pairs is
//! wired and the two nodes are joined by the rest of the circuit. Readouts
//! of components without such a path are forced to zero.

use std::collections::HashMap;

use super::topology::UnionFind;
use super::types::ComponentId;
use crate::components::{Component, Device};

/// Per-topology-version memo of which components sit on a closed path.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityCache {
    version: Option<u64>,
    connected: HashMap<ComponentId, bool>,
}

impl ConnectivityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute unless `version` is the one already cached.
    pub fn refresh(&mut self, version: u64, components: &[Component], node_count: usize) {
        if self.version == Some(version) {
            return;
        }
        self.connected = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, closes_path(i, components, node_count)))
            .collect();
        self.version = Some(version);
        log::debug!(
            "connectivity v{version}: {} of {} components on a closed path",
            self.connected.values().filter(|&&c| c).count(),
            components.len()
        );
    }

    /// Whether `id` was on a closed path at the cached version.
    pub fn is_connected(&self, id: ComponentId) -> bool {
        self.connected.get(&id).copied().unwrap_or(false)
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn invalidate(&mut self) {
        self.version = None;
        self.connected.clear();
    }
}

fn closes_path(index: usize, components: &[Component], node_count: usize) -> bool {
    let component = &components[index];
    if matches!(component.device, Device::Ground) {
        return component.device.is_wired(&component.nodes);
    }

    let pairs: Vec<(usize, usize)> = component
        .device
        .conduction_pairs()
        .iter()
        .filter_map(|&(a, b)| {
            let na = component.nodes.get(a).copied().flatten()?;
            let nb = component.nodes.get(b).copied().flatten()?;
            (na != nb && na.0 < node_count && nb.0 < node_count).then_some((na.0, nb.0))
        })
        .collect();
    if pairs.is_empty() {
        return false;
    }

    // Join nodes through every other component
    let mut uf = UnionFind::new(node_count);
    for (j, other) in components.iter().enumerate() {
        if j == index {
            continue;
        }
        for &(a, b) in other.device.conduction_pairs() {
            let (Some(Some(na)), Some(Some(nb))) = (other.nodes.get(a), other.nodes.get(b)) else {
                continue;
            };
            if na.0 < node_count && nb.0 < node_count {
                uf.union(na.0, nb.0);
            }
        }
    }

    pairs.into_iter().any(|(a, b)| uf.find(a) == uf.find(b))
}
