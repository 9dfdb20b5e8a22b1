//! Electrical node extraction.
//!
//! Every component terminal and every wire endpoint is a "post". Posts are
//! joined with a union-find when they belong to the same wire, share a grid
//! coordinate, or when a wire endpoint is bound to a terminal. Each resulting
//! set that contains a connected terminal becomes one electrical node.

use std::collections::HashMap;

use super::types::{ComponentId, GridKey, NodeId, Point, TerminalRef, Wire, WireId};
use crate::components::{Component, Device};

/// Source of terminal coordinates for placed components.
pub trait TerminalResolver {
    /// Canvas position of `terminal` of `component`, if it is placed.
    fn terminal_position(&self, component: &Component, terminal: usize) -> Option<Point>;
}

/// Terminal coordinates keyed by component.
pub type TerminalLayout = HashMap<ComponentId, Vec<Point>>;

impl TerminalResolver for TerminalLayout {
    fn terminal_position(&self, component: &Component, terminal: usize) -> Option<Point> {
        self.get(&component.id).and_then(|t| t.get(terminal)).copied()
    }
}

impl<F> TerminalResolver for F
where
    F: Fn(&Component, usize) -> Option<Point>,
{
    fn terminal_position(&self, component: &Component, terminal: usize) -> Option<Point> {
        self(component, terminal)
    }
}

/// Disjoint sets over dense post indices.
#[derive(Debug, Clone)]
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // Path halving
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Post {
    Terminal { component: usize, terminal: usize },
    WireEnd,
}

/// Node assignment derived from components and wires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    /// Number of electrical nodes including ground
    pub node_count: usize,
    /// Node per terminal, `None` when the terminal is not connected
    pub component_nodes: HashMap<ComponentId, Vec<Option<NodeId>>>,
    /// Node each wire belongs to, `None` when it touches no connected terminal
    pub wire_nodes: HashMap<WireId, Option<NodeId>>,
    /// Number of wire endpoints and other terminals touching each terminal
    pub terminal_degree: HashMap<TerminalRef, usize>,
    /// Terminal chosen as the reference node
    pub ground: Option<TerminalRef>,
}

impl Topology {
    /// Node of a terminal.
    pub fn node(&self, terminal: TerminalRef) -> Option<NodeId> {
        self.component_nodes
            .get(&terminal.component)
            .and_then(|nodes| nodes.get(terminal.terminal))
            .copied()
            .flatten()
    }

    /// Whether a terminal touches anything.
    pub fn is_connected(&self, terminal: TerminalRef) -> bool {
        self.terminal_degree.get(&terminal).is_some_and(|&d| d > 0)
    }

    /// Write the node assignment into the components.
    pub fn apply(&self, components: &mut [Component]) {
        for c in components {
            c.nodes = match self.component_nodes.get(&c.id) {
                Some(nodes) => nodes.clone(),
                None => vec![None; c.device.terminal_count()],
            };
        }
    }
}

/// Build the electrical node graph.
///
/// Ground is chosen, in order of preference, as: a connected ground
/// terminal; the negative terminal of a connected ideal voltage source; the
/// first connected terminal; an isolated ground terminal; the negative
/// terminal of the first voltage source. Other sets are numbered from 1 in
/// terminal order.
pub fn build_topology<R>(components: &[Component], wires: &[Wire], resolver: &R) -> Topology
where
    R: TerminalResolver + ?Sized,
{
    let mut posts = Vec::new();
    let mut keys: Vec<Option<GridKey>> = Vec::new();
    let mut terminal_post: HashMap<TerminalRef, usize> = HashMap::new();

    for (ci, c) in components.iter().enumerate() {
        for t in 0..c.device.terminal_count() {
            terminal_post.insert(TerminalRef::new(c.id, t), posts.len());
            posts.push(Post::Terminal {
                component: ci,
                terminal: t,
            });
            keys.push(resolver.terminal_position(c, t).map(|p| p.key()));
        }
    }
    let first_wire_post = posts.len();
    for w in wires {
        for end in 0..2 {
            posts.push(Post::WireEnd);
            keys.push(Some(w.endpoint(end).key()));
        }
    }

    let mut uf = UnionFind::new(posts.len());
    let wire_post = |wi: usize, end: usize| first_wire_post + 2 * wi + end;

    // Both ends of a wire are one conductor
    for wi in 0..wires.len() {
        uf.union(wire_post(wi, 0), wire_post(wi, 1));
    }

    // Coincident posts touch
    let mut by_key: HashMap<GridKey, Vec<usize>> = HashMap::new();
    for (post, key) in keys.iter().enumerate() {
        if let Some(k) = key {
            by_key.entry(*k).or_default().push(post);
        }
    }
    for group in by_key.values() {
        for pair in group.windows(2) {
            uf.union(pair[0], pair[1]);
        }
    }

    // Bound endpoints touch their terminal wherever it is drawn
    let mut bound_refs: HashMap<usize, usize> = HashMap::new();
    for (wi, w) in wires.iter().enumerate() {
        for end in 0..2 {
            let Some(r) = w.endpoint_ref(end) else {
                continue;
            };
            let Some(&tp) = terminal_post.get(&r) else {
                continue;
            };
            let ep = wire_post(wi, end);
            uf.union(ep, tp);
            if keys[ep] != keys[tp] {
                *bound_refs.entry(tp).or_default() += 1;
            }
        }
    }

    // Degree: everything else at the terminal's coordinate plus remote bindings
    let mut terminal_degree = HashMap::new();
    let mut connected = vec![false; first_wire_post];
    for (r, &tp) in &terminal_post {
        let at_key = keys[tp]
            .and_then(|k| by_key.get(&k))
            .map_or(0, |g| g.len().saturating_sub(1));
        let degree = at_key + bound_refs.get(&tp).copied().unwrap_or(0);
        connected[tp] = degree > 0;
        terminal_degree.insert(*r, degree);
    }

    let ground_post = select_ground(components, &terminal_post, &connected);

    // Number the sets
    let mut root_node: HashMap<usize, NodeId> = HashMap::new();
    if let Some(gp) = ground_post {
        if connected[gp] {
            root_node.insert(uf.find(gp), NodeId::GROUND);
        }
    }
    let mut node_count = 1;
    let mut component_nodes = HashMap::with_capacity(components.len());
    for c in components {
        let mut nodes = Vec::with_capacity(c.device.terminal_count());
        for t in 0..c.device.terminal_count() {
            let tp = terminal_post[&TerminalRef::new(c.id, t)];
            if !connected[tp] {
                nodes.push(None);
                continue;
            }
            let root = uf.find(tp);
            let node = *root_node.entry(root).or_insert_with(|| {
                node_count += 1;
                NodeId(node_count - 1)
            });
            nodes.push(Some(node));
        }
        component_nodes.insert(c.id, nodes);
    }

    let wire_nodes = wires
        .iter()
        .enumerate()
        .map(|(wi, w)| {
            let root = uf.find(wire_post(wi, 0));
            (w.id, root_node.get(&root).copied())
        })
        .collect();

    let ground = ground_post.and_then(|gp| match posts[gp] {
        Post::Terminal {
            component,
            terminal,
        } => Some(TerminalRef::new(components[component].id, terminal)),
        Post::WireEnd => None,
    });

    log::debug!(
        "topology: {} posts, {} nodes, ground at {}",
        posts.len(),
        node_count,
        ground.map_or_else(|| "none".to_string(), |g| g.to_string())
    );

    Topology {
        node_count,
        component_nodes,
        wire_nodes,
        terminal_degree,
        ground,
    }
}

fn select_ground(
    components: &[Component],
    terminal_post: &HashMap<TerminalRef, usize>,
    connected: &[bool],
) -> Option<usize> {
    let post = |c: &Component, t: usize| terminal_post.get(&TerminalRef::new(c.id, t)).copied();
    let is_ground = |c: &&Component| matches!(c.device, Device::Ground);
    let is_ideal_source = |c: &&Component| c.device.is_voltage_source() && c.device.needs_aux();

    let connected_post = |c: &Component, t: usize| post(c, t).filter(|&p| connected[p]);

    components
        .iter()
        .filter(is_ground)
        .find_map(|c| connected_post(c, 0))
        .or_else(|| {
            components
                .iter()
                .filter(is_ideal_source)
                .find_map(|c| connected_post(c, 1))
        })
        .or_else(|| {
            components.iter().find_map(|c| {
                (0..c.device.terminal_count()).find_map(|t| connected_post(c, t))
            })
        })
        .or_else(|| components.iter().filter(is_ground).find_map(|c| post(c, 0)))
        .or_else(|| {
            components
                .iter()
                .find(|c| c.device.is_voltage_source())
                .and_then(|c| post(c, 1))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Battery, Resistor};

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn layout(entries: &[(u32, Vec<Point>)]) -> TerminalLayout {
        entries
            .iter()
            .map(|(id, pts)| (ComponentId(*id), pts.clone()))
            .collect()
    }

    /// Battery with a resistor across it, joined by two wires.
    fn loop_circuit() -> (Vec<Component>, Vec<Wire>, TerminalLayout) {
        let components = vec![
            Component::new(ComponentId(1), Device::Battery(Battery::ideal(9.0))),
            Component::new(ComponentId(2), Device::Resistor(Resistor::new(100.0))),
        ];
        let layout = layout(&[
            (1, vec![p(0.0, 0.0), p(0.0, 1.0)]),
            (2, vec![p(2.0, 0.0), p(2.0, 1.0)]),
        ]);
        let wires = vec![
            Wire::new(WireId(1), p(0.0, 0.0), p(2.0, 0.0)),
            Wire::new(WireId(2), p(0.0, 1.0), p(2.0, 1.0)),
        ];
        (components, wires, layout)
    }

    #[test]
    fn test_simple_loop() {
        let (components, wires, layout) = loop_circuit();
        let topo = build_topology(&components, &wires, &layout);
        assert_eq!(topo.node_count, 2);
        // Battery negative is ground
        assert_eq!(topo.ground, Some(TerminalRef::new(ComponentId(1), 1)));
        assert_eq!(
            topo.component_nodes[&ComponentId(1)],
            vec![Some(NodeId(1)), Some(NodeId(0))]
        );
        assert_eq!(
            topo.component_nodes[&ComponentId(2)],
            vec![Some(NodeId(1)), Some(NodeId(0))]
        );
        assert_eq!(topo.wire_nodes[&WireId(1)], Some(NodeId(1)));
        assert_eq!(topo.wire_nodes[&WireId(2)], Some(NodeId(0)));
    }

    #[test]
    fn test_unconnected_terminal() {
        let (components, mut wires, layout) = loop_circuit();
        wires.pop();
        let topo = build_topology(&components, &wires, &layout);
        let r = TerminalRef::new(ComponentId(2), 1);
        assert_eq!(topo.node(r), None);
        assert!(!topo.is_connected(r));
        // Battery negative no longer qualifies; first connected terminal wins
        assert_eq!(topo.ground, Some(TerminalRef::new(ComponentId(1), 0)));
        assert_eq!(topo.node_count, 1);
    }

    #[test]
    fn test_ground_component_preferred() {
        let (mut components, mut wires, mut layout) = loop_circuit();
        components.push(Component::new(ComponentId(3), Device::Ground));
        layout.insert(ComponentId(3), vec![p(2.0, 0.0)]);
        wires.truncate(2);
        let topo = build_topology(&components, &wires, &layout);
        assert_eq!(topo.ground, Some(TerminalRef::new(ComponentId(3), 0)));
        assert_eq!(topo.node(TerminalRef::new(ComponentId(2), 0)), Some(NodeId(0)));
        assert_eq!(topo.node(TerminalRef::new(ComponentId(1), 1)), Some(NodeId(1)));
    }

    #[test]
    fn test_butting_terminals_connect() {
        let components = vec![
            Component::new(ComponentId(1), Device::Resistor(Resistor::new(1.0))),
            Component::new(ComponentId(2), Device::Resistor(Resistor::new(1.0))),
        ];
        let layout = layout(&[
            (1, vec![p(0.0, 0.0), p(1.0, 0.0)]),
            (2, vec![p(1.0, 0.0), p(2.0, 0.0)]),
        ]);
        let topo = build_topology(&components, &[], &layout);
        let shared = TerminalRef::new(ComponentId(1), 1);
        assert_eq!(topo.terminal_degree[&shared], 1);
        assert_eq!(topo.node(shared), topo.node(TerminalRef::new(ComponentId(2), 0)));
        assert_eq!(topo.node(TerminalRef::new(ComponentId(1), 0)), None);
    }

    #[test]
    fn test_bound_endpoint_connects_remote_terminal() {
        let (components, mut wires, layout) = loop_circuit();
        // Wire drawn away from the terminal but bound to it
        wires[1] = Wire::new(WireId(2), p(5.0, 5.0), p(2.0, 1.0))
            .with_refs(Some(TerminalRef::new(ComponentId(1), 1)), None);
        let topo = build_topology(&components, &wires, &layout);
        assert_eq!(topo.node_count, 2);
        assert_eq!(
            topo.node(TerminalRef::new(ComponentId(1), 1)),
            topo.node(TerminalRef::new(ComponentId(2), 1))
        );
    }

    #[test]
    fn test_closure_resolver() {
        let (components, wires, layout) = loop_circuit();
        let resolver = |c: &Component, t: usize| layout.get(&c.id).and_then(|v| v.get(t)).copied();
        let topo = build_topology(&components, &wires, &resolver);
        assert_eq!(topo.node_count, 2);
    }

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(3, 4);
        uf.union(1, 4);
        assert_eq!(uf.find(0), uf.find(3));
        assert_ne!(uf.find(0), uf.find(2));
    }
}
