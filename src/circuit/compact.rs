//! Wire clean-up after edits.
//!
//! Drops zero-length wires and merges pairs of wires that meet at a free
//! junction: a point touched by exactly two unbound wire endpoints and by no
//! component terminal. A pair merges when it doubles back onto itself (both
//! far ends coincide) or when it continues in a straight line through the
//! junction.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::topology::TerminalResolver;
use super::types::{GridKey, Point, TerminalRef, Wire, WireId};
use crate::components::Component;

/// Relative tolerance for the collinearity test.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// What a compaction pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactResult {
    pub changed: bool,
    /// Wires removed, in removal order
    pub removed_ids: Vec<WireId>,
    /// Surviving wire for each merged-away wire
    pub replacement_by_removed_id: HashMap<WireId, WireId>,
}

impl CompactResult {
    fn record_removed(&mut self, id: WireId) {
        self.changed = true;
        self.removed_ids.push(id);
    }

    fn record_merge(&mut self, removed: WireId, survivor: WireId) {
        self.record_removed(removed);
        for target in self.replacement_by_removed_id.values_mut() {
            if *target == removed {
                *target = survivor;
            }
        }
        self.replacement_by_removed_id.insert(removed, survivor);
    }
}

/// Compact `wires` in place.
///
/// With `scope`, only wires whose ids are in it may be removed or merged.
pub fn compact_wires<R>(
    components: &[Component],
    wires: &mut Vec<Wire>,
    resolver: &R,
    scope: Option<&HashSet<WireId>>,
) -> CompactResult
where
    R: TerminalResolver + ?Sized,
{
    let in_scope = |id: WireId| scope.map_or(true, |s| s.contains(&id));
    let mut result = CompactResult::default();

    let terminal_keys: HashSet<GridKey> = components
        .iter()
        .flat_map(|c| {
            (0..c.device.terminal_count()).filter_map(move |t| resolver.terminal_position(c, t))
        })
        .map(|p| p.key())
        .collect();

    wires.retain(|w| {
        let drop = w.is_zero_length() && in_scope(w.id);
        if drop {
            result.record_removed(w.id);
        }
        !drop
    });

    while let Some((keep, absorb, merged)) = find_merge(wires, &terminal_keys, &in_scope) {
        let removed = wires[absorb].id;
        let survivor = wires[keep].id;
        log::debug!("merging wire {removed} into {survivor}");
        wires[keep] = merged;
        wires.remove(absorb);
        result.record_merge(removed, survivor);
    }

    result
}

/// Next mergeable pair as `(survivor index, absorbed index, merged survivor)`.
fn find_merge(
    wires: &[Wire],
    terminal_keys: &HashSet<GridKey>,
    in_scope: &dyn Fn(WireId) -> bool,
) -> Option<(usize, usize, Wire)> {
    // Sorted for a deterministic merge order
    let mut ends: BTreeMap<GridKey, Vec<(usize, usize)>> = BTreeMap::new();
    for (wi, w) in wires.iter().enumerate() {
        for end in 0..2 {
            ends.entry(w.endpoint(end).key()).or_default().push((wi, end));
        }
    }

    for (key, touching) in &ends {
        let &[(w1, e1), (w2, e2)] = touching.as_slice() else {
            continue;
        };
        if w1 == w2 || terminal_keys.contains(key) {
            continue;
        }
        let (a, b) = (&wires[w1], &wires[w2]);
        if a.endpoint_ref(e1).is_some() || b.endpoint_ref(e2).is_some() {
            continue;
        }
        if !in_scope(a.id) || !in_scope(b.id) {
            continue;
        }

        let joint = a.endpoint(e1);
        let far_a = a.endpoint(1 - e1);
        let far_b = b.endpoint(1 - e2);
        let far_b_ref = b.endpoint_ref(1 - e2);

        if far_a.coincides(&far_b) {
            // Redundant loop: keep the survivor, adopting a far binding it lacks
            let mut merged = a.clone();
            if merged.endpoint_ref(1 - e1).is_none() {
                set_endpoint(&mut merged, 1 - e1, far_a, far_b_ref);
            }
            return Some((w1, w2, merged));
        }

        if continues_straight(joint, far_a, far_b) {
            let mut merged = a.clone();
            set_endpoint(&mut merged, e1, far_b, far_b_ref);
            return Some((w1, w2, merged));
        }
    }
    None
}

fn set_endpoint(wire: &mut Wire, end: usize, point: Point, terminal: Option<TerminalRef>) {
    if end == 0 {
        wire.a = point;
        wire.a_ref = terminal;
    } else {
        wire.b = point;
        wire.b_ref = terminal;
    }
}

/// Whether `far_a` and `far_b` lie on opposite sides of `joint` on one line.
fn continues_straight(joint: Point, far_a: Point, far_b: Point) -> bool {
    let (ax, ay) = (far_a.x - joint.x, far_a.y - joint.y);
    let (bx, by) = (far_b.x - joint.x, far_b.y - joint.y);
    let cross = ax * by - ay * bx;
    let dot = ax * bx + ay * by;
    let scale = (ax * ax + ay * ay).sqrt() * (bx * bx + by * by).sqrt();
    scale > 0.0 && cross.abs() <= COLLINEAR_TOLERANCE * scale && dot < 0.0
}
