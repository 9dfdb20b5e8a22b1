//! Circuit document validation.

use std::collections::HashSet;

use crate::error::{BreadboardError, Result};

use super::document::CircuitDocument;

/// Validate a circuit document before building a [`Circuit`](super::Circuit).
///
/// Checks:
/// - No duplicate component or wire ids
/// - One terminal position per terminal of each device kind
/// - Device parameters that cannot be clamped are in range
/// - Wire endpoint bindings name existing terminals
pub fn validate_document(doc: &CircuitDocument) -> Result<()> {
    let mut ids = HashSet::new();
    for c in &doc.components {
        if !ids.insert(c.id) {
            return Err(BreadboardError::DuplicateComponent { id: c.id });
        }
        let expected = c.device.terminal_count();
        if c.terminals.len() != expected {
            return Err(BreadboardError::MalformedComponent {
                id: c.id,
                kind: c.device.kind(),
                expected,
                actual: c.terminals.len(),
            });
        }
        c.device
            .check_parameters()
            .map_err(|(param, message)| BreadboardError::invalid_parameter(c.id, param, message))?;
    }

    let mut wire_ids = HashSet::new();
    for w in &doc.wires {
        if !wire_ids.insert(w.id) {
            return Err(BreadboardError::DuplicateWire { id: w.id });
        }
        for r in [w.a_ref, w.b_ref].into_iter().flatten() {
            let target = doc.components.iter().find(|c| c.id == r.component);
            match target {
                None => return Err(BreadboardError::ComponentNotFound { id: r.component }),
                Some(c) if r.terminal >= c.device.terminal_count() => {
                    return Err(BreadboardError::MalformedComponent {
                        id: c.id,
                        kind: c.device.kind(),
                        expected: c.device.terminal_count(),
                        actual: r.terminal + 1,
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}
