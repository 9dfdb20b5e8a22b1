//! Per-device simulation state carried between timesteps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::circuit::ComponentId;
use crate::components::{Component, Device};

/// Capacitor history from the last accepted timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacitorState {
    pub prev_voltage: f64,
    pub prev_charge: f64,
    pub prev_current: f64,
}

/// Inductor history from the last accepted timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InductorState {
    pub prev_current: f64,
    pub prev_voltage: f64,
}

/// Rotor speed (rad/s) and the back-EMF it produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorState {
    pub speed: f64,
    pub back_emf: f64,
}

/// Linearization point of a diode or LED junction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JunctionState {
    pub voltage: f64,
    pub current: f64,
    pub conducting: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayState {
    pub energized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FuseState {
    pub blown: bool,
}

/// State of one device, tagged by device class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceState {
    #[default]
    Stateless,
    Capacitor(CapacitorState),
    Inductor(InductorState),
    Motor(MotorState),
    Junction(JunctionState),
    Relay(RelayState),
    Fuse(FuseState),
}

impl DeviceState {
    pub fn capacitor(&self) -> Option<CapacitorState> {
        match self {
            DeviceState::Capacitor(s) => Some(*s),
            _ => None,
        }
    }

    pub fn inductor(&self) -> Option<InductorState> {
        match self {
            DeviceState::Inductor(s) => Some(*s),
            _ => None,
        }
    }

    pub fn motor(&self) -> Option<MotorState> {
        match self {
            DeviceState::Motor(s) => Some(*s),
            _ => None,
        }
    }

    pub fn junction(&self) -> Option<JunctionState> {
        match self {
            DeviceState::Junction(s) => Some(*s),
            _ => None,
        }
    }

    pub fn relay(&self) -> Option<RelayState> {
        match self {
            DeviceState::Relay(s) => Some(*s),
            _ => None,
        }
    }

    pub fn fuse(&self) -> Option<FuseState> {
        match self {
            DeviceState::Fuse(s) => Some(*s),
            _ => None,
        }
    }
}

/// Device state keyed by component id.
///
/// Entries are created on first touch and live until [`SimulationState::reset`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationState {
    entries: HashMap<ComponentId, DeviceState>,
    history_ready: bool,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored state, if any.
    pub fn get(&self, id: ComponentId) -> Option<&DeviceState> {
        self.entries.get(&id)
    }

    /// Stored state, or the device's initial state when none is stored yet.
    pub fn get_or_default(&self, id: ComponentId, device: &Device) -> DeviceState {
        self.entries
            .get(&id)
            .copied()
            .unwrap_or_else(|| device.initial_state())
    }

    /// Mutable state, created from the device's initial state on first access.
    pub fn entry(&mut self, id: ComponentId, device: &Device) -> &mut DeviceState {
        self.entries
            .entry(id)
            .or_insert_with(|| device.initial_state())
    }

    pub fn set(&mut self, id: ComponentId, state: DeviceState) {
        self.entries.insert(id, state);
    }

    /// Drop every entry, restoring each device to its initial state.
    pub fn reset(&mut self, components: &[Component]) {
        self.entries.clear();
        for c in components {
            let initial = c.device.initial_state();
            if initial != DeviceState::Stateless {
                self.entries.insert(c.id, initial);
            }
        }
        self.history_ready = false;
    }

    /// Drop entries of components that no longer exist.
    pub fn retain_components(&mut self, components: &[Component]) {
        self.entries
            .retain(|id, _| components.iter().any(|c| c.id == *id));
    }

    /// Whether at least one timestep has been committed since the last reset.
    pub fn history_ready(&self) -> bool {
        self.history_ready
    }

    pub fn mark_history_ready(&mut self) {
        self.history_ready = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
