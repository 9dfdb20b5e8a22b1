//! JSON shape of a saved circuit.
//!
//! ```json
//! {
//!   "components": [
//!     { "id": 1, "device": { "type": "Battery", "voltage": 9.0 },
//!       "terminals": [ { "x": 0, "y": 0 }, { "x": 0, "y": 1 } ] }
//!   ],
//!   "wires": [
//!     { "id": 1, "a": { "x": 0, "y": 0 }, "b": { "x": 2, "y": 0 } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{ComponentId, Point, Wire};
use crate::components::Device;
use crate::error::{BreadboardError, Result};

/// A device with its terminal coordinates on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedComponent {
    pub id: ComponentId,
    pub device: Device,
    /// One point per terminal
    #[serde(default)]
    pub terminals: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitDocument {
    #[serde(default)]
    pub components: Vec<PlacedComponent>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl CircuitDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| BreadboardError::FileReadError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
