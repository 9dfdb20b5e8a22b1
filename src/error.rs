//! Error types for the Breadboard circuit core.
//!
//! This module provides a unified error type [`BreadboardError`] covering the
//! conditions that are genuine caller mistakes: malformed components, bad edits,
//! invalid solver parameters and unreadable circuit documents.
//!
//! Degenerate circuits (open loops, shorts, singular sub-graphs) are *not*
//! errors. A solve over such a circuit returns a result with `valid == false`
//! and an [`InvalidReason`](crate::solver::InvalidReason).

use thiserror::Error;

use crate::circuit::{ComponentId, WireId};

/// Result type alias using [`BreadboardError`].
pub type Result<T> = std::result::Result<T, BreadboardError>;

/// Unified error type for all Breadboard operations.
#[derive(Error, Debug)]
pub enum BreadboardError {
    // ============ Circuit Structure Errors ============
    /// Component node array does not match the terminal count of its kind
    #[error("Malformed component '{id}': {kind} has {expected} terminals, got {actual}")]
    MalformedComponent {
        id: ComponentId,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Duplicate component id
    #[error("Duplicate component id '{id}'")]
    DuplicateComponent { id: ComponentId },

    /// Duplicate wire id
    #[error("Duplicate wire id '{id}'")]
    DuplicateWire { id: WireId },

    /// Edit referenced a component that does not exist
    #[error("Component '{id}' not found")]
    ComponentNotFound { id: ComponentId },

    /// Edit referenced a wire that does not exist
    #[error("Wire '{id}' not found")]
    WireNotFound { id: WireId },

    /// Invalid device parameter
    #[error("Invalid parameter '{param}' for component '{id}': {message}")]
    InvalidParameter {
        id: ComponentId,
        param: &'static str,
        message: String,
    },

    // ============ Simulation Errors ============
    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Document Errors ============
    /// Error reading a circuit document
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error decoding a circuit document
    #[error("Invalid circuit document: {source}")]
    DocumentError {
        #[from]
        source: serde_json::Error,
    },

    /// Error writing simulation output
    #[error("Output error: {source}")]
    OutputError {
        #[from]
        source: std::io::Error,
    },

    // ============ WASM Errors ============
    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    WasmError { message: String },
}

impl BreadboardError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(id: ComponentId, param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            id,
            param,
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_simulation(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }
}
