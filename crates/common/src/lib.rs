//! Drishti Common - Shared types and primitives
//!
//! This crate provides the value types, error enum, and canonical IP/CIDR
//! arithmetic used across the Drishti analyzer workspace.

pub mod error;
pub mod net;
pub mod types;

// Re-export commonly used types
pub use error::{DrishtiError, DrishtiResult};
pub use types::{
    Action, Decision, DestinationRecord, ExpansionMode, PortEntry, Protocol, Reason, RunSummary,
    SimulationOptions, SimulationResult, SourceNetwork, Task, CSV_HEADER,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
