//! Error types for the Drishti analyzer

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrishtiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("missing column '{0}' in CSV header")]
    MissingColumn(String),

    #[error("CYCLE_DETECTED({name}) while flattening policy {policy_id}")]
    CycleDetected { name: String, policy_id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("policy source error: {0}")]
    PolicySource(String),

    #[error("pipeline cancelled")]
    Cancelled,
}

/// Result type alias for Drishti operations
pub type DrishtiResult<T> = Result<T, DrishtiError>;
