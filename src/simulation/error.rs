//! Error types for configuration and the strategy protocol

use thiserror::Error;

/// Errors that prevent a simulation from starting
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid range for {name}: min {min} > max {max}")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("generator has no valid range for required parameter {0}")]
    MissingGeneratorParameter(String),

    #[error("unknown strategy id: {0}")]
    UnknownStrategy(String),

    #[error("road length must be positive, got {0}")]
    InvalidRoadLength(f64),

    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f64),

    #[error("road needs at least one lane")]
    NoLanes,

    #[error("speed limit must be positive, got {0}")]
    InvalidSpeedLimit(f64),

    #[error("flow rate must be finite and non-negative, got {0}")]
    InvalidFlowRate(f64),

    #[error("invalid queue size range: min {min} > max {max}")]
    InvalidQueueRange { min: usize, max: usize },
}

/// Errors a strategy reports back to the engine while evaluating one vehicle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    /// The strategy indexed a key the engine did not resolve
    #[error("parameter {0} was not resolved")]
    MissingParameter(String),

    /// The strategy used a sentinel as a number
    #[error("parameter {key} holds sentinel {value}")]
    Sentinel { key: String, value: &'static str },
}
