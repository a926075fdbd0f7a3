//! Per-iteration configuration supplied by the driver.
//!
//! The values are validated once, before any record is read, and then threaded into the operators
//! that need them. An invalid configuration is never replaced by a default.
use serde::Serialize;
use thiserror::Error;

/// Environment variable with the damping factor, in the open interval (0, 1).
pub const DAMPING_ENV_VAR: &str = "DAMPING";
/// Environment variable with the number of nodes of the graph, a positive integer.
pub const TOTAL_NODES_ENV_VAR: &str = "TOTAL_NODES";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is required but was not set")]
    Missing(&'static str),
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Configuration of the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapperConfig {
    total_nodes: u64,
}

/// Configuration of the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReducerConfig {
    damping: f64,
    total_nodes: u64,
}

impl MapperConfig {
    pub fn new(total_nodes: u64) -> Result<Self, ConfigError> {
        check_total_nodes(total_nodes)?;
        Ok(Self { total_nodes })
    }

    /// Build the configuration from the raw values of `TOTAL_NODES` and `DAMPING`.
    ///
    /// The mapper does not need the damping factor, but when it is provided it must be valid.
    pub fn from_values(
        total_nodes: Option<&str>,
        damping: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let total_nodes = parse_total_nodes(total_nodes)?;
        if damping.is_some() {
            parse_damping(damping)?;
        }
        Ok(Self { total_nodes })
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// The rank of every node in the first iteration.
    pub fn initial_rank(&self) -> f64 {
        1.0 / self.total_nodes as f64
    }
}

impl ReducerConfig {
    pub fn new(damping: f64, total_nodes: u64) -> Result<Self, ConfigError> {
        check_damping(damping)?;
        check_total_nodes(total_nodes)?;
        Ok(Self {
            damping,
            total_nodes,
        })
    }

    /// Build the configuration from the raw values of `DAMPING` and `TOTAL_NODES`.
    pub fn from_values(
        damping: Option<&str>,
        total_nodes: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            damping: parse_damping(damping)?,
            total_nodes: parse_total_nodes(total_nodes)?,
        })
    }

    /// Build a configuration without validating the damping factor.
    ///
    /// Only the conservation checks use this, with `damping = 1`.
    #[doc(hidden)]
    pub fn new_unchecked(damping: f64, total_nodes: u64) -> Self {
        Self {
            damping,
            total_nodes,
        }
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// Rank of a node that receives no contribution.
    pub fn teleport(&self) -> f64 {
        (1.0 - self.damping) / self.total_nodes as f64
    }

    /// Rank of a node whose contributions sum to `contributions`.
    pub fn rank(&self, contributions: f64) -> f64 {
        self.teleport() + self.damping * contributions
    }
}

fn parse_damping(raw: Option<&str>) -> Result<f64, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(DAMPING_ENV_VAR))?;
    let damping = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::NotANumber {
            name: DAMPING_ENV_VAR,
            value: raw.to_string(),
        })?;
    check_damping(damping)?;
    Ok(damping)
}

fn check_damping(damping: f64) -> Result<(), ConfigError> {
    // also rejects NaN
    if damping > 0.0 && damping < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name: DAMPING_ENV_VAR,
            value: damping.to_string(),
            expected: "in the open interval (0, 1)",
        })
    }
}

fn parse_total_nodes(raw: Option<&str>) -> Result<u64, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(TOTAL_NODES_ENV_VAR))?;
    let total_nodes = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::NotANumber {
            name: TOTAL_NODES_ENV_VAR,
            value: raw.to_string(),
        })?;
    if total_nodes <= 0 {
        return Err(ConfigError::OutOfRange {
            name: TOTAL_NODES_ENV_VAR,
            value: total_nodes.to_string(),
            expected: "a positive integer",
        });
    }
    Ok(total_nodes as u64)
}

fn check_total_nodes(total_nodes: u64) -> Result<(), ConfigError> {
    if total_nodes == 0 {
        Err(ConfigError::OutOfRange {
            name: TOTAL_NODES_ENV_VAR,
            value: "0".to_string(),
            expected: "a positive integer",
        })
    } else {
        Ok(())
    }
}
