use thiserror::Error;

use crate::model::VarKey;

/// Errors that abort a solve.
///
/// Offerings that resolve to no period and reservation records that cannot
/// be read are not errors; they are skipped where they are found.
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("No schedule satisfies every constraint")]
    Infeasible,
    #[error("{what} = {value} is outside the catalog (must be below {bound})")]
    DomainViolation {
        what: String,
        value: usize,
        bound: usize,
    },
    #[error("Variable {0} was declared twice")]
    DuplicateVariable(VarKey),
    #[error("Variable {0} has no domain bounds")]
    UnboundedVariable(VarKey),
    #[error("Search stopped before reaching a verdict")]
    Interrupted,
    #[error("Solver backend failed: {0}")]
    Backend(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while loading or validating the engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Domain(#[from] SolveError),
}
