//! Weekly timetabling of course offerings into (day, slot, room) triples per
//! academic period, as a constraint satisfaction problem.

pub mod audit;
pub mod backend;
pub mod collisions;
pub mod config;
pub mod constraints;
pub mod data;
pub mod error;
pub mod extract;
pub mod model;
pub mod periods;
pub mod preferences;
pub mod server;
pub mod solver;
pub mod variables;

pub use config::EngineConfig;
pub use error::{ConfigError, SolveError};
pub use solver::{solve, solve_using};
