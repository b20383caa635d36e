//! Satisfiability backends for a [`ConstraintModel`].
//!
//! Every backend answers the same question: an assignment satisfying every
//! constraint, or a definite "none exists". There is no partial result.

pub mod ilp;
pub mod search;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::BackendKind;
use crate::error::SolveError;
use crate::model::{Assignment, ConstraintModel};

pub use ilp::IlpBackend;
pub use search::SearchBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sat(Assignment),
    Unsat,
}

/// Shared flag a caller can raise to stop a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub time_limit: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl SearchLimits {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs one search. Hitting a limit is `Err(SolveError::Interrupted)`,
    /// never `Ok(Outcome::Unsat)`.
    fn solve(&self, model: &ConstraintModel, limits: &SearchLimits) -> Result<Outcome, SolveError>;
}

pub fn from_kind(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Highs => Box::new(IlpBackend::default()),
        BackendKind::Search => Box::new(SearchBackend),
    }
}
