use log::{debug, info};
use std::time::Instant;

use super::{Backend, CancelToken, Outcome, SearchLimits};
use crate::error::SolveError;
use crate::model::{Assignment, Constraint, ConstraintModel};

/// How many nodes are expanded between two deadline/cancellation checks.
const CHECK_INTERVAL: u64 = 256;

/// Depth-first search with forward checking.
///
/// After each assignment every watched constraint prunes the candidates of
/// its unassigned variables, and a branch is abandoned as soon as one of
/// them runs empty. The unassigned variable with the fewest candidates goes
/// next, ties broken by declaration order, and values are tried in
/// ascending order, so the first solution found is the same on every run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBackend;

struct Search<'a> {
    constraints: &'a [Constraint],
    candidates: Vec<Vec<i64>>,
    // Constraint indices to propagate once a variable is assigned.
    watches: Vec<Vec<usize>>,
    values: Vec<Option<i64>>,
    // Candidate lists replaced by pruning, restored on backtrack.
    trail: Vec<(usize, Vec<i64>)>,
    deadline: Option<Instant>,
    cancel: Option<&'a CancelToken>,
    nodes: u64,
}

impl Search<'_> {
    fn tick(&mut self) -> Result<(), SolveError> {
        if self.nodes % CHECK_INTERVAL == 0 {
            let expired = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
            if expired || self.cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("Search interrupted after {} nodes", self.nodes);
                return Err(SolveError::Interrupted);
            }
        }
        self.nodes += 1;
        Ok(())
    }

    fn next_var(&self) -> Option<usize> {
        (0..self.values.len())
            .filter(|&var| self.values[var].is_none())
            .min_by_key(|&var| (self.candidates[var].len(), var))
    }

    /// Keeps only the candidates of `var` that `constraint` still allows.
    /// False when none are left.
    fn prune(&mut self, var: usize, constraint: &Constraint) -> bool {
        let mut kept = Vec::with_capacity(self.candidates[var].len());
        for &value in &self.candidates[var] {
            self.values[var] = Some(value);
            if constraint.consistent(&self.values) {
                kept.push(value);
            }
        }
        self.values[var] = None;
        if kept.len() < self.candidates[var].len() {
            let previous = std::mem::replace(&mut self.candidates[var], kept);
            self.trail.push((var, previous));
        }
        !self.candidates[var].is_empty()
    }

    fn propagate(&mut self, assigned: usize) -> bool {
        let constraints = self.constraints;
        for w in 0..self.watches[assigned].len() {
            let constraint = &constraints[self.watches[assigned][w]];
            if !constraint.consistent(&self.values) {
                return false;
            }
            for var in constraint.vars() {
                let var = var.index();
                if self.values[var].is_none() && !self.prune(var, constraint) {
                    return false;
                }
            }
        }
        true
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((var, previous)) = self.trail.pop() {
                self.candidates[var] = previous;
            }
        }
    }

    fn descend(&mut self) -> Result<bool, SolveError> {
        let Some(var) = self.next_var() else {
            return Ok(true);
        };
        let choices = self.candidates[var].clone();
        for value in choices {
            self.tick()?;
            self.values[var] = Some(value);
            let mark = self.trail.len();
            if self.propagate(var) && self.descend()? {
                return Ok(true);
            }
            self.undo(mark);
        }
        self.values[var] = None;
        Ok(false)
    }
}

impl Backend for SearchBackend {
    fn name(&self) -> &'static str {
        "search"
    }

    fn solve(&self, model: &ConstraintModel, limits: &SearchLimits) -> Result<Outcome, SolveError> {
        let start_time = Instant::now();
        let mut candidates: Vec<Vec<i64>> = model
            .domains()?
            .into_iter()
            .map(|range| range.collect())
            .collect();
        let mut watches = vec![Vec::new(); model.var_count()];
        for (index, constraint) in model.constraints().iter().enumerate() {
            match constraint {
                Constraint::Within { .. } => {}
                Constraint::Equals { var, value } => candidates[var.index()].retain(|v| v == value),
                other => {
                    let mut vars = other.vars();
                    vars.sort();
                    vars.dedup();
                    for var in vars {
                        watches[var.index()].push(index);
                    }
                }
            }
        }

        let mut search = Search {
            constraints: model.constraints(),
            candidates,
            watches,
            values: vec![None; model.var_count()],
            trail: Vec::new(),
            deadline: limits.time_limit.map(|limit| start_time + limit),
            cancel: limits.cancel.as_ref(),
            nodes: 0,
        };
        // Node consistency: drop values no constraint allows on their own.
        for var in 0..model.var_count() {
            for w in 0..search.watches[var].len() {
                let constraint = &model.constraints()[search.watches[var][w]];
                if !search.prune(var, constraint) {
                    return Ok(Outcome::Unsat);
                }
            }
            if search.candidates[var].is_empty() {
                return Ok(Outcome::Unsat);
            }
        }
        search.trail.clear();

        let found = search.descend()?;
        info!(
            "Search finished in {:.2?} after {} nodes",
            start_time.elapsed(),
            search.nodes
        );
        if !found {
            return Ok(Outcome::Unsat);
        }
        Ok(Outcome::Sat(Assignment::new(
            search.values.into_iter().map(|v| v.unwrap_or_default()).collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, SessionKey, VarId, VarKey};
    use std::time::Duration;

    fn declare(model: &mut ConstraintModel, code: &str, min: i64, max: i64) -> VarId {
        let var = model
            .declare(VarKey {
                session: SessionKey::new(code, "P1", 1),
                field: Field::Room,
            })
            .unwrap();
        model.add(Constraint::Within { var, min, max });
        var
    }

    fn pigeonhole(holes: i64, pigeons: usize) -> ConstraintModel {
        let mut model = ConstraintModel::new();
        let vars: Vec<VarId> = (0..pigeons)
            .map(|i| declare(&mut model, &format!("P{i}"), 0, holes - 1))
            .collect();
        for (i, a) in vars.iter().enumerate() {
            for b in &vars[i + 1..] {
                model.add(Constraint::Differs(*a, *b));
            }
        }
        model
    }

    #[test]
    fn test_first_solution_is_lexicographically_smallest() {
        let model = pigeonhole(3, 3);
        let outcome = SearchBackend.solve(&model, &SearchLimits::default()).unwrap();
        assert_eq!(outcome, Outcome::Sat(Assignment::new(vec![0, 1, 2])));
    }

    #[test]
    fn test_unsat_is_definite() {
        let model = pigeonhole(3, 4);
        assert_eq!(SearchBackend.solve(&model, &SearchLimits::default()).unwrap(), Outcome::Unsat);
    }

    #[test]
    fn test_equals_prunes_domain_up_front() {
        let mut model = ConstraintModel::new();
        let a = declare(&mut model, "A", 0, 4);
        let b = declare(&mut model, "B", 0, 4);
        model.add(Constraint::Equals { var: a, value: 4 });
        model.add(Constraint::AllowedPairs {
            first: a,
            second: b,
            pairs: vec![(4, 2), (0, 0)],
        });
        let outcome = SearchBackend.solve(&model, &SearchLimits::default()).unwrap();
        assert_eq!(outcome, Outcome::Sat(Assignment::new(vec![4, 2])));

        model.add(Constraint::Equals { var: b, value: 7 });
        assert_eq!(SearchBackend.solve(&model, &SearchLimits::default()).unwrap(), Outcome::Unsat);
    }

    #[test]
    fn test_cancellation_interrupts() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let limits = SearchLimits {
            time_limit: None,
            cancel: Some(cancel),
        };
        assert!(matches!(
            SearchBackend.solve(&pigeonhole(8, 9), &limits),
            Err(SolveError::Interrupted)
        ));
    }

    #[test]
    fn test_expired_deadline_interrupts() {
        let limits = SearchLimits {
            time_limit: Some(Duration::ZERO),
            cancel: None,
        };
        assert!(matches!(
            SearchBackend.solve(&pigeonhole(8, 9), &limits),
            Err(SolveError::Interrupted)
        ));
    }

    #[test]
    fn test_unbounded_variable_is_reported() {
        let mut model = ConstraintModel::new();
        model
            .declare(VarKey {
                session: SessionKey::new("A", "P1", 1),
                field: Field::Day,
            })
            .unwrap();
        assert!(matches!(
            SearchBackend.solve(&model, &SearchLimits::default()),
            Err(SolveError::UnboundedVariable(_))
        ));
    }
}
