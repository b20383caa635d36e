use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use log::{info, trace};
use std::time::Instant;

use super::{Backend, Outcome, SearchLimits};
use crate::error::SolveError;
use crate::model::{Assignment, Constraint, ConstraintModel, VarId};

/// Solves the model as a 0-1 integer program with HiGHS.
///
/// Each integer variable `v` over `lo..=hi` becomes binaries `x_vk`, exactly
/// one of which is set. The objective prefers low values (earliest day, then
/// slot, then room); with one thread and a fixed seed the answer is the same
/// on every run.
#[derive(Debug, Clone)]
pub struct IlpBackend {
    pub random_seed: i32,
}

impl Default for IlpBackend {
    fn default() -> Self {
        Self { random_seed: 1234 }
    }
}

/// `x_vk` for every value `k` in the domain of `v`, indexed by variable.
struct OneHot {
    lows: Vec<i64>,
    bits: Vec<Vec<Variable>>,
}

impl OneHot {
    fn bit(&self, var: VarId, value: i64) -> Option<Variable> {
        let offset = usize::try_from(value - self.lows[var.index()]).ok()?;
        self.bits[var.index()].get(offset).copied()
    }

    /// `(x_ak, x_bk)` for every value both variables can take.
    fn common(&self, a: VarId, b: VarId) -> Vec<(Variable, Variable)> {
        let lo = self.lows[a.index()].max(self.lows[b.index()]);
        let hi_a = self.lows[a.index()] + self.bits[a.index()].len() as i64;
        let hi_b = self.lows[b.index()] + self.bits[b.index()].len() as i64;
        (lo..hi_a.min(hi_b))
            .filter_map(|k| Some((self.bit(a, k)?, self.bit(b, k)?)))
            .collect()
    }
}

impl Backend for IlpBackend {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, model: &ConstraintModel, limits: &SearchLimits) -> Result<Outcome, SolveError> {
        if limits.is_cancelled() {
            return Err(SolveError::Interrupted);
        }
        let start_time = Instant::now();
        let domains = model.domains()?;
        if domains.iter().any(|range| range.is_empty()) {
            return Ok(Outcome::Unsat);
        }
        // HiGHS rejects a problem without columns.
        if model.var_count() == 0 {
            return Ok(Outcome::Sat(Assignment::new(Vec::new())));
        }

        let mut problem = ProblemVariables::new();
        let one_hot = OneHot {
            lows: domains.iter().map(|range| *range.start()).collect(),
            bits: domains
                .iter()
                .map(|range| problem.add_vector(variable().binary(), range.clone().count()))
                .collect(),
        };

        let mut rows = Vec::new();
        for bits in &one_hot.bits {
            let chosen: Expression = bits.iter().copied().sum();
            rows.push(constraint!(chosen == 1));
        }

        for c in model.constraints() {
            match c {
                // Already folded into the domains.
                Constraint::Within { .. } => {}
                Constraint::Equals { var, value } => match one_hot.bit(*var, *value) {
                    Some(bit) => rows.push(constraint!(bit == 1)),
                    None => return Ok(Outcome::Unsat),
                },
                Constraint::Differs(a, b) => {
                    for (x, y) in one_hot.common(*a, *b) {
                        rows.push(constraint!(x + y <= 1));
                    }
                }
                Constraint::AnyDiffers(pairs) => {
                    if let [(a, b)] = pairs.as_slice() {
                        for (x, y) in one_hot.common(*a, *b) {
                            rows.push(constraint!(x + y <= 1));
                        }
                        continue;
                    }
                    let shared: Vec<Vec<(Variable, Variable)>> =
                        pairs.iter().map(|(a, b)| one_hot.common(*a, *b)).collect();
                    // A pair without common values can never be equal.
                    if shared.iter().any(Vec::is_empty) {
                        continue;
                    }
                    // e_i is forced to 1 whenever pair i takes equal values.
                    let mut equals = Vec::with_capacity(shared.len());
                    for values in shared {
                        let equal = problem.add(variable().binary());
                        for (x, y) in values {
                            rows.push(constraint!(x + y - equal <= 1));
                        }
                        equals.push(equal);
                    }
                    let equal_sum: Expression = equals.into_iter().sum();
                    let bound = pairs.len() as i32 - 1;
                    rows.push(constraint!(equal_sum <= bound));
                }
                Constraint::AllowedPairs { first, second, pairs } => {
                    let usable: Vec<(Variable, Variable)> = pairs
                        .iter()
                        .filter_map(|&(p, q)| {
                            Some((one_hot.bit(*first, p)?, one_hot.bit(*second, q)?))
                        })
                        .collect();
                    if usable.is_empty() {
                        return Ok(Outcome::Unsat);
                    }
                    let mut picks = Vec::with_capacity(usable.len());
                    for (x, y) in usable {
                        let pick = problem.add(variable().binary());
                        rows.push(constraint!(pick <= x));
                        rows.push(constraint!(pick <= y));
                        picks.push(pick);
                    }
                    let picked: Expression = picks.into_iter().sum();
                    rows.push(constraint!(picked == 1));
                }
            }
        }

        let objective: Expression = one_hot
            .lows
            .iter()
            .zip(&one_hot.bits)
            .flat_map(|(low, bits)| {
                bits.iter()
                    .enumerate()
                    .map(move |(i, bit)| (*low + i as i64) as f64 * *bit)
            })
            .sum();
        trace!(
            "Lowered {} variables and {} constraints into {} rows",
            model.var_count(),
            model.constraints().len(),
            rows.len()
        );

        let mut solver = problem
            .minimise(objective)
            .using(default_solver)
            .set_option("threads", 1) // limit to 1 thread for reproducibility
            .set_option("random_seed", self.random_seed)
            .set_option("log_to_console", "false");
        if let Some(limit) = limits.time_limit {
            solver = solver.set_option("time_limit", limit.as_secs_f64());
        }
        for row in rows {
            solver.add_constraint(row);
        }

        info!("Starting ILP solver...");
        let solution = match solver.solve() {
            Ok(s) => s,
            Err(e) => return resolution_failure(e, limits),
        };
        info!("ILP solver finished in {:.2?}", start_time.elapsed());

        let mut values = Vec::with_capacity(one_hot.bits.len());
        for (i, bits) in one_hot.bits.iter().enumerate() {
            let chosen = bits
                .iter()
                .position(|bit| solution.value(*bit) > 0.5)
                .ok_or_else(|| {
                    SolveError::Backend(format!("no value chosen for {}", model.key(VarId(i))))
                })?;
            values.push(one_hot.lows[i] + chosen as i64);
        }
        let assignment = Assignment::new(values);
        if !model.check(&assignment) {
            // HiGHS hands back its incumbent when the time limit hits.
            return Err(match limits.time_limit {
                Some(_) => SolveError::Interrupted,
                None => SolveError::Backend("solution violates the model".into()),
            });
        }
        Ok(Outcome::Sat(assignment))
    }
}

/// Maps a failed HiGHS run to a verdict or an error.
fn resolution_failure(err: ResolutionError, limits: &SearchLimits) -> Result<Outcome, SolveError> {
    match err {
        ResolutionError::Infeasible => Ok(Outcome::Unsat),
        // The time limit ran out before HiGHS found an incumbent.
        ResolutionError::Other("NoSolutionFound") if limits.time_limit.is_some() => {
            Err(SolveError::Interrupted)
        }
        other => Err(SolveError::Backend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, SessionKey, VarKey};
    use std::time::Duration;

    fn declare(model: &mut ConstraintModel, code: &str, min: i64, max: i64) -> VarId {
        let var = model
            .declare(VarKey {
                session: SessionKey::new(code, "P1", 1),
                field: Field::Day,
            })
            .unwrap();
        model.add(Constraint::Within { var, min, max });
        var
    }

    fn solve(model: &ConstraintModel) -> Outcome {
        IlpBackend::default().solve(model, &SearchLimits::default()).unwrap()
    }

    #[test]
    fn test_prefers_lowest_values() {
        let mut model = ConstraintModel::new();
        let a = declare(&mut model, "A", 0, 4);
        let b = declare(&mut model, "B", 0, 4);
        model.add(Constraint::Differs(a, b));
        let Outcome::Sat(assignment) = solve(&model) else {
            panic!("expected a solution");
        };
        assert_ne!(assignment.value(a), assignment.value(b));
        assert_eq!(assignment.value(a) + assignment.value(b), 1);
    }

    #[test]
    fn test_any_differs_and_allowed_pairs() {
        let mut model = ConstraintModel::new();
        let a = declare(&mut model, "A", 0, 1);
        let b = declare(&mut model, "B", 0, 1);
        let c = declare(&mut model, "C", 0, 1);
        let d = declare(&mut model, "D", 0, 1);
        model.add(Constraint::AllowedPairs {
            first: a,
            second: b,
            pairs: vec![(0, 0)],
        });
        model.add(Constraint::AllowedPairs {
            first: c,
            second: d,
            pairs: vec![(0, 0), (1, 1)],
        });
        model.add(Constraint::AnyDiffers(vec![(a, c), (b, d)]));
        let Outcome::Sat(assignment) = solve(&model) else {
            panic!("expected a solution");
        };
        assert_eq!(assignment.values(), &[0, 0, 1, 1]);
        assert!(model.check(&assignment));
    }

    #[test]
    fn test_reports_unsat() {
        let mut model = ConstraintModel::new();
        let a = declare(&mut model, "A", 0, 1);
        let b = declare(&mut model, "B", 0, 1);
        let c = declare(&mut model, "C", 0, 1);
        model.add(Constraint::Differs(a, b));
        model.add(Constraint::Differs(b, c));
        model.add(Constraint::Differs(a, c));
        assert_eq!(solve(&model), Outcome::Unsat);
    }

    #[test]
    fn test_pin_outside_domain_is_unsat() {
        let mut model = ConstraintModel::new();
        let a = declare(&mut model, "A", 0, 1);
        model.add(Constraint::Equals { var: a, value: 3 });
        assert_eq!(solve(&model), Outcome::Unsat);
    }

    #[test]
    fn test_cancelled_before_start() {
        let model = ConstraintModel::new();
        let cancel = crate::backend::CancelToken::new();
        cancel.cancel();
        let limits = SearchLimits {
            time_limit: None,
            cancel: Some(cancel),
        };
        assert!(matches!(
            IlpBackend::default().solve(&model, &limits),
            Err(SolveError::Interrupted)
        ));
    }

    #[test]
    fn test_empty_model_is_trivially_satisfied() {
        let model = ConstraintModel::new();
        assert_eq!(solve(&model), Outcome::Sat(Assignment::new(vec![])));
    }

    #[test]
    fn test_no_incumbent_within_time_limit_is_interrupted() {
        let limited = SearchLimits {
            time_limit: Some(Duration::from_millis(1)),
            cancel: None,
        };
        assert!(matches!(
            resolution_failure(ResolutionError::Other("NoSolutionFound"), &limited),
            Err(SolveError::Interrupted)
        ));
        assert!(matches!(
            resolution_failure(ResolutionError::Other("NoSolutionFound"), &SearchLimits::default()),
            Err(SolveError::Backend(_))
        ));
        assert!(matches!(
            resolution_failure(ResolutionError::Infeasible, &limited),
            Ok(Outcome::Unsat)
        ));
    }

    #[test]
    fn test_tiny_time_limit_never_fails_the_backend() {
        // Thirteen pigeons, twelve holes: the LP relaxation is feasible.
        let mut model = ConstraintModel::new();
        let vars: Vec<VarId> = (0..13)
            .map(|i| declare(&mut model, &format!("P{i}"), 0, 11))
            .collect();
        for (i, a) in vars.iter().enumerate() {
            for b in &vars[i + 1..] {
                model.add(Constraint::Differs(*a, *b));
            }
        }
        let limits = SearchLimits {
            time_limit: Some(Duration::from_millis(1)),
            cancel: None,
        };
        assert!(matches!(
            IlpBackend::default().solve(&model, &limits),
            Err(SolveError::Interrupted) | Ok(Outcome::Unsat)
        ));
    }
}
