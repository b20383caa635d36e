use log::{error, info, warn};
use std::time::Instant;

use crate::backend::{self, Backend, Outcome, SearchLimits};
use crate::config::EngineConfig;
use crate::data::{PreferenceSet, SchedulingInput, SchedulingOutput, dedup_offerings};
use crate::error::{ConfigError, SolveError};
use crate::model::ConstraintModel;
use crate::{audit, collisions, constraints, extract, periods, preferences, variables};

/// Solves the timetable with the backend and time limit named in `config`.
pub fn solve(
    input: &SchedulingInput,
    config: &EngineConfig,
) -> Result<SchedulingOutput, SolveError> {
    let limits = SearchLimits {
        time_limit: config.time_limit(),
        cancel: None,
    };
    solve_using(input, config, backend::from_kind(config.backend).as_ref(), &limits)
}

/// Validates `config`, builds the model, runs `backend` once and extracts
/// the schedule.
pub fn solve_using(
    input: &SchedulingInput,
    config: &EngineConfig,
    backend: &dyn Backend,
    limits: &SearchLimits,
) -> Result<SchedulingOutput, SolveError> {
    let start_time = Instant::now();
    config.validate().map_err(|err| match err {
        ConfigError::Domain(err) => err,
        other => SolveError::InvalidConfig(other.to_string()),
    })?;

    let offerings = dedup_offerings(&input.offerings);
    let preferences = collect_preferences(input, config);
    let resolved = periods::resolve_all(&offerings, &config.periods);
    info!(
        "Setting up model: {} offerings ({} in a known period), {} rooms, {} days, {} slots",
        offerings.len(),
        resolved.len(),
        config.catalog.room_count(),
        config.catalog.day_count(),
        config.catalog.slot_count()
    );

    let mut model = ConstraintModel::new();
    let allocated = variables::allocate(&resolved, config, &mut model)?;
    constraints::build(&allocated, &preferences, config, &mut model)?;
    collisions::generate(&allocated, config.collision_policy, &mut model);
    info!(
        "Model has {} variables and {} constraints, solving with {}",
        model.var_count(),
        model.constraints().len(),
        backend.name()
    );

    let assignment = match backend.solve(&model, limits)? {
        Outcome::Sat(assignment) => assignment,
        Outcome::Unsat => {
            warn!("No solution found. The problem is over-constrained.");
            return Err(SolveError::Infeasible);
        }
    };

    let placed = extract::place(&allocated, &assignment)?;
    let violations = audit::hard_violations(&placed, &preferences, config);
    if !violations.is_empty() {
        for violation in &violations {
            error!("{}", violation);
        }
        return Err(SolveError::Backend(format!(
            "{} returned a timetable with {} violations",
            backend.name(),
            violations.len()
        )));
    }
    let overlaps = audit::overlaps(&placed, config);
    for overlap in &overlaps {
        warn!("{}", overlap);
    }
    let schedule = extract::render(&placed, config)?;

    let duration = start_time.elapsed();
    info!("Scheduled {} sessions in {:.2?}", schedule.len(), duration);
    Ok(SchedulingOutput {
        schedule,
        overlaps,
        backend: backend.name().to_string(),
        elapsed_ms: duration.as_millis() as u64,
    })
}

/// Pre-extracted preferences merged with those mined from raw reservations.
pub fn collect_preferences(input: &SchedulingInput, config: &EngineConfig) -> PreferenceSet {
    let mut preferences = PreferenceSet::from_entries(&input.preferences, &config.catalog);
    if !input.reservations.is_empty() {
        preferences.merge(preferences::extract(&input.reservations, &config.catalog));
    }
    preferences
}
