use log::{debug, info};

use crate::config::{EngineConfig, check_pin};
use crate::data::{Catalog, PreferenceSet};
use crate::error::SolveError;
use crate::model::{Constraint, ConstraintModel, SessionSlot};
use crate::variables::OfferingSessions;

/// Adds the per-offering constraints: catalog bounds, distinct meeting days,
/// the fixed-course pin and teacher preferences.
///
/// A fixed pin outside the catalog fails with `DomainViolation` before
/// anything is added for that offering.
pub fn build(
    allocated: &[OfferingSessions<'_>],
    preferences: &PreferenceSet,
    config: &EngineConfig,
    model: &mut ConstraintModel,
) -> Result<(), SolveError> {
    let catalog = &config.catalog;
    let before = model.constraints().len();

    for entry in allocated {
        for session in &entry.sessions {
            add_bounds(model, session, catalog);
        }

        if let [first, second] = entry.sessions.as_slice() {
            // The day inequality alone is decisive; the weaker clause is kept alongside it.
            model.add(Constraint::AnyDiffers(vec![
                (first.day, second.day),
                (first.slot, second.slot),
            ]));
            model.add(Constraint::Differs(first.day, second.day));
        }

        if let Some(fixed) = config.fixed_course.as_ref().filter(|f| f.code == entry.code()) {
            check_pin("fixed day", fixed.day, catalog.day_count())?;
            check_pin("fixed slot", fixed.slot, catalog.slot_count())?;
            check_pin("fixed room", fixed.room, catalog.room_count())?;
            let first = &entry.sessions[0];
            model.add(Constraint::Equals {
                var: first.day,
                value: fixed.day as i64,
            });
            model.add(Constraint::Equals {
                var: first.slot,
                value: fixed.slot as i64,
            });
            model.add(Constraint::Equals {
                var: first.room,
                value: fixed.room as i64,
            });
            continue;
        }

        match preferences.get(&entry.offering.code, &entry.offering.teacher) {
            Some(preferred) => {
                let pairs: Vec<(i64, i64)> = preferred
                    .iter()
                    .map(|&(day, slot)| (day as i64, slot as i64))
                    .collect();
                for session in &entry.sessions {
                    model.add(Constraint::AllowedPairs {
                        first: session.day,
                        second: session.slot,
                        pairs: pairs.clone(),
                    });
                }
            }
            None => debug!(
                "No preferences for {} / {}, leaving {} unconstrained",
                entry.offering.code, entry.offering.teacher, entry.period
            ),
        }
    }

    info!(
        "Added {} offering constraints for {} offering-periods",
        model.constraints().len() - before,
        allocated.len()
    );
    Ok(())
}

fn add_bounds(model: &mut ConstraintModel, session: &SessionSlot, catalog: &Catalog) {
    let within = |var, count: usize| Constraint::Within {
        var,
        min: 0,
        max: count as i64 - 1,
    };
    model.add(within(session.day, catalog.day_count()));
    model.add(within(session.slot, catalog.slot_count()));
    model.add(within(session.room, catalog.room_count()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CourseOffering, PreferenceKey};
    use crate::variables::allocate;

    fn offering(code: &str, teacher: &str) -> CourseOffering {
        CourseOffering {
            code: code.into(),
            teacher: teacher.into(),
            group: "G".into(),
            name: code.into(),
            starts: None,
            ends: None,
        }
    }

    fn count(model: &ConstraintModel, pred: impl Fn(&Constraint) -> bool) -> usize {
        model.constraints().iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_ordinary_course_constraints() {
        let config = EngineConfig::default();
        let course = offering("IT00AA01", "Smith");
        let mut model = ConstraintModel::new();
        let resolved = [(&course, vec!["2023-P1".to_string()])];
        let allocated = allocate(&resolved, &config, &mut model).unwrap();
        build(&allocated, &PreferenceSet::new(), &config, &mut model).unwrap();

        assert_eq!(count(&model, |c| matches!(c, Constraint::Within { .. })), 6);
        assert_eq!(count(&model, |c| matches!(c, Constraint::Differs(..))), 1);
        assert_eq!(count(&model, |c| matches!(c, Constraint::AnyDiffers(p) if p.len() == 2)), 1);
        assert_eq!(count(&model, |c| matches!(c, Constraint::AllowedPairs { .. })), 0);
        assert_eq!(model.domains().unwrap()[0], 0..=4);
        assert_eq!(model.domains().unwrap()[2], 0..=3);
    }

    #[test]
    fn test_preferences_constrain_every_session() {
        let config = EngineConfig::default();
        let course = offering("IT00AA01", "Smith");
        let mut prefs = PreferenceSet::new();
        prefs.insert(PreferenceKey::new("IT00AA01", "Smith"), 1, 2);
        prefs.insert(PreferenceKey::new("IT00AA01", "Smith"), 3, 0);
        let mut model = ConstraintModel::new();
        let resolved = [(&course, vec!["2023-P1".to_string()])];
        let allocated = allocate(&resolved, &config, &mut model).unwrap();
        build(&allocated, &prefs, &config, &mut model).unwrap();

        let allowed: Vec<_> = model
            .constraints()
            .iter()
            .filter_map(|c| match c {
                Constraint::AllowedPairs { pairs, .. } => Some(pairs.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(allowed, vec![vec![(1, 2), (3, 0)], vec![(1, 2), (3, 0)]]);
    }

    #[test]
    fn test_fixed_course_is_pinned_and_ignores_preferences() {
        let config = EngineConfig::default();
        let course = offering("IT00CD42", "Smith");
        let mut prefs = PreferenceSet::new();
        prefs.insert(PreferenceKey::new("IT00CD42", "Smith"), 0, 0);
        let mut model = ConstraintModel::new();
        let resolved = [(&course, vec!["2023-P1".to_string()])];
        let allocated = allocate(&resolved, &config, &mut model).unwrap();
        build(&allocated, &prefs, &config, &mut model).unwrap();

        let session = &allocated[0].sessions[0];
        assert!(model.constraints().contains(&Constraint::Equals { var: session.day, value: 4 }));
        assert!(model.constraints().contains(&Constraint::Equals { var: session.slot, value: 0 }));
        assert!(model.constraints().contains(&Constraint::Equals { var: session.room, value: 0 }));
        assert_eq!(count(&model, |c| matches!(c, Constraint::AllowedPairs { .. })), 0);
        assert_eq!(count(&model, |c| matches!(c, Constraint::Differs(..))), 0);
    }

    #[test]
    fn test_pin_outside_catalog_fails_fast() {
        let mut config = EngineConfig::default();
        if let Some(fixed) = config.fixed_course.as_mut() {
            fixed.day = 5;
        }
        let course = offering("IT00CD42", "Smith");
        let mut model = ConstraintModel::new();
        let resolved = [(&course, vec!["2023-P1".to_string()])];
        let allocated = allocate(&resolved, &config, &mut model).unwrap();
        let result = build(&allocated, &PreferenceSet::new(), &config, &mut model);
        assert!(matches!(
            result,
            Err(SolveError::DomainViolation { value: 5, bound: 5, .. })
        ));
    }
}
