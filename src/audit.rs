//! Checks on a solved timetable.

use itertools::Itertools;

use crate::config::EngineConfig;
use crate::data::{Overlap, OverlapKind, PreferenceSet};
use crate::extract::{self, PlacedSession};

/// Lists every hard invariant a placed timetable breaks. Empty for any
/// timetable a backend accepted.
pub fn hard_violations(
    placed: &[PlacedSession<'_>],
    preferences: &PreferenceSet,
    config: &EngineConfig,
) -> Vec<String> {
    let catalog = &config.catalog;
    let mut violations = Vec::new();

    for session in placed {
        if session.day >= catalog.day_count()
            || session.slot >= catalog.slot_count()
            || session.room >= catalog.room_count()
        {
            violations.push(format!(
                "{} is placed outside the catalog at ({}, {}, {})",
                session.key, session.day, session.slot, session.room
            ));
        }
        match config.fixed_course.as_ref().filter(|f| f.code == session.offering.code) {
            Some(fixed) => {
                let at = (session.day, session.slot, session.room);
                if at != (fixed.day, fixed.slot, fixed.room) {
                    violations.push(format!("{} is not at its fixed slot", session.key));
                }
            }
            None => {
                let offering = session.offering;
                let preferred = preferences.get(&offering.code, &offering.teacher);
                if preferred.is_some_and(|set| !set.contains(&(session.day, session.slot))) {
                    violations.push(format!("{} ignores its teacher's preferences", session.key));
                }
            }
        }
    }

    let by_offering = placed
        .iter()
        .into_group_map_by(|s| (s.key.course_code.as_str(), s.key.period.as_str()));
    for ((code, period), sessions) in by_offering {
        if sessions.iter().map(|s| s.day).all_unique() {
            continue;
        }
        violations.push(format!("{} meets twice on the same day in {}", code, period));
    }

    let by_cell = placed
        .iter()
        .into_group_map_by(|s| (s.key.period.as_str(), s.day, s.slot, s.room));
    for ((period, day, slot, room), sessions) in by_cell {
        if sessions.len() > 1 {
            violations.push(format!(
                "Room {} is double-booked in {} at ({}, {}): {}",
                room,
                period,
                day,
                slot,
                sessions.iter().map(|s| s.key.to_string()).join(", ")
            ));
        }
    }

    violations.sort();
    violations
}

/// Sessions sharing a teacher or group at the same day and slot in
/// different rooms. Room-only collision handling allows these.
pub fn overlaps(placed: &[PlacedSession<'_>], config: &EngineConfig) -> Vec<Overlap> {
    let catalog = &config.catalog;
    let mut found = Vec::new();

    let by_time = placed
        .iter()
        .into_group_map_by(|s| (s.key.period.as_str(), s.day, s.slot));
    for ((period, day, _), sessions) in by_time {
        for (a, b) in sessions.iter().tuple_combinations() {
            let day_name = catalog.days.get(day).cloned().unwrap_or_default();
            let fixed_b = config.is_fixed(&b.offering.code);
            let shown = if fixed_b { b } else { a };
            let time = extract::time_label(shown, config).unwrap_or_default();
            let mut report = |kind, who: &str| {
                found.push(Overlap {
                    kind,
                    period: period.to_string(),
                    day: day_name.clone(),
                    time: time.clone(),
                    first: a.offering.code.clone(),
                    second: b.offering.code.clone(),
                    description: format!(
                        "{} has {} and {} at the same time on {} {} in {}",
                        who, a.offering.code, b.offering.code, day_name, time, period
                    ),
                });
            };
            if a.offering.teacher == b.offering.teacher {
                report(OverlapKind::Teacher, &a.offering.teacher);
            }
            if a.offering.group == b.offering.group {
                report(OverlapKind::Group, &a.offering.group);
            }
        }
    }

    found.sort_by_key(|o| (o.period.clone(), o.first.clone(), o.second.clone(), o.kind as u8));
    found
}
