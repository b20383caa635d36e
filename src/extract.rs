use crate::config::EngineConfig;
use crate::data::{CourseOffering, DayIndex, RoomIndex, ScheduleEntry, SlotIndex};
use crate::error::SolveError;
use crate::model::{Assignment, SessionKey, VarId};
use crate::variables::OfferingSessions;

/// A session with its solved catalog indices.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSession<'a> {
    pub offering: &'a CourseOffering,
    pub key: SessionKey,
    pub day: DayIndex,
    pub slot: SlotIndex,
    pub room: RoomIndex,
}

/// Reads every session's day, slot and room out of a solved assignment.
pub fn place<'a>(
    allocated: &[OfferingSessions<'a>],
    assignment: &Assignment,
) -> Result<Vec<PlacedSession<'a>>, SolveError> {
    let read = |var: VarId, what: &str| {
        let value = assignment.value(var);
        usize::try_from(value)
            .map_err(|_| SolveError::Backend(format!("{} has negative value {}", what, value)))
    };
    let mut placed = Vec::new();
    for entry in allocated {
        for session in &entry.sessions {
            placed.push(PlacedSession {
                offering: entry.offering,
                key: session.key.clone(),
                day: read(session.day, "day")?,
                slot: read(session.slot, "slot")?,
                room: read(session.room, "room")?,
            });
        }
    }
    Ok(placed)
}

/// The time shown for a session: the fixed-schedule course's own display
/// time, otherwise the label of its slot.
pub fn time_label(session: &PlacedSession<'_>, config: &EngineConfig) -> Option<String> {
    match config.fixed_course.as_ref().filter(|f| f.code == session.offering.code) {
        Some(fixed) => Some(fixed.display_time.clone()),
        None => config.catalog.slots.get(session.slot).map(|slot| slot.label()),
    }
}

/// Turns placed sessions into display entries.
pub fn render(
    placed: &[PlacedSession<'_>],
    config: &EngineConfig,
) -> Result<Vec<ScheduleEntry>, SolveError> {
    let catalog = &config.catalog;
    let lookup = |names: &[String], index: usize, what: &str| {
        names.get(index).cloned().ok_or_else(|| SolveError::DomainViolation {
            what: what.to_string(),
            value: index,
            bound: names.len(),
        })
    };

    placed
        .iter()
        .map(|session| -> Result<ScheduleEntry, SolveError> {
            let time = time_label(session, config).ok_or_else(|| SolveError::DomainViolation {
                what: "slot".into(),
                value: session.slot,
                bound: catalog.slot_count(),
            })?;
            Ok(ScheduleEntry {
                course_code: session.offering.code.clone(),
                course_name: session.offering.name.clone(),
                teacher: session.offering.teacher.clone(),
                period: session.key.period.clone(),
                day: lookup(&catalog.days, session.day, "day")?,
                time,
                room: lookup(&catalog.rooms, session.room, "room")?,
            })
        })
        .collect()
}
