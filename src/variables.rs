use log::trace;

use crate::config::EngineConfig;
use crate::data::CourseOffering;
use crate::error::SolveError;
use crate::model::{ConstraintModel, Field, SessionKey, SessionSlot, VarKey};

/// Weekly meetings of an ordinary course.
pub const SESSIONS_PER_WEEK: u8 = 2;

/// The sessions allocated for one offering in one of its periods.
#[derive(Debug, Clone)]
pub struct OfferingSessions<'a> {
    pub offering: &'a CourseOffering,
    pub period: String,
    pub sessions: Vec<SessionSlot>,
}

impl OfferingSessions<'_> {
    pub fn code(&self) -> &str {
        &self.offering.code
    }
}

/// Declares day, slot and room variables for every (offering, period) pair.
///
/// Ordinary courses get two sessions, the fixed-schedule course one.
pub fn allocate<'a>(
    resolved: &[(&'a CourseOffering, Vec<String>)],
    config: &EngineConfig,
    model: &mut ConstraintModel,
) -> Result<Vec<OfferingSessions<'a>>, SolveError> {
    let mut allocated = Vec::new();
    for (offering, periods) in resolved {
        let count = if config.is_fixed(&offering.code) {
            1
        } else {
            SESSIONS_PER_WEEK
        };
        for period in periods {
            let sessions = (1..=count)
                .map(|index| {
                    let key = SessionKey::new(offering.code.as_str(), period.as_str(), index);
                    declare_session(model, key)
                })
                .collect::<Result<Vec<_>, _>>()?;
            trace!("Allocated {} session(s) for {} in {}", sessions.len(), offering.code, period);
            allocated.push(OfferingSessions {
                offering,
                period: period.clone(),
                sessions,
            });
        }
    }
    Ok(allocated)
}

fn declare_session(
    model: &mut ConstraintModel,
    key: SessionKey,
) -> Result<SessionSlot, SolveError> {
    let mut var = |field| {
        model.declare(VarKey {
            session: key.clone(),
            field,
        })
    };
    let day = var(Field::Day)?;
    let slot = var(Field::Slot)?;
    let room = var(Field::Room)?;
    Ok(SessionSlot { key, day, slot, room })
}
