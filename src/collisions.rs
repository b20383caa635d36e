use itertools::Itertools;
use log::info;

use crate::config::CollisionPolicy;
use crate::model::{Constraint, ConstraintModel, SessionSlot};
use crate::variables::OfferingSessions;

/// Adds clash-avoidance constraints between offerings sharing a period.
///
/// Two sessions at the same day and slot must use different rooms. That is
/// the only rule under `RoomOnly`, whether or not the offerings share a
/// teacher or a group. `Exclusive` also keeps sessions of the same teacher
/// or group off the same day and slot altogether.
///
/// Sessions are bucketed by period first, so offerings in different periods
/// are never compared. Returns the number of constraints added.
pub fn generate(
    allocated: &[OfferingSessions<'_>],
    policy: CollisionPolicy,
    model: &mut ConstraintModel,
) -> usize {
    let before = model.constraints().len();
    let mut buckets: Vec<(&str, Vec<&OfferingSessions<'_>>)> = allocated
        .iter()
        .into_group_map_by(|entry| entry.period.as_str())
        .into_iter()
        .collect();
    buckets.sort_by_key(|(period, _)| *period);

    for (_, bucket) in &buckets {
        for (a, b) in bucket.iter().tuple_combinations() {
            let shares_people = a.offering.teacher == b.offering.teacher
                || a.offering.group == b.offering.group;
            for (x, y) in a.sessions.iter().cartesian_product(&b.sessions) {
                model.add(room_clash(x, y));
                if policy == CollisionPolicy::Exclusive && shares_people {
                    model.add(Constraint::AnyDiffers(vec![(x.day, y.day), (x.slot, y.slot)]));
                }
            }
        }
    }

    let added = model.constraints().len() - before;
    info!("Added {} collision constraints across {} periods", added, buckets.len());
    added
}

/// Same day and slot implies different rooms.
fn room_clash(x: &SessionSlot, y: &SessionSlot) -> Constraint {
    Constraint::AnyDiffers(vec![(x.day, y.day), (x.slot, y.slot), (x.room, y.room)])
}
