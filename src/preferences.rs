//! Mines teacher time preferences from room reservation records.

use chrono::{Datelike, NaiveDateTime};
use log::{debug, info};

use crate::data::{Catalog, DayIndex, PreferenceKey, PreferenceSet, ReservationRecord, SlotIndex};

/// Timestamp layout used by the reservation export, e.g. `18.09.2023 10.15`.
pub const RESERVATION_TIME_FORMAT: &str = "%d.%m.%Y %H.%M";

/// Builds the preference set from reservation records.
///
/// Records that cannot be read are skipped: a course version without `-`,
/// an empty teacher, an unparsable start, a weekend day or a start time
/// outside every slot.
pub fn extract(records: &[ReservationRecord], catalog: &Catalog) -> PreferenceSet {
    let mut preferences = PreferenceSet::new();
    let mut skipped = 0usize;
    for record in records {
        match parse_record(record, catalog) {
            Some((key, day, slot)) => preferences.insert(key, day, slot),
            None => {
                skipped += 1;
                debug!("Skipping reservation {:?}", record);
            }
        }
    }
    info!(
        "Extracted preferences for {} course/teacher pairs from {} reservations ({} skipped)",
        preferences.len(),
        records.len(),
        skipped
    );
    preferences
}

fn parse_record(
    record: &ReservationRecord,
    catalog: &Catalog,
) -> Option<(PreferenceKey, DayIndex, SlotIndex)> {
    let course_version = record.course_version.trim();
    let teacher = record.booked_for.trim();
    let starts = record.starts.trim();
    if teacher.is_empty() || starts.is_empty() {
        return None;
    }
    let (code, _) = course_version.split_once('-')?;

    let start = NaiveDateTime::parse_from_str(starts, RESERVATION_TIME_FORMAT).ok()?;
    let day = start.weekday().num_days_from_monday() as DayIndex;
    if day >= catalog.day_count() {
        return None;
    }
    let slot = catalog.slot_at(start.time())?;
    Some((PreferenceKey::new(code.trim(), teacher), day, slot))
}
