//! Maps an offering's date range onto the academic period table.

use chrono::NaiveDateTime;
use log::{debug, trace};

use crate::data::{AcademicPeriod, CourseOffering};

/// Returns the labels of the periods an offering running `starts..=ends` is valid in.
///
/// Every period that fully contains the range is returned. When none does,
/// only the first period in table order that overlaps the range is returned,
/// so an offering straddling a boundary is counted once. A missing or
/// inverted range resolves to nothing.
pub fn resolve(
    starts: Option<NaiveDateTime>,
    ends: Option<NaiveDateTime>,
    periods: &[AcademicPeriod],
) -> Vec<String> {
    let (Some(starts), Some(ends)) = (starts, ends) else {
        return Vec::new();
    };
    let (start, end) = (starts.date(), ends.date());
    if start > end {
        return Vec::new();
    }

    let containing: Vec<String> = periods
        .iter()
        .filter(|period| period.contains(start, end))
        .map(|period| period.label.clone())
        .collect();
    if !containing.is_empty() {
        return containing;
    }

    periods
        .iter()
        .find(|period| period.overlaps(start, end))
        .map(|period| {
            trace!("{}..{} straddles periods, falling back to {}", start, end, period.label);
            vec![period.label.clone()]
        })
        .unwrap_or_default()
}

/// Resolves every offering, dropping those with no valid period.
pub fn resolve_all<'a>(
    offerings: &'a [CourseOffering],
    periods: &[AcademicPeriod],
) -> Vec<(&'a CourseOffering, Vec<String>)> {
    offerings
        .iter()
        .filter_map(|offering| {
            let labels = resolve(offering.starts, offering.ends, periods);
            if labels.is_empty() {
                debug!("Course {} resolves to no academic period, skipping", offering.code);
                None
            } else {
                Some((offering, labels))
            }
        })
        .collect()
}
