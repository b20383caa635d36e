use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

// Indices into the catalogs; every decision variable ranges over one of these.
pub type DayIndex = usize;
pub type SlotIndex = usize;
pub type RoomIndex = usize;

/// A course offering to be placed in every period it is valid in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOffering {
    pub code: String,
    pub teacher: String,
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub starts: Option<NaiveDateTime>,
    #[serde(default)]
    pub ends: Option<NaiveDateTime>,
}

/// A named academic term covering the closed date range `start..=end`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AcademicPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AcademicPeriod {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    /// True when `start..=end` lies entirely inside this period.
    pub fn contains(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start >= self.start && end <= self.end
    }

    /// True when `start..=end` shares at least one day with this period.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }
}

/// One teaching interval of the weekly grid, e.g. 08:00–09:45.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Inclusive on both ends, so a booking starting exactly at `end` still matches.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn label(&self) -> String {
        format!("{}–{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// The closed enumerations every variable domain indexes into.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    pub rooms: Vec<String>,
    pub days: Vec<String>,
    pub slots: Vec<TimeSlot>,
}

impl Catalog {
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Index of the first slot whose interval contains `t`.
    pub fn slot_at(&self, t: NaiveTime) -> Option<SlotIndex> {
        self.slots.iter().position(|slot| slot.contains(t))
    }
}

/// A course category held to a single meeting at a literal day, slot and room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedCourse {
    pub code: String,
    pub day: DayIndex,
    pub slot: SlotIndex,
    pub room: RoomIndex,
    pub display_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreferenceKey {
    pub course_code: String,
    pub teacher: String,
}

impl PreferenceKey {
    pub fn new(course_code: impl Into<String>, teacher: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            teacher: teacher.into(),
        }
    }
}

/// A (day, slot) pair in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlotRef {
    pub day: DayIndex,
    pub slot: SlotIndex,
}

/// Wire form of one `PreferenceSet` key and its pairs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceEntry {
    pub course_code: String,
    pub teacher: String,
    pub slots: Vec<SlotRef>,
}

/// Preferred (day, slot) pairs per (course code, teacher).
///
/// Pairs are kept in a `BTreeSet` so that the disjunctions built from them
/// come out in the same order on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSet {
    pairs: HashMap<PreferenceKey, BTreeSet<(DayIndex, SlotIndex)>>,
}

impl PreferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PreferenceKey, day: DayIndex, slot: SlotIndex) {
        self.pairs.entry(key).or_default().insert((day, slot));
    }

    /// Preferred pairs for a course and teacher; `None` when nothing was recorded.
    pub fn get(
        &self,
        course_code: &str,
        teacher: &str,
    ) -> Option<&BTreeSet<(DayIndex, SlotIndex)>> {
        self.pairs
            .get(&PreferenceKey::new(course_code, teacher))
            .filter(|set| !set.is_empty())
    }

    pub fn merge(&mut self, other: PreferenceSet) {
        for (key, set) in other.pairs {
            self.pairs.entry(key).or_default().extend(set);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Builds a set from wire entries, dropping pairs outside the catalog.
    pub fn from_entries(entries: &[PreferenceEntry], catalog: &Catalog) -> Self {
        let mut set = Self::new();
        for entry in entries {
            for slot_ref in &entry.slots {
                if slot_ref.day >= catalog.day_count() || slot_ref.slot >= catalog.slot_count() {
                    warn!(
                        "Dropping preference ({}, {}) for {} / {}: outside the weekly grid",
                        slot_ref.day, slot_ref.slot, entry.course_code, entry.teacher
                    );
                    continue;
                }
                set.insert(
                    PreferenceKey::new(entry.course_code.as_str(), entry.teacher.as_str()),
                    slot_ref.day,
                    slot_ref.slot,
                );
            }
        }
        set
    }

    pub fn to_entries(&self) -> Vec<PreferenceEntry> {
        let mut entries: Vec<PreferenceEntry> = self
            .pairs
            .iter()
            .map(|(key, set)| PreferenceEntry {
                course_code: key.course_code.clone(),
                teacher: key.teacher.clone(),
                slots: set.iter().map(|&(day, slot)| SlotRef { day, slot }).collect(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.course_code, &a.teacher).cmp(&(&b.course_code, &b.teacher)));
        entries
    }
}

/// A raw room booking from which teacher preferences are mined.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRecord {
    #[serde(default)]
    pub course_version: String,
    #[serde(default)]
    pub booked_for: String,
    #[serde(default)]
    pub starts: String,
}

/// The complete input for one solve.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub offerings: Vec<CourseOffering>,
    #[serde(default)]
    pub preferences: Vec<PreferenceEntry>,
    #[serde(default)]
    pub reservations: Vec<ReservationRecord>,
}

/// One placed weekly meeting, in display form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub course_code: String,
    pub course_name: String,
    pub teacher: String,
    pub period: String,
    pub day: String,
    pub time: String,
    pub room: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlapKind {
    Teacher,
    Group,
}

/// Two sessions of the same teacher or group meeting at the same day and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlap {
    pub kind: OverlapKind,
    pub period: String,
    pub day: String,
    pub time: String,
    pub first: String,
    pub second: String,
    pub description: String,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            OverlapKind::Teacher => "Teacher Overlap",
            OverlapKind::Group => "Group Overlap",
        };
        write!(f, "[{}] {}", kind, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub schedule: Vec<ScheduleEntry>,
    pub overlaps: Vec<Overlap>,
    pub backend: String,
    pub elapsed_ms: u64,
}

/// Keeps the first offering per course code.
pub fn dedup_offerings(offerings: &[CourseOffering]) -> Vec<CourseOffering> {
    let mut seen = HashSet::new();
    offerings
        .iter()
        .filter(|offering| {
            let fresh = seen.insert(offering.code.as_str());
            if !fresh {
                warn!("Dropping duplicate offering for course {}", offering.code);
            }
            fresh
        })
        .cloned()
        .collect()
}
