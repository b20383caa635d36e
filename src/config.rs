use chrono::{NaiveDate, NaiveTime};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::data::{AcademicPeriod, Catalog, FixedCourse, TimeSlot};
use crate::error::{ConfigError, SolveError};

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "TIMETABLE_CONFIG";

/// What sessions sharing a day and slot are kept apart by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionPolicy {
    /// Sessions at the same day and slot only need different rooms, even
    /// when they share a teacher or a group.
    #[default]
    RoomOnly,
    /// Sessions sharing a teacher or a group may not meet at the same day
    /// and slot at all.
    Exclusive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    #[default]
    Highs,
    Search,
}

/// Immutable engine configuration, loaded once and shared by reference.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub catalog: Catalog,
    pub periods: Vec<AcademicPeriod>,
    pub fixed_course: Option<FixedCourse>,
    pub collision_policy: CollisionPolicy,
    pub backend: BackendKind,
    pub time_limit_secs: Option<f64>,
    pub bind_addr: String,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog {
                rooms: ["Agora 110AB", "Agora 115A", "Agora XX", "Quantum 111+112"]
                    .map(String::from)
                    .to_vec(),
                days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                    .map(String::from)
                    .to_vec(),
                slots: vec![
                    TimeSlot::new(hm(8, 0), hm(9, 45)),
                    TimeSlot::new(hm(10, 0), hm(11, 45)),
                    TimeSlot::new(hm(12, 0), hm(13, 45)),
                    TimeSlot::new(hm(14, 0), hm(15, 45)),
                ],
            },
            periods: vec![
                AcademicPeriod::new("2022-P1", date(2022, 9, 5), date(2022, 10, 30)),
                AcademicPeriod::new("2022-P2", date(2022, 10, 31), date(2022, 12, 18)),
                AcademicPeriod::new("2023-P3", date(2023, 1, 9), date(2023, 3, 19)),
                AcademicPeriod::new("2023-P4", date(2023, 3, 20), date(2023, 5, 28)),
                AcademicPeriod::new("2023-P1", date(2023, 9, 4), date(2023, 10, 29)),
                AcademicPeriod::new("2023-P2", date(2023, 10, 30), date(2023, 12, 17)),
                AcademicPeriod::new("2024-P3", date(2024, 1, 8), date(2024, 3, 17)),
                AcademicPeriod::new("2024-P4", date(2024, 3, 18), date(2024, 5, 26)),
            ],
            fixed_course: Some(FixedCourse {
                code: "IT00CD42".into(),
                day: 4,
                slot: 0,
                room: 0,
                display_time: "08:30–11:30".into(),
            }),
            collision_policy: CollisionPolicy::default(),
            backend: BackendKind::default(),
            time_limit_secs: None,
            bind_addr: "127.0.0.1:8080".into(),
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON configuration file. Missing fields take
    /// their reference values.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Loads the file named by `TIMETABLE_CONFIG`, or the reference deployment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(path),
            None => {
                info!("{} not set, using the reference configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn is_fixed(&self, code: &str) -> bool {
        self.fixed_course.as_ref().is_some_and(|fixed| fixed.code == code)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let catalog = &self.catalog;
        if catalog.rooms.is_empty() || catalog.days.is_empty() || catalog.slots.is_empty() {
            return Err(ConfigError::Invalid(
                "rooms, days and slots must all be non-empty".into(),
            ));
        }
        if let Some(slot) = catalog.slots.iter().find(|slot| slot.start > slot.end) {
            return Err(ConfigError::Invalid(format!(
                "time slot {} ends before it starts",
                slot.label()
            )));
        }
        if let Some(period) = self.periods.iter().find(|p| p.start > p.end) {
            return Err(ConfigError::Invalid(format!(
                "period {} ends before it starts",
                period.label
            )));
        }
        if let Some(label) = self.periods.iter().map(|p| &p.label).duplicates().next() {
            return Err(ConfigError::Invalid(format!("period {} is listed twice", label)));
        }
        if let Some(fixed) = &self.fixed_course {
            check_pin("fixed day", fixed.day, catalog.day_count())?;
            check_pin("fixed slot", fixed.slot, catalog.slot_count())?;
            check_pin("fixed room", fixed.room, catalog.room_count())?;
        }
        Ok(())
    }
}

/// Fails when a literal does not index into a catalog of `bound` entries.
pub fn check_pin(what: &str, value: usize, bound: usize) -> Result<(), SolveError> {
    if value >= bound {
        return Err(SolveError::DomainViolation {
            what: what.to_string(),
            value,
            bound,
        });
    }
    Ok(())
}
