//! Solver-neutral constraint store.
//!
//! Variables are bounded integers identified by a typed [`VarKey`]; the
//! constraint vocabulary is the small set of forms the timetable needs.
//! Backends in [`crate::backend`] lower the same store to their own encoding.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::SolveError;

/// Identity of one weekly meeting of an offering within one period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionKey {
    pub course_code: String,
    pub period: String,
    pub index: u8,
}

impl SessionKey {
    pub fn new(course_code: impl Into<String>, period: impl Into<String>, index: u8) -> Self {
        Self {
            course_code: course_code.into(),
            period: period.into(),
            index,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.course_code, self.period, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    Day,
    Slot,
    Room,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarKey {
    pub session: SessionKey,
    pub field: Field,
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            Field::Day => "day",
            Field::Slot => "slot",
            Field::Room => "room",
        };
        write!(f, "{}.{}", self.session, field)
    }
}

/// Dense handle of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The three decision variables of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSlot {
    pub key: SessionKey,
    pub day: VarId,
    pub slot: VarId,
    pub room: VarId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `min <= var <= max`
    Within { var: VarId, min: i64, max: i64 },
    /// `var == value`
    Equals { var: VarId, value: i64 },
    /// `a != b`
    Differs(VarId, VarId),
    /// At least one pair holds different values. `Implies(a1 == b1 && a2 == b2, a3 != b3)`
    /// is written as `AnyDiffers([(a1, b1), (a2, b2), (a3, b3)])`.
    AnyDiffers(Vec<(VarId, VarId)>),
    /// `(first, second)` equals one of `pairs`.
    AllowedPairs {
        first: VarId,
        second: VarId,
        pairs: Vec<(i64, i64)>,
    },
}

impl Constraint {
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Constraint::Within { var, .. } | Constraint::Equals { var, .. } => vec![*var],
            Constraint::Differs(a, b) => vec![*a, *b],
            Constraint::AnyDiffers(pairs) => pairs.iter().flat_map(|&(a, b)| [a, b]).collect(),
            Constraint::AllowedPairs { first, second, .. } => vec![*first, *second],
        }
    }

    /// False only when the partial assignment already violates the constraint.
    pub fn consistent(&self, values: &[Option<i64>]) -> bool {
        let get = |var: &VarId| values[var.index()];
        match self {
            Constraint::Within { var, min, max } => get(var).is_none_or(|v| *min <= v && v <= *max),
            Constraint::Equals { var, value } => get(var).is_none_or(|v| v == *value),
            Constraint::Differs(a, b) => match (get(a), get(b)) {
                (Some(x), Some(y)) => x != y,
                _ => true,
            },
            Constraint::AnyDiffers(pairs) => pairs.iter().any(|(a, b)| match (get(a), get(b)) {
                (Some(x), Some(y)) => x != y,
                _ => true,
            }),
            Constraint::AllowedPairs {
                first,
                second,
                pairs,
            } => match (get(first), get(second)) {
                (Some(x), Some(y)) => pairs.contains(&(x, y)),
                (Some(x), None) => pairs.iter().any(|&(p, _)| p == x),
                (None, Some(y)) => pairs.iter().any(|&(_, q)| q == y),
                (None, None) => !pairs.is_empty(),
            },
        }
    }
}

/// A concrete value for every declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<i64>,
}

impl Assignment {
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> i64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

/// Declared variables and every constraint over them. Written while the
/// model is built, read-only once a backend receives it.
#[derive(Debug, Default)]
pub struct ConstraintModel {
    keys: Vec<VarKey>,
    ids: HashMap<VarKey, VarId>,
    constraints: Vec<Constraint>,
}

impl ConstraintModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, key: VarKey) -> Result<VarId, SolveError> {
        if self.ids.contains_key(&key) {
            return Err(SolveError::DuplicateVariable(key));
        }
        let id = VarId(self.keys.len());
        self.ids.insert(key.clone(), id);
        self.keys.push(key);
        Ok(id)
    }

    pub fn id(&self, key: &VarKey) -> Option<VarId> {
        self.ids.get(key).copied()
    }

    pub fn key(&self, var: VarId) -> &VarKey {
        &self.keys[var.index()]
    }

    pub fn var_count(&self) -> usize {
        self.keys.len()
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Intersects every `Within` bound per variable. Each variable must have one.
    pub fn domains(&self) -> Result<Vec<RangeInclusive<i64>>, SolveError> {
        let mut bounds: Vec<Option<(i64, i64)>> = vec![None; self.keys.len()];
        for constraint in &self.constraints {
            if let Constraint::Within { var, min, max } = constraint {
                let slot = &mut bounds[var.index()];
                *slot = Some(match *slot {
                    Some((lo, hi)) => (lo.max(*min), hi.min(*max)),
                    None => (*min, *max),
                });
            }
        }
        bounds
            .into_iter()
            .enumerate()
            .map(|(i, bound)| {
                bound
                    .map(|(lo, hi)| lo..=hi)
                    .ok_or_else(|| SolveError::UnboundedVariable(self.keys[i].clone()))
            })
            .collect()
    }

    /// True when `assignment` satisfies every constraint.
    pub fn check(&self, assignment: &Assignment) -> bool {
        let values: Vec<Option<i64>> = assignment.values().iter().copied().map(Some).collect();
        values.len() == self.keys.len() && self.constraints.iter().all(|c| c.consistent(&values))
    }
}
