// src/models/assessment.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two quiz variants an assessment can be.
///
/// Questions reference their owner through a `(table_name, row_id)` pair in
/// storage; this enum is the typed form of `table_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssessmentKind {
    #[serde(rename = "tests", alias = "test")]
    Test,
    #[serde(rename = "groups", alias = "group")]
    Group,
}

impl AssessmentKind {
    /// Owner table name used by the storage layer.
    pub fn table_name(self) -> &'static str {
        match self {
            AssessmentKind::Test => "tests",
            AssessmentKind::Group => "groups",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "tests" => Some(AssessmentKind::Test),
            "groups" => Some(AssessmentKind::Group),
            _ => None,
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Identifies one assessment: its variant plus the owning row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentRef {
    pub kind: AssessmentKind,
    pub id: i64,
}

impl AssessmentRef {
    pub fn new(kind: AssessmentKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn test(id: i64) -> Self {
        Self::new(AssessmentKind::Test, id)
    }

    pub fn group(id: i64) -> Self {
        Self::new(AssessmentKind::Group, id)
    }

    /// Splits into the `(test_id, group_id)` column pair of a result row.
    pub fn as_columns(self) -> (Option<i64>, Option<i64>) {
        match self.kind {
            AssessmentKind::Test => (Some(self.id), None),
            AssessmentKind::Group => (None, Some(self.id)),
        }
    }

    /// Rebuilds the reference from a `(test_id, group_id)` column pair.
    /// Exactly one side must be set.
    pub fn from_columns(test_id: Option<i64>, group_id: Option<i64>) -> Option<Self> {
        match (test_id, group_id) {
            (Some(id), None) => Some(Self::test(id)),
            (None, Some(id)) => Some(Self::group(id)),
            _ => None,
        }
    }
}

impl fmt::Display for AssessmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
