use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One calendar-activity row: total active time for a (student, date) pair.
/// `duration_minutes` is already normalized from 30-second blocks at load.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub date_key: NaiveDate,
    pub student_id: String,
    pub course_id: String,
    pub duration_minutes: i64,
    pub display_name: String,
}

/// One logged interaction with a course activity item (lab step).
/// `item_id` is a slash-delimited path; records without one are excluded
/// from all aggregation.
#[derive(Debug, Clone)]
pub struct LearningRecord {
    pub course_id: String,
    pub student_id: String,
    pub display_name: String,
    pub item_id: Option<String>,
    pub duration_minutes: Option<i64>,
    pub accessed_at: Option<DateTime<Utc>>,
}

/// One dense per-entity row of a pivoted table.
/// Invariant: `total == buckets.values().sum()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotedRow {
    pub entity_id: String,
    pub display_name: String,
    pub total: i64,
    pub buckets: BTreeMap<String, i64>,
}

/// Pivoted table: the global distinct bucket key set plus one row per entity.
/// Every row's buckets are zero-filled over `keys`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PivotedTable {
    pub keys: Vec<String>,
    pub rows: Vec<PivotedRow>,
}

impl PivotedTable {
    pub fn row(&self, entity_id: &str) -> Option<&PivotedRow> {
        self.rows.iter().find(|r| r.entity_id == entity_id)
    }

    /// A zero-valued row aligned with this table's key set, for entities with
    /// no recorded activity.
    pub fn empty_row(&self, entity_id: &str, display_name: &str) -> PivotedRow {
        PivotedRow {
            entity_id: entity_id.to_string(),
            display_name: display_name.to_string(),
            total: 0,
            buckets: self.keys.iter().map(|k| (k.clone(), 0)).collect(),
        }
    }
}

/// Cohort summary row: one median value per bucket plus an overall total,
/// both medians rather than sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub scope_id: String,
    pub total: i64,
    pub buckets: BTreeMap<String, i64>,
}
