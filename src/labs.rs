use crate::bucket::{self, date_key};
use crate::models::{LearningRecord, PivotedRow, PivotedTable, SummaryRow};
use crate::pivot::pivot_with_keys;
use crate::summary;

/// Extract the lab grouping key from a slash-delimited item id: the first
/// segment whose trimmed, lowercased form starts with "book". Falls back to
/// the whole id when no such segment exists.
pub fn extract_lab_id(item_id: &str) -> String {
    for segment in item_id.split('/') {
        let trimmed = segment.trim();
        if trimmed.to_lowercase().starts_with("book") {
            return trimmed.to_string();
        }
    }
    item_id.to_string()
}

/// Last non-empty slash-delimited segment of an item id, e.g.
/// "path/to/book-1/step-1" -> "step-1".
pub fn extract_step_name(item_id: &str) -> String {
    item_id
        .split('/')
        .filter(|s| !s.trim().is_empty())
        .next_back()
        .unwrap_or(item_id)
        .to_string()
}

/// Lab engagement views for one course: per-student tables bucketed by lab
/// and by step, plus the cohort median rows. Records without an item id are
/// excluded throughout.
#[derive(Debug, Clone, Default)]
pub struct LabModel {
    pub course_id: String,
    pub labs: Vec<String>,
    pub steps: Vec<String>,
    pub lab: PivotedTable,
    pub step: PivotedTable,
    pub median_by_lab: Option<SummaryRow>,
    pub median_by_step: Option<SummaryRow>,
    pub error: Option<String>,
}

impl LabModel {
    pub fn build(records: &[LearningRecord], error: Option<String>) -> Self {
        let valid: Vec<&LearningRecord> =
            records.iter().filter(|r| r.item_id.is_some()).collect();

        let course_id = valid
            .first()
            .map(|r| r.course_id.clone())
            .unwrap_or_default();

        let labs = bucket::distinct_sorted(
            valid
                .iter()
                .filter_map(|r| r.item_id.as_deref())
                .map(extract_lab_id),
        );
        let steps = bucket::distinct_sorted(
            valid.iter().filter_map(|r| r.item_id.clone()),
        );

        let lab = pivot_with_keys(
            &valid,
            &labs,
            |r| Some(r.student_id.clone()),
            |r| r.item_id.as_deref().map(extract_lab_id),
            |r| Some(r.display_name.clone()),
            |r| r.duration_minutes.unwrap_or(0),
        );
        let step = pivot_with_keys(
            &valid,
            &steps,
            |r| Some(r.student_id.clone()),
            |r| r.item_id.clone(),
            |r| Some(r.display_name.clone()),
            |r| r.duration_minutes.unwrap_or(0),
        );

        let median_by_lab = summary::summarize(&lab.rows, &labs, &course_id);
        let median_by_step = summary::summarize(&step.rows, &steps, &course_id);

        LabModel {
            course_id,
            labs,
            steps,
            lab,
            step,
            median_by_lab,
            median_by_step,
            error,
        }
    }

    pub fn lab_row(&self, student_id: &str) -> Option<&PivotedRow> {
        self.lab.row(student_id)
    }

    pub fn step_row(&self, student_id: &str) -> Option<&PivotedRow> {
        self.step.row(student_id)
    }

    pub fn has_data(&self) -> bool {
        !self.lab.rows.is_empty()
    }
}

/// Single-student lab row bucketed by access date, zero-filled over the
/// course-wide date set so its columns line up with the calendar tables.
/// Time on records without an access date is not shown in this view.
pub fn lab_row_by_day(
    records: &[LearningRecord],
    student_id: &str,
    dates: &[String],
    display_name: &str,
) -> Option<PivotedRow> {
    let valid: Vec<&LearningRecord> = records
        .iter()
        .filter(|r| r.item_id.is_some() && r.student_id == student_id)
        .collect();
    if valid.is_empty() || dates.is_empty() {
        return None;
    }

    let table = pivot_with_keys(
        &valid,
        dates,
        |r| Some(r.student_id.clone()),
        |r| Some(date_key(r.accessed_at)),
        |_| Some(display_name.to_string()),
        |r| r.duration_minutes.unwrap_or(0),
    );
    table.rows.into_iter().next()
}

/// Cohort median of lab time per access date: for each date, the median of
/// per-student daily sums (students with no lab time that day excluded); the
/// total is the median of per-student sums over the whole date set.
pub fn median_by_day(
    records: &[LearningRecord],
    course_id: &str,
    dates: &[String],
) -> Option<SummaryRow> {
    let valid: Vec<&LearningRecord> =
        records.iter().filter(|r| r.item_id.is_some()).collect();
    if valid.is_empty() || dates.is_empty() {
        return None;
    }

    let table = pivot_with_keys(
        &valid,
        dates,
        |r| Some(r.student_id.clone()),
        |r| Some(date_key(r.accessed_at)),
        |r| Some(r.display_name.clone()),
        |r| r.duration_minutes.unwrap_or(0),
    );
    summary::summarize(&table.rows, dates, course_id)
}
