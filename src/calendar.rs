use crate::bucket;
use crate::models::{ActivityRecord, PivotedRow, PivotedTable, SummaryRow};
use crate::pivot::pivot_with_keys;
use crate::summary;

/// Calendar engagement views for one course and date window: per-student
/// day and week tables plus the cohort median rows.
#[derive(Debug, Clone, Default)]
pub struct CalendarModel {
    pub course_id: String,
    pub dates: Vec<String>,
    pub weeks: Vec<String>,
    pub day: PivotedTable,
    pub week: PivotedTable,
    pub median_by_day: Option<SummaryRow>,
    pub median_by_week: Option<SummaryRow>,
    pub error: Option<String>,
}

impl CalendarModel {
    pub fn build(records: &[ActivityRecord], error: Option<String>) -> Self {
        let course_id = records
            .first()
            .map(|r| r.course_id.clone())
            .unwrap_or_default();
        let dates = bucket::distinct_dates(records);
        let weeks = bucket::distinct_weeks(records);

        let day = pivot_with_keys(
            records,
            &dates,
            |r| Some(r.student_id.clone()),
            |r| Some(r.date_key.format("%Y-%m-%d").to_string()),
            |r| Some(r.display_name.clone()),
            |r| r.duration_minutes,
        );
        let week = pivot_with_keys(
            records,
            &weeks,
            |r| Some(r.student_id.clone()),
            |r| Some(bucket::week_start(r.date_key).format("%Y-%m-%d").to_string()),
            |r| Some(r.display_name.clone()),
            |r| r.duration_minutes,
        );

        let median_by_day = summary::summarize(&day.rows, &dates, &course_id);
        // Week medians derive from the day medians, not from the week table.
        let median_by_week = median_by_day
            .as_ref()
            .map(|row| summary::summarize_weeks_from_days(row, &weeks, &course_id));

        CalendarModel {
            course_id,
            dates,
            weeks,
            day,
            week,
            median_by_day,
            median_by_week,
            error,
        }
    }

    pub fn day_row(&self, student_id: &str) -> Option<&PivotedRow> {
        self.day.row(student_id)
    }

    pub fn week_row(&self, student_id: &str) -> Option<&PivotedRow> {
        self.week.row(student_id)
    }

    pub fn has_data(&self) -> bool {
        !self.day.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(student: &str, name: &str, day: &str, minutes: i64) -> ActivityRecord {
        ActivityRecord {
            date_key: date(day),
            student_id: student.to_string(),
            course_id: "wad-2025".to_string(),
            duration_minutes: minutes,
            display_name: name.to_string(),
        }
    }

    fn two_student_week() -> Vec<ActivityRecord> {
        vec![
            record("amy", "Amy Adams", "2025-01-06", 30),
            record("amy", "Amy Adams", "2025-01-07", 10),
            record("ben", "Ben Burke", "2025-01-06", 20),
        ]
    }

    #[test]
    fn empty_records_build_empty_model() {
        let model = CalendarModel::build(&[], None);
        assert!(model.dates.is_empty());
        assert!(model.day.rows.is_empty());
        assert!(model.median_by_day.is_none());
        assert!(model.median_by_week.is_none());
        assert!(!model.has_data());
    }

    #[test]
    fn day_table_matches_end_to_end_scenario() {
        let model = CalendarModel::build(&two_student_week(), None);

        assert_eq!(model.dates, vec!["2025-01-06", "2025-01-07"]);
        let amy = model.day_row("amy").unwrap();
        assert_eq!(amy.buckets["2025-01-06"], 30);
        assert_eq!(amy.buckets["2025-01-07"], 10);
        assert_eq!(amy.total, 40);
        let ben = model.day_row("ben").unwrap();
        assert_eq!(ben.buckets["2025-01-06"], 20);
        assert_eq!(ben.buckets["2025-01-07"], 0);
        assert_eq!(ben.total, 20);
    }

    #[test]
    fn week_table_sums_days_into_mondays() {
        let model = CalendarModel::build(&two_student_week(), None);

        assert_eq!(model.weeks, vec!["2025-01-06"]);
        assert_eq!(model.week_row("amy").unwrap().buckets["2025-01-06"], 40);
        assert_eq!(model.week_row("ben").unwrap().buckets["2025-01-06"], 20);
    }

    #[test]
    fn median_by_day_excludes_inactive_students_per_bucket() {
        let model = CalendarModel::build(&two_student_week(), None);
        let row = model.median_by_day.as_ref().unwrap();

        assert_eq!(row.buckets["2025-01-06"], 25);
        // Ben's zero-filled Tuesday does not drag the median down.
        assert_eq!(row.buckets["2025-01-07"], 10);
        // Overall total: median of [40, 20] across the full cohort.
        assert_eq!(row.total, 30);
    }

    #[test]
    fn median_by_week_derives_from_day_medians() {
        let model = CalendarModel::build(&two_student_week(), None);
        let row = model.median_by_week.as_ref().unwrap();

        // 25 (Mon) + 10 (Tue) land in the single week.
        assert_eq!(row.buckets["2025-01-06"], 35);
        assert_eq!(row.total, 35);
    }

    #[test]
    fn spans_multiple_weeks() {
        let records = vec![
            record("amy", "Amy Adams", "2025-01-06", 30),
            record("amy", "Amy Adams", "2025-01-15", 60),
        ];
        let model = CalendarModel::build(&records, None);
        assert_eq!(model.weeks, vec!["2025-01-06", "2025-01-13"]);
        let amy = model.week_row("amy").unwrap();
        assert_eq!(amy.buckets["2025-01-06"], 30);
        assert_eq!(amy.buckets["2025-01-13"], 60);
    }

    #[test]
    fn error_is_carried_through() {
        let model = CalendarModel::build(&[], Some("fetch failed".to_string()));
        assert_eq!(model.error.as_deref(), Some("fetch failed"));
        assert!(model.day.rows.is_empty());
    }
}
