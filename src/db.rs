use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use chrono::NaiveDate;
use sqlx::{PgPool, Row};

use crate::calendar::CalendarModel;
use crate::labs::{self, LabModel};
use crate::models::{ActivityRecord, LearningRecord, PivotedRow, SummaryRow};
use crate::units::to_minutes;

/// Optional inclusive date window for calendar queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Fully loaded course: both aggregation models plus the raw learning
/// records (kept so student views can build their day-indexed lab rows).
#[derive(Debug, Clone)]
pub struct CourseView {
    pub id: String,
    pub title: String,
    pub calendar: CalendarModel,
    pub labs: LabModel,
    pub learning_records: Vec<LearningRecord>,
    pub error: Option<String>,
}

/// One student's slice of a loaded course. Calendar rows are always present,
/// zero-padded over the course-wide key sets when the student has no
/// activity, so the columns line up with the course view.
#[derive(Debug, Clone)]
pub struct StudentView {
    pub course_id: String,
    pub course_title: String,
    pub student_id: String,
    pub student_name: String,
    pub calendar_by_day: PivotedRow,
    pub calendar_by_week: PivotedRow,
    pub labs_by_lab: Option<PivotedRow>,
    pub labs_by_step: Option<PivotedRow>,
    pub labs_by_day: Option<PivotedRow>,
    pub labs_median_by_day: Option<SummaryRow>,
    pub course: CourseView,
    pub has_data: bool,
}

/// Read-through cache of loaded courses. Only unfiltered loads are cached;
/// any date window bypasses it.
#[derive(Debug, Default)]
pub struct CourseCache {
    entries: HashMap<String, CourseView>,
}

impl CourseCache {
    pub fn new() -> Self {
        CourseCache::default()
    }

    fn get(&self, course_id: &str) -> Option<&CourseView> {
        self.entries.get(course_id)
    }

    fn insert(&mut self, view: CourseView) {
        self.entries.insert(view.id.clone(), view);
    }
}

pub async fn fetch_activity_records(
    pool: &PgPool,
    course_id: &str,
    range: DateRange,
) -> anyhow::Result<Vec<ActivityRecord>> {
    let mut query = String::from(
        "SELECT id, studentid, courseid, timeactive \
         FROM calendar WHERE courseid = $1",
    );
    let mut next = 2;
    if range.start.is_some() {
        let _ = write!(query, " AND id >= ${next}");
        next += 1;
    }
    if range.end.is_some() {
        let _ = write!(query, " AND id <= ${next}");
    }
    query.push_str(" ORDER BY id ASC");

    let mut rows = sqlx::query(&query).bind(course_id);
    if let Some(start) = range.start {
        rows = rows.bind(start);
    }
    if let Some(end) = range.end {
        rows = rows.bind(end);
    }

    let raw = rows.fetch_all(pool).await?;

    let student_ids: Vec<String> = distinct(raw.iter().map(|row| row.get("studentid")));
    let names = fetch_display_names(pool, &student_ids)
        .await
        .unwrap_or_default();

    let mut records = Vec::with_capacity(raw.len());
    for row in raw {
        let student_id: String = row.get("studentid");
        let display_name = names
            .get(&student_id)
            .cloned()
            .unwrap_or_else(|| student_id.clone());
        records.push(ActivityRecord {
            date_key: row.get("id"),
            course_id: row.get("courseid"),
            duration_minutes: to_minutes(row.get("timeactive")),
            student_id,
            display_name,
        });
    }

    Ok(records)
}

pub async fn fetch_learning_records(
    pool: &PgPool,
    course_id: &str,
) -> anyhow::Result<Vec<LearningRecord>> {
    let raw = sqlx::query(
        "SELECT course_id, student_id, lo_id, duration, date_last_accessed \
         FROM learning_records WHERE course_id = $1 AND type = 'lab' \
         ORDER BY date_last_accessed DESC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    let student_ids: Vec<String> = distinct(raw.iter().map(|row| row.get("student_id")));
    let names = fetch_display_names(pool, &student_ids)
        .await
        .unwrap_or_default();

    let mut records = Vec::with_capacity(raw.len());
    for row in raw {
        let student_id: String = row.get("student_id");
        let display_name = names
            .get(&student_id)
            .cloned()
            .unwrap_or_else(|| student_id.clone());
        records.push(LearningRecord {
            course_id: row.get("course_id"),
            item_id: row.get("lo_id"),
            duration_minutes: row
                .get::<Option<i64>, _>("duration")
                .map(|blocks| to_minutes(Some(blocks))),
            accessed_at: row.get("date_last_accessed"),
            student_id,
            display_name,
        });
    }

    Ok(records)
}

pub async fn fetch_course_title(pool: &PgPool, course_id: &str) -> anyhow::Result<String> {
    let row = sqlx::query(
        "SELECT course_record->>'title' AS title \
         FROM \"tutors-connect-courses\" WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row
        .and_then(|row| row.get::<Option<String>, _>("title"))
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| course_id.to_string()))
}

pub async fn fetch_student_name(pool: &PgPool, student_id: &str) -> anyhow::Result<String> {
    let row = sqlx::query(
        "SELECT full_name FROM \"tutors-connect-users\" WHERE github_id = $1",
    )
    .bind(student_id.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row
        .and_then(|row| row.get::<Option<String>, _>("full_name"))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| student_id.trim().to_string()))
}

async fn fetch_display_names(
    pool: &PgPool,
    student_ids: &[String],
) -> anyhow::Result<HashMap<String, String>> {
    if student_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        "SELECT github_id, full_name \
         FROM \"tutors-connect-users\" WHERE github_id = ANY($1)",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await?;

    let mut names = HashMap::new();
    for row in rows {
        let github_id: String = row.get("github_id");
        if let Some(full_name) = row.get::<Option<String>, _>("full_name") {
            if !full_name.trim().is_empty() {
                names.insert(github_id, full_name.trim().to_string());
            }
        }
    }
    Ok(names)
}

/// Load a course's calendar and lab models. A fetch failure still yields a
/// well-typed view: empty tables, `None` median rows and the error message
/// carried on the view, so callers render uniformly either way.
pub async fn load_course(
    pool: &PgPool,
    cache: &mut CourseCache,
    course_id: &str,
    range: DateRange,
) -> CourseView {
    if range.is_unbounded() {
        if let Some(cached) = cache.get(course_id) {
            return cached.clone();
        }
    }

    let title = fetch_course_title(pool, course_id)
        .await
        .unwrap_or_else(|_| course_id.to_string());

    let view = match fetch_activity_records(pool, course_id, range).await {
        Ok(records) => {
            let (learning_records, lab_error) =
                match fetch_learning_records(pool, course_id).await {
                    Ok(records) => (records, None),
                    Err(err) => (Vec::new(), Some(err.to_string())),
                };
            CourseView {
                id: course_id.to_string(),
                title,
                calendar: CalendarModel::build(&records, None),
                labs: LabModel::build(&learning_records, lab_error),
                learning_records,
                error: None,
            }
        }
        Err(err) => {
            let message = err.to_string();
            CourseView {
                id: course_id.to_string(),
                title,
                calendar: CalendarModel::build(&[], Some(message.clone())),
                labs: LabModel::build(&[], Some(message.clone())),
                learning_records: Vec::new(),
                error: Some(message),
            }
        }
    };

    if range.is_unbounded() {
        cache.insert(view.clone());
    }

    view
}

/// Load one student's rows within a course. Missing calendar rows are padded
/// with zeros over the course key sets; lab rows stay `None` when the student
/// has no lab activity.
pub async fn load_student(
    pool: &PgPool,
    cache: &mut CourseCache,
    course_id: &str,
    student_id: &str,
    range: DateRange,
) -> StudentView {
    let course = load_course(pool, cache, course_id, range).await;

    let student_name = match course.calendar.day_row(student_id) {
        Some(row) => row.display_name.clone(),
        None => fetch_student_name(pool, student_id)
            .await
            .unwrap_or_else(|_| student_id.to_string()),
    };

    let calendar_by_day = course
        .calendar
        .day_row(student_id)
        .cloned()
        .unwrap_or_else(|| course.calendar.day.empty_row(student_id, &student_name));
    let calendar_by_week = course
        .calendar
        .week_row(student_id)
        .cloned()
        .unwrap_or_else(|| course.calendar.week.empty_row(student_id, &student_name));

    let labs_by_lab = course.labs.lab_row(student_id).cloned();
    let labs_by_step = course.labs.step_row(student_id).cloned();

    let labs_by_day = labs::lab_row_by_day(
        &course.learning_records,
        student_id,
        &course.calendar.dates,
        &student_name,
    );
    let labs_median_by_day = labs::median_by_day(
        &course.learning_records,
        &course.id,
        &course.calendar.dates,
    );

    let has_cal_data = course.calendar.has_data() && course.calendar.day_row(student_id).is_some();
    let has_lab_data = labs_by_lab.is_some();

    StudentView {
        course_id: course.id.clone(),
        course_title: course.title.clone(),
        student_id: student_id.to_string(),
        student_name,
        calendar_by_day,
        calendar_by_week,
        labs_by_lab,
        labs_by_step,
        labs_by_day,
        labs_median_by_day,
        course,
        has_data: has_cal_data || has_lab_data,
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}
