use std::fmt::Write;

use serde_json::{json, Value};

use crate::db::{CourseView, DateRange};
use crate::models::{PivotedTable, SummaryRow};

/// Markdown engagement report for one course and date window.
pub fn build_report(view: &CourseView, range: DateRange) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Engagement Report: {}", view.title);
    let _ = writeln!(output, "Course id: {}", view.id);
    let _ = writeln!(output, "Window: {}", describe_range(range));
    let _ = writeln!(output);

    if let Some(error) = &view.error {
        let _ = writeln!(output, "Data could not be loaded: {error}");
        return output;
    }

    let _ = writeln!(output, "## Most Active Students");

    let mut by_total: Vec<_> = view.calendar.day.rows.iter().collect();
    by_total.sort_by(|a, b| b.total.cmp(&a.total));

    if by_total.is_empty() {
        let _ = writeln!(output, "No calendar activity recorded for this window.");
    } else {
        for row in by_total.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) {} min across {} active days",
                row.display_name,
                row.entity_id,
                row.total,
                row.buckets.values().filter(|v| **v > 0).count()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Medians");

    match &view.calendar.median_by_day {
        Some(row) => {
            let _ = writeln!(output, "- Median total time per student: {} min", row.total);
            if let Some((date, minutes)) = busiest_bucket(row) {
                let _ = writeln!(output, "- Busiest day: {date} (median {minutes} min)");
            }
        }
        None => {
            let _ = writeln!(output, "No day-level medians (no activity).");
        }
    }
    if let Some(row) = &view.calendar.median_by_week {
        let _ = writeln!(output, "- Median active week: {} min", row.total);
        if let Some((week, minutes)) = busiest_bucket(row) {
            let _ = writeln!(output, "- Busiest week: w/c {week} (median {minutes} min)");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Labs");

    if !view.labs.has_data() {
        match &view.labs.error {
            Some(error) => {
                let _ = writeln!(output, "Lab records could not be loaded: {error}");
            }
            None => {
                let _ = writeln!(output, "No lab activity recorded.");
            }
        }
    } else {
        let _ = writeln!(
            output,
            "{} labs, {} steps, {} students with lab time.",
            view.labs.labs.len(),
            view.labs.steps.len(),
            view.labs.lab.rows.len()
        );
        if let Some(row) = &view.labs.median_by_lab {
            let _ = writeln!(output, "- Median lab time per student: {} min", row.total);
            if let Some((lab, minutes)) = busiest_bucket(row) {
                let _ = writeln!(output, "- Most worked lab: {lab} (median {minutes} min)");
            }
        }
    }

    output
}

fn describe_range(range: DateRange) -> String {
    match (range.start, range.end) {
        (None, None) => "all time".to_string(),
        (Some(start), None) => format!("from {start}"),
        (None, Some(end)) => format!("until {end}"),
        (Some(start), Some(end)) => format!("{start} to {end}"),
    }
}

fn busiest_bucket(row: &SummaryRow) -> Option<(&str, i64)> {
    row.buckets
        .iter()
        .max_by_key(|(_, minutes)| **minutes)
        .filter(|(_, minutes)| **minutes > 0)
        .map(|(key, minutes)| (key.as_str(), *minutes))
}

/// Write a pivoted table (and its median row, when present) as CSV:
/// one column per bucket key plus a trailing total.
pub fn write_csv<W: std::io::Write>(
    writer: W,
    table: &PivotedTable,
    median: Option<&SummaryRow>,
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["student_id".to_string(), "name".to_string()];
    header.extend(table.keys.iter().cloned());
    header.push("total".to_string());
    csv_writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.entity_id.clone(), row.display_name.clone()];
        for key in &table.keys {
            record.push(row.buckets.get(key).copied().unwrap_or(0).to_string());
        }
        record.push(row.total.to_string());
        csv_writer.write_record(&record)?;
    }

    if let Some(summary) = median {
        let mut record = vec![summary.scope_id.clone(), "median".to_string()];
        for key in &table.keys {
            record.push(summary.buckets.get(key).copied().unwrap_or(0).to_string());
        }
        record.push(summary.total.to_string());
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Render a pivoted table (and its median row, when present) as JSON.
pub fn to_json(table: &PivotedTable, median: Option<&SummaryRow>) -> Value {
    json!({
        "keys": table.keys,
        "rows": table.rows,
        "median": median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarModel;
    use crate::labs::LabModel;
    use crate::models::{ActivityRecord, PivotedRow};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn record(student: &str, name: &str, day: &str, minutes: i64) -> ActivityRecord {
        ActivityRecord {
            date_key: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
            student_id: student.to_string(),
            course_id: "wad-2025".to_string(),
            duration_minutes: minutes,
            display_name: name.to_string(),
        }
    }

    fn sample_view() -> CourseView {
        let records = vec![
            record("amy", "Amy Adams", "2025-01-06", 30),
            record("amy", "Amy Adams", "2025-01-07", 10),
            record("ben", "Ben Burke", "2025-01-06", 20),
        ];
        CourseView {
            id: "wad-2025".to_string(),
            title: "Web App Development".to_string(),
            calendar: CalendarModel::build(&records, None),
            labs: LabModel::build(&[], None),
            learning_records: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn report_lists_students_and_medians() {
        let report = build_report(&sample_view(), DateRange::default());
        assert!(report.contains("# Engagement Report: Web App Development"));
        assert!(report.contains("Amy Adams (amy) 40 min across 2 active days"));
        assert!(report.contains("Median total time per student: 30 min"));
        assert!(report.contains("Busiest day: 2025-01-06 (median 25 min)"));
        assert!(report.contains("No lab activity recorded."));
    }

    #[test]
    fn report_surfaces_load_errors() {
        let view = CourseView {
            id: "wad-2025".to_string(),
            title: "Web App Development".to_string(),
            calendar: CalendarModel::build(&[], Some("connection refused".to_string())),
            labs: LabModel::build(&[], Some("connection refused".to_string())),
            learning_records: Vec::new(),
            error: Some("connection refused".to_string()),
        };
        let report = build_report(&view, DateRange::default());
        assert!(report.contains("Data could not be loaded: connection refused"));
        assert!(!report.contains("Most Active Students"));
    }

    #[test]
    fn csv_export_has_one_column_per_bucket_plus_total() {
        let view = sample_view();
        let mut buffer = Vec::new();
        write_csv(
            &mut buffer,
            &view.calendar.day,
            view.calendar.median_by_day.as_ref(),
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "student_id,name,2025-01-06,2025-01-07,total"
        );
        assert_eq!(lines.next().unwrap(), "amy,Amy Adams,30,10,40");
        assert_eq!(lines.next().unwrap(), "ben,Ben Burke,20,0,20");
        assert_eq!(lines.next().unwrap(), "wad-2025,median,25,10,30");
    }

    #[test]
    fn json_export_carries_rows_and_median() {
        let table = PivotedTable {
            keys: vec!["2025-01-06".to_string()],
            rows: vec![PivotedRow {
                entity_id: "amy".to_string(),
                display_name: "Amy Adams".to_string(),
                total: 30,
                buckets: BTreeMap::from([("2025-01-06".to_string(), 30)]),
            }],
        };
        let value = to_json(&table, None);
        assert_eq!(value["keys"][0], "2025-01-06");
        assert_eq!(value["rows"][0]["entity_id"], "amy");
        assert_eq!(value["rows"][0]["buckets"]["2025-01-06"], 30);
        assert!(value["median"].is_null());
    }
}
