use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::models::ActivityRecord;

/// Bucket key for records without a usable timestamp. Sorted after all real
/// dates so the column lands at the right edge of a table.
pub const NO_DATE_KEY: &str = "__no_date__";

/// Calendar-date bucket key (`YYYY-MM-DD`) for a timestamp, or the no-date
/// sentinel when absent.
pub fn date_key(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.date_naive().format("%Y-%m-%d").to_string(),
        None => NO_DATE_KEY.to_string(),
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_back = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(days_back)
}

/// Dedupe and sort bucket keys ascending, with the no-date sentinel forced
/// last regardless of its lexicographic position.
pub fn distinct_sorted(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out.sort_by(|a, b| {
        if a == NO_DATE_KEY {
            std::cmp::Ordering::Greater
        } else if b == NO_DATE_KEY {
            std::cmp::Ordering::Less
        } else {
            a.cmp(b)
        }
    });
    out
}

/// Distinct sorted date keys across calendar records.
pub fn distinct_dates(records: &[ActivityRecord]) -> Vec<String> {
    distinct_sorted(
        records
            .iter()
            .map(|r| r.date_key.format("%Y-%m-%d").to_string()),
    )
}

/// Distinct sorted Monday week-start keys across calendar records.
pub fn distinct_weeks(records: &[ActivityRecord]) -> Vec<String> {
    distinct_sorted(
        records
            .iter()
            .map(|r| week_start(r.date_key).format("%Y-%m-%d").to_string()),
    )
}
