use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::bucket;
use crate::median::median;
use crate::models::{PivotedRow, SummaryRow};

/// Cohort median row over a pivoted table.
///
/// Per-bucket medians consider only entities with activity in that bucket
/// (zeros are dropped first), so an inactive majority cannot drag a column
/// down to 0. The overall total is the median of every row's total, zeros
/// included. The asymmetry is intentional.
pub fn summarize(rows: &[PivotedRow], keys: &[String], scope_id: &str) -> Option<SummaryRow> {
    if rows.is_empty() {
        return None;
    }

    let mut buckets = BTreeMap::new();
    for key in keys {
        let values: Vec<i64> = rows
            .iter()
            .map(|row| row.buckets.get(key).copied().unwrap_or(0))
            .filter(|v| *v > 0)
            .collect();
        buckets.insert(key.clone(), median(&values));
    }

    let totals: Vec<i64> = rows.iter().map(|row| row.total).collect();

    Some(SummaryRow {
        scope_id: scope_id.to_string(),
        total: median(&totals),
        buckets,
    })
}

/// Week-level median row derived from a day-level median row.
///
/// Daily medians with a positive value are summed into their Monday-aligned
/// week; the total is the median of the positive week sums. Weeks in `weeks`
/// with no contributing day still appear as zero columns.
pub fn summarize_weeks_from_days(
    day_row: &SummaryRow,
    weeks: &[String],
    scope_id: &str,
) -> SummaryRow {
    let mut week_sums: HashMap<String, i64> = HashMap::new();
    for (date_key, day_median) in &day_row.buckets {
        if *day_median <= 0 {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(date_key, "%Y-%m-%d") else {
            continue;
        };
        let monday = bucket::week_start(date).format("%Y-%m-%d").to_string();
        *week_sums.entry(monday).or_insert(0) += day_median;
    }

    let mut buckets = BTreeMap::new();
    let mut positive_sums = Vec::new();
    for week in weeks {
        let sum = week_sums.get(week).copied().unwrap_or(0);
        buckets.insert(week.clone(), sum);
        if sum > 0 {
            positive_sums.push(sum);
        }
    }

    SummaryRow {
        scope_id: scope_id.to_string(),
        total: median(&positive_sums),
        buckets,
    }
}
