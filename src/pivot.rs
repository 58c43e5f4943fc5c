use std::collections::{BTreeMap, HashMap};

use crate::bucket::distinct_sorted;
use crate::models::{PivotedRow, PivotedTable};

/// Pivot flat records into one dense row per entity.
///
/// Records for which `entity_key` or `bucket_key` yields `None` are silently
/// skipped. The column set is the distinct bucket keys over all counted
/// records, so every row carries every column, zero-filled where the entity
/// had no activity. Display names resolve from the first record seen for an
/// entity, in input order. Rows are sorted ascending by entity id.
pub fn pivot<R>(
    records: &[R],
    entity_key: impl Fn(&R) -> Option<String>,
    bucket_key: impl Fn(&R) -> Option<String>,
    display_name: impl Fn(&R) -> Option<String>,
    minutes: impl Fn(&R) -> i64,
) -> PivotedTable {
    let keys = distinct_sorted(
        records
            .iter()
            .filter(|r| entity_key(r).is_some())
            .filter_map(|r| bucket_key(r)),
    );
    pivot_with_keys(records, &keys, entity_key, bucket_key, display_name, minutes)
}

/// Like [`pivot`], but zero-fills against a caller-supplied key set instead
/// of deriving one. Used when a row's columns must align with a wider table
/// (e.g. a single student's lab-by-day row against the course-wide dates).
/// Sums landing outside `keys` are dropped.
pub fn pivot_with_keys<R>(
    records: &[R],
    keys: &[String],
    entity_key: impl Fn(&R) -> Option<String>,
    bucket_key: impl Fn(&R) -> Option<String>,
    display_name: impl Fn(&R) -> Option<String>,
    minutes: impl Fn(&R) -> i64,
) -> PivotedTable {
    let mut sums: HashMap<(String, String), i64> = HashMap::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut entities: Vec<String> = Vec::new();

    for record in records {
        let Some(entity) = entity_key(record) else {
            continue;
        };
        let Some(bucket) = bucket_key(record) else {
            continue;
        };
        if !entities.contains(&entity) {
            entities.push(entity.clone());
        }
        names.entry(entity.clone()).or_insert_with(|| {
            display_name(record).unwrap_or_else(|| entity.clone())
        });
        *sums.entry((entity, bucket)).or_insert(0) += minutes(record);
    }

    entities.sort();

    let mut rows = Vec::with_capacity(entities.len());
    for entity in entities {
        let mut total = 0i64;
        let mut buckets = BTreeMap::new();
        for key in keys {
            let value = sums
                .get(&(entity.clone(), key.clone()))
                .copied()
                .unwrap_or(0);
            total += value;
            buckets.insert(key.clone(), value);
        }
        let display_name = names.get(&entity).cloned().unwrap_or_else(|| entity.clone());
        rows.push(PivotedRow {
            entity_id: entity,
            display_name,
            total,
            buckets,
        });
    }

    PivotedTable {
        keys: keys.to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        student: Option<&'static str>,
        bucket: Option<&'static str>,
        name: Option<&'static str>,
        minutes: i64,
    }

    fn sample(
        student: Option<&'static str>,
        bucket: Option<&'static str>,
        name: Option<&'static str>,
        minutes: i64,
    ) -> Sample {
        Sample {
            student,
            bucket,
            name,
            minutes,
        }
    }

    fn run(records: &[Sample]) -> PivotedTable {
        pivot(
            records,
            |r| r.student.map(str::to_string),
            |r| r.bucket.map(str::to_string),
            |r| r.name.map(str::to_string),
            |r| r.minutes,
        )
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = run(&[]);
        assert!(table.rows.is_empty());
        assert!(table.keys.is_empty());
    }

    #[test]
    fn rows_are_zero_filled_over_the_global_key_set() {
        let table = run(&[
            sample(Some("amy"), Some("2025-01-06"), Some("Amy"), 30),
            sample(Some("amy"), Some("2025-01-07"), Some("Amy"), 10),
            sample(Some("ben"), Some("2025-01-06"), Some("Ben"), 20),
        ]);

        assert_eq!(table.keys, vec!["2025-01-06", "2025-01-07"]);
        assert_eq!(table.rows.len(), 2);

        let amy = &table.rows[0];
        assert_eq!(amy.entity_id, "amy");
        assert_eq!(amy.buckets["2025-01-06"], 30);
        assert_eq!(amy.buckets["2025-01-07"], 10);
        assert_eq!(amy.total, 40);

        let ben = &table.rows[1];
        assert_eq!(ben.buckets["2025-01-06"], 20);
        assert_eq!(ben.buckets["2025-01-07"], 0);
        assert_eq!(ben.total, 20);
    }

    #[test]
    fn duplicate_cells_sum() {
        let table = run(&[
            sample(Some("amy"), Some("lab-1"), Some("Amy"), 5),
            sample(Some("amy"), Some("lab-1"), Some("Amy"), 7),
        ]);
        assert_eq!(table.rows[0].buckets["lab-1"], 12);
        assert_eq!(table.rows[0].total, 12);
    }

    #[test]
    fn records_without_keys_are_skipped() {
        let table = run(&[
            sample(None, Some("2025-01-06"), None, 99),
            sample(Some("amy"), None, Some("Amy"), 99),
            sample(Some("amy"), Some("2025-01-06"), Some("Amy"), 15),
        ]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.keys, vec!["2025-01-06"]);
        assert_eq!(table.rows[0].total, 15);
    }

    #[test]
    fn display_name_is_first_wins() {
        let table = run(&[
            sample(Some("amy"), Some("a"), Some("Amy Adams"), 1),
            sample(Some("amy"), Some("b"), Some("Renamed Later"), 1),
        ]);
        assert_eq!(table.rows[0].display_name, "Amy Adams");
    }

    #[test]
    fn missing_display_name_falls_back_to_entity_id() {
        let table = run(&[sample(Some("amy"), Some("a"), None, 1)]);
        assert_eq!(table.rows[0].display_name, "amy");
    }

    #[test]
    fn rows_sort_by_entity_id() {
        let table = run(&[
            sample(Some("zoe"), Some("a"), Some("Zoe"), 1),
            sample(Some("amy"), Some("a"), Some("Amy"), 1),
        ]);
        let ids: Vec<_> = table.rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["amy", "zoe"]);
    }

    #[test]
    fn pivot_is_idempotent() {
        let records = vec![
            sample(Some("amy"), Some("2025-01-06"), Some("Amy"), 30),
            sample(Some("ben"), Some("2025-01-06"), Some("Ben"), 20),
        ];
        let first = run(&records);
        let second = run(&records);
        assert_eq!(first.keys, second.keys);
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn supplied_keys_override_derived_ones() {
        let keys = vec!["2025-01-06".to_string(), "2025-01-07".to_string()];
        let records = vec![sample(Some("amy"), Some("2025-01-06"), Some("Amy"), 30)];
        let table = pivot_with_keys(
            &records,
            &keys,
            |r| r.student.map(str::to_string),
            |r| r.bucket.map(str::to_string),
            |r| r.name.map(str::to_string),
            |r| r.minutes,
        );
        assert_eq!(table.keys, keys);
        assert_eq!(table.rows[0].buckets["2025-01-07"], 0);
        assert_eq!(table.rows[0].total, 30);
    }
}
