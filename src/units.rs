/// Convert raw storage units (30-second blocks) to whole minutes.
///
/// This runs exactly once, when rows are mapped out of the database in
/// `db.rs`. Everything downstream works in minutes and must never convert
/// again.
pub fn to_minutes(blocks: Option<i64>) -> i64 {
    match blocks {
        Some(blocks) => ((blocks * 30) as f64 / 60.0).round() as i64,
        None => 0,
    }
}
