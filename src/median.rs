/// Median of a numeric collection. Empty input yields 0. For even lengths
/// the two middle values are averaged and rounded half-up, not truncated;
/// grids downstream expect whole minutes, so this rounding is part of the
/// contract.
pub fn median(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        ((sorted[mid - 1] + sorted[mid]) as f64 / 2.0).round() as i64
    }
}
