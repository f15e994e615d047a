/// Linear-interpolation percentile of `values` at `p` (0..=100).
///
/// `p` outside the range is clamped, so the result always lies within `[min, max]`.
/// `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = k.floor() as usize;
    let hi = k.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (k - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; `0` for fewer than two values.
pub fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
