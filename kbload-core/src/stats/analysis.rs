use serde::Serialize;

/// Throughput observed at one load level (concurrency or data size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputPoint {
    pub level: usize,
    pub throughput: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DegradationPoint {
    pub level: usize,
    /// Drop from the first point's throughput, in percent.
    pub drop_pct: f64,
}

/// First level whose throughput gains less than `min_gain_pct` over the level before it.
///
/// Points are taken in the given order. `None` when throughput keeps scaling.
pub fn find_saturation(points: &[ThroughputPoint], min_gain_pct: f64) -> Option<usize> {
    points.windows(2).find_map(|w| {
        let (prev, next) = (w[0], w[1]);
        if prev.throughput <= 0.0 {
            return None;
        }
        let gain = (next.throughput - prev.throughput) / prev.throughput * 100.0;
        (gain < min_gain_pct).then_some(next.level)
    })
}

/// First level whose throughput falls more than `max_drop_pct` below the first point's.
///
/// `None` when the first point has no throughput to compare against.
pub fn find_degradation(points: &[ThroughputPoint], max_drop_pct: f64) -> Option<DegradationPoint> {
    let (first, rest) = points.split_first()?;
    if first.throughput <= 0.0 {
        return None;
    }
    rest.iter().find_map(|p| {
        let drop_pct = (first.throughput - p.throughput) / first.throughput * 100.0;
        (drop_pct > max_drop_pct).then_some(DegradationPoint {
            level: p.level,
            drop_pct,
        })
    })
}
