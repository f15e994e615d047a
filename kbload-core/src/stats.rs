mod analysis;
mod baseline;
mod delta;
mod percentile;
mod summary;

pub use analysis::{DegradationPoint, ThroughputPoint, find_degradation, find_saturation};
pub use baseline::{
    Baseline, BaselineMetric, Change, ComparisonStatus, MetricComparison, UNCHANGED_TOLERANCE_PCT,
    compare_to_baseline,
};
pub use delta::{DeltaSummary, FieldStats, ResourceDelta, resource_delta};
pub use percentile::{mean, percentile, stdev};
pub use summary::{
    Distribution, ErrorCount, IterationAverage, MeanStdev, Summary, Throughput, summarize,
};
