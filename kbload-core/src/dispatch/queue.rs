use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out operation indices from a range, each exactly once.
#[derive(Debug)]
pub(crate) struct WorkQueue {
    cursor: AtomicUsize,
    end: usize,
}

impl WorkQueue {
    pub(crate) fn new(range: Range<usize>) -> Self {
        Self {
            cursor: AtomicUsize::new(range.start),
            end: range.end,
        }
    }

    pub(crate) fn next(&self) -> Option<usize> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        (idx < self.end).then_some(idx)
    }
}

/// Splits `0..n` into `parts` contiguous ranges whose lengths differ by at most one.
pub(crate) fn partition(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, n.max(1));
    let base = n / parts;
    let extra = n % parts;

    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        out.push(start..start + len);
        start += len;
    }
    out
}
