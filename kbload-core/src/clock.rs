use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

struct Anchor {
    wall_secs: f64,
    mono: Instant,
}

static ANCHOR: OnceLock<Anchor> = OnceLock::new();

/// Unix time in seconds that never goes backwards within a process.
///
/// The wall clock is read once; later readings advance it by the monotonic clock, so a
/// snapshot taken after another one always carries a timestamp that is `>=` the earlier one.
pub fn now_unix_secs() -> f64 {
    let anchor = ANCHOR.get_or_init(|| Anchor {
        wall_secs: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0),
        mono: Instant::now(),
    });
    anchor.wall_secs + anchor.mono.elapsed().as_secs_f64()
}
