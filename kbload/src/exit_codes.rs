#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// A stress dimension hit its stop condition and `--fail-on-limit` was set.
    StopConditionTriggered = 10,

    /// A metric degraded against the baseline and `--fail-on-regression` was set.
    BaselineRegressed = 11,

    /// The scenario aborted (resource setup or teardown failed).
    Aborted = 20,

    /// Invalid CLI/config/data input (bad flags, unreadable files, invalid values).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_quality_gates(limit_hit: bool, regressed: bool) -> Self {
        match (limit_hit, regressed) {
            (false, false) => Self::Success,
            (true, _) => Self::StopConditionTriggered,
            (false, true) => Self::BaselineRegressed,
        }
    }
}
