use thiserror::Error;

/// Guarded precondition failures of the statistics pipeline.
///
/// These are data states, not faults: a caller skips the computation cycle
/// and keeps its prior state when one of these comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PulseError {
    #[error("no heart rate samples accumulated")]
    EmptyHrSeries,
    #[error("no peak-to-peak intervals accumulated")]
    EmptyPpiSeries,
    #[error("need at least {need} peak-to-peak intervals, have {have}")]
    ShortPpiSeries { need: usize, have: usize },
}
