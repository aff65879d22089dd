use time::{Duration, OffsetDateTime};

use crate::types::Timeframe;

/// Absolute cutoff for the rolling window. "Now" is the caller's true
/// invocation time, so this is recomputed on every call and never cached.
pub fn cutoff(timeframe: Timeframe) -> OffsetDateTime {
    cutoff_at(timeframe, OffsetDateTime::now_utc())
}

pub fn cutoff_at(timeframe: Timeframe, now: OffsetDateTime) -> OffsetDateTime {
    now - Duration::hours(timeframe.hours())
}
