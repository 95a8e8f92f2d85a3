//! Time range partitioning and work-unit slicing.
//!
//! A large `[from, to)` extraction range is split into fixed-duration
//! windows so no single query is unbounded, then the ordered window
//! sequence is dealt into a fixed number of contiguous groups, one per
//! parallel task. Both functions are pure; only the `to = now` default in
//! [`generate_windows`] reads the clock.

use crate::error::MarketoError;
use chrono::{DateTime, Duration, Utc};

/// Default window width: one hour.
pub const DEFAULT_INTERVAL_SECONDS: i64 = 3600;

/// One bounded query window, `from < to`. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn duration_seconds(&self) -> i64 {
        (self.to - self.from).num_seconds()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {})", self.from, self.to)
    }
}

/// Split `[from, to)` into consecutive windows of `interval_seconds`, the
/// last clamped to `to`. When `to` is `None` the current instant is used.
///
/// Window count is `ceil((to - from) / interval_seconds)`; windows cover the
/// range with no gaps or overlaps.
///
/// # Errors
/// - [`MarketoError::InvalidRange`] if `from >= to`
/// - [`MarketoError::Config`] if `interval_seconds` is not positive
pub fn generate_windows(
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
    interval_seconds: i64,
) -> Result<Vec<TimeWindow>, MarketoError> {
    let to = to.unwrap_or_else(Utc::now);

    if from >= to {
        return Err(MarketoError::InvalidRange { from, to });
    }
    if interval_seconds <= 0 {
        return Err(MarketoError::Config(format!(
            "interval_seconds must be positive, got {}",
            interval_seconds
        )));
    }

    let interval = Duration::seconds(interval_seconds);
    let mut windows = Vec::new();
    let mut start = from;
    while start < to {
        let end = std::cmp::min(start + interval, to);
        windows.push(TimeWindow {
            from: start,
            to: end,
        });
        start = end;
    }

    log::debug!(
        "Generated {} window(s) of {}s covering [{} .. {})",
        windows.len(),
        interval_seconds,
        from,
        to
    );
    Ok(windows)
}

/// Deal the ordered window sequence into exactly `group_count` contiguous
/// groups, preserving chronological order within and across groups.
///
/// Group sizes are as equal as possible: the first `len % group_count`
/// groups carry one extra window. Groups may be empty when `group_count`
/// exceeds the window count. A `group_count` of zero yields no groups.
pub fn slice(windows: Vec<TimeWindow>, group_count: usize) -> Vec<Vec<TimeWindow>> {
    if group_count == 0 {
        return Vec::new();
    }

    let base = windows.len() / group_count;
    let remainder = windows.len() % group_count;

    let mut groups = Vec::with_capacity(group_count);
    let mut rest = windows.into_iter();
    for index in 0..group_count {
        let size = base + usize::from(index < remainder);
        groups.push(rest.by_ref().take(size).collect());
    }
    groups
}
