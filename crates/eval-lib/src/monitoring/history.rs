//! Chunked history retrieval
//!
//! The monitoring API limits how much history a single call may return, so
//! a window is walked in sub-windows of at most `max_days` days each.

use super::HistoryBackend;
use crate::error::{EvalError, Result};
use crate::models::{HistoryRecord, ValueType};
use crate::observability::EvalMetrics;
use tracing::debug;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// A `[time_from, time_till)` window split into spans of at most `max_span`
/// seconds
///
/// Iterating yields the sub-windows in chronological order. The iterator is
/// resumable: `time_from` always marks the start of the next sub-window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWindow {
    pub time_from: i64,
    pub time_till: i64,
    pub max_span: i64,
}

impl HistoryWindow {
    pub fn new(time_from: i64, time_till: i64, max_span: i64) -> Self {
        Self {
            time_from,
            time_till,
            max_span: max_span.max(1),
        }
    }

    /// Window bounded by `max_days` days per request
    pub fn with_max_days(time_from: i64, time_till: i64, max_days: u32) -> Self {
        Self::new(time_from, time_till, i64::from(max_days) * SECONDS_PER_DAY)
    }

    /// Number of sub-windows left to fetch
    pub fn remaining_chunks(&self) -> u64 {
        if self.time_till <= self.time_from {
            return 0;
        }
        let span = (self.time_till - self.time_from) as u64;
        span.div_ceil(self.max_span as u64)
    }
}

impl Iterator for HistoryWindow {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.time_till <= self.time_from {
            return None;
        }
        if self.time_till - self.time_from > self.max_span {
            let chunk = (self.time_from, self.time_from + self.max_span);
            self.time_from += self.max_span;
            Some(chunk)
        } else {
            let chunk = (self.time_from, self.time_till);
            self.time_from = self.time_till;
            Some(chunk)
        }
    }
}

/// Fetch all history of `item_id` in `window`, chunk by chunk
///
/// The item's value type is resolved first because history queries are
/// typed per item.
pub async fn fetch_history<B>(
    backend: &B,
    item_id: &str,
    window: HistoryWindow,
) -> Result<Vec<HistoryRecord>>
where
    B: HistoryBackend + ?Sized,
{
    let items = backend.items(item_id).await?;
    if items.len() != 1 {
        return Err(EvalError::ItemNotFound {
            item_id: item_id.to_string(),
            found: items.len(),
        });
    }
    let value_type = ValueType::try_from(items[0].value_type.as_str()).map_err(|reason| {
        EvalError::monitoring(format!("item {}: {}", item_id, reason))
    })?;

    let metrics = EvalMetrics::new();
    let mut records = Vec::new();
    for (time_from, time_till) in window {
        let chunk = backend
            .history(item_id, value_type, time_from, time_till)
            .await?;
        debug!(
            item_id = %item_id,
            time_from = time_from,
            time_till = time_till,
            records = chunk.len(),
            "Fetched history chunk"
        );
        metrics.observe_history_chunk(chunk.len());
        records.extend(chunk);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_splits_into_bounded_chunks() {
        let chunks: Vec<_> = HistoryWindow::new(0, 25, 10).collect();
        assert_eq!(chunks, vec![(0, 10), (10, 20), (20, 25)]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let chunks: Vec<_> = HistoryWindow::new(100, 130, 10).collect();
        assert_eq!(chunks, vec![(100, 110), (110, 120), (120, 130)]);
    }

    #[test]
    fn test_empty_and_inverted_windows() {
        assert_eq!(HistoryWindow::new(50, 50, 10).count(), 0);
        assert_eq!(HistoryWindow::new(60, 50, 10).count(), 0);
        assert_eq!(HistoryWindow::new(60, 50, 10).remaining_chunks(), 0);
    }

    #[test]
    fn test_remaining_chunks_matches_iteration() {
        for duration in [1i64, 9, 10, 11, 99, 100, 101] {
            let window = HistoryWindow::new(1_000, 1_000 + duration, 10);
            let expected = window.remaining_chunks();
            assert_eq!(window.count() as u64, expected, "duration {}", duration);
            assert_eq!(expected, (duration as u64).div_ceil(10));
        }
    }

    #[test]
    fn test_window_resumes_after_partial_iteration() {
        let mut window = HistoryWindow::new(0, 35, 10);
        assert_eq!(window.next(), Some((0, 10)));
        assert_eq!(window.time_from, 10);

        let resumed = HistoryWindow::new(window.time_from, window.time_till, window.max_span);
        assert_eq!(resumed.collect::<Vec<_>>(), window.collect::<Vec<_>>());
    }

    #[test]
    fn test_max_days_span() {
        let window = HistoryWindow::with_max_days(0, 40 * SECONDS_PER_DAY, 15);
        assert_eq!(window.max_span, 15 * SECONDS_PER_DAY);
        assert_eq!(window.remaining_chunks(), 3);
    }
}
