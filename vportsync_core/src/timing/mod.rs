//! Outstanding display-port requests, for measuring render latency.
//!
//! Each display-port sent to the content engine is recorded with the time it
//! was sent. When a frame arrives whose drawn region matches one of them, the
//! difference is the draw latency for that request. Requests older than the
//! match are presumed superseded and discarded with it.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::TimingConfig;
use crate::display_port::DisplayPortMetrics;

/// Bounded FIFO of `(display-port, sent-at)` pairs.
///
/// Never blocks and never errors: once `capacity` requests are outstanding,
/// each `add` silently evicts the oldest. A content engine that stalls simply
/// leaves its entries to age out this way.
#[derive(Debug, Clone)]
pub struct DrawTimingQueue {
    entries: VecDeque<(DisplayPortMetrics, Instant)>,
    capacity: usize,
    tolerance: f32,
}

impl DrawTimingQueue {
    pub fn new(config: &TimingConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            tolerance: config.match_tolerance,
        }
    }

    /// Record `display_port` as sent now.
    pub fn add(&mut self, display_port: DisplayPortMetrics) {
        self.add_at(display_port, Instant::now());
    }

    /// Record `display_port` as sent at `at`.
    pub fn add_at(&mut self, display_port: DisplayPortMetrics, at: Instant) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((display_port, at));
    }

    /// Find when the request matching `drawn` was sent.
    ///
    /// Scans oldest to newest. On a match, removes that entry and everything
    /// older and returns its timestamp. `None` when nothing matches; the
    /// queue is left untouched in that case.
    pub fn find_time_for(&mut self, drawn: &DisplayPortMetrics) -> Option<Instant> {
        let idx = self
            .entries
            .iter()
            .position(|(dp, _)| dp.fuzzy_equals(drawn, self.tolerance))?;
        let (_, at) = self.entries[idx];
        self.entries.drain(..=idx);
        Some(at)
    }

    /// Drop every outstanding request.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
