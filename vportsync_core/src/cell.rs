//! Lock-free publication of viewport snapshots.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::metrics::ViewportMetrics;

/// Holds the current [`ViewportMetrics`] behind an atomic pointer.
///
/// `store` swaps the pointer with release ordering and `load` reads it with
/// acquire ordering, so a reader sees either the previous snapshot or the new
/// one in full, never a mix. Neither side blocks the other. Readers that keep
/// an `Arc` from `load` keep that snapshot alive after it is replaced.
#[derive(Debug)]
pub struct MetricsCell {
    inner: ArcSwap<ViewportMetrics>,
}

impl MetricsCell {
    pub fn new(metrics: ViewportMetrics) -> Self {
        Self {
            inner: ArcSwap::from_pointee(metrics),
        }
    }

    /// The latest published snapshot.
    pub fn load(&self) -> Arc<ViewportMetrics> {
        self.inner.load_full()
    }

    /// Publish `metrics` and return the shared snapshot.
    pub fn store(&self, metrics: ViewportMetrics) -> Arc<ViewportMetrics> {
        let snapshot = Arc::new(metrics);
        self.inner.store(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use euclid::{point2, size2};

    use super::MetricsCell;
    use crate::metrics::ViewportMetrics;

    #[test]
    fn store_replaces_and_old_snapshot_survives() {
        let first = ViewportMetrics::new(size2(100.0, 100.0));
        let cell = MetricsCell::new(first);
        let held = cell.load();

        let second = cell.store(first.with_origin(point2(0.0, 10.0)));
        assert_eq!(*held, first);
        assert!(Arc::ptr_eq(&cell.load(), &second));
        assert_eq!(cell.load().origin().y, 10.0);
    }
}
