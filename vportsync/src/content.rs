//! A stand-in content engine.
//!
//! Requests arrive on the UI thread through [`ContentEngine`]. The render
//! thread's [`Painter`] then "draws" the newest one in timed passes, asking
//! the compositor bridge before every step whether to keep going, and hands
//! back finished regions as updated layers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use vportsync_core::units::DeviceIntSize;
use vportsync_core::{
    CompositorBridge, ContentEngine, DisplayPortMetrics, ProgressiveRequest, ViewportMetrics,
};

/// Content engine that queues display-port requests for a [`Painter`].
#[derive(Default)]
pub struct SimulatedContent {
    requests: Mutex<VecDeque<DisplayPortMetrics>>,
    received: AtomicUsize,
    resizes: AtomicUsize,
    view_size_changes: AtomicUsize,
}

impl SimulatedContent {
    /// Take the newest request; anything older is superseded.
    fn take_newest(&self) -> Option<DisplayPortMetrics> {
        let mut requests = self.requests.lock();
        let newest = requests.pop_back();
        requests.clear();
        newest
    }

    fn has_pending(&self) -> bool {
        !self.requests.lock().is_empty()
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    pub fn resizes(&self) -> usize {
        self.resizes.load(Ordering::Relaxed)
    }

    pub fn view_size_changes(&self) -> usize {
        self.view_size_changes.load(Ordering::Relaxed)
    }
}

impl ContentEngine for SimulatedContent {
    fn send_viewport(&self, metrics: &ViewportMetrics, display_port: &DisplayPortMetrics) {
        log::trace!(
            "content: viewport {:?} display-port {:?}",
            metrics.viewport(),
            display_port.rect()
        );
        self.requests.lock().push_back(*display_port);
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn send_resize(&self, window: DeviceIntSize, screen: DeviceIntSize) {
        log::debug!(
            "content: resize window {}x{} screen {}x{}",
            window.width,
            window.height,
            screen.width,
            screen.height
        );
        self.resizes.fetch_add(1, Ordering::Relaxed);
    }

    fn view_size_changed(&self) {
        self.view_size_changes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pass outcomes, reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaintStats {
    pub completed: u32,
    pub aborted_low: u32,
    pub aborted_high: u32,
    pub frames: u32,
}

struct Pass {
    display_port: DisplayPortMetrics,
    low_precision: bool,
    remaining: Duration,
}

/// Render-thread side of the simulated content engine.
pub struct Painter {
    content: Arc<SimulatedContent>,
    px_per_ms: f32,
    low_precision_first: bool,
    pass: Option<Pass>,
    stats: PaintStats,
}

impl Painter {
    pub fn new(content: Arc<SimulatedContent>, px_per_ms: f32, low_precision_first: bool) -> Self {
        Self {
            content,
            px_per_ms,
            low_precision_first,
            pass: None,
            stats: PaintStats::default(),
        }
    }

    pub fn stats(&self) -> PaintStats {
        self.stats
    }

    /// Advance drawing by one frame of `elapsed` and return the region
    /// finished during it, if any.
    pub fn step(&mut self, bridge: &mut CompositorBridge, elapsed: Duration) -> Option<DisplayPortMetrics> {
        self.stats.frames += 1;
        if self.pass.is_none() {
            let display_port = self.content.take_newest()?;
            self.pass = Some(self.start(display_port, self.low_precision_first));
        }
        let pass = self.pass.as_mut()?;

        let request = ProgressiveRequest {
            has_pending_new_content: self.content.has_pending(),
            region: pass.display_port.rect(),
            resolution: pass.display_port.resolution(),
            low_precision: pass.low_precision,
        };
        if bridge.progressive_update(&request).abort() {
            if pass.low_precision {
                self.stats.aborted_low += 1;
                let display_port = pass.display_port;
                self.pass = Some(self.start(display_port, false));
            } else {
                self.stats.aborted_high += 1;
                self.pass = None;
            }
            return None;
        }

        pass.remaining = pass.remaining.saturating_sub(elapsed);
        if !pass.remaining.is_zero() {
            return None;
        }
        let display_port = pass.display_port;
        if pass.low_precision {
            self.pass = Some(self.start(display_port, false));
            return None;
        }
        self.pass = None;
        self.stats.completed += 1;
        Some(display_port)
    }

    fn start(&self, display_port: DisplayPortMetrics, low_precision: bool) -> Pass {
        let mut area = display_port.rect().area();
        if low_precision {
            // A coarse pass touches a quarter of the pixels.
            area /= 4.0;
        }
        let ms = (area / self.px_per_ms).max(1.0);
        Pass {
            display_port,
            low_precision,
            remaining: Duration::from_secs_f32(ms / 1000.0),
        }
    }
}
