//! Display-port derivation and checkerboard prediction.
//!
//! The display-port is the region (and resolution) the content engine is
//! asked to render. It over-provisions around the viewport so that scrolling
//! reveals already-rendered content while the next render is in flight. The
//! calculator biases that over-provisioning toward the direction of travel
//! and sizes the leading margin from a running estimate of how fast the
//! content engine draws.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use euclid::{point2, size2};

use crate::config::CalculatorConfig;
use crate::metrics::ViewportMetrics;
use crate::units::{DeviceRect, DeviceVector, edges_within, fuzzy_eq};

/// A region to render and the scale to render it at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPortMetrics {
    rect: DeviceRect,
    resolution: f32,
}

impl DisplayPortMetrics {
    pub fn new(rect: DeviceRect, resolution: f32) -> Self {
        Self { rect, resolution }
    }

    /// Zero-sized region at resolution 1; what is "sent" before anything is.
    pub fn empty() -> Self {
        Self {
            rect: DeviceRect::zero(),
            resolution: 1.0,
        }
    }

    pub fn rect(&self) -> DeviceRect {
        self.rect
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Same region (each edge within `tolerance`) at the same resolution.
    pub fn fuzzy_equals(&self, other: &Self, tolerance: f32) -> bool {
        fuzzy_eq(self.resolution, other.resolution) && edges_within(&self.rect, &other.rect, tolerance)
    }
}

/// Velocity-biased display-port strategy with adaptive draw-time feedback.
///
/// `calculate` runs on the control thread while `draw_time_update` runs on
/// the render thread, so the adaptive state lives in atomics and every
/// method takes `&self`. The render thread is the only writer of the draw
/// rate; the control thread only reads it.
#[derive(Debug)]
pub struct DisplayPortCalculator {
    config: CalculatorConfig,
    /// Running average of content draw speed in pixels/ms, as `f32` bits.
    /// Zero means nothing has been measured yet.
    pixels_per_ms: AtomicU32,
    /// Samples folded into `pixels_per_ms` since the last reset.
    samples: AtomicU32,
    /// Consecutive calculations above `high_velocity`.
    fast_streak: AtomicU32,
}

impl DisplayPortCalculator {
    pub fn new(config: CalculatorConfig) -> Self {
        Self {
            config,
            pixels_per_ms: AtomicU32::new(0),
            samples: AtomicU32::new(0),
            fast_streak: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Derive the display-port for `metrics` moving at `velocity` (device
    /// px/s).
    ///
    /// At rest the region extends `base_margin_fraction` of the viewport on
    /// every side. In motion the leading side grows by the distance covered
    /// during one estimated draw, the trailing side shrinks to
    /// `reverse_buffer` of the base, and the total on each axis never exceeds
    /// `max_size_multiplier` viewports. The result is shifted, then cropped,
    /// into the page bounds.
    pub fn calculate(&self, metrics: &ViewportMetrics, velocity: DeviceVector) -> DisplayPortMetrics {
        let viewport = metrics.viewport();
        let grown_area = viewport.area() * (1.0 + 2.0 * self.config.base_margin_fraction).powi(2);
        let draw_secs = self.estimated_draw_secs(grown_area);

        let (left, right) = self.axis_margins(viewport.width(), velocity.x, draw_secs);
        let (top, bottom) = self.axis_margins(viewport.height(), velocity.y, draw_secs);

        let rect = DeviceRect::new(
            point2(viewport.min_x() - left, viewport.min_y() - top),
            size2(
                viewport.width() + left + right,
                viewport.height() + top + bottom,
            ),
        );
        let rect = clamp_to_page(rect, metrics.page_rect()).unwrap_or(viewport);

        DisplayPortMetrics::new(rect, metrics.zoom() * self.resolution_tier(velocity))
    }

    /// Whether the viewport, projected `checkerboard_horizon_secs` ahead
    /// along `velocity`, escapes `display_port`.
    ///
    /// [`DisplayPortMetrics::empty`] contains nothing, so before the first
    /// request this always reports danger.
    pub fn about_to_checkerboard(
        &self,
        metrics: &ViewportMetrics,
        velocity: DeviceVector,
        display_port: &DisplayPortMetrics,
    ) -> bool {
        let projected = metrics
            .viewport()
            .translate(velocity * self.config.checkerboard_horizon_secs);
        display_port.rect.is_empty() || !display_port.rect.contains_rect(&projected)
    }

    /// Fold a completed render of `pixel_area` pixels that took `elapsed`
    /// into the draw-speed estimate.
    ///
    /// Returns `false` once `draw_time_samples` samples have been collected;
    /// callers should stop measuring until [`reset_page_state`] re-arms it.
    ///
    /// [`reset_page_state`]: Self::reset_page_state
    pub fn draw_time_update(&self, elapsed: Duration, pixel_area: f32) -> bool {
        let limit = self.config.draw_time_samples;
        let ms = elapsed.as_secs_f32() * 1000.0;
        if ms <= 0.0 || pixel_area.is_nan() || pixel_area <= 0.0 {
            return self.samples.load(Ordering::Relaxed) < limit;
        }

        let rate = pixel_area / ms;
        let prev = f32::from_bits(self.pixels_per_ms.load(Ordering::Relaxed));
        let next = if prev > 0.0 {
            let w = self.config.ewma_weight;
            w * rate + (1.0 - w) * prev
        } else {
            rate
        };
        self.pixels_per_ms.store(next.to_bits(), Ordering::Release);

        let n = self.samples.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= limit {
            log::debug!("display_port: draw rate settled at {next:.1} px/ms after {n} samples");
            return false;
        }
        true
    }

    /// Forget everything learned about the current document.
    pub fn reset_page_state(&self) {
        self.pixels_per_ms.store(0, Ordering::Release);
        self.samples.store(0, Ordering::Relaxed);
        self.fast_streak.store(0, Ordering::Relaxed);
    }

    /// Measured draw speed, if any samples have been recorded.
    pub fn pixels_per_ms(&self) -> Option<f32> {
        let rate = f32::from_bits(self.pixels_per_ms.load(Ordering::Acquire));
        (rate > 0.0).then_some(rate)
    }

    fn estimated_draw_secs(&self, area: f32) -> f32 {
        match self.pixels_per_ms() {
            Some(rate) => area / rate / 1000.0,
            None => self.config.default_draw_time_ms / 1000.0,
        }
    }

    /// Margins `(before, after)` on one axis of length `extent`.
    fn axis_margins(&self, extent: f32, velocity: f32, draw_secs: f32) -> (f32, f32) {
        let base = extent * self.config.base_margin_fraction;
        let max_total = extent * (self.config.max_size_multiplier - 1.0);

        if velocity.abs() <= self.config.velocity_threshold {
            let m = base.min(max_total / 2.0);
            return (m, m);
        }

        let lead = (base + velocity.abs() * draw_secs).min(max_total);
        let trail = (base * self.config.reverse_buffer).min(max_total - lead);
        if velocity > 0.0 { (trail, lead) } else { (lead, trail) }
    }

    /// Resolution multiplier: drops to the low tier after enough consecutive
    /// high-velocity calculations.
    fn resolution_tier(&self, velocity: DeviceVector) -> f32 {
        if velocity.length() > self.config.high_velocity {
            let streak = self.fast_streak.fetch_add(1, Ordering::Relaxed) + 1;
            if streak >= self.config.sustained_frames {
                return self.config.low_resolution_scale;
            }
        } else {
            self.fast_streak.store(0, Ordering::Relaxed);
        }
        1.0
    }
}

/// Slide `rect` back inside `page` on each axis, then crop whatever still
/// overhangs. `None` when the two do not overlap.
fn clamp_to_page(rect: DeviceRect, page: DeviceRect) -> Option<DeviceRect> {
    let mut x = rect.min_x();
    let mut y = rect.min_y();
    if x < page.min_x() {
        x = page.min_x();
    }
    if x + rect.width() > page.max_x() {
        x = page.max_x() - rect.width();
    }
    if y < page.min_y() {
        y = page.min_y();
    }
    if y + rect.height() > page.max_y() {
        y = page.max_y() - rect.height();
    }
    DeviceRect::new(point2(x, y), rect.size).intersection(&page)
}
