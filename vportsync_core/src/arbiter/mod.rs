//! Abort decisions for in-flight progressive render passes.
//!
//! The content engine draws a display-port progressively, possibly as a
//! coarse low-precision pass followed by a high-precision one, and asks
//! before each step whether the work is still wanted. The arbiter answers on
//! the render thread using only render-thread state plus lock-free snapshots.
//!
//! When unsure, it lets the pass finish: a redundant draw costs a little
//! time, while a wrong abort can leave a blank region on screen or loop the
//! content engine through endless restarts.

use std::sync::Arc;

use crate::config::ArbiterConfig;
use crate::display_port::{DisplayPortCalculator, DisplayPortMetrics};
use crate::metrics::ViewportMetrics;
use crate::units::{DeviceRect, DeviceVector, EPSILON, edges_within};

/// Outcome of one [`ProgressiveUpdateArbiter::decide`] call.
///
/// The arbiter owns a single instance and overwrites it on every call, so a
/// reference to it is only meaningful until the next decision.
#[derive(Debug, Clone)]
pub struct ProgressiveUpdateData {
    abort: bool,
    viewport: Arc<ViewportMetrics>,
}

impl ProgressiveUpdateData {
    /// Whether the content engine should drop the current pass.
    pub fn abort(&self) -> bool {
        self.abort
    }

    /// The snapshot the decision was made against.
    pub fn viewport(&self) -> &Arc<ViewportMetrics> {
        &self.viewport
    }
}

/// One pass the content engine is about to continue.
#[derive(Debug, Clone, Copy)]
pub struct ProgressiveRequest {
    /// Newer content is queued behind this pass.
    pub has_pending_new_content: bool,
    pub region: DeviceRect,
    pub resolution: f32,
    pub low_precision: bool,
}

/// Shared state the arbiter reads but does not own.
pub struct FrameContext<'a> {
    /// Current canonical snapshot.
    pub viewport: &'a Arc<ViewportMetrics>,
    /// Last display-port sent to the content engine.
    pub display_port: &'a DisplayPortMetrics,
    pub velocity: DeviceVector,
    pub calculator: &'a DisplayPortCalculator,
}

/// Render-thread-private progressive update state for one document.
#[derive(Debug)]
pub struct ProgressiveUpdateArbiter {
    config: ArbiterConfig,
    was_low_precision_last: bool,
    in_danger: bool,
    last_high_precision: DisplayPortMetrics,
    data: ProgressiveUpdateData,
}

impl ProgressiveUpdateArbiter {
    pub fn new(config: ArbiterConfig, viewport: Arc<ViewportMetrics>) -> Self {
        Self {
            config,
            was_low_precision_last: false,
            in_danger: false,
            last_high_precision: DisplayPortMetrics::empty(),
            data: ProgressiveUpdateData {
                abort: false,
                viewport,
            },
        }
    }

    /// Forget per-document state; called when a new document paints.
    pub fn reset(&mut self) {
        self.was_low_precision_last = false;
        self.in_danger = false;
        self.last_high_precision = DisplayPortMetrics::empty();
    }

    /// Whether low-precision passes are currently worth drawing.
    pub fn in_danger(&self) -> bool {
        self.in_danger
    }

    /// The most recent high-precision region the content engine drew.
    pub fn last_high_precision(&self) -> &DisplayPortMetrics {
        &self.last_high_precision
    }

    /// Decide whether the pass described by `request` should be abandoned.
    ///
    /// Low-precision passes are skipped outright unless a high-precision
    /// pass has predicted checkerboarding. Any pass is dropped when its
    /// resolution no longer matches the zoom or when it no longer covers the
    /// visible part of the page. A pass matching the last display-port sent
    /// always continues, since nothing newer is known to be coming.
    pub fn decide(
        &mut self,
        ctx: &FrameContext<'_>,
        request: &ProgressiveRequest,
    ) -> &ProgressiveUpdateData {
        if request.low_precision && !self.in_danger {
            self.data.abort = true;
            return &self.data;
        }

        // Precision recovered.
        if !request.low_precision && self.was_low_precision_last {
            self.in_danger = false;
        }
        self.was_low_precision_last = request.low_precision;

        self.data.viewport = Arc::clone(ctx.viewport);
        self.data.abort = false;
        let viewport: &ViewportMetrics = ctx.viewport;

        if (request.resolution - viewport.zoom()).abs() >= self.config.resolution_epsilon {
            log::debug!("arbiter: aborting draw due to resolution change");
            self.data.abort = true;
            return &self.data;
        }

        if !request.low_precision {
            let drawn = DisplayPortMetrics::new(request.region, request.resolution);
            if !drawn.fuzzy_equals(&self.last_high_precision, EPSILON) {
                self.last_high_precision = drawn;
            }
        }

        if edges_within(
            &ctx.display_port.rect(),
            &self.last_high_precision.rect(),
            self.config.display_port_tolerance,
        ) {
            return &self.data;
        }

        if !request.low_precision
            && !self.in_danger
            && ctx.calculator.about_to_checkerboard(
                viewport,
                ctx.velocity,
                &self.last_high_precision,
            )
        {
            self.in_danger = true;
        }

        if !covers_visible_page(&request.region, viewport, self.config.coverage_slack) {
            log::debug!("arbiter: aborting update due to viewport not in display-port");
            self.data.abort = true;
            return &self.data;
        }

        // A stale coarse pass is only worth finishing while something newer
        // is still on its way.
        if request.low_precision && !request.has_pending_new_content {
            self.data.abort = true;
        }
        &self.data
    }
}

/// Whether `region` covers the viewport cropped to the page, give or take
/// `slack` pixels on each edge.
fn covers_visible_page(region: &DeviceRect, metrics: &ViewportMetrics, slack: f32) -> bool {
    let vp = metrics.viewport();
    let page = metrics.page_rect();
    vp.min_x().max(page.min_x()) + slack >= region.min_x()
        && vp.min_y().max(page.min_y()) + slack >= region.min_y()
        && vp.max_x().min(page.max_x()) - slack <= region.max_x()
        && vp.max_y().min(page.max_y()) - slack <= region.max_y()
}

#[cfg(test)]
mod tests;
