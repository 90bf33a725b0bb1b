//! Render-thread side of the synchronizer.

use std::sync::Arc;

use super::ViewportSynchronizer;
use crate::arbiter::{FrameContext, ProgressiveRequest, ProgressiveUpdateArbiter, ProgressiveUpdateData};
use crate::display_port::DisplayPortMetrics;
use crate::error::MetricsError;
use crate::metrics::ViewportMetrics;
use crate::units::{CssRect, DeviceMargins, DevicePoint, DeviceRect};

/// Where to draw the content layer this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub origin: DevicePoint,
    pub scale: f32,
    /// Fixed margins, shrunk by however far the viewport is overscrolled.
    pub fixed_margins: DeviceMargins,
}

/// The compositor's handle on a [`ViewportSynchronizer`].
///
/// Owned by the render thread. `sync_viewport_info` and
/// `progressive_update` run once or more per frame: they never take the
/// synchronizer's control lock, never allocate, and never panic. The scratch
/// values they return are overwritten by the next call.
#[derive(Debug)]
pub struct CompositorBridge {
    sync: Arc<ViewportSynchronizer>,
    frame_metrics: Arc<ViewportMetrics>,
    transform: ViewTransform,
    /// Position and resolution of the content layer as last drawn.
    layer: DisplayPortMetrics,
    arbiter: ProgressiveUpdateArbiter,
}

impl CompositorBridge {
    pub fn new(sync: Arc<ViewportSynchronizer>) -> Self {
        let frame_metrics = sync.current_metrics();
        let arbiter = ProgressiveUpdateArbiter::new(
            sync.arbiter_config().clone(),
            Arc::clone(&frame_metrics),
        );
        Self {
            transform: transform_for(&frame_metrics),
            frame_metrics,
            layer: DisplayPortMetrics::empty(),
            arbiter,
            sync,
        }
    }

    pub fn synchronizer(&self) -> &Arc<ViewportSynchronizer> {
        &self.sync
    }

    /// Start a frame: take the latest snapshot and work out where the
    /// content layer goes.
    ///
    /// `region` and `resolution` describe what the content layer currently
    /// holds. With `layers_updated`, that content is new this frame and is
    /// matched against outstanding requests to time the content engine.
    pub fn sync_viewport_info(
        &mut self,
        region: DeviceRect,
        resolution: f32,
        layers_updated: bool,
    ) -> &ViewTransform {
        self.frame_metrics = self.sync.current_metrics();
        self.transform = transform_for(&self.frame_metrics);
        self.layer = DisplayPortMetrics::new(region, resolution);

        if layers_updated {
            self.sync.record_frame(&self.layer);
        }
        &self.transform
    }

    /// The snapshot the current frame is composited with.
    pub fn frame_metrics(&self) -> &Arc<ViewportMetrics> {
        &self.frame_metrics
    }

    /// What the content layer held at the last `sync_viewport_info`.
    pub fn layer(&self) -> &DisplayPortMetrics {
        &self.layer
    }

    /// Should the content engine keep drawing this progressive pass?
    pub fn progressive_update(&mut self, request: &ProgressiveRequest) -> &ProgressiveUpdateData {
        let viewport = self.sync.current_metrics();
        let display_port = self.sync.display_port();
        let ctx = FrameContext {
            viewport: &viewport,
            display_port: &display_port,
            velocity: self.sync.collaborators().pan_zoom.velocity(),
            calculator: self.sync.calculator(),
        };
        self.arbiter.decide(&ctx, request)
    }

    pub fn arbiter(&self) -> &ProgressiveUpdateArbiter {
        &self.arbiter
    }

    /// Forward a first paint and start a fresh arbiter history.
    ///
    /// Unlike the per-frame calls, this takes the control lock.
    pub fn first_paint(
        &mut self,
        origin: DevicePoint,
        zoom: f32,
        page_rect: DeviceRect,
        css_page_rect: CssRect,
    ) -> Result<(), MetricsError> {
        self.sync
            .on_first_paint(origin, zoom, page_rect, css_page_rect)?;
        self.arbiter.reset();
        Ok(())
    }

    /// Forward a page-size change. Takes the control lock.
    pub fn page_rect_changed(&self, css_page_rect: CssRect) -> Result<(), MetricsError> {
        self.sync.on_page_rect_changed(css_page_rect)
    }
}

fn transform_for(metrics: &ViewportMetrics) -> ViewTransform {
    ViewTransform {
        origin: metrics.origin(),
        scale: metrics.zoom(),
        fixed_margins: metrics.overscroll_adjusted_margins(),
    }
}
