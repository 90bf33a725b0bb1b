//! The canonical viewport and everything that feeds it.
//!
//! [`ViewportSynchronizer`] is the single writer of the published
//! [`ViewportMetrics`]. Updates arrive from the UI thread (gestures, geometry
//! changes, chrome margins) and from the content engine (first paint, page
//! size, scroll position). Each update is validated, merged with local state,
//! clamped and published in one critical section on `control`; the render
//! thread reads through [`CompositorBridge`] without ever taking that lock.
//!
//! Lock order: `control`, then `timing`. The render thread only ever
//! `try_lock`s `timing`.

mod compositor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use arc_swap::ArcSwap;
use euclid::size2;
use parking_lot::Mutex;

pub use compositor::{CompositorBridge, ViewTransform};

use crate::cell::MetricsCell;
use crate::config::{ArbiterConfig, Config};
use crate::display_port::{DisplayPortCalculator, DisplayPortMetrics};
use crate::error::MetricsError;
use crate::event::{Collaborators, Event, OwnerId};
use crate::metrics::ViewportMetrics;
use crate::timing::DrawTimingQueue;
use crate::units::{
    CssPoint, CssRect, DeviceIntSize, DevicePoint, DeviceRect, DeviceSize, DeviceVector, edges_within,
    fuzzy_eq, margins,
};

/// Where the current document is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DocumentState {
    /// Nothing has painted yet.
    NoDocument = 0,
    /// A document painted but no frame of it has been composited.
    FirstPaint = 1,
    SteadyState = 2,
}

impl DocumentState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::FirstPaint,
            2 => Self::SteadyState,
            _ => Self::NoDocument,
        }
    }
}

/// Page-declared zoom limits, forwarded from the content engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomConstraints {
    pub allow_zoom: bool,
    pub default_zoom: Option<f32>,
    pub min_zoom: Option<f32>,
    pub max_zoom: Option<f32>,
}

impl Default for ZoomConstraints {
    fn default() -> Self {
        Self {
            allow_zoom: true,
            default_zoom: None,
            min_zoom: None,
            max_zoom: None,
        }
    }
}

impl ZoomConstraints {
    /// Pull `zoom` inside the declared limits. When zooming is disallowed,
    /// the default zoom (or `current`) wins.
    pub fn constrain(&self, zoom: f32, current: f32) -> f32 {
        if !self.allow_zoom {
            return self.default_zoom.unwrap_or(current);
        }
        let zoom = self.min_zoom.map_or(zoom, |min| zoom.max(min));
        self.max_zoom.map_or(zoom, |max| zoom.min(max))
    }
}

/// Control-side state guarded by the coarse lock.
#[derive(Debug)]
struct ControlState {
    /// Bypass the redraw-hint gate once.
    force_redraw: bool,
    clamp_on_margin_change: bool,
    zoom_constraints: ZoomConstraints,
    screen_size: DeviceIntSize,
    /// Sizes last reported to the content engine.
    sent_window_size: DeviceIntSize,
    sent_screen_size: DeviceIntSize,
}

/// Owns the canonical viewport snapshot and keeps the content engine in step
/// with it.
pub struct ViewportSynchronizer {
    metrics: MetricsCell,
    /// Last display-port handed to the content engine. Zero-sized until the
    /// first request.
    display_port: ArcSwap<DisplayPortMetrics>,
    /// The viewport as the content engine last heard it. Written on the UI
    /// thread.
    content_viewport: Arc<MetricsCell>,
    control: Mutex<ControlState>,
    calculator: DisplayPortCalculator,
    timing: Mutex<DrawTimingQueue>,
    record_draw_times: AtomicBool,
    content_ready: AtomicBool,
    document: AtomicU8,
    arbiter_config: ArbiterConfig,
    collaborators: Collaborators,
}

impl std::fmt::Debug for ViewportSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportSynchronizer")
            .field("metrics", &self.metrics.load())
            .field("display_port", &self.display_port())
            .field("document", &self.document_state())
            .finish_non_exhaustive()
    }
}

impl ViewportSynchronizer {
    /// Start with `initial` (usually a page-less snapshot of the surface
    /// size) and no document.
    pub fn new(
        config: &Config,
        initial: ViewportMetrics,
        collaborators: Collaborators,
    ) -> Result<Self, MetricsError> {
        initial.validate()?;
        Ok(Self {
            metrics: MetricsCell::new(initial),
            display_port: ArcSwap::from_pointee(DisplayPortMetrics::empty()),
            content_viewport: Arc::new(MetricsCell::new(initial)),
            control: Mutex::new(ControlState {
                force_redraw: true,
                clamp_on_margin_change: config.sync.clamp_on_margin_change,
                zoom_constraints: ZoomConstraints::default(),
                screen_size: DeviceIntSize::zero(),
                sent_window_size: DeviceIntSize::zero(),
                sent_screen_size: DeviceIntSize::zero(),
            }),
            calculator: DisplayPortCalculator::new(config.calculator.clone()),
            timing: Mutex::new(DrawTimingQueue::new(&config.timing)),
            record_draw_times: AtomicBool::new(true),
            content_ready: AtomicBool::new(false),
            document: AtomicU8::new(DocumentState::NoDocument as u8),
            arbiter_config: config.arbiter.clone(),
            collaborators,
        })
    }

    // --- readers ---

    /// The latest published snapshot. Lock-free.
    pub fn current_metrics(&self) -> Arc<ViewportMetrics> {
        self.metrics.load()
    }

    /// The last display-port sent to the content engine. Lock-free.
    pub fn display_port(&self) -> Arc<DisplayPortMetrics> {
        self.display_port.load_full()
    }

    /// The viewport the content engine was last told about.
    pub fn content_viewport(&self) -> Arc<ViewportMetrics> {
        self.content_viewport.load()
    }

    pub fn document_state(&self) -> DocumentState {
        DocumentState::from_u8(self.document.load(Ordering::Acquire))
    }

    pub fn calculator(&self) -> &DisplayPortCalculator {
        &self.calculator
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn is_content_ready(&self) -> bool {
        self.content_ready.load(Ordering::Acquire)
    }

    /// Whether completed frames are still being timed.
    pub fn is_recording_draw_times(&self) -> bool {
        self.record_draw_times.load(Ordering::Acquire)
    }

    pub fn zoom_constraints(&self) -> ZoomConstraints {
        self.control.lock().zoom_constraints
    }

    /// Map a point in view space to CSS pixels relative to the content
    /// engine's scroll position. `None` until content is ready.
    pub fn convert_view_point_to_layer_point(&self, view_point: DevicePoint) -> Option<CssPoint> {
        if !self.is_content_ready() {
            return None;
        }
        let local = self.metrics.load();
        let remote = self.content_viewport.load();
        let (origin, zoom) = (local.origin(), local.zoom());
        let (content_origin, content_zoom) = (remote.origin(), remote.zoom());
        Some(CssPoint::new(
            (view_point.x + origin.x) / zoom - content_origin.x / content_zoom,
            (view_point.y + origin.y) / zoom - content_origin.y / content_zoom,
        ))
    }

    // --- content engine updates ---

    /// A new document painted for the first time.
    ///
    /// Replaces origin, zoom and page bounds wholesale. The device page rect
    /// is re-derived from `css_page_rect`; a `page_rect` disagreeing with it
    /// is logged and ignored. An origin pinned to the page top is moved up
    /// by the top fixed margin so the chrome does not cover content.
    pub fn on_first_paint(
        &self,
        origin: DevicePoint,
        zoom: f32,
        page_rect: DeviceRect,
        css_page_rect: CssRect,
    ) -> Result<(), MetricsError> {
        let mut state = self.control.lock();
        let current = self.metrics.load();

        let mut next = current.with_zoom(zoom).with_page_rect(css_page_rect);
        if !edges_within(&next.page_rect(), &page_rect, 1.0) {
            log::warn!(
                "sync: first paint page rect {page_rect:?} disagrees with css rect at zoom {zoom}, using {:?}",
                next.page_rect()
            );
        }
        let mut origin = origin;
        if fuzzy_eq(origin.y, next.page_rect().min_y()) {
            origin.y = next.page_rect().min_y() - current.fixed_margins().top;
        }
        next = next.with_origin(origin);
        let next = checked(next, "first paint")?;

        log::debug!(
            "sync: first paint at {:?} zoom {} page {:?}",
            next.origin(),
            next.zoom(),
            next.css_page_rect()
        );

        self.calculator.reset_page_state();
        self.timing.lock().reset();
        self.record_draw_times.store(true, Ordering::Release);
        self.content_ready.store(true, Ordering::Release);
        self.document
            .store(DocumentState::FirstPaint as u8, Ordering::Release);

        self.post_content_viewport(next);
        // A new document needs a display-port even if the view did not move.
        state.force_redraw = true;
        self.publish(&mut state, next, true, true);
        self.post_abort_animation();
        self.collaborators.post_event(Event::FirstPaint);
        Ok(())
    }

    /// The content engine resized the page.
    ///
    /// Only the page fields change; no new display-port is requested.
    pub fn on_page_rect_changed(&self, css_page_rect: CssRect) -> Result<(), MetricsError> {
        let _state = self.control.lock();
        let current = self.metrics.load();
        if current.css_page_rect() == css_page_rect {
            return Ok(());
        }
        let next = checked(current.with_page_rect(css_page_rect), "page rect")?;
        let snapshot = self.metrics.store(next);

        let pan_zoom = Arc::clone(&self.collaborators.pan_zoom);
        self.collaborators
            .ui
            .post(Box::new(move || pan_zoom.page_rect_updated(&snapshot)));
        self.collaborators.post_event(Event::RequestRender);
        Ok(())
    }

    /// Merge viewport metrics reported by the content engine and return the
    /// display-port it should render next.
    ///
    /// The viewport size always stays local. A page-size update takes only
    /// the page bounds, rescaled from the remote zoom to the local one; any
    /// other update takes position and zoom too and cancels a running
    /// animation when it moves the viewport noticeably.
    pub fn on_external_viewport_update(
        &self,
        remote: &ViewportMetrics,
        is_page_size_update: bool,
    ) -> Result<DisplayPortMetrics, MetricsError> {
        checked(*remote, "external update")?;
        let mut state = self.control.lock();
        let old = self.metrics.load();

        let next = if is_page_size_update {
            old.with_page_rect(remote.css_page_rect())
        } else {
            let next = remote
                .with_viewport_size(old.size())
                .with_fixed_margins_from(&old);
            if !old.fuzzy_equals(&next) {
                self.post_abort_animation();
            }
            let margin_top = old.fixed_margins().top;
            let page_top = next.page_rect().min_y();
            if margin_top > 0.0 && fuzzy_eq(next.origin().y, page_top) {
                next.with_origin(DevicePoint::new(next.origin().x, page_top - margin_top))
            } else {
                next
            }
        };
        let next = checked(next.clamp(), "external update")?;

        self.post_content_viewport(next);
        self.publish(&mut state, next, !is_page_size_update, true);

        let display_port = self
            .calculator
            .calculate(&self.metrics.load(), DeviceVector::zero());
        self.display_port.store(Arc::new(display_port));
        Ok(display_port)
    }

    /// Entry point for the content engine asking what to render.
    ///
    /// Only the selected, foregrounded document updates the canonical
    /// viewport; a background document gets a display-port computed from its
    /// own metrics and changes nothing here.
    pub fn get_display_port(
        &self,
        is_page_size_update: bool,
        is_foreground: bool,
        owner: OwnerId,
        remote: &ViewportMetrics,
    ) -> Result<DisplayPortMetrics, MetricsError> {
        if is_foreground && self.collaborators.tabs.is_selected(owner) {
            return self.on_external_viewport_update(remote, is_page_size_update);
        }
        checked(*remote, "background display-port")?;
        Ok(self.calculator.calculate(remote, DeviceVector::zero()))
    }

    /// Allow notifications to the content engine. First paint implies this.
    pub fn mark_content_ready(&self) {
        let _state = self.control.lock();
        self.content_ready.store(true, Ordering::Release);
    }

    // --- UI updates ---

    /// The visible area changed size.
    ///
    /// Clamps the viewport and, if the redraw-hint gate allows, sends a
    /// fresh display-port.
    pub fn on_geometry_changed(&self, size: DeviceSize) -> Result<(), MetricsError> {
        let mut state = self.control.lock();
        let current = self.metrics.load();
        let next = checked(current.with_viewport_size(size).clamp(), "geometry")?;
        self.publish(&mut state, next, false, true);
        self.geometry_changed(&mut state);
        Ok(())
    }

    /// The drawing surface changed size. Once content is ready, the content
    /// engine hears about it right away.
    pub fn on_viewport_resized(&self, size: DeviceSize) -> Result<(), MetricsError> {
        let mut state = self.control.lock();
        let current = self.metrics.load();
        let next = checked(current.with_viewport_size(size), "viewport resize")?;
        self.metrics.store(next);
        if self.is_content_ready() {
            self.send_resize(&mut state, true);
            let content = Arc::clone(&self.collaborators.content);
            self.collaborators
                .ui
                .post(Box::new(move || content.view_size_changed()));
        }
        Ok(())
    }

    /// Record the physical screen size reported with resize events.
    pub fn set_screen_size(&self, size: DeviceIntSize) {
        self.control.lock().screen_size = size;
    }

    /// Report window and screen sizes to the content engine if either
    /// changed since the last report, or unconditionally with `force`.
    pub fn send_resize_if_necessary(&self, force: bool) {
        let mut state = self.control.lock();
        self.send_resize(&mut state, force);
    }

    /// Chrome overlapping the content edges changed size.
    ///
    /// With clamp-on-margin-change enabled, a margin that shrinks while the
    /// viewport is overscrolled past it pulls the viewport back to the new
    /// bound. The adjustment only ever reduces overscroll.
    pub fn set_fixed_layer_margins(
        &self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    ) -> Result<(), MetricsError> {
        let mut state = self.control.lock();
        let old = self.metrics.load();
        let mut next = old.with_fixed_margins(margins(left, top, right, bottom));
        if state.clamp_on_margin_change {
            next = clamp_on_margin_change(&old, &next);
        }
        let next = checked(next, "fixed margins")?;
        self.publish(&mut state, next, false, false);
        Ok(())
    }

    pub fn set_clamp_on_margin_change(&self, enabled: bool) {
        self.control.lock().clamp_on_margin_change = enabled;
    }

    pub fn set_zoom_constraints(&self, constraints: ZoomConstraints) {
        self.control.lock().zoom_constraints = constraints;
    }

    // --- pan/zoom updates ---

    /// Publish metrics produced by the pan/zoom controller. Fixed margins
    /// stay as they are, and the zoom is held inside the page's zoom
    /// constraints.
    pub fn set_viewport_metrics(&self, metrics: ViewportMetrics) -> Result<(), MetricsError> {
        let metrics = checked(metrics, "pan/zoom")?;
        let mut state = self.control.lock();
        let current = self.metrics.load();
        let zoom = state
            .zoom_constraints
            .constrain(metrics.zoom(), current.zoom());
        let metrics = if fuzzy_eq(zoom, metrics.zoom()) {
            metrics
        } else {
            checked(metrics.with_zoom(zoom), "pan/zoom")?
        };
        self.publish(&mut state, metrics, true, true);
        Ok(())
    }

    /// Pre-render the display-port for where a running animation will end.
    pub fn set_animation_target(&self, metrics: &ViewportMetrics) -> Result<(), MetricsError> {
        let metrics = checked(*metrics, "animation target")?;
        let _state = self.control.lock();
        if self.is_content_ready() {
            let target = self.calculator.calculate(&metrics, DeviceVector::zero());
            self.adjust_viewport(Some(target));
        }
        Ok(())
    }

    /// Send a fresh display-port on the next chance, bypassing the
    /// redraw-hint gate once.
    pub fn force_redraw(&self) {
        let mut state = self.control.lock();
        state.force_redraw = true;
        if self.is_content_ready() {
            self.geometry_changed(&mut state);
        }
    }

    // --- render-thread hooks ---

    pub(crate) fn arbiter_config(&self) -> &ArbiterConfig {
        &self.arbiter_config
    }

    /// A frame covering `drawn` reached the screen.
    ///
    /// Never blocks: if the control side holds the timing queue, the sample
    /// is skipped.
    pub(crate) fn record_frame(&self, drawn: &DisplayPortMetrics) {
        let _ = self.document.compare_exchange(
            DocumentState::FirstPaint as u8,
            DocumentState::SteadyState as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        if !self.record_draw_times.load(Ordering::Acquire) {
            return;
        }
        let Some(mut queue) = self.timing.try_lock() else {
            return;
        };
        let sent_at = queue.find_time_for(drawn);
        drop(queue);

        if let Some(sent_at) = sent_at {
            let keep = self
                .calculator
                .draw_time_update(sent_at.elapsed(), drawn.rect().area());
            if !keep {
                log::debug!("sync: draw time recording off until next first paint");
            }
            self.record_draw_times.store(keep, Ordering::Release);
        }
    }

    // --- internals; callers hold `control` ---

    /// Make `next` canonical, request a render and update the toolbar
    /// shadow. With `notify`, the content engine is brought up to date too
    /// (once it is ready).
    fn publish(
        &self,
        state: &mut ControlState,
        next: ViewportMetrics,
        notify: bool,
        keep_margins: bool,
    ) {
        let next = if keep_margins {
            next.with_fixed_margins_from(&self.metrics.load())
        } else {
            next
        };
        self.metrics.store(next);
        log::trace!("sync: published {next:?}");

        self.collaborators.post_event(Event::RequestRender);
        if notify && self.is_content_ready() {
            self.geometry_changed(state);
        }
        self.collaborators
            .post_event(Event::ShadowVisibility(next.shows_top_shadow()));
    }

    fn geometry_changed(&self, state: &mut ControlState) {
        self.send_resize(state, false);
        if self.redraw_hint(state) {
            self.adjust_viewport(None);
        }
    }

    /// Forced redraws always pass. Otherwise the pan/zoom controller must
    /// agree, and the current display-port must be about to run out.
    fn redraw_hint(&self, state: &mut ControlState) -> bool {
        if state.force_redraw {
            state.force_redraw = false;
            return true;
        }
        let pan_zoom = &self.collaborators.pan_zoom;
        if !pan_zoom.redraw_hint() {
            return false;
        }
        let display_port = self.display_port.load();
        self.calculator
            .about_to_checkerboard(&self.metrics.load(), pan_zoom.velocity(), &display_port)
    }

    /// Send the current viewport with `display_port` (or a freshly computed
    /// one) to the content engine.
    fn adjust_viewport(&self, display_port: Option<DisplayPortMetrics>) {
        let metrics = self.metrics.load();
        let mut clamped = metrics.clamp();
        if metrics.has_overscrolled_margins() {
            clamped = clamped.with_fixed_margins(metrics.overscroll_adjusted_margins());
        }

        let display_port = display_port.unwrap_or_else(|| {
            self.calculator
                .calculate(&metrics, self.collaborators.pan_zoom.velocity())
        });
        self.display_port.store(Arc::new(display_port));
        if self.record_draw_times.load(Ordering::Acquire) {
            self.timing.lock().add(display_port);
        }

        let content = Arc::clone(&self.collaborators.content);
        let content_viewport = Arc::clone(&self.content_viewport);
        self.collaborators.ui.post(Box::new(move || {
            content_viewport.store(clamped);
            content.send_viewport(&clamped, &display_port);
        }));
    }

    fn send_resize(&self, state: &mut ControlState, force: bool) {
        let size = self.metrics.load().size();
        let window = size2(size.width.round() as i32, size.height.round() as i32);
        let screen = state.screen_size;
        if !force && window == state.sent_window_size && screen == state.sent_screen_size {
            return;
        }
        state.sent_window_size = window;
        state.sent_screen_size = screen;
        log::debug!(
            "sync: resize event window {}x{} screen {}x{}",
            window.width,
            window.height,
            screen.width,
            screen.height
        );
        let content = Arc::clone(&self.collaborators.content);
        self.collaborators
            .ui
            .post(Box::new(move || content.send_resize(window, screen)));
    }

    /// The pan/zoom controller may call back into the synchronizer, so the
    /// abort runs on the UI thread after `control` is released.
    fn post_abort_animation(&self) {
        let pan_zoom = Arc::clone(&self.collaborators.pan_zoom);
        self.collaborators
            .ui
            .post(Box::new(move || pan_zoom.abort_animation()));
    }

    fn post_content_viewport(&self, metrics: ViewportMetrics) {
        let content_viewport = Arc::clone(&self.content_viewport);
        self.collaborators.ui.post(Box::new(move || {
            content_viewport.store(metrics);
        }));
    }
}

/// Reject `metrics` that break a snapshot invariant, logging which update
/// was dropped.
fn checked(metrics: ViewportMetrics, what: &str) -> Result<ViewportMetrics, MetricsError> {
    match metrics.validate() {
        Ok(()) => Ok(metrics),
        Err(e) => {
            log::warn!("sync: dropping {what} update: {e}");
            Err(e)
        }
    }
}

/// Pull an overscrolled viewport back when the margin it was overscrolled
/// into shrinks. Each axis moves at most once, toward the page.
fn clamp_on_margin_change(old: &ViewportMetrics, next: &ViewportMetrics) -> ViewportMetrics {
    let before = old.fixed_margins();
    let after = next.fixed_margins();
    let vp = next.viewport();
    let page = next.page_rect();
    let mut origin = next.origin();

    if before.left > after.left && vp.min_x() < page.min_x() - after.left {
        origin.x = page.min_x() - after.left;
    } else if before.right > after.right && vp.max_x() > page.max_x() + after.right {
        origin.x = page.max_x() + after.right - vp.width();
    }

    if before.top > after.top && vp.min_y() < page.min_y() - after.top {
        origin.y = page.min_y() - after.top;
    } else if before.bottom > after.bottom && vp.max_y() > page.max_y() + after.bottom {
        origin.y = page.max_y() + after.bottom - vp.height();
    }

    next.with_origin(origin)
}
