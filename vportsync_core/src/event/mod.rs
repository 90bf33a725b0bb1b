//! Collaborator traits and UI-visible events.
//!
//! The synchronizer never reaches for global registries. Everything it talks
//! to (the content engine, the pan/zoom controller, the tab list, the UI
//! thread and whoever listens for render requests) is handed to it once, at
//! construction, as a [`Collaborators`] bundle. Tests wire in the `Void*`
//! implementations and an [`InlineDispatcher`] that runs posted tasks on the
//! spot.

use std::fmt;
use std::sync::Arc;

use crate::display_port::DisplayPortMetrics;
use crate::metrics::ViewportMetrics;
use crate::units::{DeviceIntSize, DeviceVector};

/// Identifies the tab that owns a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/// Side effects for the view, delivered on the UI thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Something visible changed; schedule a composite.
    RequestRender,
    /// Whether the toolbar shadow should be drawn.
    ShadowVisibility(bool),
    /// A new document has painted; the view may stop showing its
    /// placeholder.
    FirstPaint,
}

/// Receives [`Event`]s. Default: no-op.
pub trait EventListener: Send + Sync + 'static {
    fn send_event(&self, _event: Event) {}
}

/// The remote engine that lays out and rasterizes the page.
///
/// Calls arrive on the UI thread and must not block.
pub trait ContentEngine: Send + Sync + 'static {
    /// Where the user is looking and what region to render next.
    fn send_viewport(&self, metrics: &ViewportMetrics, display_port: &DisplayPortMetrics);

    /// The window or screen changed size.
    fn send_resize(&self, _window: DeviceIntSize, _screen: DeviceIntSize) {}

    /// The drawing surface changed size.
    fn view_size_changed(&self) {}
}

/// Pan/zoom controller: owns gesture state and fling animations.
pub trait PanZoom: Send + Sync + 'static {
    /// Current scroll velocity in device px/s.
    fn velocity(&self) -> DeviceVector {
        DeviceVector::zero()
    }

    /// Whether now is a good time to request a redraw. `false` while an
    /// animation is about to change the viewport anyway.
    fn redraw_hint(&self) -> bool {
        true
    }

    fn abort_animation(&self) {}

    /// The page bounds changed; `metrics` carries the new ones.
    fn page_rect_updated(&self, _metrics: &ViewportMetrics) {}
}

/// Answers whether a document's tab is the selected one.
pub trait TabRegistry: Send + Sync + 'static {
    fn is_selected(&self, owner: OwnerId) -> bool;
}

/// A task posted to the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules fire-and-forget work on the UI thread.
pub trait UiDispatcher: Send + Sync + 'static {
    fn post(&self, task: UiTask);
}

/// Everything the synchronizer talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentEngine>,
    pub pan_zoom: Arc<dyn PanZoom>,
    pub tabs: Arc<dyn TabRegistry>,
    pub ui: Arc<dyn UiDispatcher>,
    pub listener: Arc<dyn EventListener>,
}

impl Collaborators {
    /// Inert collaborators: nothing is sent anywhere, every tab is selected
    /// and UI tasks run inline.
    pub fn void() -> Self {
        Self {
            content: Arc::new(VoidContent),
            pan_zoom: Arc::new(VoidPanZoom),
            tabs: Arc::new(AllSelected),
            ui: Arc::new(InlineDispatcher),
            listener: Arc::new(VoidListener),
        }
    }

    /// Post `event` to the listener on the UI thread.
    pub(crate) fn post_event(&self, event: Event) {
        let listener = Arc::clone(&self.listener);
        self.ui.post(Box::new(move || listener.send_event(event)));
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// No-op event listener for tests and headless operation.
pub struct VoidListener;

impl EventListener for VoidListener {}

/// Content engine that discards everything.
pub struct VoidContent;

impl ContentEngine for VoidContent {
    fn send_viewport(&self, _metrics: &ViewportMetrics, _display_port: &DisplayPortMetrics) {}
}

/// Pan/zoom controller that is never moving.
pub struct VoidPanZoom;

impl PanZoom for VoidPanZoom {}

/// Tab registry with a single, always-selected tab.
pub struct AllSelected;

impl TabRegistry for AllSelected {
    fn is_selected(&self, _owner: OwnerId) -> bool {
        true
    }
}

/// Runs posted tasks immediately on the calling thread.
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn post(&self, task: UiTask) {
        task();
    }
}
