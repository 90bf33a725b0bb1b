//! Immutable viewport snapshot.
//!
//! A `ViewportMetrics` describes where the user is looking: the device-pixel
//! window into the page, the zoom, the page bounds in both pixel spaces, and
//! the margins reserved for chrome overlapping the content edges. Snapshots
//! are never mutated; every `with_*` returns a new value, so a thread holding
//! an old snapshot always sees a consistent, if stale, state.

use euclid::{Point2D, SideOffsets2D};

use crate::error::MetricsError;
use crate::units::{
    CssRect, DeviceMargins, DevicePoint, DeviceRect, DeviceSize, ZoomFactor, fuzzy_eq,
    rect_is_finite,
};

/// One consistent view of the page.
///
/// Invariants (checked by [`ViewportMetrics::validate`]): zoom is finite and
/// positive, margins are non-negative, and `page_rect` is `css_page_rect`
/// scaled by the zoom. The page rect is always derived from the CSS rect, so
/// the last invariant holds by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    origin: DevicePoint,
    size: DeviceSize,
    zoom: ZoomFactor,
    page_rect: DeviceRect,
    css_page_rect: CssRect,
    margins: DeviceMargins,
}

impl ViewportMetrics {
    /// Initial snapshot for a surface of `size`: origin at zero, zoom 1, and
    /// a page exactly covering the surface.
    pub fn new(size: DeviceSize) -> Self {
        let css_page_rect = CssRect::from_size(size.cast_unit());
        Self {
            origin: Point2D::zero(),
            size,
            zoom: ZoomFactor::identity(),
            page_rect: css_page_rect * ZoomFactor::identity(),
            css_page_rect,
            margins: SideOffsets2D::zero(),
        }
    }

    /// Top-left of the viewport in page device pixels.
    pub fn origin(&self) -> DevicePoint {
        self.origin
    }

    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Zoom as a plain scalar.
    pub fn zoom(&self) -> f32 {
        self.zoom.get()
    }

    pub fn zoom_factor(&self) -> ZoomFactor {
        self.zoom
    }

    pub fn page_rect(&self) -> DeviceRect {
        self.page_rect
    }

    pub fn css_page_rect(&self) -> CssRect {
        self.css_page_rect
    }

    pub fn fixed_margins(&self) -> DeviceMargins {
        self.margins
    }

    /// The visible rectangle in page device pixels.
    pub fn viewport(&self) -> DeviceRect {
        DeviceRect::new(self.origin, self.size)
    }

    /// The page rect grown by the fixed-layer margins: how far the viewport
    /// may travel.
    pub fn scrollable_rect(&self) -> DeviceRect {
        self.page_rect.outer_rect(self.margins)
    }

    pub fn with_viewport_size(&self, size: DeviceSize) -> Self {
        Self { size, ..*self }
    }

    pub fn with_origin(&self, origin: DevicePoint) -> Self {
        Self { origin, ..*self }
    }

    /// Change the zoom and rescale the device page rect to match.
    pub fn with_zoom(&self, zoom: f32) -> Self {
        let zoom = ZoomFactor::new(zoom);
        Self {
            zoom,
            page_rect: self.css_page_rect * zoom,
            ..*self
        }
    }

    /// Replace the page bounds. The device rect is derived from the CSS rect
    /// at the current zoom.
    pub fn with_page_rect(&self, css_page_rect: CssRect) -> Self {
        Self {
            page_rect: css_page_rect * self.zoom,
            css_page_rect,
            ..*self
        }
    }

    pub fn with_fixed_margins(&self, margins: DeviceMargins) -> Self {
        Self { margins, ..*self }
    }

    /// Copy the fixed margins of `other`, keeping everything else.
    pub fn with_fixed_margins_from(&self, other: &Self) -> Self {
        self.with_fixed_margins(other.margins)
    }

    /// Constrain the origin so the viewport stays inside the page grown by
    /// the fixed margins. Size and zoom are untouched.
    ///
    /// When the viewport is wider (or taller) than the allowed area, the
    /// leading edge wins: the viewport is pinned to the left (top).
    pub fn clamp(&self) -> Self {
        let bounds = self.scrollable_rect();
        let mut x = self.origin.x;
        let mut y = self.origin.y;

        if x + self.size.width > bounds.max_x() {
            x = bounds.max_x() - self.size.width;
        }
        if x < bounds.min_x() {
            x = bounds.min_x();
        }
        if y + self.size.height > bounds.max_y() {
            y = bounds.max_y() - self.size.height;
        }
        if y < bounds.min_y() {
            y = bounds.min_y();
        }

        self.with_origin(DevicePoint::new(x, y))
    }

    /// Fixed margins reduced by however far the viewport is overscrolled
    /// past each page edge, floored at zero.
    pub fn overscroll_adjusted_margins(&self) -> DeviceMargins {
        let vp = self.viewport();
        let page = self.page_rect;
        let m = self.margins;
        SideOffsets2D::new(
            (m.top + (vp.min_y() - page.min_y()).min(0.0)).max(0.0),
            (m.right + (page.max_x() - vp.max_x()).min(0.0)).max(0.0),
            (m.bottom + (page.max_y() - vp.max_y()).min(0.0)).max(0.0),
            (m.left + (vp.min_x() - page.min_x()).min(0.0)).max(0.0),
        )
    }

    /// Whether any margin is set on an edge the viewport is overscrolled past.
    pub fn has_overscrolled_margins(&self) -> bool {
        let vp = self.viewport();
        let page = self.page_rect;
        let m = self.margins;
        (m.left > 0.0 && vp.min_x() < page.min_x())
            || (m.top > 0.0 && vp.min_y() < page.min_y())
            || (m.right > 0.0 && vp.max_x() > page.max_x())
            || (m.bottom > 0.0 && vp.max_y() > page.max_y())
    }

    /// Whether the toolbar shadow should show: the viewport has scrolled
    /// down to (or past) the top margin.
    pub fn shows_top_shadow(&self) -> bool {
        self.origin.y >= self.page_rect.min_y() - self.margins.top
    }

    /// Field-wise equality within the geometry epsilon.
    pub fn fuzzy_equals(&self, other: &Self) -> bool {
        fuzzy_eq(self.origin.x, other.origin.x)
            && fuzzy_eq(self.origin.y, other.origin.y)
            && fuzzy_eq(self.size.width, other.size.width)
            && fuzzy_eq(self.size.height, other.size.height)
            && fuzzy_eq(self.zoom.get(), other.zoom.get())
            && rects_fuzzy_eq(&self.page_rect, &other.page_rect)
            && rects_fuzzy_eq(&self.css_page_rect.cast_unit(), &other.css_page_rect.cast_unit())
            && fuzzy_eq(self.margins.left, other.margins.left)
            && fuzzy_eq(self.margins.top, other.margins.top)
            && fuzzy_eq(self.margins.right, other.margins.right)
            && fuzzy_eq(self.margins.bottom, other.margins.bottom)
    }

    /// Check every invariant a published snapshot must satisfy.
    pub fn validate(&self) -> Result<(), MetricsError> {
        let zoom = self.zoom.get();
        if !zoom.is_finite() {
            return Err(MetricsError::NonFinite { field: "zoom" });
        }
        if zoom <= 0.0 {
            return Err(MetricsError::NonPositiveZoom(zoom));
        }
        if !(self.origin.x.is_finite() && self.origin.y.is_finite()) {
            return Err(MetricsError::NonFinite { field: "origin" });
        }
        if !(self.size.width.is_finite() && self.size.height.is_finite()) {
            return Err(MetricsError::NonFinite { field: "size" });
        }
        if self.size.width < 0.0 || self.size.height < 0.0 {
            return Err(MetricsError::NegativeSize);
        }
        if !rect_is_finite(&self.css_page_rect) || !rect_is_finite(&self.page_rect) {
            return Err(MetricsError::NonFinite { field: "page_rect" });
        }
        let m = self.margins;
        if !(m.left.is_finite() && m.top.is_finite() && m.right.is_finite() && m.bottom.is_finite())
        {
            return Err(MetricsError::NonFinite {
                field: "fixed_margins",
            });
        }
        if m.left < 0.0 || m.top < 0.0 || m.right < 0.0 || m.bottom < 0.0 {
            return Err(MetricsError::NegativeMargin);
        }
        Ok(())
    }
}

fn rects_fuzzy_eq(a: &DeviceRect, b: &DeviceRect) -> bool {
    fuzzy_eq(a.origin.x, b.origin.x)
        && fuzzy_eq(a.origin.y, b.origin.y)
        && fuzzy_eq(a.size.width, b.size.width)
        && fuzzy_eq(a.size.height, b.size.height)
}
