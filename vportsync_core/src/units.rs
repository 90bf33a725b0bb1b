//! Typed geometry in device and CSS pixel spaces.
//!
//! `DevicePixel` and `CssPixel` are phantom unit tags so that euclid refuses
//! to mix a device-space rectangle with a CSS-space one. The zoom factor is a
//! `Scale<f32, CssPixel, DevicePixel>`: multiplying a CSS rect by it yields
//! the device rect.

use euclid::{Point2D, Rect, Scale, SideOffsets2D, Size2D, Vector2D};

/// Physical pixels on the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DevicePixel;

/// Layout pixels as reported by the content engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CssPixel;

pub type DevicePoint = Point2D<f32, DevicePixel>;
pub type DeviceSize = Size2D<f32, DevicePixel>;
pub type DeviceIntSize = Size2D<i32, DevicePixel>;
pub type DeviceRect = Rect<f32, DevicePixel>;
pub type DeviceVector = Vector2D<f32, DevicePixel>;
/// Per-edge device-pixel offsets, used for fixed-layer margins.
pub type DeviceMargins = SideOffsets2D<f32, DevicePixel>;

pub type CssPoint = Point2D<f32, CssPixel>;
pub type CssRect = Rect<f32, CssPixel>;

/// CSS-to-device zoom.
pub type ZoomFactor = Scale<f32, CssPixel, DevicePixel>;

/// Absolute tolerance for comparing accumulated float geometry.
pub const EPSILON: f32 = 1e-3;

/// Whether two scalars are equal within [`EPSILON`].
pub fn fuzzy_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Whether two device rects have all four edges within `tolerance`.
pub fn edges_within(a: &DeviceRect, b: &DeviceRect, tolerance: f32) -> bool {
    (a.min_x() - b.min_x()).abs() <= tolerance
        && (a.min_y() - b.min_y()).abs() <= tolerance
        && (a.max_x() - b.max_x()).abs() <= tolerance
        && (a.max_y() - b.max_y()).abs() <= tolerance
}

/// Whether every coordinate of `rect` is finite.
pub(crate) fn rect_is_finite<U>(rect: &Rect<f32, U>) -> bool {
    rect.origin.x.is_finite()
        && rect.origin.y.is_finite()
        && rect.size.width.is_finite()
        && rect.size.height.is_finite()
}

/// Build margins from left/top/right/bottom, the order chrome code uses.
pub fn margins(left: f32, top: f32, right: f32, bottom: f32) -> DeviceMargins {
    SideOffsets2D::new(top, right, bottom, left)
}
