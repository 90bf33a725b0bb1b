use std::sync::Arc;

use euclid::{rect, size2, vec2};

use super::{FrameContext, ProgressiveRequest, ProgressiveUpdateArbiter};
use crate::config::{ArbiterConfig, CalculatorConfig};
use crate::display_port::{DisplayPortCalculator, DisplayPortMetrics};
use crate::metrics::ViewportMetrics;
use crate::units::{DeviceRect, DeviceVector};

/// 400x800 viewport at the top of a 1000x2000 page.
fn viewport() -> Arc<ViewportMetrics> {
    Arc::new(ViewportMetrics::new(size2(400.0, 800.0)).with_page_rect(rect(0.0, 0.0, 1000.0, 2000.0)))
}

struct Fixture {
    viewport: Arc<ViewportMetrics>,
    sent: DisplayPortMetrics,
    calculator: DisplayPortCalculator,
    arbiter: ProgressiveUpdateArbiter,
}

impl Fixture {
    fn new() -> Self {
        let viewport = viewport();
        let calculator = DisplayPortCalculator::new(CalculatorConfig::default());
        let sent = calculator.calculate(&viewport, DeviceVector::zero());
        let arbiter = ProgressiveUpdateArbiter::new(ArbiterConfig::default(), Arc::clone(&viewport));
        Self {
            viewport,
            sent,
            calculator,
            arbiter,
        }
    }

    fn decide(&mut self, velocity: DeviceVector, request: ProgressiveRequest) -> bool {
        let ctx = FrameContext {
            viewport: &self.viewport,
            display_port: &self.sent,
            velocity,
            calculator: &self.calculator,
        };
        self.arbiter.decide(&ctx, &request).abort()
    }
}

fn high(region: DeviceRect) -> ProgressiveRequest {
    ProgressiveRequest {
        has_pending_new_content: false,
        region,
        resolution: 1.0,
        low_precision: false,
    }
}

fn low(region: DeviceRect, pending: bool) -> ProgressiveRequest {
    ProgressiveRequest {
        has_pending_new_content: pending,
        region,
        resolution: 1.0,
        low_precision: true,
    }
}

// --- low precision gating ---

#[test]
fn low_precision_without_danger_always_aborts() {
    let mut f = Fixture::new();
    let covering = rect(0.0, 0.0, 1000.0, 2000.0);
    assert!(f.decide(DeviceVector::zero(), low(covering, true)));
    assert!(f.decide(DeviceVector::zero(), low(covering, false)));
    assert!(f.decide(vec2(0.0, 5000.0), low(f.sent.rect(), true)));
    assert!(!f.arbiter.in_danger());
}

#[test]
fn predicted_checkerboard_enables_low_precision() {
    let mut f = Fixture::new();
    let tight = rect(0.0, 0.0, 420.0, 820.0);

    // Moving down fast: the projected viewport leaves the tight region.
    assert!(!f.decide(vec2(0.0, 1000.0), high(tight)));
    assert!(f.arbiter.in_danger());

    // A coarse pass is now worth finishing while new content is pending.
    assert!(!f.decide(vec2(0.0, 1000.0), low(tight, true)));
    // Without anything newer coming it is dropped.
    assert!(f.decide(vec2(0.0, 1000.0), low(tight, false)));
}

#[test]
fn high_precision_after_low_clears_danger() {
    let mut f = Fixture::new();
    let tight = rect(0.0, 0.0, 420.0, 820.0);
    f.decide(vec2(0.0, 1000.0), high(tight));
    f.decide(vec2(0.0, 1000.0), low(tight, true));
    assert!(f.arbiter.in_danger());

    // At rest the tight region is sufficient, so danger is not re-raised.
    assert!(!f.decide(DeviceVector::zero(), high(tight)));
    assert!(!f.arbiter.in_danger());
    assert!(f.decide(DeviceVector::zero(), low(tight, true)));
}

// --- resolution ---

#[test]
fn resolution_mismatch_aborts() {
    let mut f = Fixture::new();
    let request = ProgressiveRequest {
        resolution: 2.0,
        ..high(f.sent.rect())
    };
    assert!(f.decide(DeviceVector::zero(), request));
    // Nothing is recorded from an aborted stale-resolution pass.
    assert_eq!(*f.arbiter.last_high_precision(), DisplayPortMetrics::empty());
}

// --- matching display-port ---

#[test]
fn pass_matching_sent_display_port_continues() {
    let mut f = Fixture::new();
    assert!(!f.decide(DeviceVector::zero(), high(f.sent.rect())));
    assert_eq!(f.arbiter.last_high_precision().rect(), f.sent.rect());
}

#[test]
fn near_match_within_tolerance_continues_even_if_stale() {
    let mut f = Fixture::new();
    // Scroll the viewport away so the region no longer covers it; the pass
    // still matches the last request, so it is allowed to finish.
    f.viewport = Arc::new(f.viewport.with_origin(euclid::point2(0.0, 1000.0)));
    let region = f.sent.rect().translate(vec2(1.5, -1.5));
    assert!(!f.decide(DeviceVector::zero(), high(region)));
}

// --- coverage ---

#[test]
fn pass_not_covering_viewport_aborts() {
    let mut f = Fixture::new();
    let off_screen = rect(0.0, 1200.0, 600.0, 800.0);
    assert!(f.decide(DeviceVector::zero(), high(off_screen)));
}

#[test]
fn coverage_only_considers_the_page() {
    let mut f = Fixture::new();
    // Overscrolled above the page: the region only needs to cover the part
    // of the viewport that overlaps the page.
    f.viewport = Arc::new(f.viewport.with_origin(euclid::point2(0.0, -100.0)));
    let region = rect(0.0, 0.0, 400.0, 700.0);
    assert!(!f.decide(DeviceVector::zero(), high(region)));
}

#[test]
fn coverage_allows_one_pixel_slack() {
    let mut f = Fixture::new();
    let region = rect(0.5, 0.5, 399.0, 799.0);
    assert!(!f.decide(DeviceVector::zero(), high(region)));
    let region = rect(2.0, 0.0, 398.0, 800.0);
    assert!(f.decide(DeviceVector::zero(), high(region)));
}

// --- bookkeeping ---

#[test]
fn decision_reports_current_snapshot() {
    let mut f = Fixture::new();
    let newer = Arc::new(f.viewport.with_origin(euclid::point2(0.0, 10.0)));
    f.viewport = Arc::clone(&newer);
    let ctx = FrameContext {
        viewport: &f.viewport,
        display_port: &f.sent,
        velocity: DeviceVector::zero(),
        calculator: &f.calculator,
    };
    let data = f.arbiter.decide(&ctx, &high(f.sent.rect()));
    assert!(Arc::ptr_eq(data.viewport(), &newer));
}

#[test]
fn reset_forgets_document_state() {
    let mut f = Fixture::new();
    let tight = rect(0.0, 0.0, 420.0, 820.0);
    f.decide(vec2(0.0, 1000.0), high(tight));
    assert!(f.arbiter.in_danger());

    f.arbiter.reset();
    assert!(!f.arbiter.in_danger());
    assert_eq!(*f.arbiter.last_high_precision(), DisplayPortMetrics::empty());
    assert!(f.decide(DeviceVector::zero(), low(tight, true)));
}
