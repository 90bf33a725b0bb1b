//! A decaying fling standing in for the pan/zoom controller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use vportsync_core::units::DeviceVector;
use vportsync_core::{PanZoom, ViewportMetrics};

/// Speed below which a fling stops, in device px/s.
const STOP_VELOCITY: f32 = 20.0;

#[derive(Default)]
pub struct Fling {
    velocity: Mutex<Option<DeviceVector>>,
    aborts: AtomicUsize,
    page_updates: AtomicUsize,
}

impl Fling {
    pub fn start(&self, velocity: DeviceVector) {
        *self.velocity.lock() = Some(velocity);
    }

    /// Distance to move this frame. Velocity decays by `decay` per frame;
    /// `None` once the fling has stopped.
    pub fn step(&self, frame: Duration, decay: f32) -> Option<DeviceVector> {
        let mut velocity = self.velocity.lock();
        let v = (*velocity)?;
        let next = v * decay;
        *velocity = (next.length() >= STOP_VELOCITY).then_some(next);
        Some(v * frame.as_secs_f32())
    }

    /// Total distance a fling at `velocity` covers before stopping.
    pub fn travel(velocity: DeviceVector, frame: Duration, decay: f32) -> DeviceVector {
        velocity * frame.as_secs_f32() / (1.0 - decay)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::Relaxed)
    }

    pub fn page_updates(&self) -> usize {
        self.page_updates.load(Ordering::Relaxed)
    }
}

impl PanZoom for Fling {
    fn velocity(&self) -> DeviceVector {
        self.velocity.lock().unwrap_or_else(DeviceVector::zero)
    }

    fn abort_animation(&self) {
        if self.velocity.lock().take().is_some() {
            log::debug!("fling: aborted");
        }
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    fn page_rect_updated(&self, metrics: &ViewportMetrics) {
        log::trace!("fling: page now {:?}", metrics.page_rect());
        self.page_updates.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use euclid::vec2;
    use vportsync_core::PanZoom;

    use super::Fling;

    #[test]
    fn fling_decays_to_rest() {
        let fling = Fling::default();
        fling.start(vec2(0.0, 1000.0));
        let frame = Duration::from_millis(16);
        let mut travelled = 0.0;
        let mut steps = 0;
        while let Some(d) = fling.step(frame, 0.9) {
            travelled += d.y;
            steps += 1;
            assert!(steps < 1000);
        }
        assert_eq!(fling.step(frame, 0.9), None);
        let bound = Fling::travel(vec2(0.0, 1000.0), frame, 0.9).y;
        assert!(travelled <= bound + 1e-3);
        assert!(travelled > bound * 0.9);
    }

    #[test]
    fn abort_stops_motion() {
        let fling = Fling::default();
        fling.start(vec2(500.0, 0.0));
        assert_eq!(fling.velocity(), vec2(500.0, 0.0));
        fling.abort_animation();
        assert_eq!(fling.velocity(), vec2(0.0, 0.0));
        assert_eq!(fling.aborts(), 1);
    }
}
