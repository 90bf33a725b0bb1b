//! Wires the engine to a UI thread, a render thread, a simulated content
//! engine and a fling, then runs one scripted session.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use euclid::{point2, rect, size2, vec2};
use vportsync_core::event::AllSelected;
use vportsync_core::units::CssRect;
use vportsync_core::{
    Collaborators, CompositorBridge, DisplayPortMetrics, DocumentState, Event, EventListener,
    MetricsError, OwnerId, ViewportMetrics, ViewportSynchronizer,
};

use crate::config::Settings;
use crate::content::{PaintStats, Painter, SimulatedContent};
use crate::fling::Fling;
use crate::ui::UiThread;

/// Counts view events delivered on the UI thread.
#[derive(Default)]
struct ViewEvents {
    renders: AtomicUsize,
    first_paints: AtomicUsize,
    shadow: AtomicBool,
}

impl EventListener for ViewEvents {
    fn send_event(&self, event: Event) {
        match event {
            Event::RequestRender => {
                self.renders.fetch_add(1, Ordering::Relaxed);
            }
            Event::FirstPaint => {
                self.first_paints.fetch_add(1, Ordering::Relaxed);
            }
            Event::ShadowVisibility(visible) => self.shadow.store(visible, Ordering::Relaxed),
        }
    }
}

/// What happened during a run.
#[derive(Debug)]
pub struct Summary {
    pub paint: PaintStats,
    pub render_requests: usize,
    pub first_paints: usize,
    pub display_ports_sent: usize,
    pub resize_events: usize,
    pub view_size_changes: usize,
    pub ui_tasks: usize,
    pub fling_aborts: usize,
    pub page_updates: usize,
    pub shadow_visible: bool,
    pub document: DocumentState,
    pub draw_rate: Option<f32>,
    pub final_metrics: ViewportMetrics,
}

impl Summary {
    pub fn log(&self) {
        let p = &self.paint;
        log::info!(
            "frames {} | passes completed {} aborted low {} high {}",
            p.frames,
            p.completed,
            p.aborted_low,
            p.aborted_high
        );
        log::info!(
            "render requests {} | display-ports sent {} | resize events {} | view size changes {} | ui tasks {}",
            self.render_requests,
            self.display_ports_sent,
            self.resize_events,
            self.view_size_changes,
            self.ui_tasks
        );
        log::info!(
            "document {:?} | first paints {} | fling aborts {} | page updates {} | shadow {}",
            self.document,
            self.first_paints,
            self.fling_aborts,
            self.page_updates,
            self.shadow_visible
        );
        match self.draw_rate {
            Some(rate) => log::info!("measured draw rate {rate:.0} px/ms"),
            None => log::info!("no draw rate measured"),
        }
        log::info!(
            "final viewport {:?} zoom {}",
            self.final_metrics.viewport(),
            self.final_metrics.zoom()
        );
    }
}

/// Run one session: first paint, a fling down the page, then hide the
/// toolbar once the fling settles.
pub fn run(settings: &Settings) -> Result<Summary, Box<dyn Error>> {
    let h = &settings.harness;
    let interval = Duration::from_millis(h.frame_interval_ms);

    let ui = UiThread::spawn()?;
    let content = Arc::new(SimulatedContent::default());
    let fling = Arc::new(Fling::default());
    let events = Arc::new(ViewEvents::default());
    let collaborators = Collaborators {
        content: content.clone(),
        pan_zoom: fling.clone(),
        tabs: Arc::new(AllSelected),
        ui: Arc::new(ui.handle()),
        listener: events.clone(),
    };

    let surface = size2(h.viewport[0], h.viewport[1]);
    let sync = Arc::new(ViewportSynchronizer::new(
        &settings.engine,
        ViewportMetrics::new(surface),
        collaborators,
    )?);
    sync.set_screen_size(size2(surface.width as i32, surface.height as i32));
    sync.set_fixed_layer_margins(0.0, h.toolbar_height, 0.0, 0.0)?;

    let page: CssRect = rect(0.0, 0.0, h.page[0], h.page[1]);
    let stop = Arc::new(AtomicBool::new(false));

    let render = {
        let sync = Arc::clone(&sync);
        let content = Arc::clone(&content);
        let stop = Arc::clone(&stop);
        let (frames, px_per_ms, low_first) = (h.frames, h.content_px_per_ms, h.low_precision_first);
        thread::Builder::new()
            .name("render".into())
            .spawn(move || -> Result<PaintStats, MetricsError> {
                let result = render_loop(&sync, content, frames, interval, page, px_per_ms, low_first);
                stop.store(true, Ordering::Release);
                result
            })?
    };

    while sync.document_state() == DocumentState::NoDocument && !stop.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(1));
    }

    let velocity = vec2(h.fling_velocity[0], h.fling_velocity[1]);
    let start = sync.current_metrics();
    let target = start
        .with_origin(start.origin() + Fling::travel(velocity, interval, h.fling_decay))
        .clamp();
    sync.set_animation_target(&target)?;
    fling.start(velocity);

    let mut toolbar_hidden = false;
    while !stop.load(Ordering::Acquire) {
        if let Some(delta) = fling.step(interval, h.fling_decay) {
            let m = sync.current_metrics();
            sync.set_viewport_metrics(m.with_origin(m.origin() + delta).clamp())?;
        } else if !toolbar_hidden {
            // Settled: collapse the toolbar, give its space to the surface
            // and let the content engine confirm where it thinks we are.
            sync.set_fixed_layer_margins(0.0, 0.0, 0.0, 0.0)?;
            sync.on_viewport_resized(size2(surface.width, surface.height + h.toolbar_height))?;
            let current = sync.current_metrics();
            sync.get_display_port(false, true, OwnerId(0), &current)?;
            toolbar_hidden = true;
        }
        thread::sleep(interval);
    }

    let paint = render
        .join()
        .map_err(|e| format!("render thread panicked: {e:?}"))??;
    let ui_tasks = ui.shutdown();

    Ok(Summary {
        paint,
        render_requests: events.renders.load(Ordering::Relaxed),
        first_paints: events.first_paints.load(Ordering::Relaxed),
        display_ports_sent: content.received(),
        resize_events: content.resizes(),
        view_size_changes: content.view_size_changes(),
        ui_tasks,
        fling_aborts: fling.aborts(),
        page_updates: fling.page_updates(),
        shadow_visible: events.shadow.load(Ordering::Relaxed),
        document: sync.document_state(),
        draw_rate: sync.calculator().pixels_per_ms(),
        final_metrics: *sync.current_metrics(),
    })
}

fn render_loop(
    sync: &Arc<ViewportSynchronizer>,
    content: Arc<SimulatedContent>,
    frames: u32,
    interval: Duration,
    page: CssRect,
    px_per_ms: f32,
    low_precision_first: bool,
) -> Result<PaintStats, MetricsError> {
    let mut bridge = CompositorBridge::new(Arc::clone(sync));
    bridge.first_paint(point2(0.0, 0.0), 1.0, page.cast_unit(), page)?;

    let mut painter = Painter::new(content, px_per_ms, low_precision_first);
    let mut layer = DisplayPortMetrics::empty();
    for frame in 0..frames {
        let frame_start = Instant::now();
        if frame == frames / 2 {
            // More content loaded below the fold.
            let grown = page.size.height * 1.5;
            bridge.page_rect_changed(rect(0.0, 0.0, page.size.width, grown))?;
        }
        let finished = painter.step(&mut bridge, interval);
        if let Some(display_port) = finished {
            layer = display_port;
        }
        bridge.sync_viewport_info(layer.rect(), layer.resolution(), finished.is_some());
        if let Some(rest) = interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }
    Ok(painter.stats())
}
