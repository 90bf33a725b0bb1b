//! Viewport and display-port synchronization.
//!
//! This crate keeps three parties agreeing on where the user is looking: a
//! UI thread that handles gestures and window geometry, a render thread that
//! composites every frame, and a remote content engine that rasterizes the
//! page asynchronously. It publishes one immutable viewport snapshot at a
//! time, derives the region the content engine should render next, and
//! decides when an in-flight render pass is no longer worth finishing. It
//! contains no drawing, GPU or gesture code.

#![deny(unsafe_code)]

pub mod arbiter;
pub mod cell;
pub mod config;
pub mod display_port;
pub mod error;
pub mod event;
pub mod metrics;
pub mod sync;
pub mod timing;
pub mod units;

pub use arbiter::{ProgressiveRequest, ProgressiveUpdateArbiter, ProgressiveUpdateData};
pub use cell::MetricsCell;
pub use config::Config;
pub use display_port::{DisplayPortCalculator, DisplayPortMetrics};
pub use error::{ConfigError, MetricsError};
pub use event::{Collaborators, ContentEngine, Event, EventListener, OwnerId, PanZoom, TabRegistry, UiDispatcher};
pub use metrics::ViewportMetrics;
pub use sync::{CompositorBridge, DocumentState, ViewTransform, ViewportSynchronizer, ZoomConstraints};
pub use timing::DrawTimingQueue;
