//! Attachment lifecycle manager for a webmail compose timer.
//!
//! Watches a host page for the compose trigger and for compose windows, gives
//! each window exactly one elapsed-time widget, and tears that widget down
//! exactly once when the window is sent, discarded, closed or removed.

pub mod augmenter;
pub mod clock;
pub mod config;
pub mod host;
pub mod logging;
pub mod root_observer;
pub mod scenario;
pub mod schedule;
pub mod tracker;
pub mod widget;

pub use augmenter::Augmenter;
pub use clock::{IntervalTicks, ManualTicks, TickSource};
pub use config::AugmentConfig;
pub use host::{HostDocument, PageDocument};
pub use widget::{WidgetPhase, WidgetSnapshot};
