use tracing::{debug, info, warn};

use crate::clock::{TickSource, TimerId};
use crate::config::{AugmentConfig, ConfigError};
use crate::host::{HostDocument, HostEvent};
use crate::root_observer::RootObserver;
use crate::tracker::AttachmentTracker;
use crate::widget::{WidgetOptions, WidgetSnapshot};

const MAX_PUMP_ROUNDS: usize = 64;

/// Owns the host document and tick source and delivers their events, one at a
/// time, to the root observer and the attachment tracker.
pub struct Augmenter<D: HostDocument, T: TickSource> {
    document: D,
    ticks: T,
    root: RootObserver,
    tracker: AttachmentTracker<D::Node>,
    finished: Vec<WidgetSnapshot>,
}

impl<D: HostDocument, T: TickSource> Augmenter<D, T> {
    pub fn new(document: D, ticks: T, config: &AugmentConfig) -> Result<Self, ConfigError> {
        let options = WidgetOptions::from_config(config)?;
        Ok(Self {
            document,
            ticks,
            root: RootObserver::new(),
            tracker: AttachmentTracker::new(options),
            finished: Vec::new(),
        })
    }

    pub fn start(&mut self) {
        if self.root.start(&mut self.document) {
            debug!(target: "augmenter", "trigger bound at start-up");
        }
        self.pump();
    }

    /// Deliver queued host events and fired ticks until nothing is left.
    ///
    /// Widget updates mutate the document, which queues further deliveries, so
    /// this loops; the round limit guards against a host that never settles.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let events = self.document.drain_events();
            let fired = self.ticks.drain_fired();
            if events.is_empty() && fired.is_empty() {
                self.reap();
                return handled;
            }

            handled += events.len() + fired.len();
            for event in events {
                self.handle_event(event);
            }
            for timer_id in fired {
                self.tracker.on_tick(timer_id, &mut self.document);
            }
        }

        warn!(target: "augmenter", rounds = MAX_PUMP_ROUNDS, "event pump did not settle");
        self.reap();
        handled
    }

    /// Deliver a single tick received outside [`pump`](Self::pump).
    pub fn dispatch_tick(&mut self, timer_id: TimerId) -> bool {
        self.tracker.on_tick(timer_id, &mut self.document)
    }

    fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Mutated(observer) => {
                if self.root.owns_observer(observer) {
                    self.root.on_mutation(observer, &mut self.document);
                } else if self.tracker.owns_observer(observer) {
                    self.tracker.on_mutation(&mut self.document, &mut self.ticks);
                }
            }
            HostEvent::Activated(listener) => {
                if self.root.is_trigger_activation(listener) {
                    info!(target: "augmenter", "compose clicked, looking for new compose window");
                    self.tracker
                        .begin_watching(&mut self.document, &mut self.ticks);
                } else if !self
                    .tracker
                    .on_activation(listener, &mut self.document, &mut self.ticks)
                {
                    debug!(target: "augmenter", listener, "activation for unknown listener");
                }
            }
        }
    }

    /// Explicitly stop every live widget, e.g. when the page is torn down.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self.tracker.stop_all(&mut self.document, &mut self.ticks);
        self.reap();
        stopped
    }

    fn reap(&mut self) {
        self.finished.extend(self.tracker.reap());
    }

    /// Snapshots of widgets that are still live, in attachment order.
    pub fn snapshots(&self) -> Vec<WidgetSnapshot> {
        self.tracker
            .widgets()
            .iter()
            .map(|widget| widget.snapshot())
            .collect()
    }

    pub fn snapshot_for(&self, surface: &D::Node) -> Option<WidgetSnapshot> {
        self.tracker.widget_for(surface).map(|widget| widget.snapshot())
    }

    /// Final snapshots of widgets that have been stopped and released.
    pub fn finished(&self) -> &[WidgetSnapshot] {
        &self.finished
    }

    pub fn live_widgets(&self) -> usize {
        self.tracker.live_count()
    }

    pub fn is_trigger_bound(&self) -> bool {
        self.root.is_bound()
    }

    pub fn is_watching(&self) -> bool {
        self.tracker.is_watching()
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn ticks(&self) -> &T {
        &self.ticks
    }

    pub fn ticks_mut(&mut self) -> &mut T {
        &mut self.ticks
    }
}
