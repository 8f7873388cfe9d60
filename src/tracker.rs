use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::clock::{TickSource, TimerId};
use crate::host::{HostDocument, ListenerId, ObserverId, TerminalControl};
use crate::widget::{StopReason, SurfaceWidget, WidgetId, WidgetOptions, WidgetSnapshot};

/// Attaches exactly one widget to every qualifying surface and routes
/// terminal-control activations and clock ticks back to the owning widget.
pub struct AttachmentTracker<N> {
    options: WidgetOptions,
    observer: Option<ObserverId>,
    activations: u32,
    next_widget_id: WidgetId,
    widgets: Vec<SurfaceWidget<N>>,
    routes: HashMap<ListenerId, (WidgetId, TerminalControl)>,
}

impl<N> AttachmentTracker<N>
where
    N: Clone + PartialEq + std::fmt::Debug,
{
    pub fn new(options: WidgetOptions) -> Self {
        Self {
            options,
            observer: None,
            activations: 0,
            next_widget_id: 1,
            widgets: Vec::new(),
            routes: HashMap::new(),
        }
    }

    /// Arm the surface watch. Repeated calls reuse the armed watch and re-scan.
    pub fn begin_watching<D>(&mut self, document: &mut D, ticks: &mut dyn TickSource) -> usize
    where
        D: HostDocument<Node = N>,
    {
        self.activations += 1;
        match self.observer {
            Some(observer) => {
                debug!(
                    target: "tracker",
                    observer,
                    activations = self.activations,
                    "surface watch already armed"
                );
            }
            None => {
                let observer = document.observe_mutations();
                self.observer = Some(observer);
                info!(target: "tracker", observer, "watching for compose windows");
            }
        }
        self.scan(document, ticks)
    }

    pub fn is_watching(&self) -> bool {
        self.observer.is_some()
    }

    pub fn owns_observer(&self, observer: ObserverId) -> bool {
        self.observer == Some(observer)
    }

    /// Handle a mutation delivery: release widgets whose surface left the
    /// document, then attach to any new qualifying surfaces.
    pub fn on_mutation<D>(&mut self, document: &mut D, ticks: &mut dyn TickSource) -> usize
    where
        D: HostDocument<Node = N>,
    {
        self.release_disconnected(document, ticks);
        self.scan(document, ticks)
    }

    fn scan<D>(&mut self, document: &mut D, ticks: &mut dyn TickSource) -> usize
    where
        D: HostDocument<Node = N>,
    {
        let mut attached = 0;
        for surface in document.list_candidate_surfaces() {
            if !document.surface_has_completion_control(&surface) {
                continue;
            }
            if document.get_marker(&surface) {
                continue;
            }
            // Check-and-set happens inside one delivery, so no other scan can interleave.
            document.set_marker(&surface);

            let id = self.next_widget_id;
            self.next_widget_id += 1;

            let mut widget = SurfaceWidget::attach(id, surface, document);
            for binding in widget.bindings() {
                self.routes.insert(binding.listener, (id, binding.control));
            }
            widget.start(ticks, self.options.tick_interval);
            info!(target: "tracker", widget = id, "found new compose window, timer attached");

            self.widgets.push(widget);
            attached += 1;
        }
        attached
    }

    fn release_disconnected<D>(&mut self, document: &mut D, ticks: &mut dyn TickSource)
    where
        D: HostDocument<Node = N>,
    {
        for widget in &mut self.widgets {
            if widget.is_live() && !document.is_connected(widget.surface()) {
                debug!(target: "tracker", widget = widget.id(), "surface left the document");
                widget.stop(document, ticks, StopReason::SurfaceRemoved);
            }
        }
    }

    /// Route an activation to the widget bound to `listener`.
    /// Returns `false` if no widget ever registered it.
    pub fn on_activation<D>(
        &mut self,
        listener: ListenerId,
        document: &mut D,
        ticks: &mut dyn TickSource,
    ) -> bool
    where
        D: HostDocument<Node = N>,
    {
        let Some(&(id, control)) = self.routes.get(&listener) else {
            return false;
        };
        let Some(widget) = self.widgets.iter_mut().find(|widget| widget.id() == id) else {
            return false;
        };

        if !widget.stop(document, ticks, StopReason::Control(control)) {
            debug!(target: "tracker", widget = id, %control, "widget already stopped");
        }
        true
    }

    /// Route a clock tick. Ticks for stopped or unknown timers are dropped.
    pub fn on_tick<D>(&mut self, timer_id: TimerId, document: &mut D) -> bool
    where
        D: HostDocument<Node = N>,
    {
        let Some(widget) = self
            .widgets
            .iter_mut()
            .find(|widget| widget.owns_timer(timer_id))
        else {
            trace!(target: "tracker", timer_id, "tick for unknown timer");
            return false;
        };
        widget.tick(document, &self.options);
        true
    }

    pub fn stop_all<D>(&mut self, document: &mut D, ticks: &mut dyn TickSource) -> usize
    where
        D: HostDocument<Node = N>,
    {
        let mut stopped = 0;
        for widget in &mut self.widgets {
            if widget.stop(document, ticks, StopReason::External) {
                stopped += 1;
            }
        }
        stopped
    }

    /// Drop stopped widgets and their routes, returning their final snapshots.
    pub fn reap(&mut self) -> Vec<WidgetSnapshot> {
        let (stopped, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.widgets)
            .into_iter()
            .partition(|widget| !widget.is_live());
        self.widgets = live;

        if !stopped.is_empty() {
            self.routes
                .retain(|_, (id, _)| !stopped.iter().any(|widget| widget.id() == *id));
        }
        stopped.iter().map(SurfaceWidget::snapshot).collect()
    }

    pub fn widgets(&self) -> &[SurfaceWidget<N>] {
        &self.widgets
    }

    pub fn widget_for(&self, surface: &N) -> Option<&SurfaceWidget<N>> {
        self.widgets.iter().find(|widget| widget.surface() == surface)
    }

    pub fn live_count(&self) -> usize {
        self.widgets.iter().filter(|widget| widget.is_live()).count()
    }
}
