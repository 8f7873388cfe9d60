//! Per-surface timer widget.
//!
//! A widget moves `Created -> Running -> Stopped` and never back. The live
//! variants own the rendered nodes, the listener registrations and the clock,
//! so leaving them is the one place teardown can happen.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, TickSource, TimerId};
use crate::config::{AugmentConfig, ConfigError};
use crate::host::{HostDocument, ListenerId, TerminalControl};
use crate::schedule::{NotificationSchedule, NotificationSet};

pub type WidgetId = u64;

pub const WIDGET_CLASS: &str = "compose-timer";
pub const CLOCK_CLASS: &str = "compose-timer__clock";
pub const TAUNT_CLASS: &str = "compose-timer__taunt";
const WIDGET_STYLE: &str = "position: absolute; top: 8px; right: 90px; font: 14px monospace; \
     color: #333; background: #f5f5f5; padding: 4px 8px; border-radius: 4px; z-index: 9998";

/// `minutes:seconds`, seconds zero-padded, minutes unbounded.
pub fn format_elapsed(elapsed_secs: u64) -> String {
    format!("{}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}

/// Settings shared by every widget the tracker creates.
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub tick_interval: Duration,
    pub schedule: NotificationSchedule,
    pub notifications: NotificationSet,
}

impl WidgetOptions {
    pub fn from_config(config: &AugmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let notifications =
            NotificationSet::new(config.taunts.clone()).ok_or(ConfigError::Invalid {
                field: "taunts",
                reason: "at least one message is required",
            })?;
        Ok(Self {
            tick_interval: config.tick_interval(),
            schedule: NotificationSchedule::new(
                config.first_taunt_delay_secs,
                config.taunt_repeat_secs,
            ),
            notifications,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetPhase {
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "control", rename_all = "snake_case")]
pub enum StopReason {
    Control(TerminalControl),
    SurfaceRemoved,
    External,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    elapsed_seconds: u64,
    notification_index: usize,
    notification: Option<String>,
}

impl WidgetState {
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Index of the next message to show.
    pub fn notification_index(&self) -> usize {
        self.notification_index
    }

    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSnapshot {
    pub id: WidgetId,
    pub phase: WidgetPhase,
    pub elapsed_seconds: u64,
    pub display: String,
    pub notification_index: usize,
    pub notification: Option<String>,
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalBinding {
    pub control: TerminalControl,
    pub listener: ListenerId,
}

#[derive(Debug)]
struct WidgetUi<N> {
    root: N,
    clock_label: N,
    taunt: Option<N>,
}

#[derive(Debug)]
struct Live<N> {
    ui: WidgetUi<N>,
    bindings: Vec<TerminalBinding>,
}

#[derive(Debug)]
enum Lifecycle<N> {
    Created(Live<N>),
    Running(Live<N>, Clock),
    Stopped(StopReason),
}

#[derive(Debug)]
pub struct SurfaceWidget<N> {
    id: WidgetId,
    surface: N,
    state: WidgetState,
    lifecycle: Lifecycle<N>,
}

impl<N> SurfaceWidget<N>
where
    N: Clone + PartialEq + std::fmt::Debug,
{
    /// Render the widget into `surface` and bind every terminal control found there.
    pub fn attach<D>(id: WidgetId, surface: N, document: &mut D) -> Self
    where
        D: HostDocument<Node = N>,
    {
        let ui = render(document, &surface);

        let mut bindings = Vec::new();
        for control in TerminalControl::ALL {
            match document.locate_control(&surface, control) {
                Some(node) => bindings.push(TerminalBinding {
                    control,
                    listener: document.add_activation_listener(&node),
                }),
                None => debug!(target: "widget", widget = id, %control, "control not found"),
            }
        }

        Self {
            id,
            surface,
            state: WidgetState::default(),
            lifecycle: Lifecycle::Created(Live { ui, bindings }),
        }
    }

    /// Begin ticking. Only valid from `Created`; returns whether the clock started.
    pub fn start(&mut self, ticks: &mut dyn TickSource, period: Duration) -> bool {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped(StopReason::External)) {
            Lifecycle::Created(live) => {
                let clock = Clock::start(ticks, period);
                self.lifecycle = Lifecycle::Running(live, clock);
                true
            }
            other => {
                self.lifecycle = other;
                false
            }
        }
    }

    /// Advance one second. Returns `true` when a notification was shown.
    pub fn tick<D>(&mut self, document: &mut D, options: &WidgetOptions) -> bool
    where
        D: HostDocument<Node = N>,
    {
        let Lifecycle::Running(live, _) = &mut self.lifecycle else {
            return false;
        };

        self.state.elapsed_seconds += 1;
        let elapsed = self.state.elapsed_seconds;
        document.set_text(&live.ui.clock_label, &format_elapsed(elapsed));

        if !options.schedule.is_due(elapsed) {
            return false;
        }

        let message = options
            .notifications
            .get(self.state.notification_index)
            .to_string();
        self.state.notification_index =
            (self.state.notification_index + 1) % options.notifications.len();

        if let Some(previous) = live.ui.taunt.take() {
            document.remove_node(&previous);
        }
        let bubble = document.create_element("div");
        document.set_attribute(&bubble, "class", TAUNT_CLASS);
        document.set_text(&bubble, &message);
        document.append_child(&live.ui.root, &bubble);
        live.ui.taunt = Some(bubble);

        debug!(target: "widget", widget = self.id, elapsed, "notification shown");
        self.state.notification = Some(message);
        true
    }

    /// Tear down: cancel the clock, remove the UI, release every listener.
    ///
    /// Safe to call any number of times; only the first call from a live phase
    /// does anything and returns `true`.
    pub fn stop<D>(
        &mut self,
        document: &mut D,
        ticks: &mut dyn TickSource,
        reason: StopReason,
    ) -> bool
    where
        D: HostDocument<Node = N>,
    {
        let (live, clock) =
            match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped(reason)) {
                Lifecycle::Created(live) => (live, None),
                Lifecycle::Running(live, clock) => (live, Some(clock)),
                stopped @ Lifecycle::Stopped(_) => {
                    self.lifecycle = stopped;
                    return false;
                }
            };

        if let Some(mut clock) = clock {
            clock.cancel(ticks);
        }
        document.remove_node(&live.ui.root);
        for binding in live.bindings {
            document.remove_activation_listener(binding.listener);
        }

        info!(
            target: "widget",
            widget = self.id,
            elapsed = %format_elapsed(self.state.elapsed_seconds),
            ?reason,
            "timer stopped"
        );
        true
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn surface(&self) -> &N {
        &self.surface
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn phase(&self) -> WidgetPhase {
        match self.lifecycle {
            Lifecycle::Created(_) => WidgetPhase::Created,
            Lifecycle::Running(..) => WidgetPhase::Running,
            Lifecycle::Stopped(_) => WidgetPhase::Stopped,
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.lifecycle, Lifecycle::Stopped(_))
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.lifecycle {
            Lifecycle::Stopped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn owns_timer(&self, timer_id: TimerId) -> bool {
        matches!(&self.lifecycle, Lifecycle::Running(_, clock) if clock.owns(timer_id))
    }

    /// Listener registrations currently held; empty once stopped.
    pub fn bindings(&self) -> &[TerminalBinding] {
        match &self.lifecycle {
            Lifecycle::Created(live) | Lifecycle::Running(live, _) => &live.bindings,
            Lifecycle::Stopped(_) => &[],
        }
    }

    /// Root of the rendered UI while the widget is live.
    pub fn ui_root(&self) -> Option<&N> {
        match &self.lifecycle {
            Lifecycle::Created(live) | Lifecycle::Running(live, _) => Some(&live.ui.root),
            Lifecycle::Stopped(_) => None,
        }
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            id: self.id,
            phase: self.phase(),
            elapsed_seconds: self.state.elapsed_seconds,
            display: format_elapsed(self.state.elapsed_seconds),
            notification_index: self.state.notification_index,
            notification: self.state.notification.clone(),
            stop_reason: self.stop_reason(),
        }
    }
}

fn render<D: HostDocument>(document: &mut D, surface: &D::Node) -> WidgetUi<D::Node> {
    let root = document.create_element("div");
    document.set_attribute(&root, "class", WIDGET_CLASS);
    document.set_attribute(&root, "style", WIDGET_STYLE);

    let clock_label = document.create_element("span");
    document.set_attribute(&clock_label, "class", CLOCK_CLASS);
    document.set_text(&clock_label, &format_elapsed(0));
    document.append_child(&root, &clock_label);

    // Sibling of the anchor when the header is recognisable, else the surface root.
    let region = document
        .locate_anchor_region(surface)
        .and_then(|anchor| document.parent_of(&anchor));
    match region {
        Some(region) => document.append_child(&region, &root),
        None => {
            debug!(target: "widget", "no anchor region, appending to surface");
            document.append_child(surface, &root);
        }
    }

    WidgetUi {
        root,
        clock_label,
        taunt: None,
    }
}
