use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

pub type TimerId = u32;

/// Source of periodic ticks. Fired timer ids are collected by the driver and
/// routed to whoever owns the timer; nothing runs inside the source itself.
pub trait TickSource {
    fn start_interval(&mut self, period: Duration) -> TimerId;
    /// Returns `false` if the timer was already cancelled or never existed.
    fn cancel(&mut self, timer_id: TimerId) -> bool;
    fn drain_fired(&mut self) -> Vec<TimerId>;
    fn is_active(&self, timer_id: TimerId) -> bool;
    fn active_count(&self) -> usize;
}

/// One widget's periodic timer registration.
#[derive(Debug)]
pub struct Clock {
    period: Duration,
    timer_id: Option<TimerId>,
}

impl Clock {
    pub fn start(ticks: &mut dyn TickSource, period: Duration) -> Self {
        let timer_id = ticks.start_interval(period);
        trace!(target: "clock", timer_id, ?period, "clock started");
        Self {
            period,
            timer_id: Some(timer_id),
        }
    }

    /// Idempotent; only the first call reaches the tick source.
    pub fn cancel(&mut self, ticks: &mut dyn TickSource) -> bool {
        match self.timer_id.take() {
            Some(timer_id) => {
                ticks.cancel(timer_id);
                trace!(target: "clock", timer_id, "clock cancelled");
                true
            }
            None => false,
        }
    }

    pub fn owns(&self, timer_id: TimerId) -> bool {
        self.timer_id == Some(timer_id)
    }

    pub fn timer_id(&self) -> Option<TimerId> {
        self.timer_id
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

struct IntervalEntry {
    period: Duration,
    task: JoinHandle<()>,
}

/// Wall-clock ticks backed by tokio interval tasks.
///
/// Each interval runs in its own task and reports fires over a channel, so the
/// single driving context stays the only place where widget state changes.
pub struct IntervalTicks {
    handle: Handle,
    next_id: TimerId,
    timers: HashMap<TimerId, IntervalEntry>,
    fired_tx: UnboundedSender<TimerId>,
    fired_rx: UnboundedReceiver<TimerId>,
}

impl IntervalTicks {
    pub fn new(handle: Handle) -> Self {
        let (fired_tx, fired_rx) = unbounded_channel();
        Self {
            handle,
            next_id: 1,
            timers: HashMap::new(),
            fired_tx,
            fired_rx,
        }
    }

    fn next_id(&mut self) -> TimerId {
        let id = self.next_id;
        self.next_id = id.wrapping_add(1).max(1);
        id
    }

    /// Wait for the next fire of a timer that is still active.
    pub async fn next_fired(&mut self) -> Option<TimerId> {
        loop {
            let timer_id = self.fired_rx.recv().await?;
            if self.timers.contains_key(&timer_id) {
                return Some(timer_id);
            }
        }
    }

    pub fn period_of(&self, timer_id: TimerId) -> Option<Duration> {
        self.timers.get(&timer_id).map(|entry| entry.period)
    }

    pub fn clear_all(&mut self) {
        for (_, entry) in self.timers.drain() {
            entry.task.abort();
        }
    }
}

impl TickSource for IntervalTicks {
    fn start_interval(&mut self, period: Duration) -> TimerId {
        let timer_id = self.next_id();
        let period = period.max(Duration::from_millis(1));
        let tx = self.fired_tx.clone();

        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // First tick happens immediately, skip it
            loop {
                interval.tick().await;
                if tx.send(timer_id).is_err() {
                    break;
                }
            }
        });

        self.timers.insert(timer_id, IntervalEntry { period, task });
        debug!(target: "clock", timer_id, ?period, "interval scheduled");
        timer_id
    }

    fn cancel(&mut self, timer_id: TimerId) -> bool {
        match self.timers.remove(&timer_id) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    fn drain_fired(&mut self) -> Vec<TimerId> {
        let mut fired = Vec::new();
        while let Ok(timer_id) = self.fired_rx.try_recv() {
            if self.timers.contains_key(&timer_id) {
                fired.push(timer_id);
            }
        }
        fired
    }

    fn is_active(&self, timer_id: TimerId) -> bool {
        self.timers.contains_key(&timer_id)
    }

    fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for IntervalTicks {
    fn drop(&mut self) {
        self.clear_all();
    }
}

/// Deterministic ticks for stepping the lifecycle by hand.
#[derive(Debug, Default)]
pub struct ManualTicks {
    next_id: TimerId,
    active: BTreeMap<TimerId, Duration>,
    pending: Vec<TimerId>,
    started: usize,
    cancelled: usize,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one fire for every active timer, in start order.
    pub fn fire_all(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.extend(self.active.keys().copied());
        self.pending.len() - before
    }

    pub fn fire(&mut self, timer_id: TimerId) -> bool {
        if !self.active.contains_key(&timer_id) {
            return false;
        }
        self.pending.push(timer_id);
        true
    }

    pub fn active_ids(&self) -> Vec<TimerId> {
        self.active.keys().copied().collect()
    }

    pub fn started_count(&self) -> usize {
        self.started
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }
}

impl TickSource for ManualTicks {
    fn start_interval(&mut self, period: Duration) -> TimerId {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.active.insert(self.next_id, period);
        self.started += 1;
        self.next_id
    }

    fn cancel(&mut self, timer_id: TimerId) -> bool {
        if self.active.remove(&timer_id).is_none() {
            return false;
        }
        self.pending.retain(|pending| *pending != timer_id);
        self.cancelled += 1;
        true
    }

    fn drain_fired(&mut self) -> Vec<TimerId> {
        std::mem::take(&mut self.pending)
    }

    fn is_active(&self, timer_id: TimerId) -> bool {
        self.active.contains_key(&timer_id)
    }

    fn active_count(&self) -> usize {
        self.active.len()
    }
}
