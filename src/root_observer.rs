use tracing::{info, trace};

use crate::host::{HostDocument, ListenerId, ObserverId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Searching { observer: ObserverId },
    Bound { listener: ListenerId },
}

/// Waits for the compose trigger to exist, then binds one activation listener
/// to it and stops watching. The trigger is assumed to persist afterwards.
#[derive(Debug)]
pub struct RootObserver {
    phase: Phase,
}

impl Default for RootObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RootObserver {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Start watching. A trigger that is already present is bound immediately.
    pub fn start<D: HostDocument>(&mut self, document: &mut D) -> bool {
        if self.phase != Phase::Idle {
            return self.is_bound();
        }
        let observer = document.observe_mutations();
        self.phase = Phase::Searching { observer };
        self.look_for_trigger(document)
    }

    pub fn on_mutation<D: HostDocument>(&mut self, observer: ObserverId, document: &mut D) -> bool {
        if !self.owns_observer(observer) {
            return false;
        }
        self.look_for_trigger(document)
    }

    fn look_for_trigger<D: HostDocument>(&mut self, document: &mut D) -> bool {
        let Phase::Searching { observer } = self.phase else {
            return false;
        };
        let Some(trigger) = document.find_trigger() else {
            trace!(target: "root_observer", "compose trigger not present yet");
            return false;
        };

        let listener = document.add_activation_listener(&trigger);
        document.disconnect_observer(observer);
        self.phase = Phase::Bound { listener };
        info!(target: "root_observer", listener, "found compose trigger, listener attached");
        true
    }

    pub fn owns_observer(&self, observer: ObserverId) -> bool {
        self.phase == Phase::Searching { observer }
    }

    pub fn is_trigger_activation(&self, listener: ListenerId) -> bool {
        self.phase == Phase::Bound { listener }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.phase, Phase::Bound { .. })
    }
}
