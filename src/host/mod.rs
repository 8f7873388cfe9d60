//! Capability contract between the lifecycle manager and the page it augments.
//!
//! The host document is owned by someone else and mutates on its own schedule.
//! Everything the manager needs from it goes through [`HostDocument`]; the
//! manager never assumes a concrete DOM implementation.

pub mod page;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use page::{DomPatch, PageDocument, PageError};

pub type ObserverId = u32;
pub type ListenerId = u32;

/// Deliveries queued by the host and drained by the driver between callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Structural change somewhere under the document root, coalesced per observer.
    Mutated(ObserverId),
    /// A control carrying this listener (or one of its descendants) was activated.
    Activated(ListenerId),
}

/// Controls on a surface whose activation ends the authoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalControl {
    Completion,
    Discard,
    Close,
}

impl TerminalControl {
    pub const ALL: [TerminalControl; 3] = [
        TerminalControl::Completion,
        TerminalControl::Discard,
        TerminalControl::Close,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TerminalControl::Completion => "completion",
            TerminalControl::Discard => "discard",
            TerminalControl::Close => "close",
        }
    }
}

impl fmt::Display for TerminalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait HostDocument {
    /// Node handle. Equality is node identity.
    type Node: Clone + PartialEq + fmt::Debug;

    // Structural lookups.
    fn find_trigger(&self) -> Option<Self::Node>;
    /// Every region that looks like an authoring surface, in document order.
    fn list_candidate_surfaces(&self) -> Vec<Self::Node>;
    fn surface_has_completion_control(&self, surface: &Self::Node) -> bool {
        self.locate_control(surface, TerminalControl::Completion)
            .is_some()
    }
    fn locate_control(&self, surface: &Self::Node, control: TerminalControl)
        -> Option<Self::Node>;
    fn locate_anchor_region(&self, surface: &Self::Node) -> Option<Self::Node>;
    fn is_connected(&self, node: &Self::Node) -> bool;

    // Namespaced attachment marker stored on the surface node.
    fn get_marker(&self, surface: &Self::Node) -> bool;
    fn set_marker(&mut self, surface: &Self::Node);

    // Subscriptions.
    fn observe_mutations(&mut self) -> ObserverId;
    fn disconnect_observer(&mut self, observer: ObserverId) -> bool;
    fn add_activation_listener(&mut self, node: &Self::Node) -> ListenerId;
    fn remove_activation_listener(&mut self, listener: ListenerId) -> bool;
    fn drain_events(&mut self) -> Vec<HostEvent>;

    // Primitives for nodes the manager owns.
    fn create_element(&mut self, tag_name: &str) -> Self::Node;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn set_text(&mut self, node: &Self::Node, text: &str);
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);
    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Detach `node` from its parent. Returns `false` when it was already detached.
    fn remove_node(&mut self, node: &Self::Node) -> bool;
    fn text_of(&self, node: &Self::Node) -> String;
}
