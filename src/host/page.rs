use std::collections::VecDeque;

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::*;
use kuchiki::{NodeRef, Selectors};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::{HostDocument, HostEvent, ListenerId, ObserverId, TerminalControl};
use crate::config::{AugmentConfig, SelectorConfig};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid {role} selector: {selector}")]
    InvalidSelector { role: &'static str, selector: String },
    #[error("document has no <body>")]
    MissingBody,
}

/// Record of a change applied to the page, kept in application order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomPatch {
    CreateElement { tag_name: String },
    Attribute {
        target: String,
        name: String,
        value: String,
    },
    TextContent { target: String, value: String },
    AppendChild { parent: String, child: String },
    InsertHtml { parent: String, html: String },
    RemoveChild { parent: String, child: String },
}

impl DomPatch {
    /// Whether a `childList`/`subtree` observer would be told about this patch.
    fn is_structural(&self) -> bool {
        matches!(
            self,
            DomPatch::TextContent { .. }
                | DomPatch::AppendChild { .. }
                | DomPatch::InsertHtml { .. }
                | DomPatch::RemoveChild { .. }
        )
    }
}

struct CompiledSelectors {
    trigger: Selectors,
    surface: Selectors,
    completion: Selectors,
    discard: Selectors,
    close: Selectors,
    anchor: Selectors,
}

impl CompiledSelectors {
    fn compile(config: &SelectorConfig) -> Result<Self, PageError> {
        Ok(Self {
            trigger: compile_selector("trigger", &config.trigger)?,
            surface: compile_selector("surface", &config.surface)?,
            completion: compile_selector("completion", &config.completion)?,
            discard: compile_selector("discard", &config.discard)?,
            close: compile_selector("close", &config.close)?,
            anchor: compile_selector("anchor", &config.anchor)?,
        })
    }

    fn control(&self, control: TerminalControl) -> &Selectors {
        match control {
            TerminalControl::Completion => &self.completion,
            TerminalControl::Discard => &self.discard,
            TerminalControl::Close => &self.close,
        }
    }
}

fn compile_selector(role: &'static str, source: &str) -> Result<Selectors, PageError> {
    Selectors::compile(source).map_err(|()| PageError::InvalidSelector {
        role,
        selector: source.to_string(),
    })
}

struct ObserverSlot {
    id: ObserverId,
    pending: bool,
}

struct ListenerSlot {
    id: ListenerId,
    node: NodeRef,
}

/// An HTML page held as a kuchiki tree, standing in for the live host document.
///
/// Host-side operations ([`insert_html`](Self::insert_html), [`remove`](Self::remove),
/// [`click`](Self::click)) simulate what the webmail application does on its own;
/// the [`HostDocument`] impl is the only surface the lifecycle manager sees.
pub struct PageDocument {
    root: NodeRef,
    selectors: CompiledSelectors,
    marker: String,
    next_id: u32,
    observers: Vec<ObserverSlot>,
    listeners: Vec<ListenerSlot>,
    events: VecDeque<HostEvent>,
    patches: VecDeque<DomPatch>,
    patch_limit: usize,
}

impl PageDocument {
    pub fn parse(html: &str, config: &AugmentConfig) -> Result<Self, PageError> {
        let selectors = CompiledSelectors::compile(&config.selectors)?;
        Ok(Self {
            root: kuchiki::parse_html().one(html),
            selectors,
            marker: config.marker_attribute.clone(),
            next_id: 1,
            observers: Vec::new(),
            listeners: Vec::new(),
            events: VecDeque::new(),
            patches: VecDeque::new(),
            patch_limit: config.patch_log_limit,
        })
    }

    pub fn to_html(&self) -> String {
        self.root.to_string()
    }

    pub fn body(&self) -> Result<NodeRef, PageError> {
        self.root
            .select_first("body")
            .map(|body| body.as_node().clone())
            .map_err(|()| PageError::MissingBody)
    }

    pub fn query(&self, selector: &str) -> Result<Option<NodeRef>, PageError> {
        let selectors = compile_selector("query", selector)?;
        Ok(first_match(&self.root, &selectors))
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>, PageError> {
        let selectors = compile_selector("query", selector)?;
        Ok(all_matches(&self.root, &selectors))
    }

    /// Parse `html` as a fragment and append its top-level nodes under `parent`.
    pub fn insert_html(&mut self, parent: &NodeRef, html: &str) -> Vec<NodeRef> {
        let fragment = kuchiki::parse_html().one(html);
        let Ok(body) = fragment.select_first("body") else {
            return Vec::new();
        };

        let inserted: Vec<NodeRef> = body.as_node().children().collect();
        for node in &inserted {
            node.detach();
            parent.append(node.clone());
        }

        self.record(DomPatch::InsertHtml {
            parent: describe(parent),
            html: html.to_string(),
        });
        inserted
    }

    /// Host-initiated removal, e.g. the application dismissing a window itself.
    pub fn remove(&mut self, node: &NodeRef) -> bool {
        self.remove_node(node)
    }

    /// Activate `node`, notifying listeners on it and on its ancestors (bubbling).
    pub fn click(&mut self, node: &NodeRef) -> usize {
        let mut notified = 0;
        for target in node.inclusive_ancestors() {
            for slot in self.listeners.iter().filter(|slot| slot.node == target) {
                self.events.push_back(HostEvent::Activated(slot.id));
                notified += 1;
            }
        }
        trace!(target: "page", node = %describe(node), notified, "click dispatched");
        notified
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The most recent patches, oldest first, at most `patch_log_limit` of them.
    pub fn patches(&self) -> &VecDeque<DomPatch> {
        &self.patches
    }

    pub fn drain_patches(&mut self) -> Vec<DomPatch> {
        self.patches.drain(..).collect()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = id.wrapping_add(1).max(1);
        id
    }

    fn record(&mut self, patch: DomPatch) {
        if patch.is_structural() {
            for slot in &mut self.observers {
                if !slot.pending {
                    slot.pending = true;
                    self.events.push_back(HostEvent::Mutated(slot.id));
                }
            }
        }
        if self.patch_limit == 0 {
            return;
        }
        if self.patches.len() == self.patch_limit {
            self.patches.pop_front();
        }
        self.patches.push_back(patch);
    }
}

impl HostDocument for PageDocument {
    type Node = NodeRef;

    fn find_trigger(&self) -> Option<NodeRef> {
        first_match(&self.root, &self.selectors.trigger)
    }

    fn list_candidate_surfaces(&self) -> Vec<NodeRef> {
        all_matches(&self.root, &self.selectors.surface)
    }

    fn locate_control(&self, surface: &NodeRef, control: TerminalControl) -> Option<NodeRef> {
        first_match(surface, self.selectors.control(control))
    }

    fn locate_anchor_region(&self, surface: &NodeRef) -> Option<NodeRef> {
        first_match(surface, &self.selectors.anchor)
    }

    fn is_connected(&self, node: &NodeRef) -> bool {
        node.inclusive_ancestors().any(|ancestor| ancestor == self.root)
    }

    fn get_marker(&self, surface: &NodeRef) -> bool {
        surface
            .as_element()
            .map(|element| element.attributes.borrow().contains(self.marker.as_str()))
            .unwrap_or(false)
    }

    fn set_marker(&mut self, surface: &NodeRef) {
        let marker = self.marker.clone();
        self.set_attribute(surface, &marker, "true");
    }

    fn observe_mutations(&mut self) -> ObserverId {
        let id = self.allocate_id();
        self.observers.push(ObserverSlot { id, pending: false });
        debug!(target: "page", observer = id, "mutation observer connected");
        id
    }

    fn disconnect_observer(&mut self, observer: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|slot| slot.id != observer);
        before != self.observers.len()
    }

    fn add_activation_listener(&mut self, node: &NodeRef) -> ListenerId {
        let id = self.allocate_id();
        self.listeners.push(ListenerSlot {
            id,
            node: node.clone(),
        });
        id
    }

    fn remove_activation_listener(&mut self, listener: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|slot| slot.id != listener);
        before != self.listeners.len()
    }

    fn drain_events(&mut self) -> Vec<HostEvent> {
        for slot in &mut self.observers {
            slot.pending = false;
        }

        let observers = &self.observers;
        let listeners = &self.listeners;
        self.events
            .drain(..)
            .filter(|event| match event {
                HostEvent::Mutated(id) => observers.iter().any(|slot| slot.id == *id),
                HostEvent::Activated(id) => listeners.iter().any(|slot| slot.id == *id),
            })
            .collect()
    }

    fn create_element(&mut self, tag_name: &str) -> NodeRef {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag_name),
        );
        self.record(DomPatch::CreateElement {
            tag_name: tag_name.to_string(),
        });
        NodeRef::new_element(name, None)
    }

    fn set_attribute(&mut self, node: &NodeRef, name: &str, value: &str) {
        let Some(element) = node.as_element() else {
            return;
        };
        element
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
        self.record(DomPatch::Attribute {
            target: describe(node),
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn set_text(&mut self, node: &NodeRef, text: &str) {
        let children: Vec<NodeRef> = node.children().collect();
        for child in children {
            child.detach();
        }
        node.append(NodeRef::new_text(text));
        self.record(DomPatch::TextContent {
            target: describe(node),
            value: text.to_string(),
        });
    }

    fn append_child(&mut self, parent: &NodeRef, child: &NodeRef) {
        child.detach();
        parent.append(child.clone());
        self.record(DomPatch::AppendChild {
            parent: describe(parent),
            child: describe(child),
        });
    }

    fn parent_of(&self, node: &NodeRef) -> Option<NodeRef> {
        node.parent()
    }

    fn remove_node(&mut self, node: &NodeRef) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        node.detach();
        self.record(DomPatch::RemoveChild {
            parent: describe(&parent),
            child: describe(node),
        });
        true
    }

    fn text_of(&self, node: &NodeRef) -> String {
        node.text_contents()
    }
}

fn first_match(scope: &NodeRef, selectors: &Selectors) -> Option<NodeRef> {
    scope
        .descendants()
        .elements()
        .find(|element| selectors.matches(element))
        .map(|element| element.as_node().clone())
}

fn all_matches(scope: &NodeRef, selectors: &Selectors) -> Vec<NodeRef> {
    scope
        .descendants()
        .elements()
        .filter(|element| selectors.matches(element))
        .map(|element| element.as_node().clone())
        .collect()
}

/// Short label for patch records: tag name plus classes, e.g. `div.compose-timer`.
fn describe(node: &NodeRef) -> String {
    if node.as_document().is_some() {
        return "#document".to_string();
    }
    let Some(element) = node.as_element() else {
        return "#text".to_string();
    };

    let mut label = element.name.local.to_string();
    if let Some(class) = element.attributes.borrow().get("class") {
        for name in class.split_whitespace() {
            label.push('.');
            label.push_str(name);
        }
    }
    label
}
