//! In-memory document the element handles operate on.
//!
//! Nodes live in a generational arena. A `NodeId` whose slot has been freed
//! stops resolving, so handles and disposers that outlive their node turn
//! into no-ops instead of touching whatever reused the slot.

pub mod event;
pub mod html;
pub mod selector;

use indexmap::IndexMap;
use serde_json::Value as PropValue;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use event::{Callback, DispatchOutcome, Event, EventType, ListenerId, dispatch};
pub use selector::Selector;

/// Generational index into the document arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl FromStr for NodeId {
    type Err = ();

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (index, generation) = text.split_once('v').ok_or(())?;
        Ok(Self {
            index: index.parse().map_err(|_| ())?,
            generation: generation.parse().map_err(|_| ())?,
        })
    }
}

#[derive(Debug)]
pub enum NodeData {
    /// The document root. Never matched by selectors, never detached.
    Document,
    Element(ElementData),
    Text(String),
}

pub struct ElementData {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    /// Inline style, serialized as the `style` attribute.
    pub style: IndexMap<String, String>,
    pub properties: HashMap<String, PropValue>,
    listeners: Vec<(ListenerId, EventType, Callback)>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            properties: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    fn style_text(&self) -> String {
        self.style
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for ElementData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ElementData")
            .field("tag", &self.tag)
            .field("attributes", &self.attributes)
            .field("style", &self.style)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: NodeId,
    /// Bumped on every structural or attribute mutation.
    revision: u64,
    next_listener_id: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            revision: 0,
            next_listener_id: 0,
        };
        document.root = document.alloc(NodeData::Document);
        document
    }

    /// Creates a document whose root holds the given markup.
    pub fn from_html(html: &str) -> Self {
        let mut document = Self::new();
        document.set_inner_html(document.root, html);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node { parent: None, children: Vec::new(), data };
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(Node::as_element)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.node_mut(id).and_then(Node::as_element_mut)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// `id` followed by its ancestors up to the root of its tree.
    pub fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }
        path
    }

    /// Element descendants of `id` in document order, `id` excluded.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                result.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        result
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.touch();
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.touch();
        self.alloc(NodeData::Text(text.to_owned()))
    }

    /// Moves `child` under `parent`. Refuses to create cycles or move the root.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if child == self.root
            || !self.contains(parent)
            || !self.contains(child)
            || matches!(self.node(parent).map(Node::data), Some(NodeData::Text(_)))
            || self.is_inclusive_ancestor(child, parent)
        {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.touch();
        true
    }

    /// Removes the node from its parent, keeping it alive.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        self.touch();
    }

    /// Detaches the node and frees it together with its whole subtree.
    pub fn free(&mut self, id: NodeId) {
        if id == self.root || !self.contains(id) {
            return;
        }
        self.detach(id);
        self.free_subtree(id);
        self.touch();
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(node.index as usize)
                .filter(|slot| slot.generation == node.generation)
            else {
                continue;
            };
            if let Some(removed) = slot.node.take() {
                stack.extend(removed.children);
                self.free_list.push(node.index);
            }
        }
    }

    /// Frees every child of `id`.
    pub fn remove_children(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
            self.free_subtree(child);
        }
        self.touch();
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        html::serialize_children(self, id, &mut out, None);
        out
    }

    /// Inner HTML with every element tagged by its `NodeId` in `attribute`.
    pub fn inner_html_with_ids(&self, id: NodeId, attribute: &str) -> String {
        let mut out = String::new();
        html::serialize_children(self, id, &mut out, Some(attribute));
        out
    }

    /// Replaces the children of `id` with the parsed fragment. The previous
    /// children are freed.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) {
        if !self.contains(id) || matches!(self.node(id).map(Node::data), Some(NodeData::Text(_))) {
            return;
        }
        self.remove_children(id);
        for child in html::parse_fragment(self, markup) {
            self.append_child(id, child);
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match self.node(node).map(Node::data) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(_) => stack.extend(self.children(node).iter().rev().copied()),
                None => {}
            }
        }
        out
    }

    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.is_element(id) && id != self.root {
            return;
        }
        self.remove_children(id);
        if !text.is_empty() {
            let child = self.create_text(text);
            self.append_child(id, child);
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let element = self.element(id)?;
        if name.eq_ignore_ascii_case("style") {
            return (!element.style.is_empty()).then(|| element.style_text());
        }
        element.attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if name == "style" {
            element.style = parse_style(value);
        } else {
            element.attributes.insert(name, value.to_owned());
        }
        self.touch();
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if name == "style" {
            element.style.clear();
        } else {
            element.attributes.shift_remove(&name);
        }
        self.touch();
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.element(id)?.style.get(&css_property_name(property)).cloned()
    }

    /// Sets an inline style property; an empty value removes it.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let property = css_property_name(property);
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if value.is_empty() {
            element.style.shift_remove(&property);
        } else {
            element.style.insert(property, value.to_owned());
        }
        self.touch();
    }

    pub fn clear_style(&mut self, id: NodeId) {
        if let Some(element) = self.element_mut(id) {
            element.style.clear();
            self.touch();
        }
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<PropValue> {
        self.element(id)?.properties.get(name).cloned()
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: PropValue) {
        if let Some(element) = self.element_mut(id) {
            element.properties.insert(name.to_owned(), value);
            self.touch();
        }
    }

    /// Current `value` of a form control: the property if set, otherwise
    /// the `value` attribute, otherwise the text of a `textarea`.
    pub fn value(&self, id: NodeId) -> String {
        let Some(element) = self.element(id) else {
            return String::new();
        };
        match element.properties.get("value") {
            Some(PropValue::String(value)) => value.clone(),
            Some(PropValue::Null) | None => element
                .attributes
                .get("value")
                .cloned()
                .unwrap_or_else(|| {
                    if element.tag == "textarea" {
                        self.text_content(id)
                    } else {
                        String::new()
                    }
                }),
            Some(other) => other.to_string(),
        }
    }

    /// Selects the whole value of a form control.
    pub fn select_all(&mut self, id: NodeId) {
        let length = self.value(id).chars().count();
        self.set_property(id, "selectionStart", 0.into());
        self.set_property(id, "selectionEnd", length.into());
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendant_elements(scope)
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendant_elements(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    /// Element descendants carrying `attribute`, in document order.
    pub fn descendants_with_attribute(&self, scope: NodeId, attribute: &str) -> Vec<NodeId> {
        self.descendant_elements(scope)
            .into_iter()
            .filter(|node| {
                self.element(*node)
                    .is_some_and(|element| element.attributes.contains_key(attribute))
            })
            .collect()
    }

    /// Registers a listener. On a stale node the id is still allocated but
    /// nothing is stored, so removing it later is a no-op.
    pub fn add_listener(&mut self, id: NodeId, event_type: EventType, callback: Callback) -> ListenerId {
        let listener = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        if let Some(element) = self.element_mut(id) {
            element.listeners.push((listener, event_type, callback));
        }
        listener
    }

    pub fn remove_listener(&mut self, id: NodeId, listener: ListenerId) -> bool {
        let Some(element) = self.element_mut(id) else {
            return false;
        };
        let before = element.listeners.len();
        element.listeners.retain(|(registered, _, _)| *registered != listener);
        before != element.listeners.len()
    }

    pub fn has_listener(&self, id: NodeId, listener: ListenerId) -> bool {
        self.element(id)
            .is_some_and(|element| element.listeners.iter().any(|(registered, _, _)| *registered == listener))
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.element(id).map_or(0, |element| element.listeners.len())
    }

    pub(crate) fn listeners_for(&self, id: NodeId, event_type: EventType) -> Vec<(ListenerId, Callback)> {
        self.element(id)
            .map(|element| {
                element
                    .listeners
                    .iter()
                    .filter(|(_, registered, _)| *registered == event_type)
                    .map(|(listener, _, callback)| (*listener, callback.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `gridTemplateColumns` -> `grid-template-columns`; kebab-case passes through.
pub fn css_property_name(property: &str) -> String {
    let mut name = String::with_capacity(property.len() + 4);
    for c in property.trim().chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

fn parse_style(text: &str) -> IndexMap<String, String> {
    text.split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty() && !value.is_empty()).then(|| (css_property_name(name), value.to_owned()))
        })
        .collect()
}
