use super::exports::{ExportSet, Exports};
use super::registry::WeakRegistry;
use super::parse_selector;
use crate::dom::{self, DispatchOutcome, Document, Event, EventType, ListenerId, NodeId};
use crate::error::{Error, Result};
use serde_json::Value as PropValue;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Releases one listener. Clones share the released flag, so a listener is
/// removed at most once no matter how many copies are released. Releasing
/// after the node is gone is a no-op.
#[derive(Clone)]
pub struct Disposer {
    inner: Rc<DisposerInner>,
}

struct DisposerInner {
    document: Weak<RefCell<Document>>,
    node: NodeId,
    listener: ListenerId,
    event_type: EventType,
    released: Cell<bool>,
}

impl Disposer {
    fn new(document: Weak<RefCell<Document>>, node: NodeId, listener: ListenerId, event_type: EventType) -> Self {
        Self {
            inner: Rc::new(DisposerInner {
                document,
                node,
                listener,
                event_type,
                released: Cell::new(false),
            }),
        }
    }

    pub fn release(&self) {
        if self.inner.released.replace(true) {
            return;
        }
        if let Some(document) = self.inner.document.upgrade() {
            document
                .borrow_mut()
                .remove_listener(self.inner.node, self.inner.listener);
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    pub fn event_type(&self) -> EventType {
        self.inner.event_type
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("node", &self.inner.node)
            .field("event_type", &self.inner.event_type)
            .field("released", &self.inner.released.get())
            .finish()
    }
}

/// Wraps one node of a [`Ui`](super::Ui) document and owns the listeners registered
/// through it. Cheap to clone; clones share listeners and lifecycle.
#[derive(Clone)]
pub struct ElementHandle {
    inner: Rc<HandleInner>,
}

struct HandleInner {
    node: NodeId,
    document: Rc<RefCell<Document>>,
    registry: WeakRegistry,
    listeners: RefCell<SmallVec<[Disposer; 4]>>,
    relaxed_cleanup: bool,
    found: bool,
    destroyed: Cell<bool>,
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("node", &self.inner.node)
            .field("found", &self.inner.found)
            .field("relaxed_cleanup", &self.inner.relaxed_cleanup)
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ElementHandle {
    pub(crate) fn adopt(
        document: Rc<RefCell<Document>>,
        registry: WeakRegistry,
        node: NodeId,
        found: bool,
        relaxed_cleanup: bool,
    ) -> Self {
        let handle = Self {
            inner: Rc::new(HandleInner {
                node,
                document,
                registry: registry.clone(),
                listeners: RefCell::new(SmallVec::new()),
                relaxed_cleanup,
                found,
                destroyed: Cell::new(false),
            }),
        };
        registry.register(&handle);
        handle
    }

    fn child(&self, node: NodeId) -> Self {
        Self::adopt(
            self.inner.document.clone(),
            self.inner.registry.clone(),
            node,
            true,
            false,
        )
    }

    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// `false` for the placeholder produced by a fallback resolve.
    pub fn found(&self) -> bool {
        self.inner.found
    }

    pub fn is_relaxed(&self) -> bool {
        self.inner.relaxed_cleanup
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Whether the node still exists (it may be detached).
    pub fn is_alive(&self) -> bool {
        self.inner.document.borrow().contains(self.inner.node)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.document.borrow().is_connected(self.inner.node)
    }

    /// Listeners registered through this handle and not yet released.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|disposer| !disposer.is_released())
            .count()
    }

    pub fn content(&self) -> String {
        self.inner.document.borrow().inner_html(self.inner.node)
    }

    /// Replaces the inner markup and returns the new exports.
    ///
    /// Listeners registered on this handle are released first; listeners on
    /// descendants go away with the discarded subtree.
    pub fn set_content(&self, markup: &str) -> Exports {
        self.release_listeners();
        self.inner
            .document
            .borrow_mut()
            .set_inner_html(self.inner.node, markup);
        self.exports()
    }

    /// [`Self::set_content`] followed by validation into a typed export set.
    pub fn render<T: ExportSet>(&self, markup: &str) -> Result<T> {
        let exports = self.set_content(markup);
        T::from_exports(&exports)
    }

    pub fn text(&self) -> String {
        self.inner.document.borrow().text_content(self.inner.node)
    }

    pub fn set_text(&self, text: &str) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .set_text_content(self.inner.node, text);
        self
    }

    pub fn css(&self, property: &str) -> Option<String> {
        self.inner.document.borrow().style(self.inner.node, property)
    }

    pub fn set_css(&self, property: &str, value: &str) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .set_style(self.inner.node, property, value);
        self
    }

    pub fn clear_css(&self) -> &Self {
        self.inner.document.borrow_mut().clear_style(self.inner.node);
        self
    }

    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.inner.document.borrow().property(self.inner.node, name)
    }

    pub fn set_prop(&self, name: &str, value: impl Into<PropValue>) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .set_property(self.inner.node, name, value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.inner.document.borrow().attribute(self.inner.node, name)
    }

    pub fn set_attr(&self, name: &str, value: &str) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .set_attribute(self.inner.node, name, value);
        self
    }

    pub fn remove_attr(&self, name: &str) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .remove_attribute(self.inner.node, name);
        self
    }

    /// The current `value` of a form control.
    pub fn value(&self) -> String {
        self.inner.document.borrow().value(self.inner.node)
    }

    pub fn append_child(&self, child: &ElementHandle) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .append_child(self.inner.node, child.node());
        self
    }

    pub fn append_children(&self, children: &[ElementHandle]) -> &Self {
        for child in children {
            self.append_child(child);
        }
        self
    }

    pub fn append_to(&self, parent: &ElementHandle) {
        parent.append_child(self);
    }

    pub fn detach(&self) {
        self.inner.document.borrow_mut().detach(self.inner.node);
    }

    pub fn empty(&self) -> &Self {
        self.inner
            .document
            .borrow_mut()
            .remove_children(self.inner.node);
        self
    }

    /// Registers `callback` for `event_type`. The returned disposer is also
    /// recorded on the handle and released by `set_content` and `destroy`.
    pub fn on(&self, event_type: EventType, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        let listener = self
            .inner
            .document
            .borrow_mut()
            .add_listener(self.inner.node, event_type, Rc::new(callback));
        let disposer = Disposer::new(
            Rc::downgrade(&self.inner.document),
            self.inner.node,
            listener,
            event_type,
        );
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.retain(|recorded| !recorded.is_released());
        listeners.push(disposer.clone());
        disposer
    }

    pub fn on_click(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::Click, callback)
    }

    pub fn on_key_up(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::KeyUp, callback)
    }

    pub fn on_key_down(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::KeyDown, callback)
    }

    pub fn on_mouse_over(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::MouseOver, callback)
    }

    pub fn on_mouse_out(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::MouseOut, callback)
    }

    pub fn on_mouse_up(&self, callback: impl Fn(&mut Event) + 'static) -> Disposer {
        self.on(EventType::MouseUp, callback)
    }

    /// Suppresses the context menu and calls `callback`.
    pub fn on_right_click(&self, callback: impl Fn() + 'static) -> Disposer {
        self.on(EventType::ContextMenu, move |event| {
            event.prevent_default();
            callback();
        })
    }

    /// Calls `callback` with the control's value at the time of the event.
    pub fn on_change(&self, callback: impl Fn(String) + 'static) -> Disposer {
        let document = Rc::downgrade(&self.inner.document);
        let node = self.inner.node;
        self.on(EventType::Change, move |_| {
            let value = document
                .upgrade()
                .map(|document| document.borrow().value(node))
                .unwrap_or_default();
            callback(value);
        })
    }

    /// Releases every listener registered through this handle, leaving the
    /// node untouched.
    pub fn release_listeners(&self) {
        let disposers = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for disposer in disposers {
            disposer.release();
        }
    }

    /// Releases listeners and, unless relaxed cleanup was requested, empties
    /// and detaches the node. The node itself stays valid for other handles
    /// over it. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.release_listeners();
        if self.inner.relaxed_cleanup {
            return;
        }
        let mut document = self.inner.document.borrow_mut();
        document.remove_children(self.inner.node);
        document.detach(self.inner.node);
    }

    pub fn find(&self, selector: &str) -> Result<ElementHandle> {
        let parsed = parse_selector(selector)?;
        let found = self
            .inner
            .document
            .borrow()
            .query_selector(self.inner.node, &parsed);
        match found {
            Some(node) => Ok(self.child(node)),
            None => Err(Error::NoSuchElement {
                selector: selector.to_owned(),
            }),
        }
    }

    /// Handles for every `data-export` descendant, in document order.
    pub fn exports(&self) -> Exports {
        let nodes = self
            .inner
            .document
            .borrow()
            .descendants_with_attribute(self.inner.node, super::EXPORT_ATTRIBUTE);
        Exports::new(nodes.into_iter().map(|node| self.child(node)).collect())
    }

    pub fn named_exports(&self) -> super::NamedExports {
        self.exports().named()
    }

    /// The `data-export` name of this element, if any.
    pub fn export_name(&self) -> Option<String> {
        self.attr(super::EXPORT_ATTRIBUTE)
    }

    pub fn scroll_to_bottom(&self) {
        let height = self.prop("scrollHeight").unwrap_or_else(|| 0.into());
        self.set_prop("scrollTop", height);
    }

    /// Selects the control's whole value on the next click, once.
    pub fn select_on_click(&self) -> Disposer {
        let document = Rc::downgrade(&self.inner.document);
        let node = self.inner.node;
        let own: Rc<RefCell<Option<Disposer>>> = Rc::default();
        let disposer = self.on_click({
            let own = own.clone();
            move |_| {
                if let Some(document) = document.upgrade() {
                    document.borrow_mut().select_all(node);
                }
                let disposer = own.borrow_mut().take();
                if let Some(disposer) = disposer {
                    disposer.release();
                }
            }
        });
        *own.borrow_mut() = Some(disposer.clone());
        disposer
    }

    pub fn dispatch(&self, event: Event) -> DispatchOutcome {
        dom::dispatch(&self.inner.document, self.inner.node, event)
    }

    pub fn click(&self) -> DispatchOutcome {
        self.dispatch(Event::new(EventType::Click))
    }

    pub fn right_click(&self) -> DispatchOutcome {
        self.dispatch(Event::new(EventType::ContextMenu))
    }

    pub fn key_up(&self, key: &str) -> DispatchOutcome {
        self.dispatch(Event::new(EventType::KeyUp).with_key(key))
    }

    /// Sets the control's value and fires `change`, like a user edit.
    pub fn change(&self, value: &str) -> DispatchOutcome {
        self.set_prop("value", value);
        self.dispatch(Event::new(EventType::Change))
    }
}
