//! Mirrors a [`Ui`] document into a real page element and feeds the page's
//! events back into it.
//!
//! Every mirrored element carries its [`NodeId`] in `data-node`. One
//! delegated listener per [`EventType`] on the host maps the real target
//! back to a node, dispatches there, and re-renders the host when the
//! document changed.

use crate::dom::{Event, EventType, NodeId};
use crate::element::Ui;
use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

pub const NODE_ATTRIBUTE: &str = "data-node";

type HostListener = Closure<dyn Fn(web_sys::Event)>;

struct MountInner {
    ui: Ui,
    host: web_sys::Element,
    synced_revision: Cell<Option<u64>>,
    listeners: RefCell<Vec<(EventType, HostListener)>>,
}

impl Drop for MountInner {
    fn drop(&mut self) {
        for (event_type, listener) in self.listeners.get_mut().drain(..) {
            let _ = self
                .host
                .remove_event_listener_with_callback(event_type.as_str(), listener.as_ref().unchecked_ref());
        }
    }
}

/// A live mirror of `ui` inside the page element matching a selector.
/// Dropping it removes the host listeners; the last rendered markup stays.
pub struct BrowserMount {
    inner: Rc<MountInner>,
}

fn js_error(context: &str, error: wasm_bindgen::JsValue) -> Error {
    Error::Browser(format!("{context}: {error:?}"))
}

impl BrowserMount {
    pub fn attach(ui: &Ui, host_selector: &str) -> Result<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| Error::Browser("no window document".to_owned()))?;
        let host = document
            .query_selector(host_selector)
            .map_err(|error| js_error("invalid host selector", error))?
            .ok_or_else(|| Error::NoSuchElement {
                selector: host_selector.to_owned(),
            })?;

        let inner = Rc::new(MountInner {
            ui: ui.clone(),
            host,
            synced_revision: Cell::new(None),
            listeners: RefCell::new(Vec::new()),
        });
        for event_type in EventType::ALL {
            let weak: Weak<MountInner> = Rc::downgrade(&inner);
            let listener: HostListener = Closure::new(move |event: web_sys::Event| {
                if let Some(inner) = weak.upgrade() {
                    forward(&inner, event_type, &event);
                }
            });
            inner
                .host
                .add_event_listener_with_callback(event_type.as_str(), listener.as_ref().unchecked_ref())
                .map_err(|error| js_error("adding host listener", error))?;
            inner.listeners.borrow_mut().push((event_type, listener));
        }
        sync(&inner);
        log::debug!("mounted document into '{host_selector}'");
        Ok(Self { inner })
    }

    /// Re-renders the host if the document changed since the last sync.
    pub fn sync(&self) {
        sync(&self.inner);
    }

    pub fn host(&self) -> &web_sys::Element {
        &self.inner.host
    }
}

fn sync(inner: &MountInner) {
    let document = inner.ui.document().borrow();
    let revision = document.revision();
    if inner.synced_revision.get() == Some(revision) {
        return;
    }
    let markup = document.inner_html_with_ids(document.root(), NODE_ATTRIBUTE);
    drop(document);
    inner.host.set_inner_html(&markup);
    inner.synced_revision.set(Some(revision));
}

fn target_node(event: &web_sys::Event) -> Option<(web_sys::Element, NodeId)> {
    let target = event.target()?.dyn_into::<web_sys::Element>().ok()?;
    let element = target.closest(&format!("[{NODE_ATTRIBUTE}]")).ok()??;
    let node = element.get_attribute(NODE_ATTRIBUTE)?.parse().ok()?;
    Some((element, node))
}

fn control_value(element: &web_sys::Element) -> Option<String> {
    if let Some(input) = element.dyn_ref::<web_sys::HtmlInputElement>() {
        return Some(input.value());
    }
    if let Some(select) = element.dyn_ref::<web_sys::HtmlSelectElement>() {
        return Some(select.value());
    }
    element
        .dyn_ref::<web_sys::HtmlTextAreaElement>()
        .map(web_sys::HtmlTextAreaElement::value)
}

fn forward(inner: &MountInner, event_type: EventType, event: &web_sys::Event) {
    let Some((element, node)) = target_node(event) else {
        return;
    };
    if matches!(event_type, EventType::Change | EventType::Input) {
        if let Some(value) = control_value(&element) {
            let mut document = inner.ui.document().borrow_mut();
            document.set_property(node, "value", value.into());
            // The page already shows this value.
            inner.synced_revision.set(Some(document.revision()));
        }
    }

    let mut mirrored = Event::new(event_type);
    if let Some(keyboard) = event.dyn_ref::<web_sys::KeyboardEvent>() {
        mirrored = mirrored.with_key(keyboard.key());
    }
    let outcome = inner.ui.dispatch(node, mirrored);
    log::trace!("forwarded {event_type} to {node}: {outcome:?}");
    if outcome.default_prevented {
        event.prevent_default();
    }
    if outcome.propagation_stopped {
        event.stop_propagation();
    }
    sync(inner);
}
