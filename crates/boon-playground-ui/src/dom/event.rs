//! Events and bubbling dispatch over the in-memory document.

use super::{Document, NodeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type Callback = Rc<dyn Fn(&mut Event)>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(pub(crate) u64);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventType {
    Click,
    ContextMenu,
    KeyUp,
    KeyDown,
    MouseOver,
    MouseOut,
    MouseUp,
    Change,
    Input,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        Self::Click,
        Self::ContextMenu,
        Self::KeyUp,
        Self::KeyDown,
        Self::MouseOver,
        Self::MouseOut,
        Self::MouseUp,
        Self::Change,
        Self::Input,
    ];

    /// The DOM event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::ContextMenu => "contextmenu",
            Self::KeyUp => "keyup",
            Self::KeyDown => "keydown",
            Self::MouseOver => "mouseover",
            Self::MouseOut => "mouseout",
            Self::MouseUp => "mouseup",
            Self::Change => "change",
            Self::Input => "input",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event_type| event_type.as_str() == name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    event_type: EventType,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
    key: Option<String>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            target: None,
            current_target: None,
            key: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The node whose listener is running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Listeners on the current node still run; ancestors are skipped.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    /// Number of listeners that actually ran.
    pub invoked: usize,
}

/// Dispatches `event` at `target` and bubbles it to the root.
///
/// The propagation path is fixed before any listener runs. At each node the
/// matching listeners are snapshotted, and every one of them is re-checked
/// right before it is invoked, so a listener released by an earlier one
/// (e.g. through a re-render) never fires. No borrow of the document is held
/// while a listener runs.
pub fn dispatch(document: &Rc<RefCell<Document>>, target: NodeId, mut event: Event) -> DispatchOutcome {
    let path = document.borrow().ancestors_inclusive(target);
    let mut outcome = DispatchOutcome::default();
    if path.is_empty() {
        log::trace!("dispatch of '{}' at stale node {target} ignored", event.event_type);
        return outcome;
    }
    event.target = Some(target);
    for node in path {
        event.current_target = Some(node);
        let listeners = document.borrow().listeners_for(node, event.event_type);
        for (listener, callback) in listeners {
            if !document.borrow().has_listener(node, listener) {
                continue;
            }
            callback(&mut event);
            outcome.invoked += 1;
        }
        if event.propagation_stopped {
            break;
        }
    }
    log::trace!(
        "dispatched '{}' at {target}: {} listener(s) invoked",
        event.event_type,
        outcome.invoked
    );
    outcome.default_prevented = event.default_prevented;
    outcome.propagation_stopped = event.propagation_stopped;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn shared(html: &str) -> (Rc<RefCell<Document>>, NodeId, NodeId) {
        let document = Document::from_html(html);
        let outer = document.children(document.root())[0];
        let inner = document.children(outer)[0];
        (Rc::new(RefCell::new(document)), outer, inner)
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let (document, outer, inner) = shared("<div><a></a></div>");
        let order = Rc::new(RefCell::new(Vec::new()));
        for (node, label) in [(outer, "outer"), (inner, "inner")] {
            let order = order.clone();
            document.borrow_mut().add_listener(
                node,
                EventType::Click,
                Rc::new(move |_: &mut Event| order.borrow_mut().push(label)),
            );
        }

        let outcome = dispatch(&document, inner, Event::new(EventType::Click));

        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
        assert_eq!(outcome.invoked, 2);
    }

    #[test]
    fn stop_propagation_skips_ancestors() {
        let (document, outer, inner) = shared("<div><a></a></div>");
        let outer_calls = Rc::new(Cell::new(0));
        {
            let outer_calls = outer_calls.clone();
            document.borrow_mut().add_listener(
                outer,
                EventType::Click,
                Rc::new(move |_: &mut Event| outer_calls.set(outer_calls.get() + 1)),
            );
        }
        document.borrow_mut().add_listener(
            inner,
            EventType::Click,
            Rc::new(|event: &mut Event| event.stop_propagation()),
        );

        let outcome = dispatch(&document, inner, Event::new(EventType::Click));

        assert!(outcome.propagation_stopped);
        assert_eq!(outer_calls.get(), 0);
    }

    #[test]
    fn listener_removed_mid_dispatch_does_not_fire() {
        let (document, outer, _) = shared("<div><a></a></div>");
        let victim: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let victim_fired = Rc::new(Cell::new(false));

        let remover = {
            let document = Rc::downgrade(&document);
            let victim = victim.clone();
            Rc::new(move |_: &mut Event| {
                if let (Some(document), Some(listener)) = (document.upgrade(), victim.get()) {
                    document.borrow_mut().remove_listener(outer, listener);
                }
            }) as Callback
        };
        document.borrow_mut().add_listener(outer, EventType::Click, remover);
        let listener = {
            let victim_fired = victim_fired.clone();
            document.borrow_mut().add_listener(
                outer,
                EventType::Click,
                Rc::new(move |_: &mut Event| victim_fired.set(true)),
            )
        };
        victim.set(Some(listener));

        dispatch(&document, outer, Event::new(EventType::Click));

        assert!(!victim_fired.get());
        assert!(!document.borrow().has_listener(outer, listener));
    }

    #[test]
    fn dispatch_at_stale_node_is_a_no_op() {
        let (document, outer, inner) = shared("<div><a></a></div>");
        document.borrow_mut().free(outer);
        let outcome = dispatch(&document, inner, Event::new(EventType::Click));
        assert_eq!(outcome, DispatchOutcome::default());
    }

    #[test]
    fn event_names_round_trip() {
        for event_type in EventType::ALL {
            assert_eq!(EventType::from_name(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::from_name("scroll"), None);
    }
}
