//! Element handles and their lifecycle.
//!
//! - `handle`: [`ElementHandle`], one node plus the listeners registered
//!   through it.
//! - `exports`: `data-export` discovery after a render.
//! - `registry`: bulk teardown of every handle a [`Ui`] created.
//!
//! Re-render contract: [`ElementHandle::set_content`] releases the handle's
//! own listeners, replaces the subtree, then derives fresh exports. Callers
//! rebind on what it returns; handles from an earlier render are stale.

mod exports;
mod handle;
mod registry;

pub use exports::{EXPORT_ATTRIBUTE, ExportSet, Exports, NamedExports};
pub use handle::{Disposer, ElementHandle};
pub use registry::HandleRegistry;

use crate::dom::{self, DispatchOutcome, Document, Event, NodeId, Selector};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// What to resolve a handle from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    BySelector(String),
    ByNode(NodeId),
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Self::BySelector(selector.to_owned())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Self::BySelector(selector)
    }
}

impl From<&String> for Target {
    fn from(selector: &String) -> Self {
        Self::BySelector(selector.clone())
    }
}

impl From<NodeId> for Target {
    fn from(node: NodeId) -> Self {
        Self::ByNode(node)
    }
}

impl From<&ElementHandle> for Target {
    fn from(handle: &ElementHandle) -> Self {
        Self::ByNode(handle.node())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BySelector(selector) => f.write_str(selector),
            Self::ByNode(node) => write!(f, "node {node}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Scope for selector lookup; the document root when `None`.
    pub parent: Option<NodeId>,
    /// Wrap a detached placeholder instead of failing when nothing matches.
    pub fallback_to_empty: bool,
    /// `destroy` releases listeners but leaves the node in place.
    pub relaxed_cleanup: bool,
}

impl ResolveOptions {
    pub fn within(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn fallback_to_empty(mut self) -> Self {
        self.fallback_to_empty = true;
        self
    }

    pub fn relaxed_cleanup(mut self) -> Self {
        self.relaxed_cleanup = true;
        self
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|error| Error::InvalidSelector {
        selector: selector.to_owned(),
        reason: error.reason,
    })
}

/// The scope handles live in: one document and the registry of every handle
/// created against it.
#[derive(Clone, Default)]
pub struct Ui {
    document: Rc<RefCell<Document>>,
    registry: HandleRegistry,
}

impl fmt::Debug for Ui {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Ui")
            .field("registered_handles", &self.registry.len())
            .finish()
    }
}

impl Ui {
    pub fn new(document: Document) -> Self {
        Self {
            document: Rc::new(RefCell::new(document)),
            registry: HandleRegistry::default(),
        }
    }

    pub fn from_html(markup: &str) -> Self {
        Self::new(Document::from_html(markup))
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Serialized content of the whole document.
    pub fn html(&self) -> String {
        let document = self.document.borrow();
        document.inner_html(document.root())
    }

    pub fn resolve(&self, target: impl Into<Target>, options: ResolveOptions) -> Result<ElementHandle> {
        let target = target.into();
        let resolved = match &target {
            Target::ByNode(node) => Some(*node),
            Target::BySelector(selector) => {
                let selector = parse_selector(selector)?;
                let document = self.document.borrow();
                let scope = options.parent.unwrap_or(document.root());
                document.query_selector(scope, &selector)
            }
        };
        let resolved = resolved.filter(|node| self.document.borrow().contains(*node));

        let (node, found) = match resolved {
            Some(node) => (node, true),
            None if options.fallback_to_empty => {
                log::debug!("nothing matches '{target}', falling back to a detached placeholder");
                (self.document.borrow_mut().create_element("div"), false)
            }
            None => {
                return Err(Error::NoSuchElement {
                    selector: target.to_string(),
                });
            }
        };
        Ok(self.adopt(node, found, options.relaxed_cleanup))
    }

    pub(crate) fn adopt(&self, node: NodeId, found: bool, relaxed_cleanup: bool) -> ElementHandle {
        ElementHandle::adopt(
            self.document.clone(),
            self.registry.downgrade(),
            node,
            found,
            relaxed_cleanup,
        )
    }

    pub fn el(&self, target: impl Into<Target>) -> Result<ElementHandle> {
        self.resolve(target, ResolveOptions::default())
    }

    /// Never fails on a missing element; check [`ElementHandle::found`].
    pub fn with_fallback(&self, selector: &str) -> Result<ElementHandle> {
        self.resolve(selector, ResolveOptions::default().fallback_to_empty())
    }

    pub fn with_relaxed_cleanup(&self, selector: &str) -> Result<ElementHandle> {
        self.resolve(selector, ResolveOptions::default().relaxed_cleanup())
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        let selector = parse_selector(selector)?;
        let document = self.document.borrow();
        Ok(document.query_selector(document.root(), &selector).is_some())
    }

    /// A new detached element.
    pub fn create(&self, tag: &str) -> ElementHandle {
        let node = self.document.borrow_mut().create_element(tag);
        self.adopt(node, true, false)
    }

    /// Parses markup with exactly one top-level element into a detached node.
    pub fn from_string(&self, markup: &str) -> Result<ElementHandle> {
        let mut document = self.document.borrow_mut();
        let container = document.create_element("div");
        document.set_inner_html(container, markup);
        let elements: Vec<NodeId> = document
            .children(container)
            .iter()
            .copied()
            .filter(|child| document.is_element(*child))
            .collect();
        let &[element] = elements.as_slice() else {
            document.free(container);
            return Err(Error::SingleRootViolation {
                found: elements.len(),
            });
        };
        document.detach(element);
        document.free(container);
        drop(document);
        Ok(self.adopt(element, true, false))
    }

    /// [`Ui::from_string`] over the inner markup of a template element.
    pub fn from_template(&self, selector: &str) -> Result<ElementHandle> {
        let markup = {
            let parsed = parse_selector(selector)?;
            let document = self.document.borrow();
            let template = document
                .query_selector(document.root(), &parsed)
                .ok_or_else(|| Error::NoSuchElement {
                    selector: selector.to_owned(),
                })?;
            document.inner_html(template)
        };
        self.from_string(&markup)
    }

    /// A detached `div` holding the given handles' nodes.
    pub fn wrap(&self, handles: &[ElementHandle]) -> ElementHandle {
        let wrapper = self.create("div");
        wrapper.append_children(handles);
        wrapper
    }

    pub fn dispatch(&self, node: NodeId, event: Event) -> DispatchOutcome {
        dom::dispatch(&self.document, node, event)
    }

    /// Destroys every handle created through this context, in creation order.
    pub fn destroy_all(&self) {
        self.registry.destroy_all();
    }
}
