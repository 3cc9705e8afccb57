use super::ElementHandle;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Every handle a [`Ui`](super::Ui) created and has not yet torn down.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    handles: Rc<RefCell<Vec<ElementHandle>>>,
}

impl HandleRegistry {
    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.handles))
    }

    pub fn len(&self) -> usize {
        self.handles.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.borrow().is_empty()
    }

    /// Destroys the registered handles in creation order and empties the
    /// registry. Handles created while this runs stay registered.
    pub fn destroy_all(&self) {
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        log::debug!("destroying {} registered element handle(s)", handles.len());
        for handle in &handles {
            handle.destroy();
        }
    }
}

/// Held by handles so the registry can own them without a cycle.
#[derive(Debug, Clone, Default)]
pub(crate) struct WeakRegistry(Weak<RefCell<Vec<ElementHandle>>>);

impl WeakRegistry {
    /// Also drops handles that are destroyed or whose node was freed, such as
    /// exports of a replaced render. Tearing those down would do nothing.
    pub(crate) fn register(&self, handle: &ElementHandle) {
        if let Some(handles) = self.0.upgrade() {
            let mut handles = handles.borrow_mut();
            handles.retain(|registered| !registered.is_destroyed() && registered.is_alive());
            handles.push(handle.clone());
        }
    }
}
