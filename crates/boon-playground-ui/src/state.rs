//! The application state the widgets render from.
//!
//! Widgets only see [`PlaygroundState`]. [`MemoryState`] keeps everything in
//! memory and is what the CLI and the tests drive.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEntry {
    pub filename: String,
    pub entry_point: bool,
}

impl FileEntry {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            entry_point: false,
        }
    }

    pub fn entry(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            entry_point: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub avatar: String,
}

/// Persisted editor preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub status_bar: bool,
}

/// Change subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub trait PlaygroundState {
    /// Calls `callback` after every change until the subscription is dropped.
    fn listen(&self, callback: Rc<dyn Fn()>) -> Subscription;
    fn files(&self) -> Vec<FileEntry>;
    fn is_current_index(&self, index: usize) -> bool;
    fn pending_changes(&self) -> bool;
    fn logged_in(&self) -> bool;
    fn profile(&self) -> Option<Profile>;
    fn is_forkable(&self) -> bool;
    fn name(&self) -> Option<String>;
    fn editor_settings(&self) -> EditorSettings;
    /// Persists status bar visibility.
    fn update_status_bar_visibility(&self, visible: bool);
    fn fork(&self);
}

/// Serializable contents of a [`MemoryState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    pub files: Vec<FileEntry>,
    pub current_index: usize,
    pub pending_changes: bool,
    pub profile: Option<Profile>,
    pub forkable: bool,
    pub name: Option<String>,
    pub editor_settings: EditorSettings,
}

struct MemoryStateInner {
    snapshot: RefCell<StateSnapshot>,
    listeners: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
    next_listener: Cell<u64>,
    forks: Cell<usize>,
}

#[derive(Clone)]
pub struct MemoryState {
    inner: Rc<MemoryStateInner>,
}

impl fmt::Debug for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoryState")
            .field("snapshot", &self.inner.snapshot.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::new(StateSnapshot::default())
    }
}

impl MemoryState {
    pub fn new(snapshot: StateSnapshot) -> Self {
        Self {
            inner: Rc::new(MemoryStateInner {
                snapshot: RefCell::new(snapshot),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                forks: Cell::new(0),
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Applies `change` and notifies listeners.
    pub fn update(&self, change: impl FnOnce(&mut StateSnapshot)) {
        change(&mut self.inner.snapshot.borrow_mut());
        self.notify();
    }

    pub fn notify(&self) {
        let listeners: Vec<Rc<dyn Fn()>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn fork_count(&self) -> usize {
        self.inner.forks.get()
    }

    pub fn status_bar_visible(&self) -> bool {
        self.inner.snapshot.borrow().editor_settings.status_bar
    }
}

impl PlaygroundState for MemoryState {
    fn listen(&self, callback: Rc<dyn Fn()>) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, callback));
        let inner: Weak<MemoryStateInner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
            }
        })
    }

    fn files(&self) -> Vec<FileEntry> {
        self.inner.snapshot.borrow().files.clone()
    }

    fn is_current_index(&self, index: usize) -> bool {
        self.inner.snapshot.borrow().current_index == index
    }

    fn pending_changes(&self) -> bool {
        self.inner.snapshot.borrow().pending_changes
    }

    fn logged_in(&self) -> bool {
        self.inner.snapshot.borrow().profile.is_some()
    }

    fn profile(&self) -> Option<Profile> {
        self.inner.snapshot.borrow().profile.clone()
    }

    fn is_forkable(&self) -> bool {
        self.inner.snapshot.borrow().forkable
    }

    fn name(&self) -> Option<String> {
        self.inner.snapshot.borrow().name.clone()
    }

    fn editor_settings(&self) -> EditorSettings {
        self.inner.snapshot.borrow().editor_settings.clone()
    }

    fn update_status_bar_visibility(&self, visible: bool) {
        self.inner.snapshot.borrow_mut().editor_settings.status_bar = visible;
    }

    fn fork(&self) {
        self.inner.forks.set(self.inner.forks.get() + 1);
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_stops_notifications() {
        let state = MemoryState::default();
        let calls = Rc::new(Cell::new(0));
        let subscription = {
            let calls = calls.clone();
            state.listen(Rc::new(move || calls.set(calls.get() + 1)))
        };

        state.update(|snapshot| snapshot.pending_changes = true);
        drop(subscription);
        state.update(|snapshot| snapshot.pending_changes = false);

        assert_eq!(calls.get(), 1);
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn snapshot_loads_from_json() {
        let state = MemoryState::from_json(
            r#"{
                "files": [{ "filename": "main.js", "entry_point": true }, { "filename": "util.js" }],
                "current_index": 1,
                "name": "demo",
                "editor_settings": { "status_bar": true }
            }"#,
        )
        .unwrap();

        assert_eq!(state.files(), vec![FileEntry::entry("main.js"), FileEntry::new("util.js")]);
        assert!(state.is_current_index(1));
        assert!(!state.logged_in());
        assert_eq!(state.name().as_deref(), Some("demo"));
        assert!(state.editor_settings().status_bar);
    }

    #[test]
    fn visibility_update_persists_without_notifying() {
        let state = MemoryState::default();
        let calls = Rc::new(Cell::new(0));
        let _subscription = {
            let calls = calls.clone();
            state.listen(Rc::new(move || calls.set(calls.get() + 1)))
        };

        state.update_status_bar_visibility(true);

        assert!(state.status_bar_visible());
        assert_eq!(calls.get(), 0);
    }
}
