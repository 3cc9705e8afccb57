//! Element handles with listener lifecycle, and the playground chrome
//! (status bar, settings panel) built on them.
//!
//! Widgets render HTML strings into an in-memory [`dom::Document`] through
//! [`ElementHandle::set_content`] and rebind on the exports it returns. On
//! wasm32, `platform::browser` mirrors that document into the page.

pub mod config;
pub mod dom;
pub mod element;
pub mod error;
#[cfg(target_arch = "wasm32")]
pub mod platform;
pub mod state;
pub mod widgets;

pub use element::{
    Disposer, ElementHandle, ExportSet, Exports, HandleRegistry, NamedExports, ResolveOptions,
    Target, Ui,
};
pub use error::{Error, Result};
pub use state::{MemoryState, PlaygroundState};
pub use widgets::{SettingsPanel, StatusBar, StatusBarActions};
