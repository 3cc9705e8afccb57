//! Editor chrome built on [`ElementHandle`](crate::ElementHandle) re-renders.

mod settings_panel;
mod status_bar;

pub use settings_panel::SettingsPanel;
pub use status_bar::{StatusBar, StatusBarActions, StatusBarExports, grid_columns};
