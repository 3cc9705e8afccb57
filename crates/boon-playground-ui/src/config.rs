//! Widget configuration, deserialized from JSON.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    /// Production builds show the profile button.
    pub production: bool,
    pub visible_height: String,
    pub hidden_height: String,
    pub status_bar_selector: String,
    pub layout_selector: String,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self {
            production: false,
            visible_height: "36px".to_owned(),
            hidden_height: "6px".to_owned(),
            status_bar_selector: ".status-bar".to_owned(),
            layout_selector: ".app .layout".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPanelConfig {
    pub toggler_selector: String,
    pub panel_selector: String,
    /// Toggler icon while the panel is hidden.
    pub open_icon: String,
    /// Toggler icon while the panel is shown.
    pub close_icon: String,
}

impl Default for SettingsPanelConfig {
    fn default() -> Self {
        Self {
            toggler_selector: ".settings-button".to_owned(),
            panel_selector: ".settings".to_owned(),
            open_icon: "./assets/img/laptop.svg".to_owned(),
            close_icon: "./assets/img/close.svg".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub demos: Vec<Demo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Demo {
    /// Snippet paths; links show their basename.
    pub snippets: Vec<String>,
}

/// The demo and snippet currently open in the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPosition {
    pub demo: usize,
    pub snippet: usize,
}
