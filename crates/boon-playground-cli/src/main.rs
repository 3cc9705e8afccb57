use anyhow::{Context, Result, bail};
use boon_playground_ui::config::{self, EditorPosition, PanelSettings, SettingsPanelConfig, StatusBarConfig};
use boon_playground_ui::state::StateSnapshot;
use boon_playground_ui::{ElementHandle, MemoryState, PlaygroundState, SettingsPanel, StatusBar, StatusBarActions, Ui};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

const STATUS_BAR_PAGE: &str =
    r#"<div class="app"><div class="layout"></div><div class="status-bar"></div></div>"#;
const SETTINGS_PAGE: &str =
    r#"<img class="settings-button" src="./assets/img/laptop.svg"><div class="settings"></div>"#;

#[derive(Parser)]
#[command(name = "boon-playground")]
#[command(about = "Render the Boon playground chrome headlessly")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the status bar, replay clicks and print the page
    StatusBar {
        /// Playground state as JSON
        #[arg(long)]
        state: PathBuf,
        /// Show the profile button
        #[arg(long)]
        production: bool,
        /// Status bar config as JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Export to left-click, `bar` for the bar itself
        #[arg(long, value_name = "EXPORT[:N]")]
        click: Vec<ExportTarget>,
        /// Export to right-click, after all left-clicks
        #[arg(long, value_name = "EXPORT[:N]")]
        right_click: Vec<ExportTarget>,
    },
    /// Mount the settings panel and print the page
    Settings {
        /// Demo list as JSON
        #[arg(long)]
        settings: PathBuf,
        /// Demo open in the editor
        #[arg(long, default_value = "0")]
        demo: usize,
        /// Snippet open in the editor
        #[arg(long, default_value = "0")]
        snippet: usize,
        /// Click the toggler once
        #[arg(long)]
        open: bool,
    },
}

/// The `N`th export named `EXPORT`, counting from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExportTarget {
    name: String,
    index: usize,
}

impl FromStr for ExportTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, index) = match value.split_once(':') {
            Some((name, index)) => {
                let index = index
                    .parse()
                    .map_err(|_| format!("'{index}' is not an export index"))?;
                (name, index)
            }
            None => (value, 0),
        };
        if name.is_empty() {
            return Err("export name is empty".to_owned());
        }
        Ok(Self {
            name: name.to_owned(),
            index,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::StatusBar {
            state,
            production,
            config: config_path,
            click,
            right_click,
        } => {
            let snapshot: StateSnapshot =
                config::from_json(&read(&state)?).context("Failed to parse playground state")?;
            let mut bar_config = match config_path {
                Some(path) => config::from_json(&read(&path)?).context("Failed to parse status bar config")?,
                None => StatusBarConfig::default(),
            };
            bar_config.production |= production;
            println!("{}", run_status_bar(snapshot, bar_config, &click, &right_click)?);
        }

        Commands::Settings {
            settings,
            demo,
            snippet,
            open,
        } => {
            let settings: PanelSettings =
                config::from_json(&read(&settings)?).context("Failed to parse panel settings")?;
            println!("{}", run_settings(settings, EditorPosition { demo, snippet }, open)?);
        }
    }

    Ok(())
}

fn run_status_bar(
    snapshot: StateSnapshot,
    config: StatusBarConfig,
    clicks: &[ExportTarget],
    right_clicks: &[ExportTarget],
) -> Result<String> {
    let ui = Ui::from_html(STATUS_BAR_PAGE);
    let state = MemoryState::new(snapshot);
    let actions = StatusBarActions::default()
        .on_show_file({
            let state = state.clone();
            move |index| {
                eprintln!("show file {index}");
                state.update(|snapshot| snapshot.current_index = index);
            }
        })
        .on_edit_file(|index| eprintln!("edit file {index}"))
        .on_new_file(|| eprintln!("new file"))
        .on_show_settings(|| eprintln!("show settings"))
        .on_show_profile(|| eprintln!("show profile"))
        .on_edit_name(|| eprintln!("edit name"));
    let status_bar = StatusBar::mount(&ui, Rc::new(state.clone()), actions, config)?;

    for target in clicks {
        export_handle(&status_bar, target)?.click();
    }
    for target in right_clicks {
        export_handle(&status_bar, target)?.right_click();
    }
    if state.fork_count() > 0 {
        eprintln!("forked {} time(s)", state.fork_count());
    }
    eprintln!(
        "status bar {}",
        if status_bar.is_expanded() { "expanded" } else { "collapsed" }
    );
    log::debug!("persisted visibility: {}", state.editor_settings().status_bar);
    Ok(ui.html())
}

fn export_handle(status_bar: &StatusBar, target: &ExportTarget) -> Result<ElementHandle> {
    if target.name == "bar" {
        return Ok(status_bar.bar().clone());
    }
    let exports = status_bar.bar().exports();
    let handle = exports.all(&target.name).nth(target.index).cloned();
    match handle {
        Some(handle) => Ok(handle),
        None => bail!("No export '{}' at index {}", target.name, target.index),
    }
}

fn run_settings(settings: PanelSettings, position: EditorPosition, open: bool) -> Result<String> {
    let ui = Ui::from_html(SETTINGS_PAGE);
    let panel = SettingsPanel::mount(
        &ui,
        settings,
        position,
        SettingsPanelConfig::default(),
        |demo, snippet| eprintln!("open snippet {demo},{snippet}"),
    )?;
    if open {
        panel.toggler().click();
    }
    Ok(ui.html())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_target_parses_optional_index() {
        assert_eq!(
            "file:2".parse::<ExportTarget>(),
            Ok(ExportTarget { name: "file".to_owned(), index: 2 })
        );
        assert_eq!(
            "close".parse::<ExportTarget>(),
            Ok(ExportTarget { name: "close".to_owned(), index: 0 })
        );
        assert!("file:x".parse::<ExportTarget>().is_err());
        assert!(":1".parse::<ExportTarget>().is_err());
    }

    #[test]
    fn status_bar_click_expands_and_prints_files() {
        let snapshot = StateSnapshot {
            files: vec![
                boon_playground_ui::state::FileEntry::entry("main.js"),
                boon_playground_ui::state::FileEntry::new("util.js"),
            ],
            ..StateSnapshot::default()
        };
        let clicks = ["bar".parse().unwrap(), "file:1".parse().unwrap()];
        let html = run_status_bar(snapshot, StatusBarConfig::default(), &clicks, &[]).unwrap();

        assert!(html.contains("display: grid"));
        assert!(html.contains(r#"class="file active""#));
        assert!(html.contains("util.js"));
    }

    #[test]
    fn settings_open_lists_snippets() {
        let settings: PanelSettings =
            config::from_json(r#"{ "demos": [ { "snippets": ["demos/a.js", "demos/b.js"] } ] }"#).unwrap();
        let html = run_settings(settings, EditorPosition { demo: 0, snippet: 1 }, true).unwrap();

        assert!(html.contains(">a.js</a>"));
        assert!(html.contains("./assets/img/close.svg"));
    }
}
